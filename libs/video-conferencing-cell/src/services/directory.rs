use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::models::{ConnectionId, ExpiredRoom, JoinOutcome, LeaveOutcome, Participant, SignalingError};

pub const ROOM_CAPACITY: usize = 2;

#[derive(Debug)]
struct RoomSession {
    participants: Vec<Participant>,
    created_at: DateTime<Utc>,
    /// When the room last dropped to a single occupant.
    solo_since: DateTime<Utc>,
}

/// Room code -> at most two participants.
///
/// Each room is mutated under its own map-entry lock. A connection is in at
/// most one room, tracked in a separate index that is never locked while a
/// room entry is held.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: DashMap<String, RoomSession>,
    memberships: DashMap<ConnectionId, String>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room_code: &str, participant: Participant) -> Result<JoinOutcome, SignalingError> {
        let connection_id = participant.connection_id;
        if let Some(current) = self.room_of(connection_id) {
            return Err(SignalingError::AlreadyInRoom(current));
        }

        let now = Utc::now();
        let outcome = {
            let mut room = self.rooms
                .entry(room_code.to_string())
                .or_insert_with(|| RoomSession {
                    participants: Vec::with_capacity(ROOM_CAPACITY),
                    created_at: now,
                    solo_since: now,
                });

            // One seat per identity
            if room.participants.iter().any(|p| p.user_id == participant.user_id) {
                return Err(SignalingError::AlreadyInRoom(room_code.to_string()));
            }
            if room.participants.len() >= ROOM_CAPACITY {
                return Err(SignalingError::RoomFull(room_code.to_string()));
            }

            let outcome = match room.participants.first() {
                Some(peer) => JoinOutcome::Paired { peer: peer.clone() },
                None => {
                    room.solo_since = now;
                    JoinOutcome::Waiting
                }
            };
            room.participants.push(participant);
            outcome
        };

        self.memberships.insert(connection_id, room_code.to_string());
        info!("Connection {} joined room {}", connection_id, room_code);
        Ok(outcome)
    }

    /// Removes the connection from its room; unknown connections are a no-op.
    pub fn leave(&self, connection_id: ConnectionId) -> Option<LeaveOutcome> {
        let (_, room_code) = self.memberships.remove(&connection_id)?;

        let remaining = {
            let mut room = self.rooms.get_mut(&room_code)?;
            room.participants.retain(|p| p.connection_id != connection_id);
            room.solo_since = Utc::now();
            room.participants.first().cloned()
        };

        if remaining.is_none() {
            self.rooms.remove_if(&room_code, |_, room| room.participants.is_empty());
            debug!("Room {} is empty and was discarded", room_code);
        }

        info!("Connection {} left room {}", connection_id, room_code);
        Some(LeaveOutcome { room_code, remaining })
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.memberships.get(&connection_id).map(|code| code.value().clone())
    }

    pub fn peer_of(&self, connection_id: ConnectionId) -> Option<Participant> {
        let room_code = self.room_of(connection_id)?;
        let room = self.rooms.get(&room_code)?;
        room.participants
            .iter()
            .find(|p| p.connection_id != connection_id)
            .cloned()
    }

    pub fn occupants(&self, room_code: &str) -> Vec<Participant> {
        self.rooms
            .get(room_code)
            .map(|room| room.participants.clone())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drops rooms whose single occupant has waited longer than `ttl`.
    pub fn expire_idle(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<ExpiredRoom> {
        let is_idle = |room: &RoomSession| room.participants.len() == 1 && now - room.solo_since > ttl;

        let candidates: Vec<String> = self.rooms
            .iter()
            .filter(|entry| is_idle(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut expired = Vec::new();
        for room_code in candidates {
            // Re-checked under the entry lock; a peer may have joined meanwhile
            if let Some((room_code, mut room)) = self.rooms.remove_if(&room_code, |_, room| is_idle(room)) {
                if let Some(occupant) = room.participants.pop() {
                    self.memberships.remove(&occupant.connection_id);
                    info!(
                        "Room {} expired after waiting since {} ({}s old)",
                        room_code,
                        room.solo_since,
                        (now - room.created_at).num_seconds()
                    );
                    expired.push(ExpiredRoom {
                        room_code,
                        occupant,
                        waiting_since: room.solo_since,
                    });
                }
            }
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::auth::Role;
    use uuid::Uuid;

    fn participant(role: Role) -> Participant {
        Participant {
            connection_id: ConnectionId::new(),
            user_id: Uuid::new_v4(),
            role,
            nickname: None,
        }
    }

    #[test]
    fn test_join_pairs_second_and_rejects_third() {
        let directory = RoomDirectory::new();
        let patient = participant(Role::User);
        let doctor = participant(Role::Doctor);

        assert_eq!(directory.join("room", patient.clone()).unwrap(), JoinOutcome::Waiting);
        assert_eq!(
            directory.join("room", doctor.clone()).unwrap(),
            JoinOutcome::Paired { peer: patient.clone() }
        );
        assert_matches!(directory.join("room", participant(Role::User)), Err(SignalingError::RoomFull(_)));

        assert_eq!(directory.peer_of(patient.connection_id), Some(doctor.clone()));
        assert_eq!(directory.peer_of(doctor.connection_id), Some(patient));
        assert_eq!(directory.occupants("room").len(), 2);
    }

    #[test]
    fn test_connection_can_only_be_in_one_room() {
        let directory = RoomDirectory::new();
        let patient = participant(Role::User);

        directory.join("a", patient.clone()).unwrap();
        assert_matches!(directory.join("b", patient.clone()), Err(SignalingError::AlreadyInRoom(room)) if room == "a");
        assert_matches!(directory.join("a", patient), Err(SignalingError::AlreadyInRoom(_)));
        assert_eq!(directory.room_count(), 1);
    }

    #[test]
    fn test_leave_reports_remaining_and_discards_empty_rooms() {
        let directory = RoomDirectory::new();
        let patient = participant(Role::User);
        let doctor = participant(Role::Doctor);
        directory.join("room", patient.clone()).unwrap();
        directory.join("room", doctor.clone()).unwrap();

        let outcome = directory.leave(doctor.connection_id).unwrap();
        assert_eq!(outcome.remaining, Some(patient.clone()));
        assert_eq!(directory.peer_of(patient.connection_id), None);

        // A freed seat can be taken again
        let again = participant(Role::Doctor);
        assert_matches!(directory.join("room", again.clone()), Ok(JoinOutcome::Paired { .. }));
        directory.leave(again.connection_id);

        let outcome = directory.leave(patient.connection_id).unwrap();
        assert_eq!(outcome.remaining, None);
        assert_eq!(directory.room_count(), 0);
        assert!(directory.leave(patient.connection_id).is_none());
    }

    #[test]
    fn test_expire_idle_only_drops_solo_rooms_past_ttl() {
        let directory = RoomDirectory::new();
        let waiting = participant(Role::User);
        directory.join("solo", waiting.clone()).unwrap();
        directory.join("pair", participant(Role::User)).unwrap();
        directory.join("pair", participant(Role::Doctor)).unwrap();

        let ttl = Duration::minutes(15);
        assert!(directory.expire_idle(ttl, Utc::now()).is_empty());

        let expired = directory.expire_idle(ttl, Utc::now() + Duration::minutes(16));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].room_code, "solo");
        assert_eq!(expired[0].occupant, waiting);
        assert_eq!(directory.room_of(waiting.connection_id), None);
        assert_eq!(directory.room_count(), 1);
    }

    #[test]
    fn test_second_socket_of_same_user_does_not_take_a_seat() {
        let directory = RoomDirectory::new();
        let patient = participant(Role::User);
        let patient_again = Participant { connection_id: ConnectionId::new(), ..patient.clone() };
        let doctor = participant(Role::Doctor);

        assert_eq!(directory.join("room", patient.clone()).unwrap(), JoinOutcome::Waiting);
        assert_matches!(
            directory.join("room", patient_again.clone()),
            Err(SignalingError::AlreadyInRoom(room)) if room == "room"
        );
        assert_eq!(directory.room_of(patient_again.connection_id), None);

        assert_eq!(
            directory.join("room", doctor.clone()).unwrap(),
            JoinOutcome::Paired { peer: patient.clone() }
        );

        // Once the stale socket leaves, the reconnected one can take its seat
        directory.leave(patient.connection_id);
        assert_eq!(
            directory.join("room", patient_again).unwrap(),
            JoinOutcome::Paired { peer: doctor }
        );
    }

    #[test]
    fn test_concurrent_joins_never_exceed_capacity() {
        let directory = std::sync::Arc::new(RoomDirectory::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let directory = directory.clone();
                std::thread::spawn(move || directory.join("busy", participant(Role::User)).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|joined| *joined)
            .count();
        assert_eq!(admitted, ROOM_CAPACITY);
        assert_eq!(directory.occupants("busy").len(), ROOM_CAPACITY);
    }
}
