use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::models::{ConnectionId, JoinOutcome, LeaveOutcome, Participant, ServerEvent, SignalingError};
use crate::services::directory::RoomDirectory;

pub struct SignalingRelay {
    directory: Arc<RoomDirectory>,
    connections: DashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
}

impl SignalingRelay {
    pub fn new(directory: Arc<RoomDirectory>) -> Self {
        Self {
            directory,
            connections: DashMap::new(),
        }
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn register(&self, connection_id: ConnectionId, sender: mpsc::Sender<ServerEvent>) {
        self.connections.insert(connection_id, sender);
        debug!("Connection {} registered", connection_id);
    }

    /// Leaves any room the connection is in, then forgets its queue.
    pub fn unregister(&self, connection_id: ConnectionId) {
        self.leave(connection_id);
        if self.connections.remove(&connection_id).is_some() {
            debug!("Connection {} unregistered", connection_id);
        }
    }

    /// Enqueues without waiting. Returns false when the event was dropped.
    pub fn deliver(&self, to: ConnectionId, event: ServerEvent) -> bool {
        let Some(sender) = self.connections.get(&to).map(|s| s.value().clone()) else {
            warn!("Dropping event for unknown connection {}", to);
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full for connection {}, event dropped", to);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Outbound queue closed for connection {}, event dropped", to);
                false
            }
        }
    }

    pub fn join_room(&self, room_code: &str, participant: Participant) -> Result<JoinOutcome, SignalingError> {
        let notice = ServerEvent::other_user(&participant);
        let outcome = self.directory.join(room_code, participant)?;

        if let JoinOutcome::Paired { peer } = &outcome {
            self.deliver(peer.connection_id, notice);
        }

        Ok(outcome)
    }

    fn peer_target(&self, from: ConnectionId, to: ConnectionId) -> Result<(), SignalingError> {
        match self.directory.peer_of(from) {
            Some(peer) if peer.connection_id == to => Ok(()),
            _ => Err(SignalingError::UnknownPeer(to)),
        }
    }

    pub fn send_signal(&self, from: ConnectionId, to: ConnectionId, signal: Value) -> Result<(), SignalingError> {
        self.peer_target(from, to)?;
        self.deliver(to, ServerEvent::ReceivingSignal { signal, sender: from });
        Ok(())
    }

    pub fn re_send_signal(&self, from: ConnectionId, to: ConnectionId, signal: Value) -> Result<(), SignalingError> {
        self.peer_target(from, to)?;
        self.deliver(to, ServerEvent::ReReceivingSignal { signal, sender: from });
        Ok(())
    }

    pub fn leave(&self, connection_id: ConnectionId) -> Option<LeaveOutcome> {
        let outcome = self.directory.leave(connection_id)?;

        if let Some(remaining) = &outcome.remaining {
            self.deliver(remaining.connection_id, ServerEvent::UserLeave { socket_id: connection_id });
        }

        Some(outcome)
    }

    /// Expires rooms whose lone occupant has waited longer than `ttl`.
    pub fn sweep_idle(&self, ttl: Duration) -> usize {
        let expired = self.directory.expire_idle(ttl, Utc::now());

        for room in &expired {
            self.deliver(room.occupant.connection_id, ServerEvent::RoomExpired { room: room.room_code.clone() });
        }

        if !expired.is_empty() {
            info!("Expired {} idle rooms", expired.len());
        }
        expired.len()
    }
}
