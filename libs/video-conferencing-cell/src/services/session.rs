use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use appointment_cell::AppointmentLifecycle;
use shared_models::auth::Role;

use crate::models::{ClientEvent, ConnectionId, Participant, ServerEvent, SignalingError};
use crate::services::relay::SignalingRelay;

/// One authenticated signaling connection, independent of the transport.
///
/// The socket task feeds it text frames; everything it emits goes through the
/// relay's outbound queue for this connection.
pub struct SignalingSession {
    connection_id: ConnectionId,
    user_id: Uuid,
    role: Role,
    relay: Arc<SignalingRelay>,
    lifecycle: Arc<AppointmentLifecycle>,
}

impl SignalingSession {
    /// Registers the outbound queue and greets the client with its socket id.
    pub fn open(
        relay: Arc<SignalingRelay>,
        lifecycle: Arc<AppointmentLifecycle>,
        user_id: Uuid,
        role: Role,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Self {
        let connection_id = ConnectionId::new();
        relay.register(connection_id, sender);
        relay.deliver(connection_id, ServerEvent::Connected { socket_id: connection_id });

        debug!("Signaling session {} opened for user {}", connection_id, user_id);
        Self {
            connection_id,
            user_id,
            role,
            relay,
            lifecycle,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Failures are reported back to this client as `error` frames.
    pub async fn handle_text(&self, text: &str) {
        if let Err(err) = self.dispatch(text).await {
            warn!("Signaling error on {}: {}", self.connection_id, err);
            self.relay.deliver(self.connection_id, ServerEvent::error(&err));
        }
    }

    async fn dispatch(&self, text: &str) -> Result<(), SignalingError> {
        match ClientEvent::parse(text)? {
            ClientEvent::JoinRoom { room, nickname } => {
                self.lifecycle.room_access(self.user_id, &room).await?;

                let participant = Participant {
                    connection_id: self.connection_id,
                    user_id: self.user_id,
                    role: self.role,
                    nickname,
                };
                self.relay.join_room(&room, participant)?;
                Ok(())
            }
            ClientEvent::SendSignal { socket_id, signal } => {
                self.relay.send_signal(self.connection_id, socket_id, signal)
            }
            ClientEvent::ReSendSignal { socket_id, signal } => {
                self.relay.re_send_signal(self.connection_id, socket_id, signal)
            }
            ClientEvent::LeaveRoom => {
                self.relay.leave(self.connection_id);
                Ok(())
            }
        }
    }

    pub fn close(self) {
        self.relay.unregister(self.connection_id);
        debug!("Signaling session {} closed", self.connection_id);
    }
}
