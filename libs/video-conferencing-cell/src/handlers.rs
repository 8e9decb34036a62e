use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use axum_extra::TypedHeader;
use futures::{SinkExt, StreamExt};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use appointment_cell::AppointmentLifecycle;
use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;

use crate::models::ServerEvent;
use crate::services::{SignalingRelay, SignalingSession};

#[derive(Clone)]
pub struct SignalingState {
    pub config: Arc<AppConfig>,
    pub relay: Arc<SignalingRelay>,
    pub lifecycle: Arc<AppointmentLifecycle>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Accepts the access token from the `Authorization` header or `?token=`.
#[axum::debug_handler]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SignalingState>,
    Query(query): Query<WsQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Response, AppError> {
    let token = match (&bearer, &query.token) {
        (Some(TypedHeader(auth)), _) => auth.token().to_string(),
        (None, Some(token)) => token.clone(),
        (None, None) => return Err(AppError::Auth("Missing access token".to_string())),
    };

    let user = validate_token(&token, &state.config.supabase_jwt_secret).map_err(|e| {
        debug!("Rejected signaling handshake: {}", e);
        AppError::Auth(e)
    })?;
    let user_id = user.uuid()?;
    let role = user.role();

    info!("Signaling connection upgrading for user {}", user_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, role)))
}

async fn handle_socket(socket: WebSocket, state: SignalingState, user_id: Uuid, role: Role) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.config.signaling_queue_capacity.max(1));

    let session = SignalingSession::open(state.relay.clone(), state.lifecycle.clone(), user_id, role, tx);
    let connection_id = session.connection_id();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to encode signaling event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Socket error on {}: {}", connection_id, e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    session.close();
    send_task.abort();
    info!("Signaling connection {} closed", connection_id);
}
