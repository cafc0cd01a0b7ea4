use std::sync::Arc;

use axum::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::rest::extract::AppQuery;
use crate::engine::presence;
use crate::error::AppError;
use crate::models::identity::{Actor, Role};
use crate::notify::DriverConnection;
use crate::state::AppState;

/// Browsers cannot set headers on a websocket handshake, so the bearer token
/// travels in the query string.
#[derive(Deserialize)]
pub struct StreamParams {
    pub token: Option<String>,
    pub replace: Option<bool>,
}

/// A driver admitted to the event stream. Extracted ahead of the upgrade so a
/// bad credential is refused before any handshake work or registration.
pub struct StreamDriver {
    pub driver: Actor,
    pub replace: bool,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StreamDriver {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AppQuery(params) = AppQuery::<StreamParams>::from_request_parts(parts, state).await?;

        let token = params
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("missing token".to_string()))?;

        let driver = state.auth.verify(token)?;
        if driver.role != Role::Driver {
            return Err(AppError::Unauthorized("reserved for drivers".to_string()));
        }

        Ok(Self {
            driver,
            replace: params.replace.unwrap_or(false),
        })
    }
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    admitted: StreamDriver,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let driver_id = admitted.driver.id;
    presence::heartbeat(&state, driver_id);

    let connection = state.hub.connect(driver_id, admitted.replace);
    ws.on_upgrade(move |socket| handle_socket(socket, connection))
}

async fn handle_socket(socket: WebSocket, mut connection: DriverConnection) {
    let (mut sender, mut receiver) = socket.split();
    let driver_id = connection.driver_id();
    let connection_id = connection.id();

    info!(driver_id = %driver_id, connection_id = %connection_id, "driver stream opened");

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = connection.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize driver event");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    // Whichever side ends first takes the other down; the connection is
    // dropped with the send task and leaves the live set.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(driver_id = %driver_id, connection_id = %connection_id, "driver stream closed");
}
