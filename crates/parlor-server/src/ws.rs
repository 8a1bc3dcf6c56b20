//! Socket endpoint.
//!
//! The handshake authenticates before upgrading, so an unknown token gets a
//! plain 401 instead of an open socket. After upgrade the connection is split:
//! a write task drains the session's outbound queue into the socket, and the
//! read loop handles heartbeats and room re-joins. Business mutations never
//! arrive over the socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use parlor_shared::{Principal, Room, SessionId, UserId};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{ApiQuery, AppState};
use crate::error::ServerError;
use crate::protocol::{ClientFrame, ServerEvent};
use crate::registry::Frame;

#[derive(Debug, Default, Deserialize)]
pub struct Handshake {
    /// Browsers cannot set headers on a socket handshake.
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ApiQuery(handshake): ApiQuery<Handshake>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let principal = state
        .principals
        .authenticate(&headers, handshake.token.as_deref())?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, principal)))
}

async fn handle_socket(socket: WebSocket, state: AppState, principal: Principal) {
    let user = principal.id;
    let (session_id, rx) = state.registry.register(principal).await;

    if let Err(e) = join_group_rooms(&state, session_id, user).await {
        warn!(session = %session_id, user = %user, error = %e, "Could not load group rooms");
    }

    let (ws_sender, ws_receiver) = socket.split();
    let mut write_task = tokio::spawn(write_loop(ws_sender, rx));
    let read_state = state.clone();
    let mut read_task = tokio::spawn(async move {
        read_loop(ws_receiver, &read_state, session_id, user).await;
    });

    // Whichever side finishes first tears the other down. The write side
    // ends when the reaper drops the session's sender.
    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    state.registry.unregister(session_id).await;
    info!(session = %session_id, user = %user, "Socket closed");
}

/// Join every active group room, then greet the client with its rooms and
/// current counters.
async fn join_group_rooms(
    state: &AppState,
    session_id: SessionId,
    user: UserId,
) -> Result<(), ServerError> {
    let groups = state.coordinator.group_rooms_for(user).await?;
    let rooms = state.registry.join_rooms(session_id, groups).await;
    let unread = state.coordinator.unread().counts_for(user).await?;

    let connected = ServerEvent::Connected {
        session_id,
        rooms,
        unread,
    };
    if let Err(e) = state.registry.send_to(session_id, &connected).await {
        warn!(session = %session_id, error = %e, "Could not encode connected event");
    }
    Ok(())
}

async fn write_loop(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Frame>,
) {
    while let Some(frame) = rx.recv().await {
        if sender.send(Message::text(frame.to_string())).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

async fn read_loop(
    mut receiver: futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    session_id: SessionId,
    user: UserId,
) {
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!(session = %session_id, error = %e, "Socket read error");
                break;
            }
        };

        // Any inbound traffic counts as liveness.
        state.registry.touch(session_id).await;

        let reply = match msg {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) => handle_frame(state, session_id, user, frame).await,
                Err(e) => ServerEvent::Error {
                    message: format!("invalid frame: {e}"),
                },
            },
            Message::Close(_) => break,
            Message::Binary(_) => ServerEvent::Error {
                message: "binary frames are not supported".into(),
            },
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Err(e) = state.registry.send_to(session_id, &reply).await {
            warn!(session = %session_id, error = %e, "Could not encode reply");
        }
    }
}

async fn handle_frame(
    state: &AppState,
    session_id: SessionId,
    user: UserId,
    frame: ClientFrame,
) -> ServerEvent {
    match frame {
        ClientFrame::Heartbeat => ServerEvent::HeartbeatAck {
            at: parlor_store::now(),
        },
        ClientFrame::JoinRooms => match state.coordinator.group_rooms_for(user).await {
            Ok(groups) => {
                let rooms: Vec<Room> = state.registry.reset_rooms(session_id, groups).await;
                debug!(session = %session_id, rooms = rooms.len(), "Rooms re-joined");
                ServerEvent::RoomsJoined { rooms }
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "Could not re-join rooms");
                ServerEvent::Error {
                    message: "could not load rooms".into(),
                }
            }
        },
    }
}
