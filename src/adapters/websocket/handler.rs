//! WebSocket upgrade handler for live activity subscriptions.
//!
//! Connection lifecycle:
//! 1. Validate the access token and the caller's membership in the scope
//! 2. Upgrade to WebSocket
//! 3. Register a subscriber on the scope's channel
//! 4. Forward queued activities and answer pings until disconnect or eviction
//! 5. Unregister

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::adapters::http::middleware::auth_error_response;
use crate::application::{Subscriber, SubscriberRegistry};
use crate::config::DispatchConfig;
use crate::domain::activity::{ActivityNotification, ChannelKey};
use crate::domain::foundation::{ActivityId, AuthenticatedSession, ScopeId, Timestamp};
use crate::ports::SessionValidator;

use super::messages::{ClientMessage, ConnectedMessage, ServerMessage};
use super::sink::ChannelSink;

/// State shared by live socket handlers.
#[derive(Clone)]
pub struct LiveState {
    pub registry: Arc<SubscriberRegistry>,
    pub sessions: Arc<dyn SessionValidator>,
    pub queue_capacity: usize,
    pub write_timeout: Duration,
}

impl LiveState {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        sessions: Arc<dyn SessionValidator>,
        dispatch: &DispatchConfig,
    ) -> Self {
        Self {
            registry,
            sessions,
            queue_capacity: dispatch.queue_capacity,
            write_timeout: dispatch.write_timeout(),
        }
    }
}

/// Query parameters of the upgrade request.
///
/// Browsers cannot set headers on a WebSocket handshake, so the access token
/// travels in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct LiveQuery {
    pub token: Option<String>,
    /// Last activity id the client has applied, typically from a catch-up.
    pub cursor: Option<String>,
}

/// Handle WebSocket upgrade requests for a scope's activity stream.
///
/// Route: `GET /api/live/:scope_id?token=...&cursor=...`
pub async fn live_handler(
    ws: WebSocketUpgrade,
    Path(scope_id): Path<String>,
    Query(query): Query<LiveQuery>,
    State(state): State<LiveState>,
) -> Response {
    let admitted = match admit(&state, &scope_id, query).await {
        Ok(admitted) => admitted,
        Err(response) => return response,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, admitted, state))
}

/// A caller cleared to subscribe.
#[derive(Debug)]
struct Admitted {
    scope_id: ScopeId,
    session: AuthenticatedSession,
    cursor: Option<ActivityId>,
}

async fn admit(state: &LiveState, scope_id: &str, query: LiveQuery) -> Result<Admitted, Response> {
    let scope_id = ScopeId::new(scope_id)
        .map_err(|_| reject(StatusCode::BAD_REQUEST, "INVALID_SCOPE", "Invalid scope id"))?;

    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "Authentication required"))?;

    let session = state
        .sessions
        .validate(&token)
        .await
        .map_err(|e| auth_error_response(&e))?;

    if !session.permissions.can_access_scope(&scope_id) {
        tracing::debug!(
            user_id = %session.user_id,
            scope_id = %scope_id,
            "Live subscription refused: not a member"
        );
        return Err(reject(StatusCode::FORBIDDEN, "FORBIDDEN", "Not a member of this scope"));
    }

    let cursor = query
        .cursor
        .filter(|c| !c.is_empty())
        .map(ActivityId::new)
        .transpose()
        .map_err(|_| reject(StatusCode::BAD_REQUEST, "INVALID_CURSOR", "Invalid cursor"))?;

    Ok(Admitted {
        scope_id,
        session,
        cursor,
    })
}

fn reject(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "code": code
        })),
    )
        .into_response()
}

async fn handle_socket(socket: WebSocket, admitted: Admitted, state: LiveState) {
    let (sink, mut queue) = ChannelSink::new(state.queue_capacity);
    let mut subscriber = Subscriber::new(
        admitted.session.permissions,
        admitted.session.credential,
        Arc::new(sink),
    );
    if let Some(cursor) = admitted.cursor {
        subscriber = subscriber.with_cursor(cursor);
    }
    let subscriber_id = subscriber.id();
    let channel = ChannelKey::for_scope(&admitted.scope_id);

    state.registry.register(subscriber, channel.clone()).await;
    tracing::debug!(
        subscriber_id = %subscriber_id,
        user_id = %admitted.session.user_id,
        channel = %channel,
        "Live subscriber connected"
    );

    let (mut sender, mut receiver) = socket.split();

    let connected = ServerMessage::Connected(ConnectedMessage {
        subscriber_id: subscriber_id.to_string(),
        channel: channel.to_string(),
        timestamp: Timestamp::now().to_rfc3339(),
    });
    if let Err(e) = send_message(&mut sender, &connected).await {
        tracing::debug!(subscriber_id = %subscriber_id, "Failed to send connected message: {}", e);
        state.registry.unregister(subscriber_id).await;
        return;
    }

    // Replies to client frames share the socket with activities.
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(8);

    let write_timeout = state.write_timeout;
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                notification = queue.recv() => match notification {
                    Some(notification) => ServerMessage::from(notification),
                    // The dispatcher dropped us after a failed write
                    None => {
                        tracing::debug!(subscriber_id = %subscriber_id, "Subscriber evicted, closing connection");
                        let evicted = ServerMessage::error(
                            "SUBSCRIBER_EVICTED",
                            "Fell behind the activity stream; catch up and reconnect",
                        );
                        let _ = tokio::time::timeout(write_timeout, send_message(&mut sender, &evicted)).await;
                        break;
                    }
                },
                Some(reply) = reply_rx.recv() => reply,
            };
            match tokio::time::timeout(write_timeout, send_message(&mut sender, &msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(subscriber_id = %subscriber_id, "Send error, closing connection: {}", e);
                    break;
                }
                Err(_) => {
                    tracing::debug!(subscriber_id = %subscriber_id, "Socket write timed out, closing connection");
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => ServerMessage::pong(),
                        Err(_) => ServerMessage::error("UNSUPPORTED_MESSAGE", "Unsupported message"),
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::warn!(subscriber_id = %subscriber_id, "Received unsupported binary message");
                }
                // protocol-level, answered by axum
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::debug!(subscriber_id = %subscriber_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(subscriber_id = %subscriber_id, "Receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.unregister(subscriber_id).await;
    tracing::debug!(subscriber_id = %subscriber_id, "Live subscriber disconnected");
}

async fn send_message(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

/// Router for the live endpoint, nested under `/api/live`.
pub fn live_router() -> Router<LiveState> {
    Router::new().route("/:scope_id", get(live_handler))
}
