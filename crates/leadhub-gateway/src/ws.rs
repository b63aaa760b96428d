// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for realtime agent sessions.
//!
//! Client -> Server (JSON):
//! ```json
//! {"event": "agent:join", "data": {"agentId": "ana"}}
//! {"event": "subscribe", "data": {"topic": "queue:update"}}
//! {"event": "message:send", "data": {"conversationId": "...", "text": "Oi", "userId": "ana"}}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"event": "conversation:updated", "data": {...}, "seq": 7}
//! {"event": "error", "data": {"message": "..."}}
//! ```

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use leadhub_bus::{Event, SubscriptionRegistry};
use leadhub_core::{
    AgentDirectory, ConversationFilter, ConversationRepository, LeadhubError, Topic,
};
use leadhub_ingest::SendRequest;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::bearer_token;
use crate::server::GatewayState;

/// Frames buffered per connection before realtime events are dropped.
const OUTBOUND_BUFFER: usize = 256;

/// Event name of error frames.
pub const ERROR_EVENT: &str = "error";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentJoin {
    agent_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListConversations {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct TopicRequest {
    topic: String,
}

/// WebSocket frame from client.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
enum ClientFrame {
    #[serde(rename = "agent:join")]
    AgentJoin(AgentJoin),
    #[serde(rename = "message:send")]
    MessageSend(SendRequest),
    #[serde(rename = "conversations:list")]
    ConversationsList(ListConversations),
    #[serde(rename = "subscribe")]
    Subscribe(TopicRequest),
    #[serde(rename = "unsubscribe")]
    Unsubscribe(TopicRequest),
}

/// Handshake query; browsers cannot set headers on WebSocket upgrades.
#[derive(Debug, Default, Deserialize)]
pub struct WsAuth {
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Accepts the bearer token from the `Authorization` header or `?token=`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(auth): Query<WsAuth>,
    headers: HeaderMap,
) -> Response {
    let presented = bearer_token(&headers).or(auth.token.as_deref());
    if !state.auth.accepts(presented) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection.
///
/// A sender task forwards queued frames to the socket while this task reads
/// client frames. Bus subscriptions push into the same queue.
async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection::new(state, tx.clone());
    debug!(connection_id = %connection.id, "websocket connected");

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                if let Some(reply) = connection.handle_text(text_str).await {
                    if tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary, ping (handled by tungstenite layer)
        }
    }

    connection.close().await;
    sender_task.abort();
}

/// Per-socket session state.
pub struct Connection {
    id: String,
    state: GatewayState,
    registry: SubscriptionRegistry,
    outbound: mpsc::Sender<String>,
    agent_id: Option<String>,
}

impl Connection {
    pub fn new(state: GatewayState, outbound: mpsc::Sender<String>) -> Self {
        let mut registry = SubscriptionRegistry::new();
        if let Err(e) = registry.connect(state.bus.clone()) {
            warn!(error = %e, "event bus unavailable, realtime events disabled");
        }
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state,
            registry,
            outbound,
            agent_id: None,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.registry.is_armed(topic)
    }

    /// Handle one client frame and return the reply frame, if any.
    ///
    /// Failures come back as error frames.
    pub async fn handle_text(&mut self, text: &str) -> Option<String> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(connection_id = %self.id, error = %e, "invalid websocket frame");
                return Some(error_frame(&format!("invalid frame: {e}")));
            }
        };
        match self.dispatch(frame).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(connection_id = %self.id, error = %e, "websocket request failed");
                Some(error_frame(&e.to_string()))
            }
        }
    }

    async fn dispatch(&mut self, frame: ClientFrame) -> Result<Option<String>, LeadhubError> {
        match frame {
            ClientFrame::AgentJoin(join) => {
                let agent = self
                    .state
                    .storage
                    .get_agent(&join.agent_id)
                    .await?
                    .ok_or_else(|| LeadhubError::not_found("agent", &join.agent_id))?;
                self.state.storage.set_agent_online(&agent.id, true).await?;
                self.subscribe(Topic::Agent(agent.id.clone()))?;
                info!(connection_id = %self.id, agent_id = %agent.id, "agent joined");
                self.agent_id = Some(agent.id.clone());
                Ok(Some(frame_of("agent:joined", json!({ "agentId": agent.id }))))
            }
            ClientFrame::MessageSend(request) => {
                let message = self.state.dispatcher.send_text(request).await?;
                Ok(Some(frame_of("message:sent", json!({ "message": message }))))
            }
            ClientFrame::ConversationsList(list) => {
                let conversations = self
                    .state
                    .storage
                    .list_conversations(ConversationFilter {
                        assigned_to: Some(list.user_id),
                        ..ConversationFilter::default()
                    })
                    .await?;
                Ok(Some(frame_of(
                    "conversations:list",
                    json!({ "conversations": conversations }),
                )))
            }
            ClientFrame::Subscribe(request) => {
                let topic = Topic::from_str(&request.topic)?;
                self.subscribe(topic)?;
                Ok(Some(frame_of("subscribed", json!({ "topic": request.topic }))))
            }
            ClientFrame::Unsubscribe(request) => {
                let topic = Topic::from_str(&request.topic)?;
                self.registry.unregister(&topic);
                Ok(Some(frame_of(
                    "unsubscribed",
                    json!({ "topic": request.topic }),
                )))
            }
        }
    }

    fn subscribe(&mut self, topic: Topic) -> Result<(), LeadhubError> {
        let tx = self.outbound.clone();
        let connection_id = self.id.clone();
        self.registry.register(topic, move |event: Arc<Event>| {
            if tx.try_send(event.frame().to_string()).is_err() {
                debug!(%connection_id, topic = %event.topic, "websocket buffer full, event dropped");
            }
        })?;
        Ok(())
    }

    /// Drop subscriptions and mark the agent offline.
    pub async fn close(&mut self) {
        self.registry.disconnect();
        if let Some(agent_id) = self.agent_id.take() {
            if let Err(e) = self.state.storage.set_agent_online(&agent_id, false).await {
                warn!(%agent_id, error = %e, "failed to mark agent offline");
            }
        }
        debug!(connection_id = %self.id, "websocket closed");
    }
}

fn frame_of(event: &str, data: Value) -> String {
    json!({ "event": event, "data": data }).to_string()
}

/// Error frame sent instead of failing the socket.
pub fn error_frame(message: &str) -> String {
    frame_of(ERROR_EVENT, json!({ "message": message }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_deserialize() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"event":"agent:join","data":{"agentId":"ana"}}"#).unwrap();
        assert!(matches!(frame, ClientFrame::AgentJoin(ref j) if j.agent_id == "ana"));

        let frame: ClientFrame = serde_json::from_str(
            r#"{"event":"message:send","data":{"conversationId":"c1","text":"oi","userId":"ana"}}"#,
        )
        .unwrap();
        assert!(matches!(frame, ClientFrame::MessageSend(ref r) if r.conversation_id == "c1"));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"event":"subscribe","data":{"topic":"queue:update"}}"#)
                .unwrap();
        assert!(matches!(frame, ClientFrame::Subscribe(ref t) if t.topic == "queue:update"));
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"event":"nope","data":{}}"#).is_err());
    }

    #[test]
    fn error_frames_have_the_error_event() {
        let frame: Value = serde_json::from_str(&error_frame("boom")).unwrap();
        assert_eq!(frame["event"], "error");
        assert_eq!(frame["data"]["message"], "boom");
    }
}
