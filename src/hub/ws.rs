use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::api::{ApiError, SharedState, session_user};
use super::models::*;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── Event types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HubEvent {
    PodCreated {
        pod: Pod,
    },
    PodMemberAdded {
        pod_id: i64,
        member: MemberView,
    },

    BlockCreated {
        block: Block,
    },
    BlockUpdated {
        block: Block,
    },
    BlockDeleted {
        block_id: i64,
    },
    BlockMemberAdded {
        block_id: i64,
        member: MemberView,
    },

    MessagePosted {
        message: ChatMessage,
    },
    MessageDeleted {
        block_id: i64,
        message_id: i64,
    },

    DocumentUploaded {
        document: Document,
    },
    DocumentDeleted {
        block_id: i64,
        document_id: i64,
    },

    EventCreated {
        event: CalendarEvent,
    },
    EventUpdated {
        event: CalendarEvent,
    },
    EventDeleted {
        block_id: i64,
        event_id: i64,
    },

    GoalCreated {
        goal: Goal,
    },
    GoalUpdated {
        goal: Goal,
    },
    GoalDeleted {
        block_id: i64,
        goal_id: i64,
    },
}

/// A serialized event tagged with the pod it concerns.
///
/// Block content events also carry the set of users allowed to see the
/// block; sockets of other pod members drop them.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub pod_id: i64,
    pub audience: Option<Arc<HashSet<i64>>>,
    pub json: String,
}

impl Envelope {
    pub fn visible_to(&self, user_id: i64, pods: &HashSet<i64>) -> bool {
        pods.contains(&self.pod_id)
            && self
                .audience
                .as_ref()
                .is_none_or(|users| users.contains(&user_id))
    }
}

// ── WebSocket handler ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    pub token: Option<String>,
    pub pod_id: Option<i64>,
}

/// `GET /ws?token=...[&podId=...]`.
///
/// Browsers cannot set headers on a WebSocket handshake, so the session token
/// travels in the query string. Without `podId` the socket follows every pod
/// the user belonged to when it connected.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(params): Query<WsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let token = params
        .token
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".into()))?;
    let user = session_user(&state, &token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".into()))?;

    let user_id = user.id;
    let pods: HashSet<i64> = match params.pod_id {
        Some(pod_id) => {
            state
                .db
                .call(move |db| db.require_pod_access(pod_id, user_id))
                .await?;
            HashSet::from([pod_id])
        }
        None => state
            .db
            .call(move |db| db.list_pods_for_user(user_id))
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect(),
    };

    let rx = state.ws_tx.subscribe();
    debug!(user_id, pods = pods.len(), "websocket connected");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, rx, user_id, pods)))
}

async fn handle_socket(
    socket: WebSocket,
    rx: broadcast::Receiver<Envelope>,
    user_id: i64,
    pods: HashSet<i64>,
) {
    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, rx, user_id, pods).await;
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Forwards broadcast events the user may see in the followed pods, reads
/// client frames, and
/// pings every [`PING_INTERVAL`]. If no Pong arrives within [`PONG_TIMEOUT`]
/// the connection is considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<Envelope>,
    user_id: i64,
    pods: HashSet<i64>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    debug!("websocket pong timeout");
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(envelope) => {
                        if !envelope.visible_to(user_id, &pods) {
                            continue;
                        }
                        if sender.send(Message::Text(envelope.json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "websocket receiver lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast an event to every socket following `pod_id`.
/// Returns silently when nobody is connected.
pub fn broadcast_event(tx: &broadcast::Sender<Envelope>, pod_id: i64, event: &HubEvent) {
    send_envelope(tx, pod_id, None, event);
}

/// Broadcast a block content event to the block's audience only.
pub fn broadcast_block_event(
    tx: &broadcast::Sender<Envelope>,
    audience: BlockAudience,
    event: &HubEvent,
) {
    send_envelope(tx, audience.pod_id, Some(Arc::new(audience.user_ids)), event);
}

fn send_envelope(
    tx: &broadcast::Sender<Envelope>,
    pod_id: i64,
    audience: Option<Arc<HashSet<i64>>>,
    event: &HubEvent,
) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(Envelope {
                pod_id,
                audience,
                json,
            });
        }
        Err(e) => {
            warn!(error = %e, "failed to serialize hub event");
        }
    }
}
