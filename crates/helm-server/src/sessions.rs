use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::handlers::{self, HandlerState};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const SESSION_TIMEOUT: Duration = Duration::from_secs(90);

/// Unique identifier of one connected administrator session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl Default for SessionId {
    fn default() -> Self {
        Self(format!("sess_{}", Uuid::now_v7()))
    }
}

impl SessionId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected administrator session.
pub struct Session {
    pub id: SessionId,
    tx: mpsc::Sender<String>,
    open: AtomicBool,
    last_pong: AtomicU64,
}

impl Session {
    fn new(id: SessionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            open: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < SESSION_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all live sessions, the broadcast target for snapshot
/// propagation. The core never tracks sessions beyond this.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    max_send_queue: usize,
}

impl SessionRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new session and return its ID + outbound receiver.
    pub fn register(&self) -> (SessionId, mpsc::Receiver<String>) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let session = Arc::new(Session::new(id.clone(), tx));
        self.sessions.insert(id.clone(), session);
        (id, rx)
    }

    pub fn unregister(&self, id: &SessionId) {
        if let Some((_, session)) = self.sessions.remove(id) {
            session.mark_closed();
        }
    }

    /// Send to one session. Returns false, without raising, when the
    /// session is gone, closed, or its queue is full.
    pub fn send_to(&self, id: &SessionId, message: String) -> bool {
        let Some(session) = self.sessions.get(id) else {
            return false;
        };
        if !session.is_open() {
            tracing::debug!(session_id = %id, "session closed, send suppressed");
            return false;
        }
        match session.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    session_id = %id,
                    msg_len = msg.len(),
                    "send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Fan a message out to every open session, optionally excluding one
    /// (the initiator, which already received its own acknowledgment).
    /// A slow or dead session drops its own copy without affecting others.
    pub fn broadcast(&self, message: &str, except: Option<&SessionId>) -> usize {
        let mut delivered = 0;
        for entry in self.sessions.iter() {
            let session = entry.value();
            if Some(&session.id) == except {
                continue;
            }
            if !session.is_open() {
                continue;
            }
            if session.tx.try_send(message.to_owned()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Remove sessions that haven't answered pings within the timeout.
    pub fn cleanup_dead_sessions(&self) -> usize {
        let dead: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.value().id.clone())
            .collect();

        let removed = dead.len();
        for id in dead {
            self.unregister(&id);
            tracing::info!(session_id = %id, "cleaned up dead session");
        }
        removed
    }
}

/// Drive one WebSocket connection: writer forwards queued responses plus
/// heartbeat pings; reader dispatches inbound commands sequentially, so a
/// session's commands are handled in arrival order while sessions stay
/// concurrent with each other.
pub async fn handle_connection(
    socket: WebSocket,
    session_id: SessionId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<SessionRegistry>,
    state: Arc<HandlerState>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_sid = session_id.clone();
    let writer_registry = Arc::clone(&registry);
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(session) = writer_registry.sessions.get(&writer_sid) {
            session.mark_closed();
        }
    });

    let reader_sid = session_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    handlers::dispatch(&state, &reader_registry, &reader_sid, text.as_str()).await;
                }
                WsMessage::Pong(_) => {
                    if let Some(session) = reader_registry.sessions.get(&reader_sid) {
                        session.record_pong();
                    }
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum answers pongs automatically
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&session_id);
    tracing::info!(session_id = %session_id, "session disconnected");
}

/// Periodic reaper for sessions whose heartbeat lapsed.
pub fn start_cleanup_task(
    registry: Arc<SessionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_sessions();
            if removed > 0 {
                tracing::info!(removed = removed, "dead session cleanup");
            }
        }
    })
}
