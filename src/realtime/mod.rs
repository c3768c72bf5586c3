//! Realtime event stream manager.
//!
//! Owns the process-wide websocket connection: at most one exists per
//! process lifetime, created lazily on the first `connect` call. Reconnects
//! are bounded (5 attempts, fixed 1 s backoff); the attempt counter resets
//! whenever a connection is established. Room membership is
//! reference-counted, so a consumer tearing down early can never evict a
//! room another consumer still needs.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::dashes::{DashTotalUpdate, NewDashEvent};
use crate::moments::Moment;
use crate::trending::TrendingUpdate;
use crate::types::{City, ProcessableEvent};

pub mod subscriptions;

pub use subscriptions::{EventKind, SubscriptionHandle, SubscriptionId};
use subscriptions::SubscriptionRegistry;

/// Reconnect policy: up to 5 consecutive failed attempts, 1 s apart.
const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RealtimeError>;

/// A broadcast scope on the event stream. City rooms carry trending and
/// new-moment events; moment rooms carry dash events for one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    City(City),
    Moment(String),
}

impl Room {
    fn join_message(&self) -> ControlMessage {
        match self {
            Room::City(city) => ControlMessage::JoinCity {
                room: city.slug().to_string(),
            },
            Room::Moment(id) => ControlMessage::JoinMoment { room: id.clone() },
        }
    }

    fn leave_message(&self) -> ControlMessage {
        match self {
            Room::City(city) => ControlMessage::LeaveCity {
                room: city.slug().to_string(),
            },
            Room::Moment(id) => ControlMessage::LeaveMoment { room: id.clone() },
        }
    }
}

/// Outbound control frames. Event names must match the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ControlMessage {
    JoinCity { room: String },
    LeaveCity { room: String },
    JoinMoment { room: String },
    LeaveMoment { room: String },
}

/// `new-moment` push payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMomentEvent {
    pub moment: Moment,
}

/// Inbound push events. Event names must match the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushEvent {
    NewDash(NewDashEvent),
    DashTotalUpdate(DashTotalUpdate),
    TrendingUpdate(TrendingUpdate),
    NewMoment(NewMomentEvent),
}

impl PushEvent {
    /// Parses one inbound text frame.
    pub fn parse(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

struct RealtimeInner {
    url: String,
    event_sender: Sender<ProcessableEvent>,
    registry: Arc<SubscriptionRegistry>,
    rooms: dashmap::DashMap<Room, usize>,
    outbound_tx: UnboundedSender<ControlMessage>,
    outbound_rx: std::sync::Mutex<Option<UnboundedReceiver<ControlMessage>>>,
    shutdown_tx: Sender<()>,
    shutdown_rx: std::sync::Mutex<Option<Receiver<()>>>,
    status: std::sync::RwLock<ConnectionStatus>,
    started: AtomicBool,
}

#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<RealtimeInner>,
}

impl std::fmt::Debug for RealtimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeManager")
            .field("url", &self.inner.url)
            .field("status", &self.status())
            .field("rooms", &self.inner.rooms.len())
            .finish()
    }
}

impl RealtimeManager {
    /// Create a new realtime manager.
    ///
    /// # Arguments
    ///
    /// * `url` - The event stream URL to connect to
    /// * `event_sender` - Channel sender for forwarding events to Dasham for processing
    pub fn new(url: impl Into<String>, event_sender: Sender<ProcessableEvent>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Self {
            inner: Arc::new(RealtimeInner {
                url: url.into(),
                event_sender,
                registry: Arc::new(SubscriptionRegistry::default()),
                rooms: dashmap::DashMap::new(),
                outbound_tx,
                outbound_rx: std::sync::Mutex::new(Some(outbound_rx)),
                shutdown_tx,
                shutdown_rx: std::sync::Mutex::new(Some(shutdown_rx)),
                status: std::sync::RwLock::new(ConnectionStatus::Disconnected),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Lazily starts the connection task. Idempotent: only the first call
    /// spawns anything, later calls are no-ops.
    pub fn connect(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let outbound_rx = self
            .inner
            .outbound_rx
            .lock()
            .expect("outbound receiver lock poisoned")
            .take();
        let shutdown_rx = self
            .inner
            .shutdown_rx
            .lock()
            .expect("shutdown receiver lock poisoned")
            .take();

        if let (Some(outbound_rx), Some(shutdown_rx)) = (outbound_rx, shutdown_rx) {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                Self::run_connection(inner, outbound_rx, shutdown_rx).await;
            });
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.read().expect("status lock poisoned")
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Requests the connection task to close the socket and exit. The room
    /// map and registry survive, but no further events are delivered.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(()).await;
    }

    /// Clears all subscriptions. Room counts are left to their owners'
    /// guards.
    pub fn unsubscribe_all(&self) {
        self.inner.registry.clear();
    }

    // Rooms -----------------------------------------------------------------

    /// Joins a room, sending the join frame only on the 0→1 transition.
    pub fn join(&self, room: Room) {
        let mut count = self.inner.rooms.entry(room.clone()).or_insert(0);
        *count += 1;
        let first = *count == 1;
        drop(count);

        if first {
            tracing::debug!(
                target: "dasham::realtime::join",
                "Joining room: {:?}",
                room
            );
            self.send_control(room.join_message());
        }
    }

    /// Leaves a room, sending the leave frame only on the 1→0 transition.
    pub fn leave(&self, room: Room) {
        let Some(mut count) = self.inner.rooms.get_mut(&room) else {
            return;
        };
        if *count > 0 {
            *count -= 1;
        }
        let last = *count == 0;
        drop(count);

        if last {
            self.inner.rooms.remove_if(&room, |_, v| *v == 0);
            tracing::debug!(
                target: "dasham::realtime::leave",
                "Leaving room: {:?}",
                room
            );
            self.send_control(room.leave_message());
        }
    }

    /// Joins a room and returns a guard that leaves it on drop.
    pub fn room_guard(&self, room: Room) -> RoomGuard {
        self.join(room.clone());
        RoomGuard {
            manager: self.clone(),
            room: Some(room),
        }
    }

    pub fn join_city(&self, city: City) -> RoomGuard {
        self.room_guard(Room::City(city))
    }

    pub fn join_moment(&self, moment_id: impl Into<String>) -> RoomGuard {
        self.room_guard(Room::Moment(moment_id.into()))
    }

    fn send_control(&self, message: ControlMessage) {
        // Dropped when the writer task is gone; active rooms are re-joined
        // from the room map on the next (re)connect.
        let _ = self.inner.outbound_tx.send(message);
    }

    // Subscriptions ---------------------------------------------------------

    pub fn subscribe_new_dash(
        &self,
        id: SubscriptionId,
        callback: impl Fn(&NewDashEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner
            .registry
            .register_new_dash(id.clone(), Arc::new(callback));
        SubscriptionHandle::new(self.inner.registry.clone(), EventKind::NewDash, id)
    }

    pub fn subscribe_dash_totals(
        &self,
        id: SubscriptionId,
        callback: impl Fn(&DashTotalUpdate) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner
            .registry
            .register_dash_total(id.clone(), Arc::new(callback));
        SubscriptionHandle::new(self.inner.registry.clone(), EventKind::DashTotalUpdate, id)
    }

    pub fn subscribe_trending(
        &self,
        id: SubscriptionId,
        callback: impl Fn(&TrendingUpdate) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner
            .registry
            .register_trending(id.clone(), Arc::new(callback));
        SubscriptionHandle::new(self.inner.registry.clone(), EventKind::TrendingUpdate, id)
    }

    pub fn subscribe_new_moments(
        &self,
        id: SubscriptionId,
        callback: impl Fn(&Moment) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner
            .registry
            .register_new_moment(id.clone(), Arc::new(callback));
        SubscriptionHandle::new(self.inner.registry.clone(), EventKind::NewMoment, id)
    }

    /// Fans a push event out to the registered subscribers. Called by the
    /// Dasham event processing loop.
    pub(crate) fn dispatch(&self, event: &PushEvent) {
        self.inner.registry.dispatch(event);
    }

    // Connection task -------------------------------------------------------

    async fn run_connection(
        inner: Arc<RealtimeInner>,
        mut outbound_rx: UnboundedReceiver<ControlMessage>,
        mut shutdown_rx: Receiver<()>,
    ) {
        let mut failed_attempts: u32 = 0;

        loop {
            Self::set_status(&inner, ConnectionStatus::Connecting);

            match connect_async(inner.url.as_str()).await {
                Ok((ws, _)) => {
                    failed_attempts = 0;
                    Self::set_status(&inner, ConnectionStatus::Connected);
                    Self::notify_status(&inner, "connected").await;

                    let (mut write, mut read) = ws.split();

                    // Restore membership for rooms that were active before
                    // the connection dropped
                    let active: Vec<Room> = inner
                        .rooms
                        .iter()
                        .filter(|entry| *entry.value() > 0)
                        .map(|entry| entry.key().clone())
                        .collect();
                    for room in active {
                        if let Ok(frame) = serde_json::to_string(&room.join_message()) {
                            let _ = write.send(Message::Text(frame)).await;
                        }
                    }

                    loop {
                        tokio::select! {
                            Some(control) = outbound_rx.recv() => {
                                let frame = match serde_json::to_string(&control) {
                                    Ok(frame) => frame,
                                    Err(e) => {
                                        tracing::error!(
                                            target: "dasham::realtime::run_connection",
                                            "Failed to encode control frame: {}",
                                            e
                                        );
                                        continue;
                                    }
                                };
                                if write.send(Message::Text(frame)).await.is_err() {
                                    break;
                                }
                            }
                            message = read.next() => {
                                match message {
                                    Some(Ok(msg)) if msg.is_text() => {
                                        let text = msg.into_text().unwrap_or_default();
                                        Self::forward_frame(&inner, &text).await;
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        tracing::warn!(
                                            target: "dasham::realtime::run_connection",
                                            "Socket read error: {}",
                                            e
                                        );
                                        break;
                                    }
                                    None => break,
                                }
                            }
                            Some(_) = shutdown_rx.recv() => {
                                tracing::debug!(
                                    target: "dasham::realtime::run_connection",
                                    "Shutdown requested, closing socket"
                                );
                                let _ = write.send(Message::Close(None)).await;
                                Self::set_status(&inner, ConnectionStatus::Disconnected);
                                Self::notify_status(&inner, "shutdown").await;
                                return;
                            }
                        }
                    }

                    Self::set_status(&inner, ConnectionStatus::Disconnected);
                    Self::notify_status(&inner, "disconnected").await;
                }
                Err(e) => {
                    failed_attempts += 1;
                    tracing::warn!(
                        target: "dasham::realtime::run_connection",
                        "Connection attempt {}/{} failed: {}",
                        failed_attempts,
                        MAX_RECONNECT_ATTEMPTS,
                        e
                    );
                    if failed_attempts >= MAX_RECONNECT_ATTEMPTS {
                        tracing::error!(
                            target: "dasham::realtime::run_connection",
                            "Giving up after {} failed attempts",
                            failed_attempts
                        );
                        Self::set_status(&inner, ConnectionStatus::Disconnected);
                        Self::notify_status(&inner, "gave-up").await;
                        return;
                    }
                }
            }

            // Fixed backoff before the next attempt; shutdown interrupts it
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                Some(_) = shutdown_rx.recv() => {
                    Self::set_status(&inner, ConnectionStatus::Disconnected);
                    return;
                }
            }
        }
    }

    async fn forward_frame(inner: &Arc<RealtimeInner>, text: &str) {
        match PushEvent::parse(text) {
            Ok(event) => {
                if inner
                    .event_sender
                    .send(ProcessableEvent::Push(event))
                    .await
                    .is_err()
                {
                    // SendError only occurs when the channel is closed
                    tracing::debug!(
                        target: "dasham::realtime::forward_frame",
                        "Event channel closed, dropping push event"
                    );
                }
            }
            Err(e) => {
                tracing::debug!(
                    target: "dasham::realtime::forward_frame",
                    "Dropping unparseable frame: {}",
                    e
                );
            }
        }
    }

    fn set_status(inner: &Arc<RealtimeInner>, status: ConnectionStatus) {
        *inner.status.write().expect("status lock poisoned") = status;
    }

    async fn notify_status(inner: &Arc<RealtimeInner>, status: &str) {
        let _ = inner
            .event_sender
            .send(ProcessableEvent::SocketStatus(status.to_string()))
            .await;
    }

    #[cfg(test)]
    pub(crate) fn room_count(&self, room: &Room) -> usize {
        self.inner.rooms.get(room).map(|c| *c).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn take_outbound_receiver(&self) -> UnboundedReceiver<ControlMessage> {
        self.inner
            .outbound_rx
            .lock()
            .expect("outbound receiver lock poisoned")
            .take()
            .expect("outbound receiver already taken")
    }
}

/// RAII room membership. Leaving happens on drop, which pairs every join
/// with exactly one leave.
#[derive(Debug)]
pub struct RoomGuard {
    manager: RealtimeManager,
    room: Option<Room>,
}

impl RoomGuard {
    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        if let Some(room) = self.room.take() {
            self.manager.leave(room);
        }
    }
}
