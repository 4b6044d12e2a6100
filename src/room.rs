//! Room subscription lifecycle: connects the presence aggregator to a
//! realtime transport.
//!
//! Subscribing spawns an event loop that feeds transport events into a
//! per-subscription [`PresenceAggregator`]. Disposing the handle (or
//! dropping it) always releases the underlying channel, and events from a
//! disposed subscription are discarded rather than applied to a newer
//! room's state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::CoreError;
use crate::presence::{ConnectionState, PresenceAggregator, PresenceEvent, PresenceRecord};

/// Event emitted by a room subscription.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// The transport confirmed the subscription.
    Subscribed,
    Presence(PresenceEvent),
    /// A payload the transport could not parse. Dropped without touching
    /// the aggregate set.
    Malformed(String),
}

/// Control side of an open subscription.
#[async_trait]
pub trait RoomChannel: Send + Sync {
    /// Announce our own presence to the room.
    async fn track(&self, record: PresenceRecord) -> Result<(), CoreError>;

    /// Release the underlying channel resource.
    async fn unsubscribe(&self);
}

pub struct Subscription {
    pub events: mpsc::Receiver<RoomEvent>,
    pub control: Arc<dyn RoomChannel>,
}

#[async_trait]
pub trait RoomTransport: Send + Sync {
    async fn subscribe(&self, room_id: &str) -> Result<Subscription, CoreError>;
}

/// Live presence view for one room subscription.
///
/// Queries are cheap and never fail; while the subscription has not
/// reached synced (or after it is gone) everyone reads as offline.
pub struct PresenceHandle {
    aggregator: Arc<Mutex<PresenceAggregator>>,
    disposed: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PresenceHandle {
    pub fn is_online(&self, user_id: &str) -> bool {
        self.lock_aggregator().is_online(user_id)
    }

    pub fn online_users(&self) -> HashSet<String> {
        self.lock_aggregator().online_users()
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_aggregator().state()
    }

    /// Tear down the subscription and wait for the channel to be released.
    pub async fn dispose(mut self) {
        self.disposed.store(true, Ordering::Relaxed);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn lock_aggregator(&self) -> std::sync::MutexGuard<'_, PresenceAggregator> {
        self.aggregator.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        // Covers every exit path that skips dispose(); the event loop
        // finishes the unsubscribe on its own task.
        self.disposed.store(true, Ordering::Relaxed);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Subscribe to a room and start aggregating presence for it.
///
/// Fails with `NotAuthenticated` when no self user id is available and
/// `Subscription` when the room id is empty. Transport failures after this
/// point degrade the handle to reporting everyone offline.
pub async fn subscribe_to_room(
    transport: Arc<dyn RoomTransport>,
    room_id: &str,
    self_user_id: &str,
) -> Result<PresenceHandle, CoreError> {
    if self_user_id.is_empty() {
        return Err(CoreError::NotAuthenticated);
    }
    if room_id.is_empty() {
        return Err(CoreError::Subscription("empty room id".to_string()));
    }

    let aggregator = Arc::new(Mutex::new(PresenceAggregator::new()));
    aggregator
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .start_subscribing();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let disposed = Arc::new(AtomicBool::new(false));

    let task = tokio::spawn(run_subscription(
        transport,
        room_id.to_string(),
        self_user_id.to_string(),
        aggregator.clone(),
        disposed.clone(),
        shutdown_rx,
    ));

    Ok(PresenceHandle {
        aggregator,
        disposed,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn run_subscription(
    transport: Arc<dyn RoomTransport>,
    room_id: String,
    self_user_id: String,
    aggregator: Arc<Mutex<PresenceAggregator>>,
    disposed: Arc<AtomicBool>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    // Shutdown during the subscribe await cancels the in-flight attempt.
    let mut sub = tokio::select! {
        _ = &mut shutdown_rx => {
            aggregator.lock().unwrap_or_else(|e| e.into_inner()).disconnect();
            return;
        }
        result = transport.subscribe(&room_id) => match result {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(%room_id, %err, "room subscription failed");
                aggregator.lock().unwrap_or_else(|e| e.into_inner()).disconnect();
                return;
            }
        },
    };

    tracing::debug!(%room_id, "room event loop started");
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            event = sub.events.recv() => {
                let Some(event) = event else {
                    tracing::debug!(%room_id, "room channel closed by transport");
                    break;
                };
                if disposed.load(Ordering::Relaxed) {
                    break;
                }
                handle_event(event, &room_id, &self_user_id, &aggregator, &sub.control);
            }
        }
    }

    sub.control.unsubscribe().await;
    aggregator.lock().unwrap_or_else(|e| e.into_inner()).disconnect();
    tracing::debug!(%room_id, "room subscription released");
}

fn handle_event(
    event: RoomEvent,
    room_id: &str,
    self_user_id: &str,
    aggregator: &Arc<Mutex<PresenceAggregator>>,
    control: &Arc<dyn RoomChannel>,
) {
    match event {
        RoomEvent::Subscribed => {
            let announce = aggregator
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .mark_synced();
            if announce {
                // Fire and forget: further events are processed without
                // waiting for the self-registration to land.
                let control = control.clone();
                let record = PresenceRecord::new(self_user_id);
                let room_id = room_id.to_string();
                tokio::spawn(async move {
                    if let Err(err) = control.track(record).await {
                        tracing::warn!(%room_id, %err, "failed to announce own presence");
                    }
                });
            }
        }
        RoomEvent::Presence(event) => {
            aggregator
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .apply(event);
        }
        RoomEvent::Malformed(payload) => {
            tracing::debug!(room_id, %payload, "dropping malformed room event");
        }
    }
}

/// In-memory transport for tests and development without a real backend.
///
/// Tests push events through [`InMemoryRoomTransport::send`] and observe
/// tracked self-registrations and channel release through the accessors.
pub struct InMemoryRoomTransport {
    rooms: Mutex<std::collections::HashMap<String, Arc<InMemoryChannel>>>,
    fail_subscribe: AtomicBool,
}

pub struct InMemoryChannel {
    sender: mpsc::Sender<RoomEvent>,
    tracked: Mutex<Vec<PresenceRecord>>,
    released: AtomicBool,
}

impl InMemoryRoomTransport {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(std::collections::HashMap::new()),
            fail_subscribe: AtomicBool::new(false),
        }
    }

    /// Make every subsequent subscribe attempt fail.
    pub fn fail_subscriptions(&self) {
        self.fail_subscribe.store(true, Ordering::Relaxed);
    }

    /// Deliver an event to the most recent subscription for a room.
    /// Returns false when there is no live subscription to deliver to.
    pub async fn send(&self, room_id: &str, event: RoomEvent) -> bool {
        let channel = {
            let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            rooms.get(room_id).cloned()
        };
        match channel {
            Some(channel) => channel.sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Self-registrations seen on the most recent subscription for a room.
    pub fn tracked(&self, room_id: &str) -> Vec<PresenceRecord> {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms
            .get(room_id)
            .map(|c| c.tracked.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .unwrap_or_default()
    }

    /// Whether the most recent subscription for a room was unsubscribed.
    pub fn is_released(&self, room_id: &str) -> bool {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms
            .get(room_id)
            .map(|c| c.released.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

impl Default for InMemoryRoomTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomTransport for InMemoryRoomTransport {
    async fn subscribe(&self, room_id: &str) -> Result<Subscription, CoreError> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(CoreError::Subscription("transport unavailable".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        let channel = Arc::new(InMemoryChannel {
            sender: tx,
            tracked: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        });
        self.rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(room_id.to_string(), channel.clone());
        Ok(Subscription {
            events: rx,
            control: channel,
        })
    }
}

#[async_trait]
impl RoomChannel for InMemoryChannel {
    async fn track(&self, record: PresenceRecord) -> Result<(), CoreError> {
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }

    async fn unsubscribe(&self) {
        self.released.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 1s");
    }

    fn snapshot(users: &[&str]) -> HashMap<String, Vec<PresenceRecord>> {
        users
            .iter()
            .map(|u| (u.to_string(), vec![PresenceRecord::new(*u)]))
            .collect()
    }

    async fn synced_handle(
        transport: &Arc<InMemoryRoomTransport>,
        room: &str,
        user: &str,
    ) -> PresenceHandle {
        let handle = subscribe_to_room(transport.clone(), room, user)
            .await
            .unwrap();
        // The subscription is registered inside the spawned loop; retry the
        // confirm until it lands.
        for _ in 0..200 {
            if transport.send(room, RoomEvent::Subscribed).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        wait_until(|| handle.state() == ConnectionState::Synced).await;
        handle
    }

    #[tokio::test]
    async fn missing_self_user_is_rejected() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let result = subscribe_to_room(transport, "room-1", "").await;
        assert!(matches!(result, Err(CoreError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn empty_room_id_is_rejected() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let result = subscribe_to_room(transport, "", "alice").await;
        assert!(matches!(result, Err(CoreError::Subscription(_))));
    }

    #[tokio::test]
    async fn subscription_confirm_announces_own_presence() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let handle = synced_handle(&transport, "room-1", "alice").await;

        wait_until(|| !transport.tracked("room-1").is_empty()).await;
        let tracked = transport.tracked("room-1");
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].user_id, "alice");
        handle.dispose().await;
    }

    #[tokio::test]
    async fn sync_join_leave_reach_the_handle() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let handle = synced_handle(&transport, "room-1", "alice").await;

        transport
            .send("room-1", RoomEvent::Presence(PresenceEvent::Sync(snapshot(&["x"]))))
            .await;
        transport
            .send("room-1", RoomEvent::Presence(PresenceEvent::Join(vec!["y".to_string()])))
            .await;
        transport
            .send("room-1", RoomEvent::Presence(PresenceEvent::Leave(vec!["x".to_string()])))
            .await;

        wait_until(|| handle.is_online("y") && !handle.is_online("x")).await;
        handle.dispose().await;
    }

    #[tokio::test]
    async fn dispose_releases_the_channel() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let handle = synced_handle(&transport, "room-1", "alice").await;
        handle.dispose().await;
        assert!(transport.is_released("room-1"));
    }

    #[tokio::test]
    async fn drop_releases_the_channel_too() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let handle = synced_handle(&transport, "room-1", "alice").await;
        drop(handle);
        wait_until(|| transport.is_released("room-1")).await;
    }

    #[tokio::test]
    async fn late_events_from_old_room_do_not_reach_new_room() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let old = synced_handle(&transport, "room-1", "alice").await;
        old.dispose().await;

        let new = synced_handle(&transport, "room-2", "alice").await;
        // A late event still queued on the old room's channel must not
        // surface in the new room's aggregate.
        transport
            .send("room-1", RoomEvent::Presence(PresenceEvent::Join(vec!["ghost".to_string()])))
            .await;
        transport
            .send("room-2", RoomEvent::Presence(PresenceEvent::Join(vec!["x".to_string()])))
            .await;

        wait_until(|| new.is_online("x")).await;
        assert!(!new.is_online("ghost"));
        new.dispose().await;
    }

    #[tokio::test]
    async fn failed_subscribe_degrades_to_everyone_offline() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        transport.fail_subscriptions();
        let handle = subscribe_to_room(transport.clone(), "room-1", "alice")
            .await
            .unwrap();
        wait_until(|| handle.state() == ConnectionState::Disconnected).await;
        assert!(!handle.is_online("anyone"));
        handle.dispose().await;
    }

    #[tokio::test]
    async fn malformed_events_leave_the_set_unchanged() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let handle = synced_handle(&transport, "room-1", "alice").await;
        transport
            .send("room-1", RoomEvent::Presence(PresenceEvent::Join(vec!["x".to_string()])))
            .await;
        wait_until(|| handle.is_online("x")).await;

        transport
            .send("room-1", RoomEvent::Malformed("{not json".to_string()))
            .await;
        transport
            .send("room-1", RoomEvent::Presence(PresenceEvent::Join(vec!["y".to_string()])))
            .await;
        wait_until(|| handle.is_online("y")).await;
        assert!(handle.is_online("x"));
        handle.dispose().await;
    }

    #[tokio::test]
    async fn queries_before_sync_report_offline() {
        let transport = Arc::new(InMemoryRoomTransport::new());
        let handle = subscribe_to_room(transport.clone(), "room-1", "alice")
            .await
            .unwrap();
        assert!(!handle.is_online("alice"));
        assert!(handle.online_users().is_empty());
        handle.dispose().await;
    }
}
