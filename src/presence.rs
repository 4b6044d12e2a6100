//! Presence aggregation: the live set of distinct online users in a room.
//!
//! A pure state machine driven by transport events. A full `sync` snapshot
//! replaces the aggregate set wholesale; `join`/`leave` events patch it
//! incrementally between syncs.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One active presence entry, e.g. a single device or tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub online_since: DateTime<Utc>,
}

impl PresenceRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            online_since: Utc::now(),
        }
    }
}

/// Presence event as delivered by the realtime transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PresenceEvent {
    /// Authoritative snapshot: member key to that member's entry list.
    Sync(HashMap<String, Vec<PresenceRecord>>),
    Join(Vec<String>),
    Leave(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Subscribing,
    Synced,
}

pub struct PresenceAggregator {
    state: ConnectionState,
    online: HashSet<String>,
}

impl PresenceAggregator {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            online: HashSet::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A subscribe request went out; events are not applied yet.
    pub fn start_subscribing(&mut self) {
        self.state = ConnectionState::Subscribing;
    }

    /// The transport confirmed the subscription. Returns true on the
    /// `Subscribing -> Synced` transition so the caller can announce its
    /// own presence exactly once.
    pub fn mark_synced(&mut self) -> bool {
        if self.state == ConnectionState::Subscribing {
            self.state = ConnectionState::Synced;
            true
        } else {
            false
        }
    }

    /// Tear down: back to `Disconnected` with an empty aggregate set.
    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.online.clear();
    }

    /// Apply one transport event. Events arriving before the subscription
    /// is confirmed are dropped and never touch the set.
    pub fn apply(&mut self, event: PresenceEvent) {
        if self.state != ConnectionState::Synced {
            return;
        }
        match event {
            PresenceEvent::Sync(members) => {
                self.online = members
                    .into_values()
                    .flatten()
                    .map(|entry| entry.user_id)
                    .collect();
            }
            PresenceEvent::Join(added) => {
                self.online.extend(added);
            }
            PresenceEvent::Leave(removed) => {
                // Removes unconditionally; a user with another still-active
                // entry (second tab) is re-added by the next full sync.
                for user_id in &removed {
                    self.online.remove(user_id);
                }
            }
        }
    }

    /// O(1) membership check. False for everyone unless synced.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn online_users(&self) -> HashSet<String> {
        self.online.clone()
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }
}

impl Default for PresenceAggregator {
    fn default() -> Self {
        Self::new()
    }
}
