//! # Sync Event Bus
//!
//! Publish/subscribe channel for the terminal UI.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  publish(event) ──► [tx₁, tx₂, tx₃]   one unbounded mpsc per subscriber │
//! │                       │    ╳    │                                       │
//! │                       ▼  closed ▼                                       │
//! │                      rx₁ pruned rx₃   same order for every subscriber   │
//! │                                                                         │
//! │  EVENTS:                                                                │
//! │  StatusChanged { state, pending, failed }                               │
//! │  ConnectivityChanged(Online | Offline)                                  │
//! │  CacheRefreshed { count }                                               │
//! │  CacheRefreshFailed { message }                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::connectivity::Connectivity;

/// Progress of the replay loop as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Syncing => write!(f, "syncing"),
            SyncState::Success => write!(f, "success"),
            SyncState::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SyncEvent {
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        state: SyncState,
        pending: i64,
        failed: i64,
    },
    ConnectivityChanged(Connectivity),
    CacheRefreshed { count: usize },
    CacheRefreshFailed { message: String },
}

/// Fan-out of [`SyncEvent`]s to any number of subscribers.
#[derive(Debug, Default)]
pub struct SyncEventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SyncEvent>>>,
}

impl SyncEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, pruning closed ones.
    pub fn publish(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
