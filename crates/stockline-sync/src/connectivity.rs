//! # Connectivity Monitor
//!
//! Tracks whether the Stockline server is reachable.
//!
//! ## Probe Schedule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   GET /health ok ──► Online  ── wait health_check_interval ──┐          │
//! │        ▲                                                     │          │
//! │        └─────────────────────────────────────────────────────┘          │
//! │                                                                         │
//! │   GET /health err ─► Offline ── wait next backoff ───────────┐          │
//! │        ▲             (500ms, 1s, 2s, ... capped at max)      │          │
//! │        └─────────────────────────────────────────────────────┘          │
//! │                                                                         │
//! │  The current state lives in a `watch` channel. Every change is also     │
//! │  published on the event bus as ConnectivityChanged.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ServerApi;
use crate::config::ClientConfig;
use crate::events::{SyncEvent, SyncEventBus};

/// Reachability of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    /// Assumed until the first successful probe.
    #[default]
    Offline,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => write!(f, "online"),
            Connectivity::Offline => write!(f, "offline"),
        }
    }
}

/// Probe timing.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Delay between probes while online.
    pub interval: Duration,
    /// First delay after a failed probe.
    pub initial_backoff: Duration,
    /// Upper bound on the delay while offline.
    pub max_backoff: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            interval: Duration::from_secs(15),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl ProbeSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        ProbeSettings {
            interval: config.health_check_interval(),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

// =============================================================================
// Monitor
// =============================================================================

/// Owns the connectivity state and the background prober. Cheap to clone.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    api: Arc<dyn ServerApi>,
    state: Arc<watch::Sender<Connectivity>>,
    events: Arc<SyncEventBus>,
    settings: ProbeSettings,
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &*self.state.borrow())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ConnectivityMonitor {
    pub fn new(api: Arc<dyn ServerApi>, events: Arc<SyncEventBus>, settings: ProbeSettings) -> Self {
        let (state, _) = watch::channel(Connectivity::default());
        ConnectivityMonitor {
            api,
            state: Arc::new(state),
            events,
            settings,
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current() == Connectivity::Online
    }

    /// Watches state changes.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    /// Sets the state directly, e.g. from an OS network notification.
    ///
    /// Returns true if the state changed.
    pub fn set_connectivity(&self, connectivity: Connectivity) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == connectivity {
                false
            } else {
                *current = connectivity;
                true
            }
        });

        if changed {
            info!(%connectivity, "Connectivity changed");
            self.events.publish(SyncEvent::ConnectivityChanged(connectivity));
        }

        changed
    }

    /// Runs a single health probe and records the result.
    pub async fn probe(&self) -> Connectivity {
        let connectivity = match self.api.health().await {
            Ok(()) => Connectivity::Online,
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                Connectivity::Offline
            }
        };

        self.set_connectivity(connectivity);
        connectivity
    }

    /// Spawns the probe loop.
    pub fn spawn(&self) -> ConnectivityMonitorHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.clone().run(shutdown_rx));

        ConnectivityMonitorHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!("Connectivity monitor starting");
        let mut backoff = self.create_backoff();

        loop {
            let delay = match self.probe().await {
                Connectivity::Online => {
                    backoff.reset();
                    self.settings.interval
                }
                Connectivity::Offline => backoff
                    .next_backoff()
                    .unwrap_or(self.settings.max_backoff),
            };

            debug!(?delay, "Next health probe scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    info!("Connectivity monitor received shutdown");
                    break;
                }
            }
        }

        info!("Connectivity monitor stopped");
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.settings.initial_backoff,
            max_interval: self.settings.max_backoff,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Controls a spawned probe loop.
#[derive(Debug)]
pub struct ConnectivityMonitorHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ConnectivityMonitorHandle {
    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
