//! # Sync Orchestrator
//!
//! Drains the offline store through the server API and keeps the product
//! cache fresh.
//!
//! ## Orchestrator Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SyncOrchestrator Architecture                      │
//! │                                                                         │
//! │  TRIGGERS                                                               │
//! │  ────────                                                               │
//! │  • Offline → Online (ConnectivityMonitor watch channel)                 │
//! │  • periodic timer while online                                          │
//! │  • manual: full_sync() / sync_pending_sales()                           │
//! │                          │                                              │
//! │                          ▼                                              │
//! │               sync_lock.try_lock() ── busy ──► SyncReport::skipped()    │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ for each pending sale (created_at order):                        │  │
//! │  │   mark syncing ──► POST /api/sales {items, saleDate}             │  │
//! │  │        ok  ──► delete local entry                                │  │
//! │  │        err ──► mark failed + detail, continue                    │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  SyncEventBus: StatusChanged { Success | Error, pending, failed }       │
//! │  settings.last_sync_at = now                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use stockline_core::validation::validate_sale_lines;
use stockline_core::{CreateSaleRequest, PendingSale, PendingSaleStatus, SaleLineRequest, SaleReceipt};

use crate::api::{HttpServerApi, ServerApi};
use crate::config::ClientConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor, ConnectivityMonitorHandle, ProbeSettings};
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEvent, SyncEventBus, SyncState};
use crate::store::{OfflineStore, PendingSaleUpdate};
use crate::SETTING_LAST_SYNC_AT;

// =============================================================================
// Reports
// =============================================================================

/// A pending sale the server did not accept during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Another pass was already running; nothing was done.
    pub skipped: bool,
    pub synced: usize,
    pub failed: usize,
    pub failures: Vec<ReplayFailure>,
    /// Products written to the cache, when a refresh ran and succeeded.
    pub cache_refreshed: Option<usize>,
    /// Why the cache refresh failed, when it did.
    pub cache_error: Option<String>,
}

impl SyncReport {
    pub fn skipped() -> Self {
        SyncReport {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        !self.skipped && self.failed == 0 && self.cache_error.is_none()
    }
}

/// Where a submitted sale ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleSubmission {
    /// Accepted by the server; stock is already deducted.
    Completed(SaleReceipt),
    /// Stored locally for replay.
    Queued(PendingSale),
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Full sync period while online.
    pub sync_interval: Duration,
    pub probe: ProbeSettings,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        OrchestratorSettings {
            sync_interval: Duration::from_secs(60),
            probe: ProbeSettings::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        OrchestratorSettings {
            sync_interval: config.sync_interval(),
            probe: ProbeSettings::from_config(config),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct SyncOrchestrator {
    store: OfflineStore,
    api: Arc<dyn ServerApi>,
    events: Arc<SyncEventBus>,
    connectivity: ConnectivityMonitor,
    settings: OrchestratorSettings,

    /// One pass at a time, per instance.
    sync_lock: Mutex<()>,

    /// Last published state, for status queries.
    state: StdMutex<SyncState>,
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("store", &self.store)
            .field("connectivity", &self.connectivity.current())
            .field("settings", &self.settings)
            .finish()
    }
}

impl SyncOrchestrator {
    pub fn new(store: OfflineStore, api: Arc<dyn ServerApi>, settings: OrchestratorSettings) -> Self {
        let events = Arc::new(SyncEventBus::new());
        let connectivity =
            ConnectivityMonitor::new(api.clone(), events.clone(), settings.probe.clone());

        SyncOrchestrator {
            store,
            api,
            events,
            connectivity,
            settings,
            sync_lock: Mutex::new(()),
            state: StdMutex::new(SyncState::Idle),
        }
    }

    /// Opens the store and builds the HTTP client described by `config`.
    pub async fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        config.validate()?;

        let store = OfflineStore::open(config.store_path()).await?;
        let api = Arc::new(HttpServerApi::from_config(config)?);

        info!(server = %config.server.url, "Sync orchestrator configured");
        Ok(Self::new(store, api, OrchestratorSettings::from_config(config)))
    }

    pub fn store(&self) -> &OfflineStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<SyncEventBus> {
        &self.events
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Forwards a host-side connectivity signal.
    pub fn set_connectivity(&self, connectivity: Connectivity) -> bool {
        self.connectivity.set_connectivity(connectivity)
    }

    /// State of the most recent pass.
    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn last_sync_at(&self) -> SyncResult<Option<DateTime<Utc>>> {
        let value = self.store.get_setting(SETTING_LAST_SYNC_AT).await?;
        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    // =========================================================================
    // Sale Entry
    // =========================================================================

    /// Records a sale from the register.
    ///
    /// Online: sent straight to the server. If the server cannot be reached
    /// the sale is stored offline and connectivity flips to offline. A
    /// business rejection (insufficient stock, unknown product) is returned
    /// as is and nothing is stored.
    pub async fn submit_sale(&self, items: Vec<SaleLineRequest>) -> SyncResult<SaleSubmission> {
        validate_sale_lines(&items)?;

        if self.connectivity.is_online() {
            let request = CreateSaleRequest::new(items.clone());
            match self.api.create_sale(&request).await {
                Ok(receipt) => {
                    info!(sale_id = %receipt.sale.id, "Sale accepted by server");
                    return Ok(SaleSubmission::Completed(receipt));
                }
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "Server unavailable, storing sale offline");
                    if matches!(e, SyncError::Network(_) | SyncError::Timeout(_)) {
                        self.connectivity.set_connectivity(Connectivity::Offline);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let pending = self.store.add_pending_sale(items).await?;
        self.publish_status(self.state()).await?;
        Ok(SaleSubmission::Queued(pending))
    }

    // =========================================================================
    // Sync Passes
    // =========================================================================

    /// Replays pending sales. Returns `SyncReport::skipped()` if a pass is
    /// already running on this instance.
    pub async fn sync_pending_sales(&self) -> SyncResult<SyncReport> {
        let Ok(_guard) = self.sync_lock.try_lock() else {
            debug!("Sync already in progress, skipping");
            return Ok(SyncReport::skipped());
        };

        self.replay_pending().await
    }

    /// Refreshes the product cache, then replays pending sales.
    ///
    /// A failed refresh is reported but does not stop the replay.
    pub async fn full_sync(&self) -> SyncResult<SyncReport> {
        let Ok(_guard) = self.sync_lock.try_lock() else {
            debug!("Sync already in progress, skipping");
            return Ok(SyncReport::skipped());
        };

        let refresh = self.refresh_product_cache().await;
        let mut report = self.replay_pending().await?;

        match refresh {
            Ok(count) => report.cache_refreshed = Some(count),
            Err(e) => report.cache_error = Some(e.to_string()),
        }

        Ok(report)
    }

    /// Overwrites the cache with `GET /api/inventory`.
    pub async fn refresh_product_cache(&self) -> SyncResult<usize> {
        let result = match self.api.fetch_inventory().await {
            Ok(products) => self.store.replace_product_cache(&products).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(count) => {
                info!(count, "Product cache refreshed");
                self.events.publish(SyncEvent::CacheRefreshed { count });
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Product cache refresh failed");
                self.events.publish(SyncEvent::CacheRefreshFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Puts every failed sale back in the replay queue.
    pub async fn retry_failed(&self) -> SyncResult<u64> {
        let reset = self.store.reset_failed().await?;
        if reset > 0 {
            info!(count = reset, "Failed sales queued for retry");
            self.publish_status(self.state()).await?;
        }
        Ok(reset)
    }

    async fn replay_pending(&self) -> SyncResult<SyncReport> {
        let entries = self.store.get_pending_sales(Some(PendingSaleStatus::Pending)).await?;
        let mut report = SyncReport::default();

        self.publish_status(SyncState::Syncing).await?;

        if entries.is_empty() {
            debug!("No pending sales to sync");
            self.finish_pass(SyncState::Success).await?;
            return Ok(report);
        }

        info!(count = entries.len(), "Replaying pending sales");

        for entry in entries {
            self.store
                .update_pending_sale(&entry.id, PendingSaleUpdate::syncing())
                .await?;

            match self.api.create_sale(&entry.to_request()).await {
                Ok(receipt) => {
                    self.store.delete_pending_sale(&entry.id).await?;
                    report.synced += 1;
                    info!(
                        local_id = %entry.id,
                        sale_id = %receipt.sale.id,
                        "Pending sale synced"
                    );
                }
                Err(e) => {
                    let detail = e.to_string();
                    warn!(local_id = %entry.id, error = %detail, "Pending sale failed to sync");
                    self.store
                        .update_pending_sale(&entry.id, PendingSaleUpdate::failed(detail.clone()))
                        .await?;
                    report.failed += 1;
                    report.failures.push(ReplayFailure {
                        id: entry.id,
                        error: detail,
                    });
                }
            }
        }

        let state = if report.failed == 0 {
            SyncState::Success
        } else {
            SyncState::Error
        };
        self.finish_pass(state).await?;

        info!(synced = report.synced, failed = report.failed, "Sync pass finished");
        Ok(report)
    }

    async fn finish_pass(&self, state: SyncState) -> SyncResult<()> {
        self.store
            .set_setting(SETTING_LAST_SYNC_AT, &Utc::now().to_rfc3339())
            .await?;
        self.publish_status(state).await
    }

    async fn publish_status(&self, state: SyncState) -> SyncResult<()> {
        let counts = self.store.count_by_status().await?;
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;

        self.events.publish(SyncEvent::StatusChanged {
            state,
            pending: counts.pending,
            failed: counts.failed,
        });
        Ok(())
    }

    // =========================================================================
    // Background Loop
    // =========================================================================

    /// Starts the connectivity monitor and the trigger loop.
    pub fn start(self: &Arc<Self>) -> SyncOrchestratorHandle {
        info!(interval = ?self.settings.sync_interval, "Starting sync orchestrator");

        let monitor = self.connectivity.spawn();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(Arc::clone(self).run(shutdown_rx));

        SyncOrchestratorHandle {
            shutdown_tx,
            task,
            monitor,
        }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut connectivity_rx = self.connectivity.subscribe();
        let mut last = *connectivity_rx.borrow_and_update();

        let mut ticker = tokio::time::interval(self.settings.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = connectivity_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now = *connectivity_rx.borrow_and_update();
                    if last == Connectivity::Offline && now == Connectivity::Online {
                        info!("Connectivity restored, syncing");
                        self.run_triggered_sync("reconnect").await;
                    }
                    last = now;
                }

                _ = ticker.tick() => {
                    if self.connectivity.is_online() {
                        self.run_triggered_sync("interval").await;
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Sync orchestrator received shutdown");
                    break;
                }
            }
        }

        info!("Sync orchestrator stopped");
    }

    async fn run_triggered_sync(&self, trigger: &str) {
        match self.full_sync().await {
            Ok(report) if report.skipped => debug!(trigger, "Triggered sync skipped"),
            Ok(report) => debug!(
                trigger,
                synced = report.synced,
                failed = report.failed,
                "Triggered sync finished"
            ),
            Err(e) => error!(trigger, error = %e, "Triggered sync failed"),
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Controls a started orchestrator.
#[derive(Debug)]
pub struct SyncOrchestratorHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    monitor: ConnectivityMonitorHandle,
}

impl SyncOrchestratorHandle {
    /// Stops the trigger loop and the connectivity monitor.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
        self.monitor.shutdown().await;
    }
}
