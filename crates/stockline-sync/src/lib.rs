//! # stockline-sync: POS Client Sync Engine
//!
//! Offline store and replay orchestration for a Stockline terminal.
//!
//! ## Offline Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Offline Sale Lifecycle                             │
//! │                                                                         │
//! │  submit_sale(items)                                                     │
//! │       │                                                                 │
//! │       ├── Online ──► POST /api/sales ──► receipt                        │
//! │       │                    │                                            │
//! │       │                    └── network error ──┐                        │
//! │       │                                        ▼                        │
//! │       └── Offline ──────────────────────► OfflineStore                  │
//! │                                           pending_sales (pending)       │
//! │                                                 │                       │
//! │  ConnectivityMonitor: Offline ──► Online        │                       │
//! │       │                                         │                       │
//! │       ▼                                         ▼                       │
//! │  SyncOrchestrator::sync_pending_sales ── mark syncing ── POST /api/sales│
//! │       │                                    │ ok: delete entry           │
//! │       │                                    └ err: mark failed + detail  │
//! │       ▼                                                                 │
//! │  SyncEventBus ──► StatusChanged { state, pending, failed }              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - TOML client configuration with env overrides
//! - [`store`] - SQLite offline store (pending sales, product cache, settings)
//! - [`api`] - HTTP client for the server API
//! - [`connectivity`] - Online/offline state and the `/health` prober
//! - [`events`] - Publish/subscribe bus for UI status
//! - [`orchestrator`] - Replay, cache refresh and the background loop
//! - [`error`] - Error types

pub mod api;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod store;

// Re-exports
pub use api::{HttpServerApi, ServerApi};
pub use config::ClientConfig;
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivityMonitorHandle, ProbeSettings};
pub use error::{SyncError, SyncResult};
pub use events::{SyncEvent, SyncEventBus, SyncState};
pub use orchestrator::{
    OrchestratorSettings, ReplayFailure, SaleSubmission, SyncOrchestrator,
    SyncOrchestratorHandle, SyncReport,
};
pub use store::{OfflineStore, PendingSaleUpdate, StatusCounts};

/// Settings key holding the time of the last finished replay pass.
pub const SETTING_LAST_SYNC_AT: &str = "last_sync_at";
