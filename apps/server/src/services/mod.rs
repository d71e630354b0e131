//! # Service Layer
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  routes (axum handlers)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐ │
//! │  │ SaleProcessor  │◄─│ QueueService   │─►│ InventoryService           │ │
//! │  │ create / void  │  │ sale handler   │  │ views, threshold, adjust   │ │
//! │  │ delete / list  │  │ adjust handler │  │                            │ │
//! │  └───────┬────────┘  └───────┬────────┘  └─────────────┬──────────────┘ │
//! │          └──────────────────┬┴─────────────────────────┘                │
//! │                             ▼                                           │
//! │                      stockline-db (Ledger, repositories)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod inventory_service;
pub mod queue_service;
pub mod sale_service;

pub use inventory_service::InventoryService;
pub use queue_service::{QueueHandler, QueueRunSummary, QueueService};
pub use sale_service::{RestoreFailure, SaleDeletion, SaleOrigin, SaleProcessor, SaleVoid};
