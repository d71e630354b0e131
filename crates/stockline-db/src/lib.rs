//! # stockline-db: Server Database Layer
//!
//! SQLite storage for the Stockline server, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apps/server services (SaleProcessor, QueueService)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  stockline-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌─────────────────┐  ┌────────────────┐   │   │
//! │  │   │   Database    │  │  Repositories   │  │  ProductLocks  │   │   │
//! │  │   │   (pool.rs)   │  │  products       │  │  (locks.rs)    │   │   │
//! │  │   │               │  │  inventory ★    │  │                │   │   │
//! │  │   │ SqlitePool    │◄─│  sales          │  │ per-product    │   │   │
//! │  │   │ WAL, FKs      │  │  sync_queue     │  │ tokio Mutex    │   │   │
//! │  │   └───────────────┘  └─────────────────┘  └────────────────┘   │   │
//! │  │                      ★ = the inventory ledger                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (migrations/server embedded)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockline_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./stockline.db")).await?;
//! let stock = db.inventory().adjust(&product_id, 25).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use locks::{ProductLockSet, ProductLocks};
pub use pool::{Database, DbConfig};

pub use repository::inventory::{InventoryRepository, Reservation};
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::sync_queue::SyncQueueRepository;
