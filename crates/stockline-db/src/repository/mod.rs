//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service                                                               │
//! │       │  db.inventory().adjust(id, +5)                                 │
//! │       ▼                                                                 │
//! │  Repository (one per table group, owns its SQL)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`ProductRepository`](product::ProductRepository) - catalog and soft delete
//! - [`InventoryRepository`](inventory::InventoryRepository) - the stock ledger
//! - [`SaleRepository`](sale::SaleRepository) - sale headers and lines
//! - [`SyncQueueRepository`](sync_queue::SyncQueueRepository) - deferred transactions
//!
//! Methods that must join a caller's transaction are associated functions
//! taking `&mut SqliteConnection` instead of `&self`.

pub mod inventory;
pub mod product;
pub mod sale;
pub mod sync_queue;
