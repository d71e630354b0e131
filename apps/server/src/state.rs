//! Shared application state.

use std::sync::Arc;

use stockline_db::Database;

use crate::config::ServerConfig;
use crate::services::{InventoryService, QueueService, SaleProcessor};

/// State handed to every handler. Cheap to clone: the database handle,
/// and with it the product lock registry, is shared by all clones.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub sales: SaleProcessor,
    pub queue: QueueService,
    pub inventory: InventoryService,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let sales = SaleProcessor::new(db.clone());
        let queue = QueueService::with_default_handlers(db.clone(), sales.clone());
        let inventory = InventoryService::new(db.clone());

        AppState {
            db,
            sales,
            queue,
            inventory,
            config: Arc::new(config),
        }
    }
}
