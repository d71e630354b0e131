//! Shared harness for end-to-end tests: a real server on an ephemeral port
//! backed by a temporary SQLite file.

#![allow(dead_code)]

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use stockline_core::NewProduct;
use stockline_db::{Database, DbConfig};
use stockline_server::{AppState, ServerConfig};

pub struct TestServer {
    pub base_url: String,
    pub db: Database,
    pub client: reqwest::Client,
    token: Option<String>,
    shutdown: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_token(None).await
    }

    pub async fn spawn_with_token(token: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database_path = dir.path().join("server.db");

        let db = Database::new(DbConfig::new(&database_path).max_connections(8))
            .await
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = ServerConfig {
            bind_addr: addr,
            database_path,
            api_token: token.map(str::to_string),
            db_max_connections: 8,
        };
        let state = AppState::new(db.clone(), config);

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            stockline_server::serve(listener, state, async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        TestServer {
            base_url: format!("http://{}", addr),
            db,
            client: reqwest::Client::new(),
            token: token.map(str::to_string),
            shutdown: Some(tx),
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request builder carrying the bearer token, if the server has one.
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn product(&self, name: &str, quantity: i64, price_cents: i64) -> String {
        self.db
            .products()
            .insert(&NewProduct {
                name: name.to_string(),
                description: None,
                category: "test".to_string(),
                price_cents,
                barcode: None,
                initial_quantity: quantity,
                min_stock_level: 1,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn quantity(&self, product_id: &str) -> i64 {
        self.db
            .inventory()
            .get(product_id)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}
