//! # Server API Client
//!
//! The three calls a terminal makes against the Stockline server.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ServerApi (trait, mockable)                                            │
//! │    create_sale      POST /api/sales      → SaleReceipt                  │
//! │    fetch_inventory  GET  /api/inventory  → Vec<ProductWithInventory>    │
//! │    health           GET  /health         → ()                           │
//! │                                                                         │
//! │  HttpServerApi (reqwest)                                                │
//! │    • per-request timeout          → SyncError::Timeout                  │
//! │    • connect/IO failure           → SyncError::Network                  │
//! │    • non-2xx {"detail": "..."}    → SyncError::Rejected{status,detail}  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use stockline_core::{CreateSaleRequest, ProductWithInventory, SaleReceipt};

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};

/// Operations the orchestrator needs from the server.
#[async_trait]
pub trait ServerApi: Send + Sync {
    /// Submits a sale. The server deducts stock atomically or rejects it.
    async fn create_sale(&self, request: &CreateSaleRequest) -> SyncResult<SaleReceipt>;

    /// Full product catalog with current stock.
    async fn fetch_inventory(&self) -> SyncResult<Vec<ProductWithInventory>>;

    /// Succeeds when the server answers its health probe.
    async fn health(&self) -> SyncResult<()>;
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// `ServerApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpServerApi {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
    timeout: Duration,
}

impl HttpServerApi {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> SyncResult<Self> {
        let mut base_url = Url::parse(base_url)?;

        // Url::join drops the last path segment unless it ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpServerApi {
            client,
            base_url,
            api_token,
            timeout,
        })
    }

    pub fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        Self::new(
            config.server_url()?.as_str(),
            config.server.api_token.clone(),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> SyncResult<RequestBuilder> {
        let url = self.base_url.join(path)?;
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> SyncResult<Response> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.detail)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("Request failed").to_string()
                } else {
                    body
                }
            });

        debug!(status = status.as_u16(), detail = %detail, "Server rejected request");
        Err(SyncError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> SyncResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout.as_secs())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl ServerApi for HttpServerApi {
    async fn create_sale(&self, request: &CreateSaleRequest) -> SyncResult<SaleReceipt> {
        let builder = self.request(Method::POST, "api/sales")?.json(request);
        let response = self.send(builder).await?;
        self.read_json(response).await
    }

    async fn fetch_inventory(&self) -> SyncResult<Vec<ProductWithInventory>> {
        let builder = self.request(Method::GET, "api/inventory")?;
        let response = self.send(builder).await?;
        self.read_json(response).await
    }

    async fn health(&self) -> SyncResult<()> {
        let builder = self.request(Method::GET, "health")?;
        self.send(builder).await?;
        Ok(())
    }
}
