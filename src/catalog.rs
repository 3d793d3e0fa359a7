//! catalog.rs
//!
//! Клиент внешнего каталога событий.
//!
//! Каталог владеет метаданными событий и списками показов; для нас он
//! только на чтение. Событие запрашивается заново на каждое бронирование,
//! ничего не кэшируется и не персистится.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::models::CatalogEvent;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("event not found in catalog")]
    NotFound,
    /// Транспортная ошибка или не-2xx ответ каталога.
    #[error("event catalog unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EventCatalog: Send + Sync {
    async fn get_event(&self, event_id: &str) -> Result<CatalogEvent, CatalogError>;
}

/// HTTP-клиент каталога: `GET {base_url}/api/v1/events/{id}`.
#[derive(Clone)]
pub struct HttpEventCatalog {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpEventCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl EventCatalog for HttpEventCatalog {
    async fn get_event(&self, event_id: &str) -> Result<CatalogEvent, CatalogError> {
        let url = format!("{}/api/v1/events/{}", self.base_url, event_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                error!("event catalog request failed: {:?}", e);
                CatalogError::Unavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CatalogError::NotFound),
            status if status.is_success() => {
                response.json::<CatalogEvent>().await.map_err(|e| {
                    error!("event catalog returned malformed body: {:?}", e);
                    CatalogError::Unavailable(e.to_string())
                })
            }
            status => Err(CatalogError::Unavailable(format!(
                "catalog responded with status {}",
                status
            ))),
        }
    }
}
