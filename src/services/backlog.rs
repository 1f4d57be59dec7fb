// Remote backlog list
// A plain JSON array of {title, category, ...} records served over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::models::BacklogEntry;

/// Failure to load the backlog. Fatal to the schedule build that needed it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BacklogError {
    #[error("no backlog URL configured")]
    NotConfigured,
    #[error("backlog fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("backlog fetch failed with status: {0}")]
    Status(u16),
    #[error("backlog fetch failed: {0}")]
    Network(String),
    #[error("failed to parse backlog: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait BacklogSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<BacklogEntry>, BacklogError>;
}

pub struct BacklogClient {
    client: Client,
    url: Option<String>,
    timeout: Duration,
}

impl BacklogClient {
    pub fn new(client: Client, url: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    async fn fetch_from(&self, url: &str) -> Result<Vec<BacklogEntry>, BacklogError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BacklogError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BacklogError::Status(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BacklogError::Network(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| BacklogError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl BacklogSource for BacklogClient {
    /// Fetch the whole list. Dropping the request on timeout cancels it.
    async fn fetch(&self) -> Result<Vec<BacklogEntry>, BacklogError> {
        let url = self.url.as_deref().ok_or(BacklogError::NotConfigured)?;

        tracing::debug!("Fetching backlog from {}", url);

        let entries = tokio::time::timeout(self.timeout, self.fetch_from(url))
            .await
            .map_err(|_| BacklogError::Timeout(self.timeout))??;

        tracing::debug!("Backlog contains {} entries", entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::services::test_server::spawn_server;
    use axum::{http::StatusCode, routing::get, Router};

    async fn backlog_at(path: &str, timeout: Duration) -> BacklogClient {
        let router = Router::new()
            .route(
                "/list.json",
                get(|| async {
                    r#"[{"title": "Frieren", "category": "Planned to Watch"},
                        {"title": "Monster", "category": "Completed"}]"#
                }),
            )
            .route("/missing.json", get(|| async { StatusCode::NOT_FOUND }))
            .route("/broken.json", get(|| async { "{ not json" }))
            .route(
                "/slow.json",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "[]"
                }),
            );
        let base = spawn_server(router).await;
        BacklogClient::new(Client::new(), Some(format!("{}{}", base, path)), timeout)
    }

    #[tokio::test]
    async fn test_fetch_backlog() {
        let client = backlog_at("/list.json", Duration::from_secs(8)).await;
        let entries = client.fetch().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Frieren");
        assert_eq!(entries[0].category, Category::PlannedToWatch);
        assert_eq!(entries[1].category, Category::Other);
    }

    #[tokio::test]
    async fn test_fetch_failures() {
        let client = backlog_at("/missing.json", Duration::from_secs(8)).await;
        assert_eq!(client.fetch().await, Err(BacklogError::Status(404)));

        let client = backlog_at("/broken.json", Duration::from_secs(8)).await;
        assert!(matches!(client.fetch().await, Err(BacklogError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let timeout = Duration::from_millis(100);
        let client = backlog_at("/slow.json", timeout).await;
        assert_eq!(client.fetch().await, Err(BacklogError::Timeout(timeout)));
    }

    #[tokio::test]
    async fn test_unconfigured_backlog() {
        let client = BacklogClient::new(Client::new(), None, Duration::from_secs(8));
        assert_eq!(client.fetch().await, Err(BacklogError::NotConfigured));
    }
}
