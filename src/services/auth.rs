// Upstream credentials for AniList
// Requests work anonymously, but an OAuth token gets its own rate bucket.
// Tokens come either pre-issued (ANILIST_ACCESS_TOKEN) or from the
// client-credentials grant, cached until shortly before they expire.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::UpstreamConfig;

/// Refresh this long before the token actually expires
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

pub enum UpstreamCredentials {
    Anonymous,
    Static(String),
    ClientCredentials(ClientCredentialsFlow),
}

impl UpstreamCredentials {
    /// Pick a credential source from configuration.
    /// A pre-issued token wins over client id/secret; neither means anonymous.
    pub fn from_config(client: Client, config: &UpstreamConfig) -> Self {
        if let Some(token) = config.access_token.clone().filter(|t| !t.is_empty()) {
            return Self::Static(token);
        }

        match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Self::ClientCredentials(ClientCredentialsFlow::new(
                    client,
                    config.token_url.clone(),
                    id.clone(),
                    secret.clone(),
                ))
            }
            _ => Self::Anonymous,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Static(_) => "static access token",
            Self::ClientCredentials(_) => "OAuth client credentials",
        }
    }

    /// Bearer token to attach to the next upstream request, if any
    pub async fn bearer_token(&self) -> Result<Option<String>> {
        match self {
            Self::Anonymous => Ok(None),
            Self::Static(token) => Ok(Some(token.clone())),
            Self::ClientCredentials(flow) => flow.token().await.map(Some),
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct ClientCredentialsFlow {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsFlow {
    pub fn new(
        client: Client,
        token_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            client,
            token_url,
            client_id,
            client_secret,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached token, exchanging credentials for a new one when
    /// it is missing or about to expire
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(ref current) = *cached {
            if Instant::now() + REFRESH_MARGIN < current.expires_at {
                return Ok(current.token.clone());
            }
        }

        let requested_at = Instant::now();
        let response = self
            .client
            .post(&self.token_url)
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await
            .context("Failed to request AniList token")?;

        if !response.status().is_success() {
            bail!("AniList token request failed with status: {}", response.status());
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("Failed to parse AniList token response")?;

        tracing::info!(
            "AniList token acquired (expires in {:.1} h)",
            body.expires_in as f64 / 3600.0
        );

        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at: requested_at + Duration::from_secs(body.expires_in),
        });

        Ok(body.access_token)
    }
}
