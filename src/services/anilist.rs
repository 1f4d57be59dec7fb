use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::auth::UpstreamCredentials;
use super::rate_limiter::RateLimiter;
use crate::models::{AiringEpisode, MediaRecord};

const SEARCH_QUERY: &str = r#"
    query ($search: String) {
        Media(search: $search, type: ANIME) {
            title {
                romaji
                english
            }
            coverImage {
                medium
                large
            }
            episodes
            nextAiringEpisode {
                episode
                airingAt
            }
        }
    }
"#;

/// Why an upstream lookup produced nothing
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("AniList rate limit hit (429)")]
    Throttled,
    #[error("AniList request failed with status: {0}")]
    Status(u16),
    #[error("AniList response contained no media")]
    MissingMedia,
    #[error("AniList request failed: {0}")]
    Network(String),
    #[error("AniList credentials unavailable: {0}")]
    Credentials(String),
    #[error("Failed to parse AniList response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Search-by-title against the upstream media API
#[async_trait]
pub trait MediaSearch: Send + Sync {
    async fn search_media(&self, title: &str) -> Result<MediaRecord, UpstreamError>;
}

/// GraphQL request wrapper
#[derive(Debug, Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    data: Option<MediaResponseData>,
}

#[derive(Debug, Deserialize)]
struct MediaResponseData {
    #[serde(rename = "Media")]
    media: Option<MediaData>,
}

/// AniList media fields the schedule needs
#[derive(Debug, Clone, Deserialize)]
pub struct MediaData {
    pub title: Option<TitleData>,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<CoverImage>,
    pub episodes: Option<u32>,
    #[serde(rename = "nextAiringEpisode")]
    pub next_airing_episode: Option<NextAiringEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleData {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverImage {
    pub medium: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextAiringEpisode {
    pub episode: u32,
    #[serde(rename = "airingAt")]
    pub airing_at: i64,
}

/// Rate-limited AniList GraphQL client
pub struct AniListClient {
    client: Client,
    api_url: String,
    limiter: RateLimiter,
    credentials: UpstreamCredentials,
}

impl AniListClient {
    pub fn new(
        client: Client,
        api_url: String,
        limiter: RateLimiter,
        credentials: UpstreamCredentials,
    ) -> Self {
        Self {
            client,
            api_url,
            limiter,
            credentials,
        }
    }

    /// Issue one GraphQL POST and read the whole body.
    /// The rate-limit permit is held until the body has been read.
    async fn execute<T: Serialize + ?Sized>(
        &self,
        body: &T,
    ) -> Result<(u16, String), UpstreamError> {
        let _permit = self.limiter.acquire().await;

        let token = self
            .credentials
            .bearer_token()
            .await
            .map_err(|e| UpstreamError::Credentials(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.api_url)
            .header("Accept", "application/json")
            .json(body);

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Forward an arbitrary GraphQL request body and hand back AniList's
    /// status code and JSON body untouched
    pub async fn passthrough(
        &self,
        body: &serde_json::Value,
    ) -> Result<(u16, serde_json::Value), UpstreamError> {
        let (status, text) = self.execute(body).await?;
        let json =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        Ok((status, json))
    }

    /// Convert AniList MediaData to our MediaRecord
    fn media_to_record(media: MediaData) -> MediaRecord {
        let (title_romaji, title_english) = media
            .title
            .map(|t| (t.romaji, t.english))
            .unwrap_or_default();

        let (cover_image_medium, cover_image_large) = media
            .cover_image
            .map(|c| (c.medium, c.large))
            .unwrap_or_default();

        // Episode 0 is not a real episode, treat it as nothing scheduled
        let upcoming_episode = media
            .next_airing_episode
            .filter(|next| next.episode > 0)
            .map(|next| AiringEpisode {
                episode: next.episode,
                airing_at: next.airing_at,
            });

        MediaRecord {
            title_romaji,
            title_english,
            cover_image_medium,
            cover_image_large,
            total_episodes: media.episodes.unwrap_or(0),
            upcoming_episode,
        }
    }
}

#[async_trait]
impl MediaSearch for AniListClient {
    async fn search_media(&self, title: &str) -> Result<MediaRecord, UpstreamError> {
        let request = GraphQLRequest {
            query: SEARCH_QUERY,
            variables: serde_json::json!({ "search": title }),
        };

        let (status, text) = self.execute(&request).await?;

        if status == 429 {
            return Err(UpstreamError::Throttled);
        }
        if !(200..300).contains(&status) {
            return Err(UpstreamError::Status(status));
        }

        let response: MediaResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        response
            .data
            .and_then(|d| d.media)
            .map(Self::media_to_record)
            .ok_or(UpstreamError::MissingMedia)
    }
}
