use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::anilist::{MediaSearch, UpstreamError};
use super::cache::TtlCache;
use crate::models::MediaRecord;

/// Title -> media lookup used by the schedule builder
#[async_trait]
pub trait MediaLookup: Send + Sync {
    /// `None` means "leave this title out", never a hard error
    async fn resolve(&self, title: &str) -> Option<MediaRecord>;
}

/// Resolves titles through a per-title TTL cache in front of the upstream search.
/// Only successful lookups are cached, so a throttled title is retried on the
/// next build.
pub struct MediaResolver {
    upstream: Arc<dyn MediaSearch>,
    cache: TtlCache<String, MediaRecord>,
}

impl MediaResolver {
    pub fn new(upstream: Arc<dyn MediaSearch>, ttl: Duration) -> Self {
        Self {
            upstream,
            cache: TtlCache::new(ttl),
        }
    }
}

#[async_trait]
impl MediaLookup for MediaResolver {
    async fn resolve(&self, title: &str) -> Option<MediaRecord> {
        let key = title.to_string();

        if let Some(record) = self.cache.get_fresh(&key).await {
            tracing::debug!("Media cache hit for '{}'", title);
            return Some(record);
        }

        match self.upstream.search_media(title).await {
            Ok(record) => {
                self.cache.insert(key, record.clone()).await;
                tracing::debug!(
                    "Cached media for '{}' ({} titles cached)",
                    title,
                    self.cache.len().await
                );
                Some(record)
            }
            Err(UpstreamError::Throttled) => {
                tracing::warn!("AniList throttled lookup for '{}', skipping", title);
                None
            }
            Err(e) => {
                tracing::warn!("AniList lookup for '{}' failed: {}", title, e);
                None
            }
        }
    }
}
