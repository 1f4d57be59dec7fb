// Schedule building: backlog -> relevant titles -> media -> selected episode

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

use super::backlog::{BacklogError, BacklogSource};
use super::episode::select_episode;
use super::media_resolver::MediaLookup;
use crate::models::{BacklogEntry, Schedule, ScheduleItem};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Backlog(#[from] BacklogError),
    #[error("schedule build aborted")]
    Aborted,
}

#[async_trait]
pub trait BuildSchedule: Send + Sync {
    async fn build(&self) -> Result<Schedule, ScheduleError>;
}

pub struct ScheduleBuilder {
    backlog: Arc<dyn BacklogSource>,
    media: Arc<dyn MediaLookup>,
    concurrency: usize,
}

impl ScheduleBuilder {
    pub fn new(
        backlog: Arc<dyn BacklogSource>,
        media: Arc<dyn MediaLookup>,
        concurrency: usize,
    ) -> Self {
        Self {
            backlog,
            media,
            concurrency: concurrency.max(1),
        }
    }

    async fn build_item(&self, entry: BacklogEntry) -> Option<ScheduleItem> {
        let media = self.media.resolve(&entry.title).await?;

        let now = chrono::Utc::now().timestamp();
        let Some(selected) = select_episode(media.upcoming_episode, now) else {
            tracing::debug!("No upcoming episode for '{}', leaving it out", entry.title);
            return None;
        };

        Some(ScheduleItem::new(&entry.title, &media, selected))
    }
}

#[async_trait]
impl BuildSchedule for ScheduleBuilder {
    async fn build(&self) -> Result<Schedule, ScheduleError> {
        let entries = self.backlog.fetch().await?;

        let relevant: Vec<BacklogEntry> = entries
            .into_iter()
            .filter(|e| e.category.is_relevant())
            .collect();

        if relevant.is_empty() {
            tracing::info!("Backlog has no titles waiting on episodes");
            return Ok(Vec::new());
        }

        tracing::info!("Resolving {} backlog titles", relevant.len());
        let total = relevant.len();

        // `buffered` keeps backlog order regardless of completion order
        let schedule: Schedule = stream::iter(relevant)
            .map(|entry| self.build_item(entry))
            .buffered(self.concurrency)
            .filter_map(|item| async move { item })
            .collect()
            .await;

        if schedule.len() < total {
            tracing::info!(
                "Left out {} of {} titles (unresolved or not airing)",
                total - schedule.len(),
                total
            );
        }

        Ok(schedule)
    }
}
