use serde::{Deserialize, Serialize};

/// Watch-status category of a backlog entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Planned to Watch")]
    PlannedToWatch,
    #[serde(rename = "Unfinished / Disinterested")]
    UnfinishedDisinterested,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    /// Only titles still waiting on new episodes end up in the schedule
    pub fn is_relevant(self) -> bool {
        matches!(
            self,
            Category::PlannedToWatch | Category::UnfinishedDisinterested
        )
    }
}

/// One title from the remote backlog list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BacklogEntry {
    pub title: String,
    #[serde(default)]
    pub category: Category,
}

/// An episode and the epoch second it airs (or aired) at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringEpisode {
    pub episode: u32,
    pub airing_at: i64,
}

/// Normalized media metadata for a single searched title
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRecord {
    pub title_romaji: Option<String>,
    pub title_english: Option<String>,
    pub cover_image_medium: Option<String>,
    pub cover_image_large: Option<String>,
    pub total_episodes: u32,
    pub upcoming_episode: Option<AiringEpisode>,
}

impl MediaRecord {
    /// English title, then Romaji, then whatever the caller searched for
    pub fn display_title(&self, query: &str) -> String {
        non_empty(&self.title_english)
            .or_else(|| non_empty(&self.title_romaji))
            .unwrap_or(query)
            .to_string()
    }

    /// Medium cover, then large, then empty
    pub fn cover_image_url(&self) -> String {
        non_empty(&self.cover_image_medium)
            .or_else(|| non_empty(&self.cover_image_large))
            .unwrap_or_default()
            .to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A single row of the served schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub title: String,
    pub cover_image: String,
    pub total_episodes: u32,
    pub next_episode: AiringEpisode,
}

impl ScheduleItem {
    pub fn new(query: &str, media: &MediaRecord, selected: AiringEpisode) -> Self {
        Self {
            title: media.display_title(query),
            cover_image: media.cover_image_url(),
            total_episodes: media.total_episodes,
            next_episode: selected,
        }
    }
}

pub type Schedule = Vec<ScheduleItem>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_categories() {
        let json = r#"[
            {"title": "Frieren", "category": "Planned to Watch", "rating": 10},
            {"title": "Beck", "category": "Unfinished / Disinterested"},
            {"title": "Monster", "category": "Completed"},
            {"title": "Mushishi"}
        ]"#;
        let entries: Vec<BacklogEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(entries[0].category, Category::PlannedToWatch);
        assert_eq!(entries[1].category, Category::UnfinishedDisinterested);
        assert_eq!(entries[2].category, Category::Other);
        assert_eq!(entries[3].category, Category::Other);

        let relevant: Vec<_> = entries
            .iter()
            .filter(|e| e.category.is_relevant())
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(relevant, vec!["Frieren", "Beck"]);
    }

    #[test]
    fn test_display_fallbacks() {
        let mut media = MediaRecord {
            title_romaji: Some("Sousou no Frieren".to_string()),
            cover_image_large: Some("https://img/large.jpg".to_string()),
            ..Default::default()
        };
        assert_eq!(media.display_title("frieren"), "Sousou no Frieren");
        assert_eq!(media.cover_image_url(), "https://img/large.jpg");

        media.title_english = Some("Frieren: Beyond Journey's End".to_string());
        media.cover_image_medium = Some("https://img/medium.jpg".to_string());
        assert_eq!(media.display_title("frieren"), "Frieren: Beyond Journey's End");
        assert_eq!(media.cover_image_url(), "https://img/medium.jpg");

        let empty = MediaRecord::default();
        assert_eq!(empty.display_title("frieren"), "frieren");
        assert_eq!(empty.cover_image_url(), "");
    }

    #[test]
    fn test_schedule_item_json_shape() {
        let media = MediaRecord {
            title_english: Some("Beck".to_string()),
            cover_image_medium: Some("https://img/beck.jpg".to_string()),
            total_episodes: 26,
            ..Default::default()
        };
        let item = ScheduleItem::new(
            "beck",
            &media,
            AiringEpisode {
                episode: 4,
                airing_at: 1_700_000_000,
            },
        );

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "title": "Beck",
                "coverImage": "https://img/beck.jpg",
                "totalEpisodes": 26,
                "nextEpisode": { "episode": 4, "airingAt": 1_700_000_000 }
            })
        );
    }
}
