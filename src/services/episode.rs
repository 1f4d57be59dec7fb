// Episode selection for the schedule
// AniList only reports the *next* airing episode. Assuming a weekly cadence,
// the previous episode aired one week earlier; for a day after that we keep
// showing it as the current one before switching over to the upcoming one.

use crate::models::AiringEpisode;

const WEEK_SECS: i64 = 7 * 24 * 3600;
const GRACE_WINDOW_SECS: i64 = 24 * 3600;

/// Pick the episode to report for a title, given its upcoming episode and the
/// current time in epoch seconds. Returns `None` when nothing is airing.
pub fn select_episode(upcoming: Option<AiringEpisode>, now: i64) -> Option<AiringEpisode> {
    let upcoming = upcoming?;

    let previous_number = upcoming.episode.saturating_sub(1);
    let previous_airing_at = upcoming.airing_at.saturating_sub(WEEK_SECS);

    if previous_number > 0 && now.saturating_sub(previous_airing_at) < GRACE_WINDOW_SECS {
        return Some(AiringEpisode {
            episode: previous_number,
            airing_at: previous_airing_at,
        });
    }

    Some(upcoming)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_730_000_000;

    fn upcoming(episode: u32) -> Option<AiringEpisode> {
        Some(AiringEpisode {
            episode,
            airing_at: T,
        })
    }

    #[test]
    fn test_just_aired_within_grace_window() {
        let now = T - WEEK_SECS + 3600;
        assert_eq!(
            select_episode(upcoming(5), now),
            Some(AiringEpisode {
                episode: 4,
                airing_at: T - WEEK_SECS
            })
        );
    }

    #[test]
    fn test_upcoming_after_grace_window() {
        let now = T - WEEK_SECS + 25 * 3600;
        assert_eq!(select_episode(upcoming(5), now), upcoming(5));
    }

    #[test]
    fn test_grace_window_boundary_is_exclusive() {
        let now = T - WEEK_SECS + GRACE_WINDOW_SECS;
        assert_eq!(select_episode(upcoming(5), now), upcoming(5));

        let now = T - WEEK_SECS + GRACE_WINDOW_SECS - 1;
        assert_eq!(select_episode(upcoming(5), now).map(|e| e.episode), Some(4));
    }

    #[test]
    fn test_first_episode_never_rolls_back() {
        for now in [T - WEEK_SECS, T - WEEK_SECS + 3600, T - 3600, T, T + WEEK_SECS] {
            assert_eq!(select_episode(upcoming(1), now), upcoming(1));
        }
    }

    #[test]
    fn test_extreme_airing_times_do_not_overflow() {
        let far_past = Some(AiringEpisode {
            episode: 5,
            airing_at: i64::MIN,
        });
        assert_eq!(select_episode(far_past, T), far_past);

        let far_future = Some(AiringEpisode {
            episode: 5,
            airing_at: i64::MAX,
        });
        assert_eq!(select_episode(far_future, i64::MIN).map(|e| e.episode), Some(4));
    }

    #[test]
    fn test_nothing_airing() {
        assert_eq!(select_episode(None, T), None);
    }
}
