use chrono::{DateTime, Utc};

use crate::types::ContentItem;

const SCORE_WEIGHT: f64 = 1.0;
const COMMENT_WEIGHT: f64 = 0.5;
const RATIO_WEIGHT: f64 = 2.0;
const HALF_LIFE_HOURS: f64 = 48.0;

/// Composite engagement/freshness score for a single item.
///
/// Base engagement is a weighted sum of score and comment count, plus a
/// ratio bonus when `upvote_ratio` is present. The result decays
/// exponentially with age: an item loses half its rank every
/// `HALF_LIFE_HOURS`. Items dated in the future clamp to zero age rather
/// than gaining a boost. Negative inputs propagate arithmetically.
pub fn composite_rank(
    score: i64,
    num_comments: i64,
    upvote_ratio: Option<f64>,
    created_utc: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let base = SCORE_WEIGHT * score as f64 + COMMENT_WEIGHT * num_comments as f64;
    let ratio_bonus = upvote_ratio.map_or(0.0, |ratio| RATIO_WEIGHT * ratio);

    let age_hours = ((now - created_utc).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
    let decay = 0.5_f64.powf(age_hours / HALF_LIFE_HOURS);

    (base + ratio_bonus) * decay
}

/// Return items sorted descending by composite rank.
///
/// The sort is stable, so ties keep their input order. `now` is sampled once
/// per call: ranking is deterministic for fixed inputs evaluated at the same
/// instant. The fetch layer never supplies an upvote ratio, so the ratio
/// term is passed as `None` here.
pub fn rank_items(items: &[ContentItem]) -> Vec<ContentItem> {
    let now = Utc::now();
    let mut scored: Vec<(f64, ContentItem)> = items
        .iter()
        .map(|item| {
            let rank = composite_rank(item.score, item.num_comments, None, item.created_utc, now);
            (rank, item.clone())
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use url::Url;

    fn item(id: &str, score: i64, num_comments: i64, created_utc: DateTime<Utc>) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            source: "reddit".to_string(),
            title: format!("item {id}"),
            author: "user".to_string(),
            url: Url::parse("https://example.com/post").unwrap(),
            score,
            num_comments,
            created_utc,
            topic: None,
            text: None,
        }
    }

    #[test]
    fn fresh_item_has_exact_base_rank() {
        let now = Utc::now();
        assert_eq!(composite_rank(100, 50, None, now, now), 125.0);
    }

    #[test]
    fn upvote_ratio_adds_weighted_bonus() {
        let now = Utc::now();
        let rank = composite_rank(100, 50, Some(0.8), now, now);
        assert!((rank - 126.6).abs() < 1e-9);
    }

    #[test]
    fn rank_halves_at_half_life() {
        let now = Utc::now();
        let fresh = composite_rank(100, 50, None, now, now);
        let aged = composite_rank(100, 50, None, now - Duration::hours(48), now);
        assert!(aged < fresh);
        assert!((aged / fresh - 0.5).abs() < 0.1);
    }

    #[test]
    fn rank_is_monotonic_in_score() {
        let now = Utc::now();
        let created = now - Duration::hours(12);
        let mut previous = f64::MIN;
        for score in [0, 1, 10, 100, 1000] {
            let rank = composite_rank(score, 5, None, created, now);
            assert!(rank >= previous);
            previous = rank;
        }
    }

    #[test]
    fn future_timestamps_clamp_to_zero_age() {
        let now = Utc::now();
        let rank = composite_rank(100, 50, None, now + Duration::hours(5), now);
        assert_eq!(rank, 125.0);
    }

    #[test]
    fn negative_engagement_propagates() {
        let now = Utc::now();
        assert!(composite_rank(-10, -5, None, now, now) < 0.0);
    }

    #[test]
    fn very_old_items_decay_towards_zero() {
        let now = Utc::now();
        let rank = composite_rank(1000, 100, Some(0.9), now - Duration::days(30), now);
        assert!(rank >= 0.0);
        assert!(rank < 1.0);
    }

    #[test]
    fn orders_by_combined_engagement() {
        let now = Utc::now();
        let items = vec![
            item("1", 1, 1, now),
            item("2", 10, 0, now),
            item("3", 5, 100, now),
        ];
        let ranked = rank_items(&items);
        assert_eq!(ranked[0].id, "3"); // 5 + 50
        assert_eq!(ranked[1].id, "2"); // 10
        assert_eq!(ranked[2].id, "1"); // 1.5
    }

    #[test]
    fn fresher_item_outranks_equal_engagement() {
        let now = Utc::now();
        let items = vec![
            item("old", 100, 50, now - Duration::hours(24)),
            item("fresh", 100, 50, now),
        ];
        let ranked = rank_items(&items);
        assert_eq!(ranked[0].id, "fresh");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(rank_items(&[]).is_empty());
    }
}
