/// Scoring, tagging and display behaviour through the public API
use chrono::{TimeZone, Utc};
use social_cards::display::{format_number, short_id};
use social_cards::score::{assign_tier, social_score_v1, Metrics, Tier};
use social_cards::tags::{compute_tags, Tag};

fn golden_metrics() -> Metrics {
    Metrics {
        followers: 1_000_000.0,
        following: 500.0,
        posts: 2000.0,
        listed: 5000.0,
        avg_eng_per_post: 3000.0,
        velocity_7d: 14.0,
    }
}

#[cfg(test)]
mod score_tests {
    use super::*;

    #[test]
    fn test_end_to_end_first_capture() {
        let score = social_score_v1(&golden_metrics());
        assert_eq!(score.value, 69);
        assert_eq!(score.tier, Tier::Gold);
        assert_eq!(score.formula_version, "v1");

        let captured_at = Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap();
        let tags = compute_tags(&score, None, true, captured_at);
        assert_eq!(tags, vec![Tag::Genesis]);
    }

    #[test]
    fn test_idempotent() {
        let a = social_score_v1(&golden_metrics());
        let b = social_score_v1(&golden_metrics());
        assert_eq!(a, b);
    }

    #[test]
    fn test_boundary_table() {
        let table = [
            (90, Tier::Mythic),
            (89, Tier::Platinum),
            (75, Tier::Platinum),
            (74, Tier::Gold),
            (50, Tier::Gold),
            (49, Tier::Silver),
            (25, Tier::Silver),
            (24, Tier::Bronze),
            (0, Tier::Bronze),
        ];
        for (value, expected) in table {
            assert_eq!(assign_tier(value), expected, "value {}", value);
        }
    }

    #[test]
    fn test_small_account() {
        let score = social_score_v1(&Metrics {
            followers: 1000.0,
            following: 1000.0,
            posts: 300.0,
            listed: 10.0,
            avg_eng_per_post: 50.0,
            velocity_7d: 3.0,
        });
        assert_eq!(score.value, 31);
        assert_eq!(score.tier, Tier::Silver);
    }

    #[test]
    fn test_following_more_lowers_score() {
        let base = social_score_v1(&Metrics {
            following: 10.0,
            ..golden_metrics()
        });
        let worse = social_score_v1(&Metrics {
            followers: 10_000.0,
            following: 5000.0,
            ..golden_metrics()
        });
        assert!(worse.value < base.value);
    }
}

#[cfg(test)]
mod tag_tests {
    use super::*;

    fn score(value: u8) -> social_cards::score::Score {
        social_cards::score::Score {
            value,
            tier: assign_tier(value),
            formula_version: "v1".to_string(),
        }
    }

    #[test]
    fn test_month_end_uses_utc() {
        // 23:59 UTC on Jan 31 is already Feb 1 in UTC+1, but the rule is UTC-anchored
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 0).unwrap();
        assert_eq!(compute_tags(&score(40), None, false, at), vec![Tag::Foil]);

        let at = Utc.with_ymd_and_hms(2024, 1, 30, 23, 59, 0).unwrap();
        assert!(compute_tags(&score(40), None, false, at).is_empty());
    }

    #[test]
    fn test_delta_threshold() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        assert_eq!(compute_tags(&score(45), Some(35), false, at), vec![Tag::Foil]);
        assert!(compute_tags(&score(44), Some(35), false, at).is_empty());
    }
}

#[cfg(test)]
mod display_tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1500.0), "1.5K");
        assert_eq!(format_number(2_300_000.0), "2.3M");
        assert_eq!(format_number(1_000_000_000.0), "1.0B");
    }

    #[test]
    fn test_short_id_shape() {
        let id = uuid::Uuid::new_v4().to_string();
        assert_eq!(id.len(), 36);
        let short = short_id(&id);
        assert_eq!(short.len(), 10);
        assert!(!short.contains('-'));
        assert!(short
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }
}
