//! Leaderboard ranking.
//!
//! Storage hands us candidate snapshots inside the time window; this module
//! decides which snapshot represents each profile and in what order.

use crate::models::{Profile, Snapshot};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_DAYS: i64 = 30;
pub const MAX_DAYS: i64 = 365;
pub const DEFAULT_LIMIT: i64 = 24;
pub const MAX_LIMIT: i64 = 100;

/// A validated leaderboard window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub days: i64,
    pub limit: i64,
}

impl Window {
    /// Applies defaults and clamps out-of-range values.
    pub fn from_query(days: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            days: days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ranked {
    pub rank: usize,
    pub snapshot: Snapshot,
    pub profile: Profile,
}

/// Higher score first; earlier capture wins ties, then lower edition number.
fn compare(a: &Snapshot, b: &Snapshot) -> Ordering {
    b.score
        .value
        .cmp(&a.score.value)
        .then_with(|| a.captured_at.cmp(&b.captured_at))
        .then_with(|| a.card_number.cmp(&b.card_number))
}

/// Keeps each profile's best snapshot and assigns 1-based ranks.
///
/// Entries whose profile is missing from `profiles` are dropped.
pub fn rank_entries(snapshots: Vec<Snapshot>, profiles: &HashMap<Uuid, Profile>) -> Vec<Ranked> {
    let mut best: HashMap<Uuid, Snapshot> = HashMap::new();
    for snapshot in snapshots {
        match best.get(&snapshot.profile_id) {
            Some(current) if compare(current, &snapshot) != Ordering::Greater => {}
            _ => {
                best.insert(snapshot.profile_id, snapshot);
            }
        }
    }

    let mut winners: Vec<Snapshot> = best.into_values().collect();
    winners.sort_by(compare);

    winners
        .into_iter()
        .filter_map(|snapshot| {
            profiles
                .get(&snapshot.profile_id)
                .cloned()
                .map(|profile| (snapshot, profile))
        })
        .enumerate()
        .map(|(i, (snapshot, profile))| Ranked {
            rank: i + 1,
            snapshot,
            profile,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricsSource, Provenance};
    use crate::score::{assign_tier, Metrics, Score, FORMULA_VERSION};
    use chrono::{Duration, TimeZone, Utc};
    use sqlx::types::Json;

    fn profile(id: Uuid, name: &str) -> Profile {
        Profile {
            id,
            platform: "x".to_string(),
            username: name.to_string(),
            display_name: None,
            avatar_url: None,
            verified: None,
            bio: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_fetched_at: None,
        }
    }

    fn snapshot(profile_id: Uuid, value: u8, minutes: i64, card_number: i64) -> Snapshot {
        let captured_at =
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        Snapshot {
            id: Uuid::new_v4(),
            profile_id,
            captured_at,
            kpis: Json(Metrics::default()),
            score: Json(Score {
                value,
                tier: assign_tier(value),
                formula_version: FORMULA_VERSION.to_string(),
            }),
            provenance: Json(Provenance {
                source: MetricsSource::Mock,
                formula_version: FORMULA_VERSION.to_string(),
                tags: vec![],
                previous_score: None,
                previous_snapshot_id: None,
            }),
            card_number,
            created_at: captured_at,
        }
    }

    #[test]
    fn test_window_defaults_and_clamps() {
        assert_eq!(Window::from_query(None, None), Window { days: 30, limit: 24 });
        assert_eq!(
            Window::from_query(Some(0), Some(1000)),
            Window { days: 1, limit: 100 }
        );
        assert_eq!(
            Window::from_query(Some(9999), Some(-5)),
            Window { days: 365, limit: 1 }
        );
    }

    #[test]
    fn test_sorted_descending_by_value() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let profiles: HashMap<_, _> = [(a, profile(a, "a")), (b, profile(b, "b")), (c, profile(c, "c"))]
            .into_iter()
            .collect();
        let ranked = rank_entries(
            vec![snapshot(a, 40, 0, 1), snapshot(b, 90, 1, 2), snapshot(c, 65, 2, 3)],
            &profiles,
        );
        let names: Vec<_> = ranked.iter().map(|r| r.profile.username.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_one_entry_per_profile_keeps_best() {
        let a = Uuid::new_v4();
        let profiles: HashMap<_, _> = [(a, profile(a, "a"))].into_iter().collect();
        let ranked = rank_entries(
            vec![snapshot(a, 40, 0, 1), snapshot(a, 70, 5, 2), snapshot(a, 55, 9, 3)],
            &profiles,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].snapshot.score.value, 70);
    }

    #[test]
    fn test_tie_goes_to_earlier_capture() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let profiles: HashMap<_, _> = [(a, profile(a, "a")), (b, profile(b, "b"))]
            .into_iter()
            .collect();
        let ranked = rank_entries(vec![snapshot(a, 50, 10, 2), snapshot(b, 50, 3, 1)], &profiles);
        assert_eq!(ranked[0].profile.username, "b");

        let ranked = rank_entries(vec![snapshot(a, 50, 10, 2), snapshot(a, 50, 3, 1)], &profiles);
        assert_eq!(ranked[0].snapshot.card_number, 1);
    }

    #[test]
    fn test_missing_profile_dropped() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let profiles: HashMap<_, _> = [(a, profile(a, "a"))].into_iter().collect();
        let ranked = rank_entries(vec![snapshot(a, 10, 0, 1), snapshot(b, 99, 0, 2)], &profiles);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rank, 1);
    }
}
