//! Provenance tags attached to a snapshot.

use crate::score::Score;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minimum score increase over the previous snapshot that earns `foil`.
pub const FOIL_SCORE_DELTA: i16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// First snapshot ever recorded for the profile.
    Genesis,
    /// Score jumped by at least [`FOIL_SCORE_DELTA`], or the snapshot was
    /// captured on the last UTC day of a month.
    Foil,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Genesis => "genesis",
            Tag::Foil => "foil",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `at` falls on the last calendar day of its UTC month.
pub fn is_month_end(at: DateTime<Utc>) -> bool {
    let next_day = at + Duration::days(1);
    next_day.month() != at.month()
}

/// Derives tags for a freshly scored snapshot.
///
/// `previous_score` is the value of the most recent earlier snapshot for the
/// same profile, or `None` when there isn't one. Callers guarantee
/// `is_first_snapshot` implies `previous_score == None`.
///
/// Output order is stable: `genesis` before `foil`, each at most once.
pub fn compute_tags(
    score: &Score,
    previous_score: Option<u8>,
    is_first_snapshot: bool,
    captured_at: DateTime<Utc>,
) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(2);

    if is_first_snapshot {
        tags.push(Tag::Genesis);
    }

    let delta = previous_score
        .map(|prev| i16::from(score.value) - i16::from(prev))
        .unwrap_or(0);
    if delta >= FOIL_SCORE_DELTA {
        tags.push(Tag::Foil);
    }

    if is_month_end(captured_at) && !tags.contains(&Tag::Foil) {
        tags.push(Tag::Foil);
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{assign_tier, FORMULA_VERSION};
    use chrono::TimeZone;

    fn score(value: u8) -> Score {
        Score {
            value,
            tier: assign_tier(value),
            formula_version: FORMULA_VERSION.to_string(),
        }
    }

    fn mid_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_snapshot_is_genesis() {
        let tags = compute_tags(&score(40), None, true, mid_month());
        assert_eq!(tags, vec![Tag::Genesis]);
    }

    #[test]
    fn test_no_history_no_foil() {
        let tags = compute_tags(&score(99), None, false, mid_month());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_delta_of_ten_is_foil() {
        let tags = compute_tags(&score(60), Some(50), false, mid_month());
        assert_eq!(tags, vec![Tag::Foil]);
    }

    #[test]
    fn test_delta_of_nine_is_not_foil() {
        let tags = compute_tags(&score(59), Some(50), false, mid_month());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_score_drop_is_not_foil() {
        let tags = compute_tags(&score(10), Some(90), false, mid_month());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_previous_zero_differs_from_none() {
        let now = mid_month();
        assert_eq!(compute_tags(&score(10), Some(0), false, now), vec![Tag::Foil]);
        assert!(compute_tags(&score(10), None, false, now).is_empty());
    }

    #[test]
    fn test_month_end_is_foil() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 0).unwrap();
        assert_eq!(compute_tags(&score(30), None, false, at), vec![Tag::Foil]);

        let at = Utc.with_ymd_and_hms(2024, 1, 30, 23, 59, 0).unwrap();
        assert!(compute_tags(&score(30), None, false, at).is_empty());
    }

    #[test]
    fn test_leap_year_february() {
        assert!(!is_month_end(Utc.with_ymd_and_hms(2024, 2, 28, 10, 0, 0).unwrap()));
        assert!(is_month_end(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()));
        assert!(is_month_end(Utc.with_ymd_and_hms(2023, 2, 28, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_year_end_is_month_end() {
        assert!(is_month_end(Utc.with_ymd_and_hms(2024, 12, 31, 8, 0, 0).unwrap()));
    }

    #[test]
    fn test_both_triggers_single_foil() {
        let at = Utc.with_ymd_and_hms(2024, 4, 30, 6, 0, 0).unwrap();
        let tags = compute_tags(&score(80), Some(20), false, at);
        assert_eq!(tags, vec![Tag::Foil]);
    }

    #[test]
    fn test_genesis_on_month_end_orders_genesis_first() {
        let at = Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap();
        let tags = compute_tags(&score(5), None, true, at);
        assert_eq!(tags, vec![Tag::Genesis, Tag::Foil]);
    }

    #[test]
    fn test_tags_serialize_lowercase() {
        let json = serde_json::to_value(vec![Tag::Genesis, Tag::Foil]).unwrap();
        assert_eq!(json, serde_json::json!(["genesis", "foil"]));
    }
}
