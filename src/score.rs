//! Social score formula (v1).
//!
//! Turns a raw [`Metrics`] record into a 0–100 [`Score`] with a [`Tier`].
//! Five sub-scores are weighted, normalized against fixed theoretical bounds
//! and rounded. Every constant here is part of formula `v1`: changing one
//! means shipping a new formula version, not editing this one.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Formula version stamped on every [`Score`].
pub const FORMULA_VERSION: &str = "v1";

/// Raw engagement metrics for a single handle at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub followers: f64,
    pub following: f64,
    pub posts: f64,
    pub listed: f64,
    pub avg_eng_per_post: f64,
    /// Posts published in the trailing 7 days.
    #[serde(rename = "velocity7d")]
    pub velocity_7d: f64,
}

/// Intermediate sub-scores. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub influence: f64,
    pub credibility: f64,
    pub quality: f64,
    pub momentum: f64,
    pub health: f64,
    /// Weighted sum of the five components.
    pub raw: f64,
}

/// Tier labels in ascending order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Mythic,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Mythic => "mythic",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored snapshot value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Integer in `[0, 100]`.
    pub value: u8,
    pub tier: Tier,
    pub formula_version: String,
}

/// Per-component weights. Must sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub influence: f64,
    pub credibility: f64,
    pub quality: f64,
    pub momentum: f64,
    pub health: f64,
}

pub const WEIGHTS: Weights = Weights {
    influence: 0.35,
    credibility: 0.15,
    quality: 0.25,
    momentum: 0.15,
    health: 0.10,
};

/// Closed interval a sub-score is expected to fall in.
#[derive(Debug, Clone, Copy)]
pub struct Bound {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    /// log10(followers + 1); 8 is roughly 100M followers.
    pub influence: Bound,
    /// log10(listed + 1); 5 is roughly 100K lists.
    pub credibility: Bound,
    /// log10(avg engagement + 1); 6 is roughly 1M per post.
    pub quality: Bound,
    pub momentum: Bound,
    pub health: Bound,
}

pub const BOUNDS: Bounds = Bounds {
    influence: Bound { min: 0.0, max: 8.0 },
    credibility: Bound { min: 0.0, max: 5.0 },
    quality: Bound { min: 0.0, max: 6.0 },
    momentum: Bound { min: 0.0, max: 1.0 },
    health: Bound { min: 0.0, max: 1.0 },
};

/// Inclusive value range mapped to a tier.
#[derive(Debug, Clone, Copy)]
pub struct TierThreshold {
    pub min: u8,
    pub max: u8,
    pub tier: Tier,
}

/// Scanned top-down; the first threshold with `min <= value` wins.
pub const TIER_THRESHOLDS: [TierThreshold; 5] = [
    TierThreshold { min: 90, max: 100, tier: Tier::Mythic },
    TierThreshold { min: 75, max: 89, tier: Tier::Platinum },
    TierThreshold { min: 50, max: 74, tier: Tier::Gold },
    TierThreshold { min: 25, max: 49, tier: Tier::Silver },
    TierThreshold { min: 0, max: 24, tier: Tier::Bronze },
];

fn clamp(n: f64, lo: f64, hi: f64) -> f64 {
    // f64::clamp keeps NaN; this maps it to `lo`.
    if n.is_nan() {
        return lo;
    }
    n.max(lo).min(hi)
}

/// log10(n + 1) with negative inputs treated as zero.
fn log_scale(n: f64) -> f64 {
    (n.max(0.0) + 1.0).log10()
}

fn weighted(influence: f64, credibility: f64, quality: f64, momentum: f64, health: f64) -> f64 {
    WEIGHTS.influence * influence
        + WEIGHTS.credibility * credibility
        + WEIGHTS.quality * quality
        + WEIGHTS.momentum * momentum
        + WEIGHTS.health * health
}

/// Computes the five sub-scores and their weighted sum.
pub fn compute_sub_scores(m: &Metrics) -> SubScores {
    let influence = log_scale(m.followers);
    let credibility = log_scale(m.listed);
    let quality = log_scale(m.avg_eng_per_post);
    let momentum = clamp(m.velocity_7d, 0.0, 100.0) / 100.0;
    let health = clamp(m.followers / m.following.max(1.0), 0.0, 10.0) / 10.0;

    let raw = weighted(influence, credibility, quality, momentum, health);

    SubScores {
        influence,
        credibility,
        quality,
        momentum,
        health,
        raw,
    }
}

/// Maps a raw weighted sum onto `[0, 1]` using the fixed bounds.
pub fn normalize_raw(raw: f64) -> f64 {
    let raw_min = weighted(
        BOUNDS.influence.min,
        BOUNDS.credibility.min,
        BOUNDS.quality.min,
        BOUNDS.momentum.min,
        BOUNDS.health.min,
    );
    let raw_max = weighted(
        BOUNDS.influence.max,
        BOUNDS.credibility.max,
        BOUNDS.quality.max,
        BOUNDS.momentum.max,
        BOUNDS.health.max,
    );

    clamp((raw - raw_min) / (raw_max - raw_min), 0.0, 1.0)
}

pub fn assign_tier(value: u8) -> Tier {
    TIER_THRESHOLDS
        .iter()
        .find(|t| value >= t.min)
        .map(|t| t.tier)
        .unwrap_or(Tier::Bronze)
}

/// Scores a metrics record with formula v1.
pub fn social_score_v1(metrics: &Metrics) -> Score {
    let sub = compute_sub_scores(metrics);
    let normalized = normalize_raw(sub.raw);
    // normalized is in [0, 1], so the cast cannot truncate.
    let value = (normalized * 100.0).round() as u8;

    Score {
        value,
        tier: assign_tier(value),
        formula_version: FORMULA_VERSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_weights_sum_to_one() {
        let sum = WEIGHTS.influence
            + WEIGHTS.credibility
            + WEIGHTS.quality
            + WEIGHTS.momentum
            + WEIGHTS.health;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_golden_score() {
        let score = social_score_v1(&golden_metrics());
        assert_eq!(score.value, 69);
        assert_eq!(score.tier, Tier::Gold);
        assert_eq!(score.formula_version, "v1");
    }

    #[test]
    fn test_golden_sub_scores() {
        let sub = compute_sub_scores(&golden_metrics());
        assert!((sub.influence - 6.000_000_434).abs() < 1e-6);
        assert!((sub.momentum - 0.14).abs() < 1e-12);
        assert_eq!(sub.health, 1.0);
        assert!((sub.raw - 3.645_175_179).abs() < 1e-6);
    }

    #[test]
    fn test_zero_metrics_score_zero() {
        let score = social_score_v1(&Metrics::default());
        assert_eq!(score.value, 0);
        assert_eq!(score.tier, Tier::Bronze);
    }

    #[test]
    fn test_zero_following_uses_one() {
        let sub = compute_sub_scores(&Metrics {
            followers: 5.0,
            following: 0.0,
            ..Metrics::default()
        });
        assert!((sub.health - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_inputs_do_not_produce_nan() {
        let m = Metrics {
            followers: -100.0,
            following: -3.0,
            posts: -1.0,
            listed: -7.0,
            avg_eng_per_post: -2.5,
            velocity_7d: -10.0,
        };
        let sub = compute_sub_scores(&m);
        assert!(sub.raw.is_finite());
        assert_eq!(social_score_v1(&m).value, 0);
    }

    #[test]
    fn test_saturated_metrics_cap_at_hundred() {
        let m = Metrics {
            followers: 1e12,
            following: 1.0,
            posts: 1e9,
            listed: 1e9,
            avg_eng_per_post: 1e9,
            velocity_7d: 5000.0,
        };
        let score = social_score_v1(&m);
        assert_eq!(score.value, 100);
        assert_eq!(score.tier, Tier::Mythic);
    }

    #[test]
    fn test_normalize_nan_is_zero() {
        assert_eq!(normalize_raw(f64::NAN), 0.0);
    }

    #[test]
    fn test_tier_boundaries() {
        let cases = [
            (100, Tier::Mythic),
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
        for (value, tier) in cases {
            assert_eq!(assign_tier(value), tier, "value {}", value);
        }
    }

    #[test]
    fn test_thresholds_cover_range_without_gaps() {
        for value in 0..=100u8 {
            let hits = TIER_THRESHOLDS
                .iter()
                .filter(|t| value >= t.min && value <= t.max)
                .count();
            assert_eq!(hits, 1, "value {}", value);
        }
    }

    #[test]
    fn test_score_serializes_camel_case() {
        let json = serde_json::to_value(social_score_v1(&golden_metrics())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"value": 69, "tier": "gold", "formulaVersion": "v1"})
        );
    }

    #[test]
    fn test_metrics_field_names() {
        let json = serde_json::to_value(golden_metrics()).unwrap();
        assert!(json.get("avgEngPerPost").is_some());
        assert!(json.get("velocity7d").is_some());
    }
}
