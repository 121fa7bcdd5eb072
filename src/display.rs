//! Display helpers shared by the card endpoint and the renderer payload.

use crate::score::{Metrics, Tier};
use serde::Serialize;
use utoipa::ToSchema;

pub const CARD_WIDTH: u32 = 630;
pub const CARD_HEIGHT: u32 = 880;

/// Visual styling for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TierStyle {
    pub label: &'static str,
    pub color: &'static str,
    pub glow: &'static str,
}

pub fn tier_style(tier: Tier) -> TierStyle {
    match tier {
        Tier::Mythic => TierStyle {
            label: "MYTHIC",
            color: "#FF00FF",
            glow: "rgba(255,0,255,0.4)",
        },
        Tier::Platinum => TierStyle {
            label: "PLATINUM",
            color: "#E5E4E2",
            glow: "rgba(229,228,226,0.3)",
        },
        Tier::Gold => TierStyle {
            label: "GOLD",
            color: "#FFD700",
            glow: "rgba(255,215,0,0.3)",
        },
        Tier::Silver => TierStyle {
            label: "SILVER",
            color: "#C0C0C0",
            glow: "rgba(192,192,192,0.25)",
        },
        Tier::Bronze => TierStyle {
            label: "BRONZE",
            color: "#CD7F32",
            glow: "rgba(205,127,50,0.25)",
        },
    }
}

/// One KPI row as shown on a card.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct KpiLine {
    pub key: &'static str,
    pub label: &'static str,
    pub value: f64,
    pub display: String,
}

/// KPI rows in card display order.
pub fn kpi_lines(m: &Metrics) -> Vec<KpiLine> {
    [
        ("followers", "Followers", m.followers),
        ("following", "Following", m.following),
        ("posts", "Total Posts", m.posts),
        ("listed", "Listed", m.listed),
        ("avgEngPerPost", "Avg Eng/Post", m.avg_eng_per_post),
        ("velocity7d", "Velocity 7d", m.velocity_7d),
    ]
    .into_iter()
    .map(|(key, label, value)| KpiLine {
        key,
        label,
        value,
        display: format_number(value),
    })
    .collect()
}

/// Compact KPI string: `1.5K`, `2.3M`, `1.0B`, or the plain number below 1000.
///
/// Ties round half-up (`1250` -> `1.3K`).
pub fn format_number(n: f64) -> String {
    const UNITS: [(f64, &str); 3] = [(1e9, "B"), (1e6, "M"), (1e3, "K")];

    for (divisor, suffix) in UNITS {
        if n >= divisor {
            let tenths = (n * 10.0 / divisor + 0.5).floor() as u64;
            return format!("{}.{}{}", tenths / 10, tenths % 10, suffix);
        }
    }

    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Display code for an identifier: hyphens removed, first 10 chars, uppercased.
///
/// Not unique; never use it as a key.
pub fn short_id(id: &str) -> String {
    id.chars()
        .filter(|c| *c != '-')
        .take(10)
        .collect::<String>()
        .to_uppercase()
}
