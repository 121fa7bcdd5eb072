//! Audits stored v1 snapshots against the current formula implementation.
//!
//! Recomputes every v1 score from its stored KPIs and reports snapshots whose
//! stored value or tier differ. Read-only. Exits non-zero on any drift.

use dotenvy::dotenv;
use social_cards::core::score::{social_score_v1, FORMULA_VERSION};
use social_cards::data::db_storage::CardStorage;
use sqlx::postgres::PgPoolOptions;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    let storage = CardStorage::new(pool);

    let snapshots = storage
        .snapshots_for_formula(FORMULA_VERSION)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    tracing::info!("Checking {} {} snapshot(s)", snapshots.len(), FORMULA_VERSION);

    let mut drifted = 0usize;
    for snapshot in &snapshots {
        let recomputed = social_score_v1(&snapshot.kpis);
        if recomputed.value != snapshot.score.value || recomputed.tier != snapshot.score.tier {
            drifted += 1;
            tracing::warn!(
                "Snapshot {} (#{}): stored {} ({}), recomputed {} ({})",
                snapshot.id,
                snapshot.card_number,
                snapshot.score.value,
                snapshot.score.tier,
                recomputed.value,
                recomputed.tier
            );
        }
    }

    if drifted > 0 {
        tracing::error!("{} of {} snapshot(s) drifted", drifted, snapshots.len());
        std::process::exit(1);
    }

    tracing::info!("All {} snapshot(s) match", snapshots.len());
    Ok(())
}
