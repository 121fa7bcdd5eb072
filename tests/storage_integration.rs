use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use social_cards::capture::build_provenance;
use social_cards::data::db_storage::CardStorage;
use social_cards::db::Database;
use social_cards::leaderboard::rank_entries;
use social_cards::metrics_provider::MockMetricsGenerator;
use social_cards::models::{AssetFormat, Visibility};
use social_cards::render_client::RenderedAsset;
use social_cards::score::social_score_v1;
use social_cards::tags::Tag;

async fn storage() -> anyhow::Result<CardStorage> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    Ok(CardStorage::new(db.pool.clone()))
}

fn unique_handle() -> String {
    format!("t_{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Two captures of one profile, assets, vault and leaderboard against a real database.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn capture_history_smoke_test() -> anyhow::Result<()> {
    let storage = storage().await?;
    let err = |e: social_cards::errors::AppError| anyhow::anyhow!(e.to_string());

    let fetched = MockMetricsGenerator::generate(&unique_handle());
    let now = Utc::now();
    let profile = storage.upsert_profile(&fetched, now).await.map_err(err)?;
    assert_eq!(profile.username, fetched.username);

    // First capture
    let score = social_score_v1(&fetched.metrics);
    let previous = storage.latest_snapshot(profile.id).await.map_err(err)?;
    assert!(previous.is_none());
    let provenance = build_provenance(fetched.source, &score, None, now);
    let first = storage
        .insert_snapshot(profile.id, now, &fetched.metrics, &score, &provenance)
        .await
        .map_err(err)?;
    assert!(first.tags().contains(&Tag::Genesis));

    // Second capture references the first
    let later = now + Duration::seconds(5);
    let previous = storage.latest_snapshot(profile.id).await.map_err(err)?;
    assert_eq!(previous.as_ref().map(|s| s.id), Some(first.id));
    let provenance = build_provenance(fetched.source, &score, previous.as_ref(), later);
    let second = storage
        .insert_snapshot(profile.id, later, &fetched.metrics, &score, &provenance)
        .await
        .map_err(err)?;
    assert!(!second.tags().contains(&Tag::Genesis));
    assert!(second.card_number > first.card_number);
    assert_eq!(second.provenance.previous_score, Some(first.score.value));

    // Re-upserting refreshes rather than duplicating
    let again = storage.upsert_profile(&fetched, later).await.map_err(err)?;
    assert_eq!(again.id, profile.id);

    // Assets replace per format
    let png = RenderedAsset {
        format: AssetFormat::Png,
        url: "https://cdn.example.com/v1.png".to_string(),
        width: Some(630),
        height: Some(880),
    };
    storage.store_assets(second.id, &[png.clone()]).await.map_err(err)?;
    let png_v2 = RenderedAsset {
        url: "https://cdn.example.com/v2.png".to_string(),
        ..png
    };
    storage.store_assets(second.id, &[png_v2]).await.map_err(err)?;
    let assets = storage.assets_for_snapshot(second.id).await.map_err(err)?;
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].url, "https://cdn.example.com/v2.png");

    // Vault: saving twice only changes visibility
    let user_id = Uuid::new_v4();
    storage
        .upsert_vault_entry(user_id, &first, Visibility::Private)
        .await
        .map_err(err)?;
    let entry = storage
        .upsert_vault_entry(user_id, &first, Visibility::Public)
        .await
        .map_err(err)?;
    assert_eq!(entry.visibility, Visibility::Public);
    assert_eq!(entry.tags, vec!["genesis".to_string()]);

    let mine = storage.vault_entries_for_user(user_id).await.map_err(err)?;
    assert_eq!(mine.len(), 1);
    let public = storage
        .public_vault_entries_for_profile(profile.id)
        .await
        .map_err(err)?;
    assert!(public.iter().any(|e| e.snapshot_id == first.id));

    // Leaderboard keeps one snapshot per profile
    let candidates = storage
        .leaderboard_candidates(now - Duration::days(1))
        .await
        .map_err(err)?;
    let ours: Vec<_> = candidates.iter().filter(|s| s.profile_id == profile.id).collect();
    assert_eq!(ours.len(), 1);

    let ids: Vec<Uuid> = candidates.iter().map(|s| s.profile_id).collect();
    let profiles = storage.profiles_by_ids(&ids).await.map_err(err)?;
    let ranked = rank_entries(candidates, &profiles);
    assert!(ranked.windows(2).all(|w| w[0].snapshot.score.value >= w[1].snapshot.score.value));

    Ok(())
}
