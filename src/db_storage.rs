use crate::errors::{AppError, ResultExt};
use crate::metrics_provider::FetchedProfile;
use crate::models::{CardAsset, Profile, Provenance, Snapshot, VaultEntry, Visibility};
use crate::render_client::RenderedAsset;
use crate::score::{Metrics, Score};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

pub const PLATFORM: &str = "x";

/// Database access for profiles, snapshots, card assets and vault entries.
#[derive(Clone)]
pub struct CardStorage {
    pool: PgPool,
}

impl CardStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }


    // ============ Profiles ============

    /// Insert or refresh a profile from provider data, stamping `last_fetched_at`.
    pub async fn upsert_profile(
        &self,
        fetched: &FetchedProfile,
        fetched_at: DateTime<Utc>,
    ) -> Result<Profile, AppError> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (platform, username, display_name, avatar_url, verified, bio, last_fetched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (platform, username) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                avatar_url = EXCLUDED.avatar_url,
                verified = EXCLUDED.verified,
                bio = EXCLUDED.bio,
                last_fetched_at = EXCLUDED.last_fetched_at
            RETURNING *
            "#,
        )
        .bind(PLATFORM)
        .bind(&fetched.username)
        .bind(&fetched.display_name)
        .bind(&fetched.avatar_url)
        .bind(fetched.verified)
        .bind(&fetched.bio)
        .bind(fetched_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("upserting profile @{}", fetched.username))
    }

    pub async fn find_profile_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles WHERE platform = $1 AND username = $2",
        )
        .bind(PLATFORM)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    pub async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    // ============ Snapshots ============

    /// Most recent snapshot for a profile by capture time.
    pub async fn latest_snapshot(&self, profile_id: Uuid) -> Result<Option<Snapshot>, AppError> {
        let snapshot = sqlx::query_as::<_, Snapshot>(
            r#"
            SELECT * FROM snapshots
            WHERE profile_id = $1
            ORDER BY captured_at DESC, card_number DESC
            LIMIT 1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading previous snapshot")?;

        Ok(snapshot)
    }

    /// Appends a snapshot. Snapshots are never updated afterwards.
    pub async fn insert_snapshot(
        &self,
        profile_id: Uuid,
        captured_at: DateTime<Utc>,
        kpis: &Metrics,
        score: &Score,
        provenance: &Provenance,
    ) -> Result<Snapshot, AppError> {
        sqlx::query_as::<_, Snapshot>(
            r#"
            INSERT INTO snapshots (profile_id, captured_at, kpis, score, provenance)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .bind(captured_at)
        .bind(Json(kpis))
        .bind(Json(score))
        .bind(Json(provenance))
        .fetch_one(&self.pool)
        .await
        .context("inserting snapshot")
    }

    pub async fn get_snapshot(&self, id: Uuid) -> Result<Option<Snapshot>, AppError> {
        let snapshot = sqlx::query_as::<_, Snapshot>("SELECT * FROM snapshots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(snapshot)
    }

    pub async fn snapshots_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Snapshot>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, Snapshot>("SELECT * FROM snapshots WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|s| (s.id, s)).collect())
    }

    /// Best snapshot per profile captured at or after `since`.
    ///
    /// Final ordering and ranking happen in [`crate::leaderboard::rank_entries`].
    pub async fn leaderboard_candidates(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, AppError> {
        let rows = sqlx::query_as::<_, Snapshot>(
            r#"
            SELECT DISTINCT ON (profile_id) *
            FROM snapshots
            WHERE captured_at >= $1
            ORDER BY profile_id, (score->>'value')::int DESC, captured_at ASC, card_number ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("loading leaderboard candidates")?;

        Ok(rows)
    }

    /// Every snapshot scored with `formula_version`, oldest first.
    pub async fn snapshots_for_formula(
        &self,
        formula_version: &str,
    ) -> Result<Vec<Snapshot>, AppError> {
        let rows = sqlx::query_as::<_, Snapshot>(
            "SELECT * FROM snapshots WHERE score->>'formulaVersion' = $1 ORDER BY card_number",
        )
        .bind(formula_version)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============ Card assets ============

    pub async fn assets_for_snapshot(&self, snapshot_id: Uuid) -> Result<Vec<CardAsset>, AppError> {
        let assets = sqlx::query_as::<_, CardAsset>(
            "SELECT * FROM card_assets WHERE snapshot_id = $1 ORDER BY format",
        )
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assets)
    }

    pub async fn assets_for_snapshots(
        &self,
        snapshot_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<CardAsset>>, AppError> {
        let mut grouped: HashMap<Uuid, Vec<CardAsset>> = HashMap::new();
        if snapshot_ids.is_empty() {
            return Ok(grouped);
        }

        let rows = sqlx::query_as::<_, CardAsset>(
            "SELECT * FROM card_assets WHERE snapshot_id = ANY($1) ORDER BY format",
        )
        .bind(snapshot_ids)
        .fetch_all(&self.pool)
        .await?;

        for asset in rows {
            grouped.entry(asset.snapshot_id).or_default().push(asset);
        }
        Ok(grouped)
    }

    /// Records rendered assets; re-rendering a format replaces its URL.
    pub async fn store_assets(
        &self,
        snapshot_id: Uuid,
        rendered: &[RenderedAsset],
    ) -> Result<Vec<CardAsset>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(rendered.len());

        for asset in rendered {
            let row = sqlx::query_as::<_, CardAsset>(
                r#"
                INSERT INTO card_assets (snapshot_id, format, url, width, height)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (snapshot_id, format) DO UPDATE
                SET url = EXCLUDED.url, width = EXCLUDED.width, height = EXCLUDED.height
                RETURNING *
                "#,
            )
            .bind(snapshot_id)
            .bind(asset.format)
            .bind(&asset.url)
            .bind(asset.width)
            .bind(asset.height)
            .fetch_one(&mut *tx)
            .await
            .context("storing card asset")?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }

    // ============ Vault ============

    /// Saves a snapshot into a user's vault, or changes its visibility if already saved.
    pub async fn upsert_vault_entry(
        &self,
        owner_user_id: Uuid,
        snapshot: &Snapshot,
        visibility: Visibility,
    ) -> Result<VaultEntry, AppError> {
        let tags: Vec<String> = snapshot.tags().iter().map(|t| t.to_string()).collect();

        sqlx::query_as::<_, VaultEntry>(
            r#"
            INSERT INTO vault_entries (owner_user_id, owner_profile_id, snapshot_id, visibility, tags)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_user_id, snapshot_id) DO UPDATE
            SET visibility = EXCLUDED.visibility
            RETURNING *
            "#,
        )
        .bind(owner_user_id)
        .bind(snapshot.profile_id)
        .bind(snapshot.id)
        .bind(visibility)
        .bind(&tags)
        .fetch_one(&self.pool)
        .await
        .context("saving vault entry")
    }

    pub async fn vault_entries_for_user(&self, user_id: Uuid) -> Result<Vec<VaultEntry>, AppError> {
        let rows = sqlx::query_as::<_, VaultEntry>(
            "SELECT * FROM vault_entries WHERE owner_user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn public_vault_entries_for_profile(
        &self,
        profile_id: Uuid,
    ) -> Result<Vec<VaultEntry>, AppError> {
        let rows = sqlx::query_as::<_, VaultEntry>(
            r#"
            SELECT * FROM vault_entries
            WHERE owner_profile_id = $1 AND visibility = 'public'
            ORDER BY created_at DESC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
