use crate::display::{KpiLine, TierStyle};
use crate::score::{Metrics, Score};
use crate::tags::Tag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ============ Database Models ============

/// A social account we have captured at least once.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    /// Source platform, currently always `"x"`.
    pub platform: String,
    /// Lowercased handle without the leading `@`.
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub verified: Option<bool>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Where a snapshot's metrics came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSource {
    Live,
    Mock,
}

/// Scoring context stored next to every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub source: MetricsSource,
    pub formula_version: String,
    pub tags: Vec<Tag>,
    pub previous_score: Option<u8>,
    pub previous_snapshot_id: Option<Uuid>,
}

/// One immutable scored measurement of a profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Snapshot {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub captured_at: DateTime<Utc>,
    #[schema(value_type = Metrics)]
    pub kpis: Json<Metrics>,
    #[schema(value_type = Score)]
    pub score: Json<Score>,
    #[schema(value_type = Provenance)]
    pub provenance: Json<Provenance>,
    /// Global edition counter, assigned by the database.
    pub card_number: i64,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn tags(&self) -> &[Tag] {
        &self.provenance.0.tags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "asset_format", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Png,
    Pdf,
}

/// A rendered artifact for a snapshot.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct CardAsset {
    pub id: Uuid,
    pub snapshot_id: Uuid,
    pub format: AssetFormat,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "vault_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Unlisted,
}

/// A snapshot saved into a user's vault.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct VaultEntry {
    pub id: Uuid,
    pub owner_user_id: Option<Uuid>,
    pub owner_profile_id: Option<Uuid>,
    pub snapshot_id: Uuid,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Vault entry fields exposed alongside a card.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VaultEntrySummary {
    pub id: Uuid,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&VaultEntry> for VaultEntrySummary {
    fn from(entry: &VaultEntry) -> Self {
        Self {
            id: entry.id,
            visibility: entry.visibility,
            tags: entry.tags.clone(),
            created_at: entry.created_at,
        }
    }
}

// ============ API Request/Response Models ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct CaptureRequest {
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaptureResult {
    pub profile: Profile,
    pub snapshot: Snapshot,
    pub assets: Vec<CardAsset>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub profile: Profile,
    pub snapshot: Snapshot,
    pub assets: Vec<CardAsset>,
    /// Short display code derived from the snapshot id.
    pub card_id: String,
    /// Public link to the card page.
    pub card_url: String,
    pub tier_style: TierStyle,
    pub kpis: Vec<KpiLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetsResponse {
    pub assets: Vec<CardAsset>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Window size in days (default 30, 1..=365).
    pub days: Option<i64>,
    /// Maximum number of items (default 24, 1..=100).
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardItem {
    pub rank: usize,
    pub total: usize,
    pub snapshot: Snapshot,
    pub profile: Profile,
    pub assets: Vec<CardAsset>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub items: Vec<LeaderboardItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveToVaultRequest {
    pub snapshot_id: Uuid,
    pub visibility: Visibility,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveToVaultResponse {
    pub ok: bool,
    pub vault_entry: VaultEntry,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultCard {
    pub vault_entry: Option<VaultEntrySummary>,
    pub snapshot: Snapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub assets: Vec<CardAsset>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyVaultResponse {
    pub cards: Vec<VaultCard>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicVaultResponse {
    pub profile: Profile,
    pub cards: Vec<VaultCard>,
}
