use crate::auth::{optional_user, require_user, AuthClient};
use crate::capture::{self, card_url};
use crate::config::Config;
use crate::db_storage::CardStorage;
use crate::display::{kpi_lines, short_id, tier_style};
use crate::errors::AppError;
use crate::leaderboard::{rank_entries, Window};
use crate::metrics_cache::MetricsCache;
use crate::metrics_provider::MetricsProvider;
use crate::models::*;
use crate::render_client::RenderClient;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Profile/snapshot/vault persistence.
    pub storage: CardStorage,
    /// Application configuration.
    pub config: Config,
    /// Live X API client or the deterministic mock.
    pub provider: MetricsProvider,
    /// Provider results per handle, checksum-validated on read.
    pub metrics_cache: MetricsCache,
    /// Handles with a capture currently running. Value is the claim time (unix seconds).
    pub in_flight_captures: Cache<String, i64>,
    /// Card renderer (optional).
    pub renderer: Option<RenderClient>,
    /// Bearer token resolver (optional; vault endpoints need it).
    pub auth: Option<AuthClient>,
}

/// Health check endpoint.
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "social-cards",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/capture-snapshot
///
/// Fetches metrics for a handle, scores them and stores a new snapshot.
/// Authentication is optional.
#[utoipa::path(
    post,
    path = "/api/capture-snapshot",
    request_body = CaptureRequest,
    responses(
        (status = 200, body = CaptureResult),
        (status = 400, description = "Invalid username"),
        (status = 404, description = "Unknown account"),
        (status = 409, description = "Capture already running for this handle"),
        (status = 502, description = "Metrics provider failure")
    )
)]
pub async fn capture_snapshot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CaptureRequest>,
) -> Result<Json<CaptureResult>, AppError> {
    tracing::info!("POST /capture-snapshot - username: {}", body.username);

    let user = optional_user(state.auth.as_ref(), &headers).await?;
    let result = capture::capture_snapshot(&state, &body.username, user.as_ref()).await?;

    Ok(Json(result))
}

async fn load_snapshot(state: &AppState, snapshot_id: Uuid) -> Result<Snapshot, AppError> {
    state
        .storage
        .get_snapshot(snapshot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Snapshot {} not found", snapshot_id)))
}

/// GET /api/card/:snapshot_id
///
/// Everything a card page needs: the snapshot, its profile, rendered assets
/// and display-ready values.
#[utoipa::path(
    get,
    path = "/api/card/{snapshot_id}",
    params(("snapshot_id" = Uuid, Path, description = "Snapshot id")),
    responses((status = 200, body = CardResponse), (status = 404, description = "Unknown snapshot"))
)]
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    Path(snapshot_id): Path<Uuid>,
) -> Result<Json<CardResponse>, AppError> {
    tracing::info!("GET /card/{}", snapshot_id);

    let snapshot = load_snapshot(&state, snapshot_id).await?;
    let profile = state
        .storage
        .get_profile(snapshot.profile_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(format!("Snapshot {} has no profile", snapshot_id))
        })?;
    let assets = state.storage.assets_for_snapshot(snapshot_id).await?;

    Ok(Json(CardResponse {
        card_id: short_id(&snapshot.id.to_string()),
        card_url: card_url(&state.config.public_base_url, snapshot.id)?,
        tier_style: tier_style(snapshot.score.tier),
        kpis: kpi_lines(&snapshot.kpis),
        profile,
        snapshot,
        assets,
    }))
}

/// GET /api/assets/:snapshot_id
///
/// Polled by clients after capture until the background render lands.
#[utoipa::path(
    get,
    path = "/api/assets/{snapshot_id}",
    params(("snapshot_id" = Uuid, Path, description = "Snapshot id")),
    responses((status = 200, body = AssetsResponse))
)]
pub async fn get_assets(
    State(state): State<Arc<AppState>>,
    Path(snapshot_id): Path<Uuid>,
) -> Result<Json<AssetsResponse>, AppError> {
    let assets = state.storage.assets_for_snapshot(snapshot_id).await?;
    Ok(Json(AssetsResponse { assets }))
}

/// GET /api/leaderboard?days=30&limit=24
///
/// Best snapshot per profile inside the window, highest score first.
#[utoipa::path(
    get,
    path = "/api/leaderboard",
    params(LeaderboardQuery),
    responses((status = 200, body = LeaderboardResponse))
)]
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let window = Window::from_query(params.days, params.limit);
    tracing::info!("GET /leaderboard - window: {:?}", window);

    let since = Utc::now() - Duration::days(window.days);
    let candidates = state.storage.leaderboard_candidates(since).await?;

    let profile_ids: Vec<Uuid> = candidates.iter().map(|s| s.profile_id).collect();
    let profiles = state.storage.profiles_by_ids(&profile_ids).await?;

    let ranked = rank_entries(candidates, &profiles);
    let total = ranked.len();
    let top: Vec<_> = ranked.into_iter().take(window.limit as usize).collect();

    let snapshot_ids: Vec<Uuid> = top.iter().map(|r| r.snapshot.id).collect();
    let mut assets = state.storage.assets_for_snapshots(&snapshot_ids).await?;

    let items = top
        .into_iter()
        .map(|r| LeaderboardItem {
            rank: r.rank,
            total,
            assets: assets.remove(&r.snapshot.id).unwrap_or_default(),
            snapshot: r.snapshot,
            profile: r.profile,
        })
        .collect();

    Ok(Json(LeaderboardResponse { items }))
}

/// POST /api/save-to-vault
///
/// Saves a snapshot into the caller's vault. Saving again changes visibility.
#[utoipa::path(
    post,
    path = "/api/save-to-vault",
    request_body = SaveToVaultRequest,
    responses(
        (status = 200, body = SaveToVaultResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown snapshot")
    ),
    security(("bearer" = []))
)]
pub async fn save_to_vault(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SaveToVaultRequest>,
) -> Result<Json<SaveToVaultResponse>, AppError> {
    let user = require_user(state.auth.as_ref(), &headers).await?;
    tracing::info!(
        "POST /save-to-vault - user: {}, snapshot: {}, visibility: {:?}",
        user.id,
        body.snapshot_id,
        body.visibility
    );

    let snapshot = load_snapshot(&state, body.snapshot_id).await?;
    let vault_entry = state
        .storage
        .upsert_vault_entry(user.id, &snapshot, body.visibility)
        .await?;

    Ok(Json(SaveToVaultResponse {
        ok: true,
        vault_entry,
    }))
}

/// Joins vault entries with their snapshots, profiles and assets, keeping entry order.
async fn build_vault_cards(
    state: &AppState,
    entries: Vec<VaultEntry>,
    include_profile: bool,
) -> Result<Vec<VaultCard>, AppError> {
    let snapshot_ids: Vec<Uuid> = entries.iter().map(|e| e.snapshot_id).collect();
    let mut snapshots = state.storage.snapshots_by_ids(&snapshot_ids).await?;
    let mut assets = state.storage.assets_for_snapshots(&snapshot_ids).await?;

    let profiles = if include_profile {
        let ids: Vec<Uuid> = snapshots.values().map(|s| s.profile_id).collect();
        state.storage.profiles_by_ids(&ids).await?
    } else {
        Default::default()
    };

    let cards = entries
        .iter()
        .filter_map(|entry| {
            let snapshot = snapshots.remove(&entry.snapshot_id)?;
            Some(VaultCard {
                vault_entry: Some(VaultEntrySummary::from(entry)),
                profile: profiles.get(&snapshot.profile_id).cloned(),
                assets: assets.remove(&entry.snapshot_id).unwrap_or_default(),
                snapshot,
            })
        })
        .collect();

    Ok(cards)
}

/// GET /api/my-vault
#[utoipa::path(
    get,
    path = "/api/my-vault",
    responses((status = 200, body = MyVaultResponse), (status = 401, description = "Missing or invalid token")),
    security(("bearer" = []))
)]
pub async fn my_vault(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MyVaultResponse>, AppError> {
    let user = require_user(state.auth.as_ref(), &headers).await?;

    let entries = state.storage.vault_entries_for_user(user.id).await?;
    let cards = build_vault_cards(&state, entries, true).await?;

    tracing::info!("GET /my-vault - user: {}, cards: {}", user.id, cards.len());
    Ok(Json(MyVaultResponse { cards }))
}

/// GET /api/vault/:username
///
/// Public vault for a profile: only entries saved with `public` visibility.
#[utoipa::path(
    get,
    path = "/api/vault/{username}",
    params(("username" = String, Path, description = "X handle")),
    responses((status = 200, body = PublicVaultResponse), (status = 404, description = "Unknown profile"))
)]
pub async fn vault_by_username(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<PublicVaultResponse>, AppError> {
    let username = capture::normalize_username(&username)?;

    let profile = state
        .storage
        .find_profile_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile @{} not found", username)))?;

    let entries = state.storage.public_vault_entries_for_profile(profile.id).await?;
    let cards = build_vault_cards(&state, entries, false).await?;

    Ok(Json(PublicVaultResponse { profile, cards }))
}
