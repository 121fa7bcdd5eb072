/// Snapshot capture workflow shared by the HTTP handler and tooling.
///
/// 1. Normalize and validate the handle
/// 2. Fetch metrics (cache first, then provider)
/// 3. Upsert the profile
/// 4. Score, then tag against the previous snapshot
/// 5. Append the snapshot
/// 6. Kick off card rendering in the background
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::metrics_provider::FetchedProfile;
use crate::models::{CaptureResult, MetricsSource, Provenance, Snapshot};
use crate::score::{social_score_v1, Score, FORMULA_VERSION};
use crate::tags::{compute_tags, Tag};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

fn handle_regex() -> &'static Regex {
    static HANDLE: OnceLock<Regex> = OnceLock::new();
    HANDLE.get_or_init(|| Regex::new(r"^[a-z0-9_]{1,15}$").unwrap())
}

/// Trims whitespace and a leading `@`, lowercases, and validates an X handle.
pub fn normalize_username(raw: &str) -> Result<String, AppError> {
    let handle = raw.trim();
    let handle = handle.strip_prefix('@').unwrap_or(handle).to_lowercase();

    if handle.is_empty() {
        return Err(AppError::BadRequest("username is required".to_string()));
    }
    if !handle_regex().is_match(&handle) {
        return Err(AppError::BadRequest(format!(
            "invalid username '{}': use 1-15 letters, digits or underscores",
            raw.trim()
        )));
    }
    Ok(handle)
}

/// Public link to a card page.
pub fn card_url(public_base_url: &str, snapshot_id: Uuid) -> Result<String, AppError> {
    let base = url::Url::parse(&format!("{}/", public_base_url.trim_end_matches('/')))
        .map_err(|e| AppError::InternalError(format!("invalid PUBLIC_BASE_URL: {}", e)))?;
    base.join(&format!("card/{}", snapshot_id))
        .map(|u| u.to_string())
        .map_err(|e| AppError::InternalError(format!("failed to build card URL: {}", e)))
}

/// Tags and provenance for a new snapshot given the profile's latest one.
pub fn build_provenance(
    source: MetricsSource,
    score: &Score,
    previous: Option<&Snapshot>,
    captured_at: DateTime<Utc>,
) -> Provenance {
    let previous_score = previous.map(|s| s.score.value);
    let tags: Vec<Tag> = compute_tags(score, previous_score, previous.is_none(), captured_at);

    Provenance {
        source,
        formula_version: FORMULA_VERSION.to_string(),
        tags,
        previous_score,
        previous_snapshot_id: previous.map(|s| s.id),
    }
}

/// Returns cached provider data for a handle, fetching on a miss.
pub async fn fetch_metrics(
    state: &AppState,
    username: &str,
    now: DateTime<Utc>,
) -> Result<FetchedProfile, AppError> {
    if let Some(cached) = state.metrics_cache.get::<FetchedProfile>(username).await {
        tracing::debug!("Metrics cache hit for @{}", username);
        return Ok(cached);
    }

    let fetched = state.provider.fetch(username, now).await?;
    state.metrics_cache.insert(username, &fetched).await;
    Ok(fetched)
}

/// Captures, scores and stores a new snapshot for `raw_username`.
///
/// A second capture of the same handle while one is running is rejected
/// with [`AppError::Conflict`].
pub async fn capture_snapshot(
    state: &Arc<AppState>,
    raw_username: &str,
    user: Option<&AuthUser>,
) -> Result<CaptureResult, AppError> {
    let username = normalize_username(raw_username)?;

    let claim = state
        .in_flight_captures
        .entry(username.clone())
        .or_insert(Utc::now().timestamp())
        .await;
    if !claim.is_fresh() {
        tracing::warn!("Capture for @{} already in progress", username);
        return Err(AppError::Conflict(format!(
            "a capture for @{} is already in progress",
            username
        )));
    }

    let result = run_capture(state, &username, user).await;
    state.in_flight_captures.invalidate(&username).await;
    result
}

async fn run_capture(
    state: &Arc<AppState>,
    username: &str,
    user: Option<&AuthUser>,
) -> Result<CaptureResult, AppError> {
    let captured_at = Utc::now();
    tracing::info!(
        "Capturing @{} (requested by {})",
        username,
        user.map(|u| u.id.to_string())
            .unwrap_or_else(|| "anonymous".to_string())
    );

    let fetched = fetch_metrics(state, username, captured_at).await?;
    let profile = state.storage.upsert_profile(&fetched, captured_at).await?;

    let score = social_score_v1(&fetched.metrics);
    let previous = state.storage.latest_snapshot(profile.id).await?;
    let provenance = build_provenance(fetched.source, &score, previous.as_ref(), captured_at);

    let snapshot = state
        .storage
        .insert_snapshot(profile.id, captured_at, &fetched.metrics, &score, &provenance)
        .await?;

    tracing::info!(
        "Snapshot {} (#{}) for @{}: score {} ({}), tags {:?}",
        snapshot.id,
        snapshot.card_number,
        username,
        score.value,
        score.tier,
        provenance.tags
    );

    spawn_render(state.clone(), snapshot.id);

    let assets = state.storage.assets_for_snapshot(snapshot.id).await?;

    Ok(CaptureResult {
        profile,
        snapshot,
        assets,
        tags: provenance.tags,
    })
}

/// Renders a card in the background and records its assets.
///
/// Render failures are logged; the snapshot stands regardless.
fn spawn_render(state: Arc<AppState>, snapshot_id: Uuid) {
    let Some(renderer) = state.renderer.clone() else {
        tracing::debug!("No renderer configured, skipping card render for {}", snapshot_id);
        return;
    };

    tokio::spawn(async move {
        let url = match card_url(&state.config.public_base_url, snapshot_id) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Cannot render {}: {}", snapshot_id, e);
                return;
            }
        };

        match renderer.render_card(snapshot_id, &url).await {
            Ok(rendered) if rendered.is_empty() => {
                tracing::warn!("Renderer returned no assets for {}", snapshot_id);
            }
            Ok(rendered) => {
                if let Err(e) = state.storage.store_assets(snapshot_id, &rendered).await {
                    tracing::error!("Failed to store assets for {}: {}", snapshot_id, e);
                }
            }
            Err(e) => tracing::error!("Card render failed for {}: {}", snapshot_id, e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{assign_tier, Metrics};
    use chrono::TimeZone;
    use sqlx::types::Json;

    fn score(value: u8) -> Score {
        Score {
            value,
            tier: assign_tier(value),
            formula_version: FORMULA_VERSION.to_string(),
        }
    }

    fn previous(value: u8) -> Snapshot {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Snapshot {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            captured_at: at,
            kpis: Json(Metrics::default()),
            score: Json(score(value)),
            provenance: Json(build_provenance(MetricsSource::Mock, &score(value), None, at)),
            card_number: 1,
            created_at: at,
        }
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  @Jack_Dorsey ").unwrap(), "jack_dorsey");
        assert_eq!(normalize_username("rustlang").unwrap(), "rustlang");
        assert!(normalize_username("").is_err());
        assert!(normalize_username("@").is_err());
        assert!(normalize_username("has space").is_err());
        assert!(normalize_username("sixteen_chars_xx").is_err());
        assert!(normalize_username("drop;table").is_err());
    }

    #[test]
    fn test_card_url() {
        let id = Uuid::parse_str("3f2a9c1e-7b4d-4e8a-9c21-0d5e6f7a8b9c").unwrap();
        assert_eq!(
            card_url("https://cards.example.com/", id).unwrap(),
            "https://cards.example.com/card/3f2a9c1e-7b4d-4e8a-9c21-0d5e6f7a8b9c"
        );
        assert_eq!(
            card_url("https://example.com/app", id).unwrap(),
            "https://example.com/app/card/3f2a9c1e-7b4d-4e8a-9c21-0d5e6f7a8b9c"
        );
    }

    #[test]
    fn test_first_capture_provenance() {
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap();
        let p = build_provenance(MetricsSource::Live, &score(69), None, at);
        assert_eq!(p.tags, vec![Tag::Genesis]);
        assert_eq!(p.previous_score, None);
        assert_eq!(p.previous_snapshot_id, None);
        assert_eq!(p.formula_version, "v1");
    }

    #[test]
    fn test_follow_up_capture_uses_previous_value() {
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap();
        let prev = previous(50);

        let p = build_provenance(MetricsSource::Mock, &score(60), Some(&prev), at);
        assert_eq!(p.tags, vec![Tag::Foil]);
        assert_eq!(p.previous_score, Some(50));
        assert_eq!(p.previous_snapshot_id, Some(prev.id));

        let p = build_provenance(MetricsSource::Mock, &score(59), Some(&prev), at);
        assert!(p.tags.is_empty());
    }
}
