use crate::display::{KpiLine, TierStyle};
use crate::handlers;
use crate::models::*;
use crate::score::{Metrics, Score, Tier};
use crate::tags::Tag;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(title = "Social Cards API", description = "Score X handles and mint trading cards"),
    paths(
        handlers::health,
        handlers::capture_snapshot,
        handlers::get_card,
        handlers::get_assets,
        handlers::get_leaderboard,
        handlers::save_to_vault,
        handlers::my_vault,
        handlers::vault_by_username,
    ),
    components(schemas(
        Metrics,
        Score,
        Tier,
        Tag,
        Profile,
        MetricsSource,
        Provenance,
        Snapshot,
        AssetFormat,
        CardAsset,
        Visibility,
        VaultEntry,
        VaultEntrySummary,
        TierStyle,
        KpiLine,
        CaptureRequest,
        CaptureResult,
        CardResponse,
        AssetsResponse,
        LeaderboardItem,
        LeaderboardResponse,
        SaveToVaultRequest,
        SaveToVaultResponse,
        VaultCard,
        MyVaultResponse,
        PublicVaultResponse,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
