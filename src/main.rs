use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use social_cards::api::handlers::{self, AppState};
use social_cards::api::openapi::ApiDoc;
use social_cards::config::Config;
use social_cards::data::{db::Database, db_storage::CardStorage};
use social_cards::integrations::{
    auth::AuthClient, metrics_provider::MetricsProvider, render_client::RenderClient,
};
use social_cards::metrics_cache::MetricsCache;

/// Serves the generated OpenAPI document.
async fn serve_openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Serves the Swagger UI HTML page, configured to load `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Social Cards API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, caches and
/// external clients, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_cards=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let provider = MetricsProvider::from_config(&config).map_err(|e| anyhow::anyhow!("{}", e))?;
    tracing::info!("Metrics provider initialized ({:?})", provider.source());

    // Provider results per handle; repeated captures inside the TTL reuse them
    let metrics_cache = MetricsCache::new(config.metrics_cache_ttl(), 50_000);
    tracing::info!(
        "Metrics cache initialized ({}s TTL)",
        config.metrics_cache_ttl_secs
    );

    // Claims for running captures; TTL releases claims leaked by a crashed task
    let in_flight_captures = Cache::builder()
        .time_to_live(Duration::from_secs(120))
        .max_capacity(10_000)
        .build();

    let renderer = match config.render_url.clone() {
        Some(url) => match RenderClient::new(url.clone(), config.render_token.clone()) {
            Ok(client) => {
                tracing::info!("✓ Render client initialized: {}", url);
                Some(client)
            }
            Err(e) => {
                tracing::error!("Failed to initialize render client: {}", e);
                None
            }
        },
        None => None,
    };

    let auth = match (config.auth_url.clone(), config.auth_api_key.clone()) {
        (Some(url), Some(key)) => Some(AuthClient::new(url, key).map_err(|e| anyhow::anyhow!("{}", e))?),
        _ => None,
    };

    // Build application state
    let app_state = Arc::new(AppState {
        storage: CardStorage::new(db.pool.clone()),
        config: config.clone(),
        provider,
        metrics_cache,
        in_flight_captures,
        renderer,
        auth,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.json", get(serve_openapi_spec))
        // Capture & cards
        .route("/api/capture-snapshot", post(handlers::capture_snapshot))
        .route("/api/card/:snapshot_id", get(handlers::get_card))
        .route("/api/assets/:snapshot_id", get(handlers::get_assets))
        .route("/api/leaderboard", get(handlers::get_leaderboard))
        // Vault
        .route("/api/save-to-vault", post(handlers::save_to_vault))
        .route("/api/my-vault", get(handlers::my_vault))
        .route("/api/vault/:username", get(handlers::vault_by_username))
        .layer(
            ServiceBuilder::new()
                // Request size limit: every body here is a few fields of JSON
                .layer(RequestBodyLimitLayer::new(64 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
