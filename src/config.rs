use serde::Deserialize;
use std::time::Duration;

/// Where metrics come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsMode {
    /// Real X API calls.
    Live,
    /// Deterministic generator keyed on the handle.
    Mock,
}

impl std::str::FromStr for MetricsMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(MetricsMode::Live),
            "mock" => Ok(MetricsMode::Mock),
            other => anyhow::bail!("METRICS_MODE must be 'live' or 'mock', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub metrics_mode: MetricsMode,
    pub x_api_base_url: String,
    pub x_bearer_token: Option<String>,
    /// Identity provider base URL used to resolve bearer tokens.
    pub auth_url: Option<String>,
    pub auth_api_key: Option<String>,
    /// Card render service; rendering is skipped when unset.
    pub render_url: Option<String>,
    pub render_token: Option<String>,
    /// Frontend origin used to build shareable card links.
    pub public_base_url: String,
    pub metrics_cache_ttl_secs: u64,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn validate_http_url(name: &str, url: String) -> anyhow::Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let metrics_mode: MetricsMode = std::env::var("METRICS_MODE")
            .unwrap_or_else(|_| "mock".to_string())
            .parse()?;

        let x_bearer_token = optional_var("X_BEARER_TOKEN");
        if metrics_mode == MetricsMode::Live && x_bearer_token.is_none() {
            anyhow::bail!("X_BEARER_TOKEN is required when METRICS_MODE=live");
        }

        let auth_url = optional_var("AUTH_URL")
            .map(|url| validate_http_url("AUTH_URL", url))
            .transpose()?;
        let auth_api_key = optional_var("AUTH_API_KEY");
        if auth_url.is_some() && auth_api_key.is_none() {
            anyhow::bail!("AUTH_API_KEY is required when AUTH_URL is set");
        }

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            metrics_mode,
            x_api_base_url: validate_http_url(
                "X_API_BASE_URL",
                std::env::var("X_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.twitter.com".to_string()),
            )?,
            x_bearer_token,
            auth_url,
            auth_api_key,
            render_url: optional_var("RENDER_URL")
                .map(|url| validate_http_url("RENDER_URL", url))
                .transpose()?,
            render_token: optional_var("RENDER_TOKEN"),
            public_base_url: validate_http_url(
                "PUBLIC_BASE_URL",
                std::env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            )?,
            metrics_cache_ttl_secs: std::env::var("METRICS_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("METRICS_CACHE_TTL_SECS must be a number"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::info!("Metrics mode: {:?}", config.metrics_mode);
        if config.auth_url.is_none() {
            tracing::warn!("AUTH_URL not set; vault endpoints will reject every request");
        }
        if config.render_url.is_none() {
            tracing::warn!("RENDER_URL not set; cards will not be rendered");
        }
        tracing::debug!("Public base URL: {}", config.public_base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn metrics_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_cache_ttl_secs)
    }

    /// Config suitable for tests: mock metrics, no external collaborators.
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/social_cards_test".to_string(),
            port: 0,
            metrics_mode: MetricsMode::Mock,
            x_api_base_url: "https://api.twitter.com".to_string(),
            x_bearer_token: None,
            auth_url: None,
            auth_api_key: None,
            render_url: None,
            render_token: None,
            public_base_url: "http://localhost:5173".to_string(),
            metrics_cache_ttl_secs: 900,
        }
    }
}
