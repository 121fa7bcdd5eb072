use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderCircuitBreaker};
use crate::config::{Config, MetricsMode};
use crate::errors::AppError;
use crate::metrics_cache::compute_checksum;
use crate::models::MetricsSource;
use crate::score::Metrics;
use chrono::{DateTime, Duration, Utc};
use failsafe::futures::CircuitBreaker;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Profile fields and metrics returned by a provider for one handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub verified: Option<bool>,
    pub bio: Option<String>,
    pub metrics: Metrics,
    pub source: MetricsSource,
}

// ============ X API v2 wire types ============

#[derive(Debug, Deserialize)]
struct XUserResponse {
    data: Option<XUser>,
    #[serde(default)]
    errors: Vec<XApiError>,
}

#[derive(Debug, Deserialize)]
struct XApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XUser {
    id: String,
    name: Option<String>,
    username: String,
    profile_image_url: Option<String>,
    verified: Option<bool>,
    description: Option<String>,
    public_metrics: XUserMetrics,
}

#[derive(Debug, Deserialize)]
struct XUserMetrics {
    followers_count: u64,
    following_count: u64,
    tweet_count: u64,
    listed_count: u64,
}

#[derive(Debug, Deserialize)]
struct XTweetsResponse {
    #[serde(default)]
    data: Vec<XTweet>,
}

#[derive(Debug, Deserialize)]
struct XTweet {
    created_at: Option<DateTime<Utc>>,
    public_metrics: Option<XTweetMetrics>,
}

#[derive(Debug, Deserialize)]
struct XTweetMetrics {
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    quote_count: u64,
}

impl XTweetMetrics {
    fn engagement(&self) -> u64 {
        self.retweet_count + self.reply_count + self.like_count + self.quote_count
    }
}

/// Client for the X API v2 user and timeline endpoints.
pub struct XApiClient {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl XApiClient {
    pub fn new(base_url: String, bearer_token: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create X client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    /// Fetches the profile, then the latest posts to derive engagement and velocity.
    pub async fn fetch_profile(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<FetchedProfile, AppError> {
        let user = self.fetch_user(username).await?;
        let tweets = self.fetch_recent_tweets(&user.id).await?;
        let (avg_eng_per_post, velocity_7d) = summarize_tweets(&tweets, now);

        tracing::info!(
            "Fetched X metrics for @{}: {} followers, {} recent posts",
            user.username,
            user.public_metrics.followers_count,
            tweets.len()
        );

        Ok(FetchedProfile {
            username: user.username.to_lowercase(),
            display_name: user.name,
            avatar_url: user.profile_image_url,
            verified: user.verified,
            bio: user.description,
            metrics: Metrics {
                followers: user.public_metrics.followers_count as f64,
                following: user.public_metrics.following_count as f64,
                posts: user.public_metrics.tweet_count as f64,
                listed: user.public_metrics.listed_count as f64,
                avg_eng_per_post,
                velocity_7d,
            },
            source: MetricsSource::Live,
        })
    }

    async fn fetch_user(&self, username: &str) -> Result<XUser, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/2/users/by/username/{}", self.base_url, username),
            &[(
                "user.fields",
                "public_metrics,profile_image_url,verified,description,name",
            )],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("X user lookup: {}", url.path());

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("X API request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("X user @{} not found", username)));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("X API returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "X API returned status {}: {}",
                status, error_text
            )));
        }

        let body: XUserResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse X user response: {}", e))
        })?;

        match body.data {
            Some(user) => Ok(user),
            None => {
                let reason = body
                    .errors
                    .first()
                    .and_then(|e| e.detail.clone().or_else(|| e.title.clone()))
                    .unwrap_or_else(|| "no data".to_string());
                tracing::warn!("X user lookup for @{} returned no data: {}", username, reason);
                Err(AppError::NotFound(format!("X user @{} not found", username)))
            }
        }
    }

    async fn fetch_recent_tweets(&self, user_id: &str) -> Result<Vec<XTweet>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/2/users/{}/tweets", self.base_url, user_id),
            &[
                ("max_results", "100"),
                ("tweet.fields", "public_metrics,created_at"),
                ("exclude", "retweets"),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("X API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "X timeline returned status {}: {}",
                status, error_text
            )));
        }

        let body: XTweetsResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse X timeline response: {}", e))
        })?;

        Ok(body.data)
    }
}

/// Mean engagement per post and the number of posts in the trailing 7 days.
fn summarize_tweets(tweets: &[XTweet], now: DateTime<Utc>) -> (f64, f64) {
    if tweets.is_empty() {
        return (0.0, 0.0);
    }

    let total: u64 = tweets
        .iter()
        .filter_map(|t| t.public_metrics.as_ref())
        .map(XTweetMetrics::engagement)
        .sum();
    let avg = total as f64 / tweets.len() as f64;

    let since = now - Duration::days(7);
    let velocity = tweets
        .iter()
        .filter_map(|t| t.created_at)
        .filter(|at| *at >= since && *at <= now)
        .count();

    (avg, velocity as f64)
}

/// Deterministic stand-in for the X API.
///
/// Every value is derived from the SHA-256 of the lowercased handle, so the
/// same handle always yields the same profile and metrics.
pub struct MockMetricsGenerator;

impl MockMetricsGenerator {
    pub fn generate(username: &str) -> FetchedProfile {
        let handle = username.to_lowercase();
        let digest = hex::decode(compute_checksum(&handle)).unwrap_or_default();
        let byte = |i: usize| u64::from(digest.get(i).copied().unwrap_or(0));
        let word = |i: usize| (byte(i) << 8) | byte(i + 1);

        // 100 .. ~9M followers, unevenly spread across magnitudes
        let followers = (1 + word(0) % 9) * 10u64.pow(2 + (byte(2) % 5) as u32) + word(3) % 1000;
        let following = 50 + word(5) % 2000;
        let posts = 100 + ((word(7) << 8) | byte(9)) % 50_000;
        // listed ~0.05%..0.5% and engagement ~0.1%..2% of followers
        let listed = followers * (5 + word(10) % 45) / 10_000;
        let avg_eng = followers * (10 + word(12) % 190) / 10_000;
        let velocity = byte(14) % 50;

        FetchedProfile {
            display_name: Some(handle.clone()),
            avatar_url: None,
            verified: Some(byte(15) % 4 == 0),
            bio: Some(format!("Mock profile for @{}", handle)),
            username: handle,
            metrics: Metrics {
                followers: followers as f64,
                following: following as f64,
                posts: posts as f64,
                listed: listed as f64,
                avg_eng_per_post: avg_eng as f64,
                velocity_7d: velocity as f64,
            },
            source: MetricsSource::Mock,
        }
    }
}

/// Source of metrics for capture requests.
pub enum MetricsProvider {
    Live {
        client: XApiClient,
        breaker: ProviderCircuitBreaker,
    },
    Mock,
}

impl MetricsProvider {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        match config.metrics_mode {
            MetricsMode::Mock => Ok(MetricsProvider::Mock),
            MetricsMode::Live => {
                let token = config.x_bearer_token.clone().ok_or_else(|| {
                    AppError::InternalError("X_BEARER_TOKEN missing in live mode".to_string())
                })?;
                Ok(Self::live(XApiClient::new(config.x_api_base_url.clone(), token)?))
            }
        }
    }

    pub fn live(client: XApiClient) -> Self {
        MetricsProvider::Live {
            client,
            breaker: create_provider_circuit_breaker(),
        }
    }

    pub fn source(&self) -> MetricsSource {
        match self {
            MetricsProvider::Live { .. } => MetricsSource::Live,
            MetricsProvider::Mock => MetricsSource::Mock,
        }
    }

    /// Fetches metrics for an already-normalized handle.
    ///
    /// Unknown users do not count against the circuit breaker.
    pub async fn fetch(&self, username: &str, now: DateTime<Utc>) -> Result<FetchedProfile, AppError> {
        match self {
            MetricsProvider::Mock => Ok(MockMetricsGenerator::generate(username)),
            MetricsProvider::Live { client, breaker } => {
                let is_failure = |e: &AppError| !matches!(e, AppError::NotFound(_));
                breaker
                    .call_with(is_failure, client.fetch_profile(username, now))
                    .await
                    .map_err(|e| match e {
                        failsafe::Error::Inner(inner) => inner,
                        failsafe::Error::Rejected => {
                            tracing::warn!("Metrics provider circuit open, rejecting @{}", username);
                            AppError::ExternalApiError(
                                "Metrics provider temporarily unavailable".to_string(),
                            )
                        }
                    })
            }
        }
    }
}
