use crate::display::{CARD_HEIGHT, CARD_WIDTH};
use crate::errors::AppError;
use crate::models::AssetFormat;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// An artifact reported back by the render service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedAsset {
    pub format: AssetFormat,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    assets: Vec<RenderedAsset>,
}

/// Client for the headless card renderer.
///
/// The renderer loads `card_url`, screenshots it at card size and uploads
/// PNG and PDF artifacts, returning their public URLs.
#[derive(Clone)]
pub struct RenderClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RenderClient {
    pub fn new(base_url: String, token: Option<String>) -> Result<Self, AppError> {
        // Headless rendering is slow; allow more time than provider calls
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create render client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Requests PNG and PDF renders of a card page.
    pub async fn render_card(
        &self,
        snapshot_id: Uuid,
        card_url: &str,
    ) -> Result<Vec<RenderedAsset>, AppError> {
        let url = format!("{}/render", self.base_url);
        tracing::info!("Requesting card render for snapshot {}", snapshot_id);

        let body = json!({
            "snapshotId": snapshot_id,
            "cardUrl": card_url,
            "width": CARD_WIDTH,
            "height": CARD_HEIGHT,
            "formats": ["png", "pdf"],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Render request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Renderer returned {}: {}",
                status, error_text
            )));
        }

        let parsed: RenderResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse render response: {}", e))
        })?;

        tracing::info!(
            "Renderer produced {} asset(s) for snapshot {}",
            parsed.assets.len(),
            snapshot_id
        );
        Ok(parsed.assets)
    }
}
