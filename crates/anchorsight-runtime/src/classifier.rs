//! [`ClassifierClient`] – HTTP client for the remote classification service.
//!
//! A [`CapturePayload`] is POSTed form-url-encoded to the classify endpoint,
//! which replies with JSON:
//!
//! ```json
//! { "labels": "cup", "single": "cup", "type": "photo" }
//! ```
//!
//! `labels` is the final label and is folded onto a known [`ModelLabel`];
//! anything unknown becomes `default`.
//!
//! The same service exposes a rooms endpoint whose `nAnchorsHigh` field is
//! the highest room in use, the usual starting point for a room chain.
//!
//! # Example
//!
//! ```rust,no_run
//! use anchorsight_runtime::classifier::ClassifierClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClassifierClient::new(
//!     "http://10.0.0.5:8080/classify",
//!     "http://10.0.0.5:8080/rooms",
//! )?;
//! let room = client.fetch_highest_room().await?;
//! # Ok(()) }
//! ```

use std::time::Duration;

use anchorsight_types::{ClassificationResult, ModelLabel};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::CapturePayload;

/// Connect and request timeout for a classification upload.
pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// Request timeout for the rooms lookup.
pub const ROOMS_TIMEOUT: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The HTTP request failed or returned an error status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response body did not have the expected shape.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ClassifyResponse {
    labels: String,
    #[serde(default)]
    single: String,
    #[serde(rename = "type", default)]
    image_type: String,
}

#[derive(Deserialize)]
struct RoomsResponse {
    #[serde(rename = "nAnchorsHigh")]
    highest: serde_json::Value,
}

/// Parse a classify response body.
pub fn parse_classification(body: &str) -> Result<ClassificationResult, ClassifierError> {
    let response: ClassifyResponse =
        serde_json::from_str(body).map_err(|e| ClassifierError::BadResponse(e.to_string()))?;
    Ok(ClassificationResult {
        label: ModelLabel::from_label(&response.labels),
        single: response.single,
        image_type: response.image_type,
    })
}

/// Parse a rooms response body.  `nAnchorsHigh` may be a number or a
/// numeric string.
pub fn parse_highest_room(body: &str) -> Result<u64, ClassifierError> {
    let response: RoomsResponse =
        serde_json::from_str(body).map_err(|e| ClassifierError::BadResponse(e.to_string()))?;
    let room = match &response.highest {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    room.ok_or_else(|| {
        ClassifierError::BadResponse(format!("nAnchorsHigh is not a room number: {}", response.highest))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Classifier trait
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can turn a capture into a classification.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, payload: &CapturePayload)
    -> Result<ClassificationResult, ClassifierError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// ClassifierClient
// ─────────────────────────────────────────────────────────────────────────────

/// Construct once and reuse; the inner [`reqwest::Client`] pools connections.
pub struct ClassifierClient {
    classify_url: String,
    rooms_url: String,
    client: reqwest::Client,
}

impl ClassifierClient {
    pub fn new(
        classify_url: impl Into<String>,
        rooms_url: impl Into<String>,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CLASSIFY_TIMEOUT)
            .build()?;
        Ok(Self {
            classify_url: classify_url.into(),
            rooms_url: rooms_url.into(),
            client,
        })
    }

    pub fn classify_url(&self) -> &str {
        &self.classify_url
    }

    pub fn rooms_url(&self) -> &str {
        &self.rooms_url
    }

    /// The highest room currently holding an anchor.
    pub async fn fetch_highest_room(&self) -> Result<u64, ClassifierError> {
        let body = self
            .client
            .get(&self.rooms_url)
            .timeout(ROOMS_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let room = parse_highest_room(&body)?;
        debug!(room, "highest room fetched");
        Ok(room)
    }
}

#[async_trait]
impl Classifier for ClassifierClient {
    async fn classify(
        &self,
        payload: &CapturePayload,
    ) -> Result<ClassificationResult, ClassifierError> {
        let body = self
            .client
            .post(&self.classify_url)
            .timeout(CLASSIFY_TIMEOUT)
            .form(payload)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let result = parse_classification(&body)?;
        info!(label = %result.label, single = %result.single, "classification received");
        Ok(result)
    }
}
