//! HTTP client for the external inference service
//!
//! Routes follow `<endpoint>/api/models/<model>/<action>/`. Transport
//! failures are retried with exponential backoff; service-level errors are not.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{InferenceError, InferenceResult};
use super::types::{
    AdversarialRequest, AdversarialResponse, FeaturesResponse, GradCamRequest, GradCamResponse,
    ModelAction, PredictRequest, PredictResponse, TrainRequest, TrainResponse,
};

/// Initial delay between attempts, doubled after each failure
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Inference client configuration
#[derive(Debug, Clone)]
pub struct InferenceClientConfig {
    /// Base URL of the service
    pub endpoint: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt, for retryable failures only
    pub max_retries: u32,
}

impl Default for InferenceClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout_ms: 5000,
            max_retries: 3,
        }
    }
}

/// Client for the predict / features / gradcam / train endpoints
pub struct InferenceClient {
    client: Client,
    endpoint: Url,
    config: InferenceClientConfig,
}

impl InferenceClient {
    /// Create a new client
    pub fn new(config: InferenceClientConfig) -> InferenceResult<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| InferenceError::InvalidEndpoint {
            reason: format!("{}: {}", config.endpoint, e),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(InferenceError::InvalidEndpoint {
                reason: format!("{} cannot be a base URL", config.endpoint),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| InferenceError::ConfigError {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Get current configuration
    pub fn config(&self) -> &InferenceClientConfig {
        &self.config
    }

    /// URL for a model action. The model name is percent-encoded as one segment.
    pub fn action_url(&self, model: &str, action: ModelAction) -> InferenceResult<Url> {
        if model.is_empty() || model == "." || model == ".." {
            return Err(InferenceError::InvalidEndpoint {
                reason: format!("invalid model name '{}'", model),
            });
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| InferenceError::InvalidEndpoint {
                reason: format!("{} cannot be a base URL", self.endpoint),
            })?
            .pop_if_empty()
            .extend(["api", "models", model, action.as_str(), ""]);
        Ok(url)
    }

    /// Run a prediction
    pub async fn predict(
        &self,
        model: &str,
        request: &PredictRequest,
    ) -> InferenceResult<PredictResponse> {
        let url = self.action_url(model, ModelAction::Predict)?;
        self.post_with_retry(url, request).await
    }

    /// Fetch feature maps, optionally for one layer
    pub async fn features(
        &self,
        model: &str,
        layer_id: Option<&str>,
    ) -> InferenceResult<FeaturesResponse> {
        let mut url = self.action_url(model, ModelAction::Features)?;
        if let Some(layer_id) = layer_id {
            url.query_pairs_mut().append_pair("layer_id", layer_id);
        }
        self.with_retry(|| self.get_once(url.clone())).await
    }

    /// Generate an adversarial example with perturbation `epsilon`
    pub async fn adversarial(
        &self,
        model: &str,
        request: &AdversarialRequest,
    ) -> InferenceResult<AdversarialResponse> {
        let url = self.action_url(model, ModelAction::Adversarial)?;
        self.post_with_retry(url, request).await
    }

    /// Compute a Grad-CAM heatmap
    pub async fn gradcam(
        &self,
        model: &str,
        request: &GradCamRequest,
    ) -> InferenceResult<GradCamResponse> {
        let url = self.action_url(model, ModelAction::Gradcam)?;
        self.post_with_retry(url, request).await
    }

    /// Run one training step
    pub async fn train(&self, model: &str) -> InferenceResult<TrainResponse> {
        let url = self.action_url(model, ModelAction::Train)?;
        self.post_with_retry(url, &TrainRequest::default()).await
    }

    async fn post_with_retry<B, R>(&self, url: Url, body: &B) -> InferenceResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.with_retry(|| self.post_once(url.clone(), body)).await
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or retries run out
    async fn with_retry<R, F, Fut>(&self, mut attempt: F) -> InferenceResult<R>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = InferenceResult<R>>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut retry_delay = INITIAL_RETRY_DELAY;
        let mut n = 0;

        loop {
            n += 1;
            let err = match attempt().await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !err.is_retryable() || n >= attempts {
                return Err(err);
            }

            tracing::warn!(
                "Inference request failed (attempt {}/{}): {}",
                n,
                attempts,
                err
            );

            let delay = match &err {
                InferenceError::RateLimitExceeded { retry_after_secs } => {
                    Duration::from_secs(*retry_after_secs)
                }
                _ => retry_delay,
            };
            tokio::time::sleep(delay).await;
            retry_delay = retry_delay.saturating_mul(2);
        }
    }

    async fn post_once<B, R>(&self, url: Url, body: &B) -> InferenceResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(%url, "POST inference request");
        let request = self.client.post(url).json(body);
        self.execute(request).await
    }

    async fn get_once<R: DeserializeOwned>(&self, url: Url) -> InferenceResult<R> {
        tracing::debug!(%url, "GET inference request");
        self.execute(self.client.get(url)).await
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> InferenceResult<R> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(InferenceError::RateLimitExceeded {
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .as_ref()
                .and_then(error_message)
                .unwrap_or(body);
            return Err(InferenceError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        decode_response(&body)
    }

    fn transport_error(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }
        } else if err.is_decode() {
            InferenceError::SerializationError {
                reason: err.to_string(),
            }
        } else {
            InferenceError::NetworkError {
                reason: err.to_string(),
            }
        }
    }
}

/// Decode a successful response body, surfacing `{"error": ...}` payloads
pub fn decode_response<R: DeserializeOwned>(body: &str) -> InferenceResult<R> {
    let value: Value = serde_json::from_str(body)?;
    if let Some(message) = error_message(&value) {
        return Err(InferenceError::ServiceError { message });
    }
    Ok(serde_json::from_value(value)?)
}

fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
