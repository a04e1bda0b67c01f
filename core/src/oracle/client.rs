//! The decision client
//!
//! Wraps a [`DecisionTransport`] with the bounded retry policy: up to
//! `max_attempts` tries with exponentially doubling backoff between them.
//! Transport failure on the final attempt surfaces as a single
//! [`OracleError::Unavailable`]; the client never retries indefinitely and
//! never sleeps past the ceiling implied by the attempt count.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client as HttpClient, StatusCode,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capture::PerceptionFrame;
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::oracle::chat::{ChatRequest, RawResponse};

/// The opaque request/response boundary to the oracle service.
#[async_trait]
pub trait DecisionTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<RawResponse>;
}

/// HTTP transport to an Ollama-compatible `/api/chat` endpoint.
pub struct HttpTransport {
    http: HttpClient,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(HttpTransport {
            http,
            endpoint: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &self.api_key {
            if !api_key.is_empty() {
                let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .context("API key contains invalid header characters")?;
                headers.insert("Authorization", value);
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl DecisionTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<RawResponse> {
        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.build_headers()?)
            .json(request)
            .send()
            .await
            .context("failed to send request to the oracle endpoint")?;

        match response.status() {
            StatusCode::OK => response
                .json::<RawResponse>()
                .await
                .context("failed to parse oracle response"),
            status => {
                let body = response.text().await.unwrap_or_default();
                bail!("oracle request failed ({status}): {}", body.trim());
            }
        }
    }
}

/// Largest power of two the backoff doubling may reach.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Sends decision requests with bounded retry and exponential backoff.
pub struct OracleClient {
    transport: Arc<dyn DecisionTransport>,
    model: String,
    max_attempts: u32,
    backoff_base: Duration,
}

impl OracleClient {
    pub fn new(transport: Arc<dyn DecisionTransport>, config: &OracleConfig) -> Self {
        OracleClient {
            transport,
            model: config.model.clone(),
            // A zero attempt budget would mean never asking at all.
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
        }
    }

    /// Ask the oracle what to do next, given the prompt and the current
    /// perception frame.
    pub async fn decide(
        &self,
        prompt: &str,
        frame: &PerceptionFrame,
    ) -> Result<RawResponse, OracleError> {
        let request = ChatRequest::vision(&self.model, prompt, frame.image_base64.clone());

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                // 1x, 2x, 4x... the base delay between attempts, with the
                // exponent capped so a large attempt budget cannot overflow.
                let exponent = (attempt - 2).min(MAX_BACKOFF_EXPONENT);
                let backoff = self.backoff_base.saturating_mul(2u32.pow(exponent));
                debug!(attempt, ?backoff, "backing off before retry");
                tokio::time::sleep(backoff).await;
            }

            match self.transport.send(&request).await {
                Ok(response) => {
                    debug!(attempt, "oracle responded");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "oracle request failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(OracleError::Unavailable {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
