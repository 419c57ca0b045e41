use super::types::ErrorEnvelope;
use crate::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Lightweight Gemini REST client.
///
/// Holds one `reqwest::Client` connection pool that every in-flight call
/// shares; nothing in here is mutated after construction.
#[derive(Clone)]
pub struct GeminiHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiHttpClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, timeout, Client::new())
    }

    pub fn new_with_client(api_key: String, timeout: Duration, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_to_url<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        url: String,
        request: &Req,
    ) -> Result<Resp> {
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to Gemini: {}", e);
                transport_error(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            tracing::error!("Gemini API error (status {}): {}", status, body);
            return Err(Error::rejected(Some(status.as_u16()), error_message(&body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}\nBody: {}", e, body);
            Error::rejected(
                Some(status.as_u16()),
                format!("Failed to parse Gemini response: {}", e),
            )
        })
    }

    /// Calls Gemini's `generateContent` endpoint.
    ///
    /// `model` may be a bare ID or `models/`-prefixed.
    pub async fn generate_content<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        model: &str,
        request: &Req,
    ) -> Result<Resp> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        self.post_to_url(url, request).await
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::ConnectionFailed(e.to_string())
    }
}

/// Pulls the human-readable message out of a Gemini error body when there is one.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{}: {}", status, envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.to_string(),
    }
}
