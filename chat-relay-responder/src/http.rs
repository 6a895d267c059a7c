//! HTTP responder client

use async_trait::async_trait;
use chat_relay_core::config::ResponderConfig;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

use crate::base::{
    Responder, ResponderError, ResponderRequest, ResponderResponse, ResponderResult,
};

/// Responder reached with a JSON POST
pub struct HttpResponder {
    client: Client,
    url: String,
    extra_headers: HashMap<String, String>,
}

impl HttpResponder {
    /// Create a client posting to `url`
    pub fn new(url: impl Into<String>) -> ResponderResult<Self> {
        Self::with_headers(url, HashMap::new())
    }

    /// Create a client posting to `url` with extra headers
    pub fn with_headers(
        url: impl Into<String>,
        extra_headers: HashMap<String, String>,
    ) -> ResponderResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ResponderError::ConfigError(
                "responder url must not be empty".to_string(),
            ));
        }

        // The call deadline is enforced by the turn handler, not here.
        let client = Client::builder()
            .http1_only()
            .build()
            .map_err(|e| ResponderError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            extra_headers,
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &ResponderConfig) -> ResponderResult<Self> {
        Self::with_headers(config.url.clone(), config.headers.clone())
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }
        req_builder
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn respond(&self, request: ResponderRequest) -> ResponderResult<ResponderResponse> {
        debug!(
            "Sending responder request to {} ({} history entries)",
            self.url,
            request.message_history.len()
        );

        let req_builder = self.apply_headers(self.client.post(&self.url).json(&request));
        let response = req_builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ResponderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.text().await?;
        serde_json::from_str::<ResponderResponse>(&raw).map_err(|e| {
            ResponderError::InvalidResponse(format!(
                "{} (body: {})",
                e,
                chat_relay_core::utils::truncate(&raw, 200)
            ))
        })
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}
