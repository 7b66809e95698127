//! Tavily search API adapter.

use super::{SearchClient, SearchError, SearchRequest, SearchResponse};
use crate::config::{Config, Secret};
use crate::endpoint::{format_endpoint, normalize_base_url};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// HTTP client for the Tavily `/search` endpoint.
pub struct TavilyClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Secret,
}

impl TavilyClient {
    /// Construct a client for the service hosted at `base_url`.
    pub fn new(base_url: &str, api_key: Secret, timeout: Duration) -> Result<Self, SearchError> {
        let http = Client::builder()
            .user_agent("docuexplore/search")
            .timeout(timeout)
            .build()
            .map_err(|error| SearchError::Configuration(error.to_string()))?;
        let base_url = normalize_base_url(base_url).map_err(SearchError::Configuration)?;
        tracing::debug!(url = %base_url, "Initialized Tavily HTTP client");
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, SearchError> {
        Self::new(
            &config.tavily_base_url,
            config.tavily_api_key.clone(),
            config.http_timeout(),
        )
    }

    fn endpoint(&self) -> String {
        format_endpoint(&self.base_url, "search")
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|error| SearchError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Http { status, body });
        }

        response
            .json()
            .await
            .map_err(|error| SearchError::InvalidResponse(error.to_string()))
    }
}
