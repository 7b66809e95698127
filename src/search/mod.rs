//! Related-article web search.
//!
//! [`search_related`] wraps a [`SearchClient`] with the retry policy used for document
//! enrichment: HTTP-level failures are retried with exponential backoff, any other failure ends
//! the search immediately, and every failure degrades to `None` instead of an error.

mod retry;
pub mod tavily;

pub use retry::RetryPolicy;
pub use tavily::TavilyClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix prepended to a document title to build the related-article query.
pub const RELATED_QUERY_PREFIX: &str = "Articles related to: ";

/// Depth of the search performed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    /// Fast, shallow search.
    Basic,
    /// Slower search with richer results.
    Advanced,
}

/// Parameters of a single search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Requested search depth.
    pub search_depth: SearchDepth,
    /// Whether image results should be included.
    pub include_images: bool,
    /// Whether the provider should synthesize an answer.
    pub include_answer: bool,
    /// Maximum number of results to return.
    pub max_results: u32,
}

impl SearchRequest {
    /// Advanced search with a synthesized answer and no images.
    pub fn related_articles(query: impl Into<String>, max_results: u32) -> Self {
        Self {
            query: query.into(),
            search_depth: SearchDepth::Advanced,
            include_images: false,
            include_answer: true,
            max_results,
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title.
    #[serde(default = "untitled")]
    pub title: String,
    /// Page URL.
    #[serde(default = "missing_url")]
    pub url: String,
    /// Extract of the page relevant to the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Relevance score assigned by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

fn untitled() -> String {
    "Untitled".to_string()
}

fn missing_url() -> String {
    "#".to_string()
}

/// Search results plus the provider's optional synthesized answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Query echoed back by the provider.
    #[serde(default)]
    pub query: String,
    /// AI-generated answer summarizing the results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Ranked results.
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Errors raised by search providers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Base URL failed to parse or the HTTP client could not be built.
    #[error("Invalid search client configuration: {0}")]
    Configuration(String),
    /// Provider answered with a non-success HTTP status.
    #[error("Search provider returned {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The request never produced a response.
    #[error("Search request failed: {0}")]
    Transport(String),
    /// Provider response could not be decoded.
    #[error("Malformed search response: {0}")]
    InvalidResponse(String),
}

impl SearchError {
    /// Only HTTP-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}

/// Interface implemented by web search providers.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a single search request.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;
}

/// Query used to look up articles related to a document title.
pub fn related_query(title: &str) -> String {
    format!("{RELATED_QUERY_PREFIX}{title}")
}

/// Search for `query`, retrying HTTP failures according to `policy`.
///
/// Returns `None` without calling the provider when the query is blank, and `None` when the
/// search fails for any reason.
pub async fn search_related(
    client: &dyn SearchClient,
    query: &str,
    max_results: u32,
    policy: &RetryPolicy,
) -> Option<SearchResponse> {
    if query.trim().is_empty() {
        tracing::debug!("Skipping search for blank query");
        return None;
    }

    let request = SearchRequest::related_articles(query, max_results);
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        tracing::info!(attempt, "Attempting related-article search");
        match client.search(&request).await {
            Ok(response) => {
                tracing::info!(
                    attempt,
                    results = response.results.len(),
                    has_answer = response.answer.is_some(),
                    "Search successful"
                );
                return Some(response);
            }
            Err(error) if error.is_retryable() => {
                tracing::warn!(attempt, error = %error, "HTTP error in search");
                if policy.should_retry(attempt) {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
            Err(error) => {
                tracing::error!(attempt, error = %error, "Unexpected error in search");
                return None;
            }
        }
    }

    tracing::warn!(attempts = max_attempts, "Search attempts exhausted");
    None
}
