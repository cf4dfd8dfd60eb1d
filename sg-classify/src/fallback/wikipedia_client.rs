//! Wikipedia search client
//!
//! Uses the MediaWiki `list=search` API. One limiter is shared by every clone
//! of the client's `Arc`, so the delay between outbound requests holds across
//! all batch workers. The limiter is awaited in `ready`, outside the HTTP
//! request timeout.

use super::{KnowledgeSearch, SearchError};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::Deserialize;
use std::time::Duration;

/// Default endpoint template; `{lang}` is the language subdomain
pub const DEFAULT_ENDPOINT: &str = "https://{lang}.wikipedia.org/w/api.php";

const USER_AGENT: &str = concat!(
    "street-gender/",
    env!("CARGO_PKG_VERSION"),
    " (street name gender classification)"
);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

/// Wikipedia article search
pub struct WikipediaClient {
    http_client: reqwest::Client,
    endpoint: String,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl WikipediaClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `endpoint` - endpoint template (default: `DEFAULT_ENDPOINT`)
    /// * `min_interval` - minimum delay between requests; zero disables limiting
    /// * `timeout` - per-request HTTP timeout
    pub fn new(
        endpoint: Option<String>,
        min_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            rate_limiter: Quota::with_period(min_interval).map(RateLimiter::direct),
        })
    }

    fn url_for(&self, lang: &str) -> String {
        self.endpoint.replace("{lang}", lang)
    }
}

#[async_trait]
impl KnowledgeSearch for WikipediaClient {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn ready(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    async fn search(&self, query: &str, lang: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        let url = self.url_for(lang);
        let limit = limit.to_string();

        tracing::debug!(query = %query, lang = %lang, url = %url, "Querying Wikipedia search API");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 || status.as_u16() == 503 {
            return Err(SearchError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SearchError::Api(status.as_u16(), error_text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(SearchError::Api(
                status.as_u16(),
                format!("{}: {}", error.code, error.info),
            ));
        }

        let titles: Vec<String> = body
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default();

        tracing::debug!(query = %query, lang = %lang, results = titles.len(), "Wikipedia search returned");

        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_client_creation() {
        let client = WikipediaClient::new(None, Duration::from_millis(500), Duration::from_secs(10));
        assert!(client.is_ok());
    }

    #[test]
    fn test_url_for_language() {
        let client = WikipediaClient::new(None, Duration::ZERO, Duration::from_secs(1)).unwrap();
        assert_eq!(client.url_for("fr"), "https://fr.wikipedia.org/w/api.php");
        assert!(client.rate_limiter.is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let client = WikipediaClient::new(None, Duration::from_millis(200), Duration::from_secs(1)).unwrap();
        let limiter = client.rate_limiter.as_ref().unwrap();

        let start = Instant::now();
        limiter.until_ready().await;
        limiter.until_ready().await;
        limiter.until_ready().await;

        // First cell is free, the next two wait one period each
        assert!(start.elapsed() >= Duration::from_millis(350));
    }
}
