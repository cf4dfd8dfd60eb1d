//! External knowledge fallback
//!
//! Resolves a proper name the registry does not know by searching an
//! external knowledge source and scanning the top result titles for a token
//! the registry does know.
//!
//! # Failure policy
//! Search failures (network, rate limit, malformed response, timeout) are
//! logged and counted, then treated exactly like "no candidate found". They
//! never escape `resolve`.
//!
//! # Memoization
//! Each query token is resolved at most once per resolver, even when several
//! workers ask for it concurrently: the first caller runs the search, the
//! others wait on the same write-once cell.

pub mod wikipedia_client;

pub use wikipedia_client::WikipediaClient;

use crate::registry::Registry;
use crate::tokenizer::tokenize_name;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sg_common::config::FallbackConfig;
use sg_common::Gender;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

/// Knowledge search failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Search timed out after {0:?}")]
    Timeout(Duration),
}

/// Document/article search capability
///
/// Any provider returning ordered result titles for a query is substitutable.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Wait until the provider accepts another request
    ///
    /// Callers await this before `search`; the wait is not part of the
    /// per-query timeout. Providers without a rate limit are always ready.
    async fn ready(&self) {}

    /// Return up to `limit` result titles, best first
    async fn search(&self, query: &str, lang: &str, limit: usize) -> Result<Vec<String>, SearchError>;
}

/// A fallback resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackMatch {
    pub gender: Gender,
    /// Registry token found in the result titles
    pub matched: String,
    /// Search language that produced the hit
    pub language: String,
}

/// Snapshot of resolver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackStats {
    /// Distinct query tokens resolved
    pub queries: usize,
    /// Outbound search calls (one per language tried)
    pub searches: usize,
    /// Search calls that failed or timed out
    pub failures: usize,
    pub hits: usize,
}

#[derive(Default)]
struct Counters {
    queries: AtomicUsize,
    searches: AtomicUsize,
    failures: AtomicUsize,
    hits: AtomicUsize,
}

/// Search-and-resolve step against a `KnowledgeSearch` provider
pub struct FallbackResolver {
    search: Arc<dyn KnowledgeSearch>,
    registry: Arc<Registry>,
    languages: Vec<String>,
    result_limit: usize,
    query_timeout: Duration,
    memo: Mutex<HashMap<String, Arc<OnceCell<Option<FallbackMatch>>>>>,
    counters: Counters,
}

impl FallbackResolver {
    pub fn new(
        search: Arc<dyn KnowledgeSearch>,
        registry: Arc<Registry>,
        config: &FallbackConfig,
    ) -> Self {
        Self {
            search,
            registry,
            languages: config.languages.clone(),
            result_limit: config.result_limit.max(1),
            query_timeout: config.query_timeout(),
            memo: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Resolve a query token, searching at most once per token
    pub async fn resolve(&self, query: &str) -> Option<FallbackMatch> {
        let cell = {
            let mut memo = self.memo.lock().await;
            Arc::clone(memo.entry(query.to_string()).or_default())
        };

        cell.get_or_init(|| self.resolve_uncached(query))
            .await
            .clone()
    }

    async fn resolve_uncached(&self, query: &str) -> Option<FallbackMatch> {
        self.counters.queries.fetch_add(1, Ordering::Relaxed);

        for language in &self.languages {
            self.counters.searches.fetch_add(1, Ordering::Relaxed);

            // Queueing behind other workers is not search time
            self.search.ready().await;
            let outcome = tokio::time::timeout(
                self.query_timeout,
                self.search.search(query, language, self.result_limit),
            )
            .await
            .unwrap_or(Err(SearchError::Timeout(self.query_timeout)));

            match outcome {
                Ok(titles) => {
                    if let Some((gender, matched)) = self.scan_titles(&titles) {
                        debug!(
                            query,
                            lang = %language,
                            matched = %matched,
                            gender = %gender,
                            "Fallback search resolved name"
                        );
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                        return Some(FallbackMatch {
                            gender,
                            matched,
                            language: language.clone(),
                        });
                    }
                    debug!(query, lang = %language, results = titles.len(), "No registry token in search results");
                }
                Err(e) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        query,
                        lang = %language,
                        provider = self.search.name(),
                        error = %e,
                        "Knowledge search failed, treating as no candidate"
                    );
                }
            }
        }

        None
    }

    /// First registry hit among the tokens of the top result titles
    pub fn scan_titles(&self, titles: &[String]) -> Option<(Gender, String)> {
        titles
            .iter()
            .take(self.result_limit)
            .flat_map(|title| tokenize_name(Some(title)))
            .find_map(|token| self.registry.lookup(&token).map(|gender| (gender, token)))
    }

    /// Provider, languages and result limit; any change can change results
    pub fn settings_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.search.name(),
            self.languages.join(","),
            self.result_limit
        )
    }

    pub fn stats(&self) -> FallbackStats {
        FallbackStats {
            queries: self.counters.queries.load(Ordering::Relaxed),
            searches: self.counters.searches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{NameRecord, NameSource, OverrideTable};

    struct FixedSearch {
        titles: HashMap<(String, String), Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KnowledgeSearch for FixedSearch {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn search(&self, query: &str, lang: &str, limit: usize) -> Result<Vec<String>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.titles.get(&(query.to_string(), lang.to_string())) {
                Some(titles) => Ok(titles.iter().take(limit).cloned().collect()),
                None => Err(SearchError::Network("unreachable".to_string())),
            }
        }
    }

    fn registry() -> Arc<Registry> {
        let source = NameSource::new(
            "test",
            None,
            vec![
                NameRecord::new("Louis", Gender::Masculine, None),
                NameRecord::new("Jeanne", Gender::Feminine, None),
            ],
        );
        Arc::new(Registry::from_sources(vec![source], &OverrideTable::default()))
    }

    fn resolver(titles: Vec<((&str, &str), Vec<&str>)>) -> (FallbackResolver, Arc<FixedSearch>) {
        let search = Arc::new(FixedSearch {
            titles: titles
                .into_iter()
                .map(|((q, l), t)| ((q.to_string(), l.to_string()), t.into_iter().map(String::from).collect()))
                .collect(),
            calls: AtomicUsize::new(0),
        });
        let resolver = FallbackResolver::new(search.clone(), registry(), &FallbackConfig::default());
        (resolver, search)
    }

    #[tokio::test]
    async fn test_primary_language_hit() {
        let (resolver, search) = resolver(vec![(
            ("pasteur", "en"),
            vec!["Louis Pasteur", "Pasteur Institute"],
        )]);

        let found = resolver.resolve("pasteur").await.unwrap();
        assert_eq!(found.gender, Gender::Masculine);
        assert_eq!(found.matched, "louis");
        assert_eq!(found.language, "en");
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_secondary_language_after_failure() {
        let (resolver, search) = resolver(vec![(("hachette", "fr"), vec!["Jeanne Hachette"])]);

        let found = resolver.resolve("hachette").await.unwrap();
        assert_eq!(found.gender, Gender::Feminine);
        assert_eq!(found.language, "fr");
        assert_eq!(search.calls.load(Ordering::SeqCst), 2);

        let stats = resolver.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_results_beyond_limit_ignored() {
        let (resolver, _) = resolver(vec![(
            ("x", "en"),
            vec!["Alpha", "Beta", "Gamma", "Louis Delta"],
        )]);
        assert_eq!(resolver.resolve("x").await, None);
    }

    /// Provider whose queue is slower than the query timeout
    struct SlowQueue;

    #[async_trait]
    impl KnowledgeSearch for SlowQueue {
        fn name(&self) -> &'static str {
            "slow-queue"
        }

        async fn ready(&self) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        async fn search(&self, _query: &str, _lang: &str, _limit: usize) -> Result<Vec<String>, SearchError> {
            Ok(vec!["Louis Example".to_string()])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_wait_is_not_timed() {
        let resolver = FallbackResolver::new(Arc::new(SlowQueue), registry(), &FallbackConfig::default());

        let found = resolver.resolve("example").await.unwrap();
        assert_eq!(found.gender, Gender::Masculine);
        assert_eq!(resolver.stats().failures, 0);
    }

    #[tokio::test]
    async fn test_query_searched_once() {
        let (resolver, search) = resolver(vec![]);

        assert_eq!(resolver.resolve("rivoli").await, None);
        assert_eq!(resolver.resolve("rivoli").await, None);

        // Two languages, one resolution
        assert_eq!(search.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.stats().queries, 1);
    }
}
