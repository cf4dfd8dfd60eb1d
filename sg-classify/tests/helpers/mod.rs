//! Shared test fixtures: a scripted knowledge search and a small registry
#![allow(dead_code)]

use async_trait::async_trait;
use sg_classify::fallback::{KnowledgeSearch, SearchError};
use sg_classify::registry::{NameRecord, NameSource, OverrideTable, Registry};
use sg_common::config::FallbackConfig;
use sg_common::Gender;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted answer for one (query, language) pair
#[derive(Clone)]
pub enum StubResponse {
    Titles(Vec<String>),
    Fail(SearchError),
    /// Never answers before the resolver's timeout
    Hang,
}

/// Knowledge search returning scripted titles and recording every call
///
/// Unscripted pairs answer with no results.
#[derive(Default)]
pub struct StubSearch {
    responses: HashMap<(String, String), StubResponse>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_titles(mut self, query: &str, lang: &str, titles: &[&str]) -> Self {
        self.responses.insert(
            (query.to_string(), lang.to_string()),
            StubResponse::Titles(titles.iter().map(|t| t.to_string()).collect()),
        );
        self
    }

    pub fn with_response(mut self, query: &str, lang: &str, response: StubResponse) -> Self {
        self.responses
            .insert((query.to_string(), lang.to_string()), response);
        self
    }

    /// Every (query, language) searched so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries_for(&self, query: &str) -> usize {
        self.calls().iter().filter(|(q, _)| q == query).count()
    }
}

#[async_trait]
impl KnowledgeSearch for StubSearch {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn search(&self, query: &str, lang: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), lang.to_string()));

        match self.responses.get(&(query.to_string(), lang.to_string())) {
            Some(StubResponse::Titles(titles)) => Ok(titles.iter().take(limit).cloned().collect()),
            Some(StubResponse::Fail(e)) => Err(e.clone()),
            Some(StubResponse::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Registry with a handful of first names plus the built-in override table
pub fn test_registry() -> Arc<Registry> {
    let insee = NameSource::new(
        "insee",
        Some(100),
        vec![
            NameRecord::new("LOUIS", Gender::Masculine, Some(250_000)),
            NameRecord::new("VICTOR", Gender::Masculine, Some(80_000)),
            NameRecord::new("MARIE", Gender::Feminine, Some(2_000_000)),
            NameRecord::new("JEANNE", Gender::Feminine, Some(500_000)),
            NameRecord::new("CAMILLE", Gender::Feminine, Some(300_000)),
            NameRecord::new("FRANCE", Gender::Feminine, Some(40_000)),
        ],
    );
    let overrides = OverrideTable::builtin().expect("built-in override table parses");
    Arc::new(Registry::from_sources(vec![insee], &overrides))
}

/// Fallback configuration without delays
pub fn fallback_config() -> FallbackConfig {
    FallbackConfig {
        min_interval_ms: 0,
        ..FallbackConfig::default()
    }
}
