//! sg-classify library interface
//!
//! Street name gender classification: registry construction, tokenization,
//! the positional classification heuristic, the external knowledge fallback
//! and batch orchestration. Exposed as a library for the binary and for
//! integration testing.

pub mod batch;
pub mod cache;
pub mod classifier;
pub mod fallback;
pub mod registry;
pub mod tokenizer;

pub use crate::batch::{BatchClassifier, BatchReport};
pub use crate::classifier::{Classification, Classifier, Resolution, Trigger};
pub use crate::registry::{OverrideTable, Registry};

use crate::fallback::{FallbackResolver, KnowledgeSearch, WikipediaClient};
use sg_common::config::TomlConfig;
use sg_common::{Error, Result};
use std::sync::Arc;
use tracing::info;

/// Build the registry described by the configuration
///
/// The override table comes from `overrides_path` when set, otherwise from
/// the built-in table. A configuration without sources is rejected unless
/// `allow_override_only` is set.
pub fn build_registry(config: &TomlConfig) -> Result<Registry> {
    let overrides = match &config.overrides_path {
        Some(path) => {
            info!("Override table: {}", path.display());
            OverrideTable::load(path)?
        }
        None => OverrideTable::builtin()?,
    };

    if config.sources.is_empty() {
        if !config.allow_override_only {
            return Err(Error::Config(
                "no name sources configured; add [[sources]] or set allow_override_only = true"
                    .to_string(),
            ));
        }
        tracing::warn!("No name sources configured; registry holds override entries only");
    }

    Registry::build(&config.sources, &overrides)
}

/// Build a classifier around a registry, with the configured fallback
///
/// `search` replaces the Wikipedia provider when given.
pub fn build_classifier(
    config: &TomlConfig,
    registry: Arc<Registry>,
    search: Option<Arc<dyn KnowledgeSearch>>,
) -> Result<Classifier> {
    if !config.fallback.enabled {
        info!("External knowledge fallback disabled");
        return Ok(Classifier::without_fallback(registry));
    }

    let search = match search {
        Some(search) => search,
        None => {
            let client = WikipediaClient::new(
                config.fallback.endpoint.clone(),
                config.fallback.min_interval(),
                config.fallback.query_timeout(),
            )
            .map_err(|e| Error::Internal(format!("Failed to create search client: {}", e)))?;
            Arc::new(client)
        }
    };

    info!(
        provider = search.name(),
        languages = ?config.fallback.languages,
        result_limit = config.fallback.result_limit,
        "External knowledge fallback enabled"
    );

    let resolver = FallbackResolver::new(search, Arc::clone(&registry), &config.fallback);
    Ok(Classifier::new(registry, Arc::new(resolver)))
}
