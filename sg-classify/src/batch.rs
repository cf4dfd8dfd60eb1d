//! Batch classification
//!
//! Classifies a finite set of street names:
//! - names are keyed by their normalized form and deduplicated, so every
//!   distinct key is classified once and the result fanned out to each
//!   occurrence by an explicit join on the key
//! - distinct keys run through a bounded worker pool
//!   (`futures::stream::buffer_unordered`)
//! - cancellation keeps every key already resolved; with a cache path the
//!   memo is persisted so a later run resumes without re-querying
//!
//! Per-name problems never fail the batch; unresolved names are Neutral.

use crate::cache::ResultCache;
use crate::classifier::{Classification, Classifier, Resolution};
use crate::fallback::FallbackStats;
use crate::tokenizer::{normalize_name, tokenize};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sg_common::config::BatchConfig;
use sg_common::Gender;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Label of one input occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLabel {
    /// Raw name as given (`None` for a missing name)
    pub name: Option<String>,
    /// Normalized key the classification is memoized under
    pub key: String,
    /// `None` only when the batch was cancelled before this key resolved
    pub gender: Option<Gender>,
}

/// Percentage of distinct names per gender, one decimal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenderShares {
    pub masculine: f64,
    pub feminine: f64,
    pub neutral: f64,
}

/// Run statistics over distinct names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub occurrences: usize,
    pub distinct_names: usize,
    /// Distinct names taken from the persisted cache
    pub reused_from_cache: usize,
    pub classified: usize,
    pub registry_hits: usize,
    pub fallback_hits: usize,
    pub unresolved: usize,
    pub fallback: Option<FallbackStats>,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub entities: Vec<EntityLabel>,
    /// Normalized key → classification, for every resolved key of this run
    pub classifications: BTreeMap<String, Classification>,
    pub stats: BatchStats,
}

impl BatchReport {
    /// Distinct raw names with the given label; missing names are left out
    pub fn names_for(&self, gender: Gender) -> BTreeSet<&str> {
        self.entities
            .iter()
            .filter(|e| e.gender == Some(gender))
            .filter_map(|e| e.name.as_deref())
            .collect()
    }

    /// Label of a raw name, by its normalized key
    pub fn gender_of(&self, name: Option<&str>) -> Option<Gender> {
        self.classifications
            .get(&normalize_name(name))
            .map(|c| c.gender)
    }

    /// Share of each gender among the distinct classified names
    pub fn shares(&self) -> GenderShares {
        let total = self.classifications.len();
        if total == 0 {
            return GenderShares::default();
        }

        let share = |gender: Gender| {
            let count = self
                .classifications
                .values()
                .filter(|c| c.gender == gender)
                .count();
            (count as f64 * 1000.0 / total as f64).round() / 10.0
        };

        GenderShares {
            masculine: share(Gender::Masculine),
            feminine: share(Gender::Feminine),
            neutral: share(Gender::Neutral),
        }
    }
}

/// Batch runner over a shared classifier
pub struct BatchClassifier {
    classifier: Arc<Classifier>,
    concurrency: usize,
    cache: Option<ResultCache>,
}

impl BatchClassifier {
    pub fn new(classifier: Arc<Classifier>, config: &BatchConfig) -> Self {
        let cache = config
            .cache_path
            .clone()
            .map(|path| ResultCache::new(path, classifier.fingerprint()));
        Self {
            classifier,
            concurrency: config.concurrency.max(1),
            cache,
        }
    }

    /// Classify every name
    ///
    /// Always returns a report. When `cancel` fires, pending names are skipped
    /// and the report is flagged `cancelled`.
    pub async fn run(&self, names: Vec<Option<String>>, cancel: &CancellationToken) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let keyed: Vec<(Option<String>, String)> = names
            .into_iter()
            .map(|raw| {
                let key = normalize_name(raw.as_deref());
                (raw, key)
            })
            .collect();

        let mut seen = HashSet::new();
        let distinct: Vec<String> = keyed
            .iter()
            .filter(|(_, key)| seen.insert(key.as_str()))
            .map(|(_, key)| key.clone())
            .collect();

        let mut memo = self.cache.as_ref().map(ResultCache::load).unwrap_or_default();
        // Only keys of this run count as reused and end up in the report
        let reused_from_cache = distinct.iter().filter(|k| memo.contains_key(*k)).count();
        let pending: Vec<String> = distinct
            .iter()
            .filter(|k| !memo.contains_key(*k))
            .cloned()
            .collect();

        tracing::info!(
            run_id = %run_id,
            occurrences = keyed.len(),
            distinct = distinct.len(),
            cached = reused_from_cache,
            pending = pending.len(),
            workers = self.concurrency,
            "Starting batch classification"
        );

        let total_pending = pending.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(RwLock::new(HashMap::with_capacity(total_pending)));

        stream::iter(pending)
            .map(|key| {
                let classifier = Arc::clone(&self.classifier);
                let results = Arc::clone(&results);
                let completed = Arc::clone(&completed);
                let cancel = cancel.clone();

                async move {
                    if cancel.is_cancelled() {
                        return;
                    }

                    let tokens = tokenize(&key);
                    let classification = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        c = classifier.classify(&tokens) => c,
                    };

                    tracing::debug!(
                        run_id = %run_id,
                        name = %key,
                        gender = %classification.gender,
                        "Name classified"
                    );

                    results.write().await.entry(key).or_insert(classification);

                    let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if current % 100 == 0 || current == total_pending {
                        tracing::info!(
                            run_id = %run_id,
                            progress = format!("{}/{}", current, total_pending),
                            "Batch progress update"
                        );
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<()>>()
            .await;

        let cancelled = cancel.is_cancelled();
        let fresh = std::mem::take(&mut *results.write().await);
        let classified = fresh.len();
        for (key, classification) in fresh {
            memo.entry(key).or_insert(classification);
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(&memo) {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to persist classification cache");
            }
        }

        // Explicit join of every occurrence on its normalized key
        let entities: Vec<EntityLabel> = keyed
            .into_iter()
            .map(|(name, key)| {
                let gender = memo.get(&key).map(|c| c.gender);
                EntityLabel { name, key, gender }
            })
            .collect();

        let classifications: BTreeMap<String, Classification> = distinct
            .iter()
            .filter_map(|key| memo.get(key).map(|c| (key.clone(), c.clone())))
            .collect();

        let mut stats = BatchStats {
            occurrences: entities.len(),
            distinct_names: distinct.len(),
            reused_from_cache,
            classified,
            fallback: self.classifier.fallback().map(|f| f.stats()),
            ..Default::default()
        };
        for classification in classifications.values() {
            match classification.resolution {
                Resolution::Registry { .. } => stats.registry_hits += 1,
                Resolution::Fallback { .. } => stats.fallback_hits += 1,
                Resolution::Unresolved { .. } => stats.unresolved += 1,
            }
        }

        if cancelled {
            tracing::info!(
                run_id = %run_id,
                resolved = classifications.len(),
                distinct = distinct.len(),
                "Batch cancelled, keeping resolved names"
            );
        } else {
            tracing::info!(
                run_id = %run_id,
                registry_hits = stats.registry_hits,
                fallback_hits = stats.fallback_hits,
                unresolved = stats.unresolved,
                "Batch classification completed"
            );
        }

        BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            entities,
            classifications,
            stats,
        }
    }
}
