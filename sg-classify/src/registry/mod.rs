//! Name-Gender Registry
//!
//! Authoritative, immutable mapping from normalized name token to gender.
//!
//! # Merge order
//! Sources are merged in the order given; on a key collision the later source
//! wins. The override table is applied after every source and always wins.
//! Exclusions are removed last, so an excluded token never survives whatever
//! its origin.
//!
//! Within one source, records below the source's frequency threshold are
//! dropped first. Among the remaining duplicates the source's
//! `DuplicatePolicy` decides: the most frequent record (first one on ties, or
//! when the source carries no frequencies), or simply the first record.

pub mod overrides;
pub mod sources;

pub use overrides::OverrideTable;

use crate::tokenizer::normalize;
use serde::Serialize;
use sg_common::config::{DuplicatePolicy, SourceConfig};
use sg_common::{Gender, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Provenance label of entries coming from the override table
pub const OVERRIDE_ORIGIN: &str = "override";

/// One raw (name, gender, frequency) triple from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    /// Name as found in the source (normalized during merge)
    pub name: String,
    pub gender: Gender,
    /// Occurrence count, when the source has one
    pub frequency: Option<u64>,
}

impl NameRecord {
    pub fn new(name: impl Into<String>, gender: Gender, frequency: Option<u64>) -> Self {
        Self {
            name: name.into(),
            gender,
            frequency,
        }
    }
}

/// A loaded source, ready to merge
#[derive(Debug, Clone)]
pub struct NameSource {
    pub label: String,
    /// Records with a lower (or missing) frequency are dropped
    pub min_frequency: Option<u64>,
    pub records: Vec<NameRecord>,
    pub duplicates: DuplicatePolicy,
    /// Rows the loader could not decode
    pub skipped_rows: usize,
}

impl NameSource {
    pub fn new(label: impl Into<String>, min_frequency: Option<u64>, records: Vec<NameRecord>) -> Self {
        Self {
            label: label.into(),
            min_frequency,
            records,
            duplicates: DuplicatePolicy::default(),
            skipped_rows: 0,
        }
    }

    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Collapse the source to one gender per normalized token
    fn collapse(&self) -> (Vec<(String, Gender)>, SourceStats) {
        let mut stats = SourceStats {
            label: self.label.clone(),
            ..Default::default()
        };
        // `order` keeps first-seen order so collapse output is deterministic
        let mut best: HashMap<String, (Gender, Option<u64>)> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for record in &self.records {
            if let Some(threshold) = self.min_frequency {
                if record.frequency.map_or(true, |f| f < threshold) {
                    stats.below_threshold += 1;
                    continue;
                }
            }

            let token = normalize(record.name.trim());
            if token.is_empty() {
                stats.below_threshold += 1;
                continue;
            }

            match best.entry(token) {
                Entry::Vacant(slot) => {
                    order.push(slot.key().clone());
                    slot.insert((record.gender, record.frequency));
                }
                Entry::Occupied(mut slot) => {
                    stats.duplicates += 1;
                    let (_, current) = *slot.get();
                    if self.duplicates == DuplicatePolicy::MostFrequent && record.frequency > current {
                        slot.insert((record.gender, record.frequency));
                    }
                }
            }
        }

        stats.accepted = order.len();
        let collapsed = order
            .into_iter()
            .filter_map(|token| best.remove(&token).map(|(gender, _)| (token, gender)))
            .collect();
        (collapsed, stats)
    }
}

/// Registry entry with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameGenderEntry {
    pub token: String,
    pub gender: Gender,
    /// Label of the source that won, or `override`
    pub origin: String,
}

/// Merge statistics of one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub label: String,
    /// Distinct tokens the source contributed before later sources ran
    pub accepted: usize,
    pub below_threshold: usize,
    /// Records collapsed into an earlier record of the same token
    pub duplicates: usize,
    /// Tokens whose gender this source replaced
    pub replaced: usize,
}

/// Immutable token → gender table
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, NameGenderEntry>,
    stats: Vec<SourceStats>,
}

impl Registry {
    /// Load every configured source and merge it with the override table
    ///
    /// Fails with `SourceUnavailable` when a source cannot be loaded. Nothing
    /// is retried.
    pub fn build(sources: &[SourceConfig], overrides: &OverrideTable) -> Result<Self> {
        let loaded = sources
            .iter()
            .map(sources::load_source)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_sources(loaded, overrides))
    }

    /// Merge already loaded sources with the override table
    pub fn from_sources(sources: Vec<NameSource>, overrides: &OverrideTable) -> Self {
        let mut entries: HashMap<String, NameGenderEntry> = HashMap::new();
        let mut stats = Vec::with_capacity(sources.len() + 1);

        for source in &sources {
            let (collapsed, mut source_stats) = source.collapse();
            for (token, gender) in collapsed {
                let entry = NameGenderEntry {
                    token: token.clone(),
                    gender,
                    origin: source.label.clone(),
                };
                if let Some(previous) = entries.insert(token, entry) {
                    if previous.gender != gender {
                        source_stats.replaced += 1;
                    }
                }
            }
            info!(
                source = %source_stats.label,
                accepted = source_stats.accepted,
                below_threshold = source_stats.below_threshold,
                duplicates = source_stats.duplicates,
                replaced = source_stats.replaced,
                "Merged name source"
            );
            stats.push(source_stats);
        }

        let mut override_stats = SourceStats {
            label: OVERRIDE_ORIGIN.to_string(),
            accepted: overrides.len(),
            ..Default::default()
        };
        for (token, gender) in overrides.entries() {
            let entry = NameGenderEntry {
                token: token.to_string(),
                gender,
                origin: OVERRIDE_ORIGIN.to_string(),
            };
            if let Some(previous) = entries.insert(token.to_string(), entry) {
                if previous.gender != gender {
                    debug!(
                        token,
                        from = %previous.gender,
                        to = %gender,
                        source = %previous.origin,
                        "Override replaced source gender"
                    );
                    override_stats.replaced += 1;
                }
            }
        }
        stats.push(override_stats);

        let mut excluded = 0usize;
        for token in overrides.exclusions() {
            if entries.remove(token).is_some() {
                excluded += 1;
            }
        }

        info!(
            tokens = entries.len(),
            overrides = overrides.len(),
            excluded,
            "Name-gender registry built"
        );

        Self { entries, stats }
    }

    /// Exact-match lookup of a normalized token
    pub fn lookup(&self, token: &str) -> Option<Gender> {
        self.entries.get(token).map(|e| e.gender)
    }

    pub fn entry(&self, token: &str) -> Option<&NameGenderEntry> {
        self.entries.get(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SHA-256 over every (token, gender) pair, in token order
    ///
    /// Two registries with the same fingerprint classify identically.
    pub fn fingerprint(&self) -> String {
        let mut tokens: Vec<&NameGenderEntry> = self.entries.values().collect();
        tokens.sort_by(|a, b| a.token.cmp(&b.token));

        let mut hasher = Sha256::new();
        for entry in tokens {
            hasher.update(entry.token.as_bytes());
            hasher.update([0, entry.gender.code(), b'\n']);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Merge statistics, one per source followed by the override table
    pub fn source_stats(&self) -> &[SourceStats] {
        &self.stats
    }
}
