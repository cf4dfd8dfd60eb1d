//! Persisted classification memo
//!
//! JSON file mapping normalized name → classification. Loaded before a batch
//! so names resolved by an earlier (possibly cancelled) run are neither
//! reclassified nor searched again.
//!
//! The file records the classifier fingerprint (registry content plus
//! fallback settings). A file written under another fingerprint is ignored.

use crate::classifier::Classification;
use serde::{Deserialize, Serialize};
use sg_common::Result;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CACHE_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    fingerprint: String,
    entries: BTreeMap<String, Classification>,
}

/// On-disk memo of classified names
#[derive(Debug, Clone)]
pub struct ResultCache {
    path: PathBuf,
    fingerprint: String,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cached classifications
    ///
    /// A missing, unreadable or incompatible file yields an empty memo with a
    /// warning; the batch then simply recomputes.
    pub fn load(&self) -> HashMap<String, Classification> {
        if !self.path.exists() {
            return HashMap::new();
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(sg_common::Error::from)
            .and_then(|content| Ok(serde_json::from_str::<CacheFile>(&content)?));

        match parsed {
            Ok(file) if file.version == CACHE_VERSION && file.fingerprint == self.fingerprint => {
                info!(
                    path = %self.path.display(),
                    entries = file.entries.len(),
                    "Loaded classification cache"
                );
                file.entries.into_iter().collect()
            }
            Ok(file) if file.version != CACHE_VERSION => {
                warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "Ignoring classification cache with unsupported version"
                );
                HashMap::new()
            }
            Ok(_) => {
                warn!(
                    path = %self.path.display(),
                    "Ignoring classification cache built from another registry or fallback configuration"
                );
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable classification cache");
                HashMap::new()
            }
        }
    }

    /// Write the memo, replacing the previous file
    pub fn save(&self, entries: &HashMap<String, Classification>) -> Result<()> {
        let file = CacheFile {
            version: CACHE_VERSION,
            fingerprint: self.fingerprint.clone(),
            entries: entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Write then rename so an interrupted save never truncates the cache
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&file)?)?;
        std::fs::rename(&tmp_path, &self.path)?;

        info!(path = %self.path.display(), entries = entries.len(), "Saved classification cache");
        Ok(())
    }
}
