//! Manual override table and exclusion set
//!
//! Both are configuration data. The default table is embedded from
//! `data/overrides.toml`; a configured path replaces it entirely.

use crate::tokenizer::normalize;
use serde::Deserialize;
use sg_common::{Error, Gender, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

const BUILTIN_OVERRIDES: &str = include_str!("../../data/overrides.toml");

#[derive(Debug, Deserialize)]
struct OverrideFile {
    #[serde(default)]
    exclusions: Vec<String>,
    /// category → (name → gender); categories only organize the file
    #[serde(default)]
    overrides: BTreeMap<String, BTreeMap<String, Gender>>,
}

/// Normalized override entries plus the exclusion set
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, Gender>,
    exclusions: HashSet<String>,
}

impl OverrideTable {
    /// Table shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_OVERRIDES)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read override table {} failed: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: OverrideFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse override table failed: {}", e)))?;

        let mut entries = HashMap::new();
        for (category, names) in &file.overrides {
            for (name, gender) in names {
                let token = normalize(name.trim());
                if let Some(previous) = entries.insert(token.clone(), *gender) {
                    if previous != *gender {
                        return Err(Error::Config(format!(
                            "override '{}' in [{}] conflicts with an earlier entry ({} vs {})",
                            token, category, previous, gender
                        )));
                    }
                }
            }
        }

        let exclusions = file
            .exclusions
            .iter()
            .map(|name| normalize(name.trim()))
            .collect();

        Ok(Self {
            entries,
            exclusions,
        })
    }

    /// Build a table directly from normalized-or-raw names
    pub fn from_entries<I, E>(entries: I, exclusions: E) -> Self
    where
        I: IntoIterator<Item = (String, Gender)>,
        E: IntoIterator<Item = String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, gender)| (normalize(name.trim()), gender))
                .collect(),
            exclusions: exclusions
                .into_iter()
                .map(|name| normalize(name.trim()))
                .collect(),
        }
    }

    pub fn get(&self, token: &str) -> Option<Gender> {
        self.entries.get(token).copied()
    }

    pub fn is_excluded(&self, token: &str) -> bool {
        self.exclusions.contains(token)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Gender)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn exclusions(&self) -> impl Iterator<Item = &str> {
        self.exclusions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
