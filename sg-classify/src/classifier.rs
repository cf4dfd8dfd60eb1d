//! Classification engine
//!
//! Decides the gender of one tokenized name:
//! 1. Direct lookup, left to right; the first registry hit wins, so leading
//!    titles ("saint", "general", "reine") beat the names that follow them.
//! 2. Otherwise a positional trigger picks the one token worth an external
//!    search. Names matching no trigger are Neutral without any search.
//! 3. The fallback result, if any, decides; otherwise Neutral.

use crate::fallback::FallbackResolver;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use sg_common::Gender;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Particles linking a generic noun to a proper name ("rue de rivoli")
const LINKING_PARTICLES: [&str; 4] = ["le", "la", "de", "d"];

/// Particles following a qualifier ("allee marguerite de navarre")
const QUALIFIER_PARTICLES: [&str; 3] = ["de", "d", "du"];

/// Positional pattern selecting the fallback query token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// `noun name`: exactly two tokens, query the second
    TwoTokens,
    /// `noun particle name`: exactly three tokens with a linking particle in
    /// second position, query the third
    LinkedName,
    /// `noun qualifier particle name ...`: more than three tokens with a
    /// particle in third position, query the second (the qualifier)
    QualifiedName,
}

/// How a classification was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// A token of the name itself is in the registry
    Registry { token: String },
    /// The external fallback resolved the query token
    Fallback {
        trigger: Trigger,
        query: String,
        matched: String,
        language: String,
    },
    /// Nothing resolved; the name is Neutral
    Unresolved { trigger: Option<Trigger> },
}

/// Result for one normalized name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub gender: Gender,
    pub resolution: Resolution,
}

impl Classification {
    fn unresolved(trigger: Option<Trigger>) -> Self {
        Self {
            gender: Gender::Neutral,
            resolution: Resolution::Unresolved { trigger },
        }
    }
}

/// Pick the trigger matching a token sequence, with its query token
pub fn fallback_target(tokens: &[String]) -> Option<(Trigger, &str)> {
    match tokens.len() {
        2 => Some((Trigger::TwoTokens, tokens[1].as_str())),
        3 if LINKING_PARTICLES.contains(&tokens[1].as_str()) => {
            Some((Trigger::LinkedName, tokens[2].as_str()))
        }
        n if n > 3 && QUALIFIER_PARTICLES.contains(&tokens[2].as_str()) => {
            Some((Trigger::QualifiedName, tokens[1].as_str()))
        }
        _ => None,
    }
}

/// Gender classifier over an immutable registry
pub struct Classifier {
    registry: Arc<Registry>,
    fallback: Option<Arc<FallbackResolver>>,
}

impl Classifier {
    /// Classifier with an external fallback
    pub fn new(registry: Arc<Registry>, fallback: Arc<FallbackResolver>) -> Self {
        Self {
            registry,
            fallback: Some(fallback),
        }
    }

    /// Classifier using direct lookup only; trigger matches end Neutral
    pub fn without_fallback(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            fallback: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn fallback(&self) -> Option<&FallbackResolver> {
        self.fallback.as_deref()
    }

    /// Hash of the registry content and fallback settings
    ///
    /// Classifications stored under one fingerprint are not valid under
    /// another.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.registry.fingerprint().as_bytes());
        match &self.fallback {
            Some(fallback) => hasher.update(fallback.settings_key().as_bytes()),
            None => hasher.update(b"no-fallback"),
        }
        format!("{:x}", hasher.finalize())
    }

    /// First token with a registry hit, scanning left to right
    pub fn classify_direct<'a>(&self, tokens: &'a [String]) -> Option<(Gender, &'a str)> {
        tokens
            .iter()
            .find_map(|token| self.registry.lookup(token).map(|gender| (gender, token.as_str())))
    }

    /// Classify a tokenized name
    pub async fn classify(&self, tokens: &[String]) -> Classification {
        if let Some((gender, token)) = self.classify_direct(tokens) {
            return Classification {
                gender,
                resolution: Resolution::Registry {
                    token: token.to_string(),
                },
            };
        }

        let Some((trigger, query)) = fallback_target(tokens) else {
            return Classification::unresolved(None);
        };

        let Some(fallback) = &self.fallback else {
            debug!(?tokens, ?trigger, "Fallback disabled, classifying as neutral");
            return Classification::unresolved(Some(trigger));
        };

        match fallback.resolve(query).await {
            Some(found) => Classification {
                gender: found.gender,
                resolution: Resolution::Fallback {
                    trigger,
                    query: query.to_string(),
                    matched: found.matched,
                    language: found.language,
                },
            },
            None => Classification::unresolved(Some(trigger)),
        }
    }
}
