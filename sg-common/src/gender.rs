//! Gender label shared by the registry, the classifier and the report layer
//!
//! The name tables this workspace reads encode gender as small integers
//! (`1` masculine, `2` feminine, `0` neutral). Those codes only exist at the
//! data boundary; everything past it works with the closed `Gender` enum.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Referential gender of a named entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Not a person, or not resolvable
    #[serde(alias = "N", alias = "n")]
    Neutral,
    #[serde(alias = "M", alias = "m")]
    Masculine,
    #[serde(alias = "F", alias = "f")]
    Feminine,
}

impl Gender {
    /// All labels in report order
    pub const ALL: [Gender; 3] = [Gender::Masculine, Gender::Feminine, Gender::Neutral];

    /// Numeric code used by the statistical name files
    pub fn code(self) -> u8 {
        match self {
            Gender::Neutral => 0,
            Gender::Masculine => 1,
            Gender::Feminine => 2,
        }
    }

    /// Decode a numeric code; unknown codes yield `None`
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Gender::Neutral),
            1 => Some(Gender::Masculine),
            2 => Some(Gender::Feminine),
            _ => None,
        }
    }

    /// Single-letter form (`M`, `F`, `N`)
    pub fn letter(self) -> char {
        match self {
            Gender::Neutral => 'N',
            Gender::Masculine => 'M',
            Gender::Feminine => 'F',
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gender::Neutral => "neutral",
            Gender::Masculine => "masculine",
            Gender::Feminine => "feminine",
        };
        f.write_str(s)
    }
}

impl FromStr for Gender {
    type Err = Error;

    /// Accepts `M`/`F`/`N`, the numeric codes and the full lowercase words
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "1" | "masculine" => Ok(Gender::Masculine),
            "f" | "2" | "feminine" => Ok(Gender::Feminine),
            "n" | "0" | "neutral" => Ok(Gender::Neutral),
            other => Err(Error::InvalidInput(format!(
                "unknown gender '{}': expected 'M', 'F' or 'N'",
                other
            ))),
        }
    }
}
