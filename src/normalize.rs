//! Text normalisation for the codepoint backend.
//!
//! Two steps, always in this order:
//! 1. casing transform ([`Casing`]),
//! 2. Unicode canonical decomposition (NFD), so that e.g. `é` becomes
//!    `e` + U+0301 and each part can be looked up on its own.
//!
//! Nothing else about the text is changed.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::Error;

/// Casing applied before decomposition.
///
/// Models shipped with the default codepoint tables were trained on
/// [`Casing::Fold`]; changing it breaks compatibility with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Casing {
    /// Leave case untouched.
    Ignore,
    Lower,
    Upper,
    /// Unicode default case folding (`ß` → `ss`, `ς` → `σ`).
    #[default]
    Fold,
}

impl Casing {
    pub fn as_str(self) -> &'static str {
        match self {
            Casing::Ignore => "ignore",
            Casing::Lower => "lower",
            Casing::Upper => "upper",
            Casing::Fold => "fold",
        }
    }

    fn apply(self, text: &str) -> String {
        match self {
            Casing::Ignore => text.to_owned(),
            Casing::Lower => text.to_lowercase(),
            Casing::Upper => text.to_uppercase(),
            Casing::Fold => caseless::default_case_fold_str(text),
        }
    }
}

impl fmt::Display for Casing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Casing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Casing::Ignore),
            "lower" => Ok(Casing::Lower),
            "upper" => Ok(Casing::Upper),
            "fold" => Ok(Casing::Fold),
            other => Err(Error::configuration(format!(
                "unknown casing '{other}' (expected ignore, lower, upper or fold)"
            ))),
        }
    }
}

/// Apply `casing`, then NFD.
pub fn normalize(text: &str, casing: Casing) -> String {
    casing.apply(text).nfd().collect()
}

/// NFD only.  Used on espeak-ng output, which must not be re-cased.
pub fn decompose(text: &str) -> String {
    text.nfd().collect()
}
