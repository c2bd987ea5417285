//! Piper voice `config.json`.
//!
//! Only the fields that drive phonemisation and id encoding are read; the rest
//! (audio, inference settings, …) is ignored.
//!
//! ```json
//! {
//!   "phoneme_type": "espeak",
//!   "espeak": { "voice": "en-us" },
//!   "language": { "code": "en_US" },
//!   "num_symbols": 256,
//!   "phoneme_map": {},
//!   "phoneme_id_map": { "_": [0], "^": [1], "$": [2], "a": [14] }
//! }
//! ```

use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{Error, Result},
    normalize::Casing,
    phonemize::EspeakConfig,
    symbols::{PhonemeId, SymbolTable, SymbolTables, MAX_PHONEMES},
    tokenize::{CodepointsConfig, PhonemeMap},
};

/// Which phonemiser a voice was trained with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum PhonemeType {
    /// espeak-ng IPA.
    #[default]
    Espeak,
    /// Raw codepoints.
    Text,
}

impl fmt::Display for PhonemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Espeak => "espeak",
            Self::Text => "text",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EspeakSection {
    #[serde(default)]
    pub voice: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSection {
    #[serde(default)]
    pub code: String,
}

/// The phonemisation-relevant subset of a voice's `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub phoneme_type: PhonemeType,

    #[serde(default)]
    pub espeak: EspeakSection,

    #[serde(default)]
    pub language: Option<LanguageSection>,

    #[serde(default)]
    pub num_symbols: Option<usize>,

    #[serde(default)]
    pub phoneme_map: BTreeMap<String, Vec<String>>,

    pub phoneme_id_map: BTreeMap<String, Vec<PhonemeId>>,
}

impl VoiceConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::configuration(format!("cannot read voice config {}: {e}", path.display()))
        })?;
        let config = Self::from_json_slice(&bytes)?;
        info!(
            path = %path.display(),
            phoneme_type = %config.phoneme_type,
            symbols = config.phoneme_id_map.len(),
            "loaded voice config"
        );
        Ok(config)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::configuration(format!("malformed voice config: {e}")))
    }

    /// Language for codepoint voices: `language.code` up to the first `_`
    /// (`"uk_UA"` → `"uk"`), falling back to the espeak voice.
    pub fn language(&self) -> &str {
        match &self.language {
            Some(lang) if !lang.code.is_empty() => {
                lang.code.split('_').next().unwrap_or(&lang.code)
            }
            _ => &self.espeak.voice,
        }
    }

    /// The voice's id table, checked against `num_symbols`.
    pub fn symbol_table(&self) -> Result<SymbolTable> {
        let table = SymbolTable::from_id_map(&self.phoneme_id_map)?;
        let limit = self.num_symbols.unwrap_or(MAX_PHONEMES).min(MAX_PHONEMES);
        if let Some(max) = table.max_id() {
            if max as usize >= limit {
                return Err(Error::symbol_table(format!(
                    "phoneme id {max} exceeds num_symbols {limit}"
                )));
            }
        }
        Ok(table)
    }

    /// Built-in tables with this voice's id map installed where its
    /// phonemiser will look for it.
    pub fn tables(&self) -> Result<Arc<SymbolTables>> {
        let table = self.symbol_table()?;
        let tables = match self.phoneme_type {
            PhonemeType::Espeak => SymbolTables::builtin().with_linguistic(table),
            PhonemeType::Text => SymbolTables::builtin().with_codepoints(self.language(), table),
        };
        Ok(Arc::new(tables))
    }

    fn phoneme_map(&self) -> Option<PhonemeMap> {
        (!self.phoneme_map.is_empty())
            .then(|| self.phoneme_map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Defaults for the voice's espeak-ng voice, with its phoneme map layered
    /// over the built-in one.
    pub fn espeak_config(&self) -> EspeakConfig {
        let mut config = EspeakConfig::new(self.espeak.voice.clone());
        if let Some(map) = self.phoneme_map() {
            config.phoneme_map.get_or_insert_with(PhonemeMap::new).extend(map);
        }
        config
    }

    pub fn codepoints_config(&self, casing: Casing) -> CodepointsConfig {
        CodepointsConfig { casing, phoneme_map: self.phoneme_map() }
    }
}
