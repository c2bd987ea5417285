//! Codepoint "phonemiser" — no linguistic backend at all.
//!
//! Text is cased and NFD-decomposed (see [`crate::normalize`]) and every
//! resulting codepoint becomes its own token, combining marks included:
//!
//! ```text
//! "ВЕСЕ́ЛКА"  ──fold──▶  "весе́лка"  ──NFD──▶  в е с е ◌́ л к а
//! ```
//!
//! There is no sentence detection: one input string gives exactly one
//! sentence.  Because nothing phonetic happens here, encoding the result needs
//! the per-language codepoint table ([`SymbolTables::codepoints`]).
//!
//! [`SymbolTables::codepoints`]: crate::symbols::SymbolTables::codepoints

use std::collections::HashMap;

use tracing::debug;

use crate::{
    normalize::{normalize, Casing},
    Sentence, Utterance,
};

/// Token substitutions applied after decomposition, e.g. `c → [k]`.
pub type PhonemeMap = HashMap<String, Vec<String>>;

/// Options for [`phonemize_codepoints`].
#[derive(Debug, Clone, Default)]
pub struct CodepointsConfig {
    pub casing: Casing,
    pub phoneme_map: Option<PhonemeMap>,
}

impl CodepointsConfig {
    pub fn with_casing(casing: Casing) -> Self {
        Self { casing, phoneme_map: None }
    }
}

/// One token per codepoint of `text`, each expanded through `map` when present.
pub(crate) fn mapped_tokens(text: &str, map: Option<&PhonemeMap>) -> Sentence {
    let mut out = Sentence::with_capacity(text.len());
    for c in text.chars() {
        let token = String::from(c);
        match map.and_then(|m| m.get(&token)) {
            Some(replacement) => out.extend(replacement.iter().cloned()),
            None => out.push(token),
        }
    }
    out
}

/// Cased + decomposed text → a single sentence of codepoint tokens.
pub fn phonemize_codepoints(text: &str, config: &CodepointsConfig) -> Utterance {
    let normalized = normalize(text, config.casing);

    let sentence = mapped_tokens(&normalized, config.phoneme_map.as_ref());

    debug!(casing = %config.casing, tokens = sentence.len(), "codepoint phonemisation");
    vec![sentence]
}

// ─── Tests ────────────────────────────────────────────────────────────────────
