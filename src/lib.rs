//! # piper-phonemize
//!
//! Text → phonemes → phoneme ids for neural text-to-speech models, plus Arabic
//! diacritic restoration.
//!
//! ## Quick start
//!
//! ```
//! use piper_phonemize::{CodepointsConfig, MissingPhonemes, Phonemizer};
//!
//! let phonemizer = Phonemizer::default();
//!
//! // One token per (decomposed, case-folded) codepoint.
//! let utterance = phonemizer.phonemize_codepoints("ВЕСЕ́ЛКА", &CodepointsConfig::default());
//!
//! let mut missing = MissingPhonemes::new();
//! let ids = phonemizer.encode_codepoints(&utterance[0], "uk", &mut missing).unwrap();
//! assert_eq!(ids, [1, 0, 14, 0, 18, 0, 33, 0, 18, 0, 45, 0, 27, 0, 26, 0, 12, 0, 2]);
//! assert!(missing.is_empty());
//! ```
//!
//! With the `espeak` feature, linguistic phonemisation goes through
//! `libespeak-ng`:
//!
//! ```ignore
//! let phonemizer = Phonemizer::default().with_espeak("/usr/share");
//! let utterance = phonemizer.phonemize_linguistic("licht!", &EspeakConfig::new("de"))?;
//! // [["l", "ˈ", "ɪ", "c", "\u{327}", "t", "!"]]
//! ```
//!
//! ## Build requirements
//! | Feature   | Requirement                                                   |
//! |-----------|---------------------------------------------------------------|
//! | (none)    | —                                                             |
//! | `espeak`  | `apt install libespeak-ng-dev` / `brew install espeak-ng`, or `ESPEAK_LIB_DIR` |
//! | `cli`     | builds the `piper-phonemize` binary                           |
//!
//! ## Pipeline
//! 1. **Diacritization** (Arabic only, optional) — [`tashkeel::Restorer`].
//! 2. **Phonemisation** — espeak-ng clauses ([`phonemize`]) or raw codepoints
//!    ([`tokenize`]).
//! 3. **Id encoding** — tokens → ids with pad/bos/eos ([`ids`]), unknown
//!    tokens tallied in [`MissingPhonemes`].

pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod phonemize;
pub mod pipeline;
pub mod symbols;
pub mod tashkeel;
pub mod tokenize;

// Native libespeak-ng is only linked when asked for.
#[cfg(feature = "espeak")]
pub mod espeak;

// hf-hub is desktop-only: mobile apps bundle the model and use Restorer::load().
#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod download;

// C FFI for iOS / Android and other non-Rust callers.
pub mod ffi;

/// One phoneme or codepoint.
pub type Token = String;
/// Tokens of one sentence.
pub type Sentence = Vec<Token>;
/// Sentences of one input text.
pub type Utterance = Vec<Sentence>;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use config::{PhonemeType, VoiceConfig};
pub use error::{Error, Result};
pub use ids::{IdConfig, MissingPhonemes};
pub use normalize::Casing;
pub use phonemize::{Clause, EspeakConfig, PhonemeEngine};
pub use pipeline::Phonemizer;
pub use symbols::{PhonemeId, SymbolTable, SymbolTables, MAX_PHONEMES};
pub use tashkeel::{DiacritizationModel, Restorer};
pub use tokenize::{CodepointsConfig, PhonemeMap};

#[cfg(feature = "espeak")]
pub use espeak::EspeakEngine;
