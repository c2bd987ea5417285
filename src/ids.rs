//! Phoneme → id encoding.
//!
//! Every sentence becomes
//!
//! ```text
//! bos pad  id₁ pad  id₂ pad  …  idₖ pad  eos
//!  1   0   ..   0   ..   0       ..   0   2
//! ```
//!
//! * every id except `eos` is followed by a `pad` separator;
//! * a token missing from the table emits nothing — not even a pad — and is
//!   counted in [`MissingPhonemes`] instead;
//! * so for `k` resolved tokens the output has exactly `2k + 3` ids, however
//!   many tokens were dropped.
//!
//! Encoding never fails.  The caller inspects the tally and decides whether
//! missing phonemes are fatal, worth a warning, or fine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::symbols::{PhonemeId, SymbolTable, BOS_ID, EOS_ID, PAD_ID};

// ─── IdConfig ─────────────────────────────────────────────────────────────────

/// Structural switches for [`phonemes_to_ids`].  The defaults are what every
/// shipped model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdConfig {
    /// Put a pad id after every id but eos.
    pub intersperse_pad: bool,
    pub add_bos: bool,
    pub add_eos: bool,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self { intersperse_pad: true, add_bos: true, add_eos: true }
    }
}

// ─── MissingPhonemes ──────────────────────────────────────────────────────────

/// Tally of tokens that had no id, with occurrence counts.
///
/// Plain accumulator owned by the caller; share it across threads only behind
/// your own lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissingPhonemes {
    counts: BTreeMap<String, usize>,
}

impl MissingPhonemes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, token: &str) {
        *self.counts.entry(token.to_owned()).or_insert(0) += 1;
    }

    /// Occurrences of `token`, 0 if it was never missing.
    pub fn count(&self, token: &str) -> usize {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Number of distinct missing tokens.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total occurrences over all tokens.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn merge(&mut self, other: &MissingPhonemes) {
        for (token, n) in &other.counts {
            *self.counts.entry(token.clone()).or_insert(0) += n;
        }
    }

    /// Tokens in sorted order with their counts.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(t, &n)| (t.as_str(), n))
    }
}

/// Render a token as `\uXXXX` escapes, one per codepoint, for diagnostics
/// (missing tokens are often invisible combining marks).
pub fn escape_token(token: &str) -> String {
    token.chars().map(|c| format!("\\u{:04x}", c as u32)).collect()
}

// ─── Encoding ─────────────────────────────────────────────────────────────────

/// Encode one sentence against `table`.
///
/// Unknown tokens are dropped from the output and recorded in `missing`.
pub fn phonemes_to_ids<S: AsRef<str>>(
    phonemes: &[S],
    table: &SymbolTable,
    config: &IdConfig,
    missing: &mut MissingPhonemes,
) -> Vec<PhonemeId> {
    let mut ids = Vec::with_capacity(2 * phonemes.len() + 3);
    let emit = |ids: &mut Vec<PhonemeId>, id: PhonemeId| {
        ids.push(id);
        if config.intersperse_pad {
            ids.push(PAD_ID);
        }
    };

    if config.add_bos {
        emit(&mut ids, BOS_ID);
    }

    let mut dropped = 0usize;
    for phoneme in phonemes {
        let phoneme = phoneme.as_ref();
        match table.get(phoneme) {
            Some(id) => emit(&mut ids, id),
            None => {
                missing.record(phoneme);
                dropped += 1;
            }
        }
    }

    if config.add_eos {
        ids.push(EOS_ID);
    }

    if dropped > 0 {
        debug!(tokens = phonemes.len(), dropped, "phonemes missing from id table");
    }
    ids
}

/// Encode every sentence separately; sentences are never concatenated.
pub fn utterance_to_ids<S: AsRef<str>>(
    sentences: &[Vec<S>],
    table: &SymbolTable,
    config: &IdConfig,
    missing: &mut MissingPhonemes,
) -> Vec<Vec<PhonemeId>> {
    sentences
        .iter()
        .map(|sentence| phonemes_to_ids(sentence, table, config, missing))
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTables;

    fn encode(phonemes: &[&str], table: &SymbolTable) -> (Vec<PhonemeId>, MissingPhonemes) {
        let mut missing = MissingPhonemes::new();
        let ids = phonemes_to_ids(phonemes, table, &IdConfig::default(), &mut missing);
        (ids, missing)
    }

    /// Deterministic pseudo-random token streams mixing known and unknown
    /// symbols.
    fn sample_sentences(table: &SymbolTable) -> Vec<Vec<String>> {
        let known: Vec<String> = {
            let mut v: Vec<_> = table.iter().map(|(t, _)| t.to_string()).collect();
            v.sort();
            v
        };
        let unknown = ["\u{0000}", "中", "ʭ", "ab", "🙂"];
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        (0..200)
            .map(|_| {
                let len = (next() % 40) as usize;
                (0..len)
                    .map(|_| {
                        let r = next();
                        if r % 4 == 0 {
                            unknown[(r / 4) as usize % unknown.len()].to_string()
                        } else {
                            known[(r / 4) as usize % known.len()].clone()
                        }
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_licht_ids() {
        let tables = SymbolTables::builtin();
        let (ids, missing) =
            encode(&["l", "ˈ", "ɪ", "c", "\u{0327}", "t", "!"], tables.linguistic());
        assert_eq!(ids, [1, 0, 24, 0, 120, 0, 74, 0, 16, 0, 140, 0, 32, 0, 4, 0, 2]);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_ukrainian_ids() {
        let tables = SymbolTables::builtin();
        let uk = tables.codepoints("uk").unwrap();
        let (ids, _) = encode(&["в", "е", "с", "е", "\u{0301}", "л", "к", "а"], uk);
        assert_eq!(ids, [1, 0, 14, 0, 18, 0, 33, 0, 18, 0, 45, 0, 27, 0, 26, 0, 12, 0, 2]);
    }

    #[test]
    fn test_all_missing_collapses() {
        let tables = SymbolTables::builtin();
        for table in [tables.linguistic(), tables.codepoints("uk").unwrap()] {
            let (ids, missing) = encode(&["\u{0000}", "\u{0000}", "\u{0000}"], table);
            assert_eq!(ids, [1, 0, 2]);
            assert_eq!(missing.len(), 1);
            assert_eq!(missing.count("\u{0000}"), 3);
        }
    }

    #[test]
    fn test_length_invariant() {
        let tables = SymbolTables::builtin();
        let table = tables.linguistic();
        for sentence in sample_sentences(table) {
            let mut missing = MissingPhonemes::new();
            let ids = phonemes_to_ids(&sentence, table, &IdConfig::default(), &mut missing);
            let k = sentence.iter().filter(|t| table.contains(t)).count();
            let m = sentence.len() - k;
            assert_eq!(ids.len(), 2 * k + 3, "sentence {sentence:?}");
            assert_eq!(missing.total(), m);
        }
    }

    #[test]
    fn test_pattern_invariant() {
        let tables = SymbolTables::builtin();
        let table = tables.linguistic();
        for sentence in sample_sentences(table) {
            let mut missing = MissingPhonemes::new();
            let ids = phonemes_to_ids(&sentence, table, &IdConfig::default(), &mut missing);

            assert_eq!(ids[0], BOS_ID);
            assert_eq!(*ids.last().unwrap(), EOS_ID);
            assert_ne!(ids[ids.len() - 2], EOS_ID, "no pad after eos");
            // Odd positions (before eos) are always pads.
            for (i, &id) in ids[..ids.len() - 1].iter().enumerate() {
                if i % 2 == 1 {
                    assert_eq!(id, PAD_ID, "position {i} in {ids:?}");
                }
            }
            // Content ids follow the resolvable tokens in order.
            let expected: Vec<_> = sentence.iter().filter_map(|t| table.get(t)).collect();
            let content: Vec<_> = ids[2..ids.len() - 1].iter().step_by(2).copied().collect();
            assert_eq!(content, expected);
        }
    }

    #[test]
    fn test_tally_accumulates_across_calls() {
        let tables = SymbolTables::builtin();
        let mut missing = MissingPhonemes::new();
        let config = IdConfig::default();
        phonemes_to_ids(&["a", "中"], tables.linguistic(), &config, &mut missing);
        phonemes_to_ids(&["中", "ʭ"], tables.linguistic(), &config, &mut missing);
        assert_eq!(missing.count("中"), 2);
        assert_eq!(missing.count("ʭ"), 1);
        assert_eq!(missing.count("a"), 0);
        assert_eq!(missing.total(), 3);
    }

    #[test]
    fn test_config_switches() {
        let tables = SymbolTables::builtin();
        let mut missing = MissingPhonemes::new();
        let bare = IdConfig { intersperse_pad: false, add_bos: false, add_eos: false };
        assert_eq!(phonemes_to_ids(&["a", "b"], tables.linguistic(), &bare, &mut missing), [14, 15]);

        let no_pad = IdConfig { intersperse_pad: false, ..IdConfig::default() };
        assert_eq!(
            phonemes_to_ids(&["a", "b"], tables.linguistic(), &no_pad, &mut missing),
            [1, 14, 15, 2]
        );
    }

    #[test]
    fn test_utterance_kept_per_sentence() {
        let tables = SymbolTables::builtin();
        let mut missing = MissingPhonemes::new();
        let utt = vec![vec!["a"], vec!["b", "中"]];
        let ids = utterance_to_ids(&utt, tables.linguistic(), &IdConfig::default(), &mut missing);
        assert_eq!(ids, vec![vec![1, 0, 14, 0, 2], vec![1, 0, 15, 0, 2]]);
        assert_eq!(missing.count("中"), 1);
    }

    #[test]
    fn test_merge_and_serialize() {
        let mut a = MissingPhonemes::new();
        a.record("x");
        let mut b = MissingPhonemes::new();
        b.record("x");
        b.record("\u{0000}");
        a.merge(&b);
        assert_eq!(a.count("x"), 2);
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"\u0000":1,"x":2}"#);
    }

    #[test]
    fn test_escape_token() {
        assert_eq!(escape_token("\u{0327}"), "\\u0327");
        assert_eq!(escape_token("ab"), "\\u0061\\u0062");
    }
}
