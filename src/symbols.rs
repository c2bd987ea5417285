//! Phoneme / codepoint → id tables.
//!
//! Two kinds of table exist:
//!
//! | Backend     | Tables                         | Key                      |
//! |-------------|--------------------------------|--------------------------|
//! | espeak-ng   | one global table               | IPA phoneme (NFD)        |
//! | codepoints  | one table per language tag     | normalised codepoint     |
//!
//! Ids 0, 1 and 2 are reserved for pad, bos and eos.  They appear in the
//! built-in tables as `_`, `^` and `$` so that exported maps line up with
//! voice `config.json` files, but the encoder never looks them up.
//!
//! Every id must be below [`MAX_PHONEMES`]: the model's embedding table is
//! statically sized.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Integer id fed to the model (int64 in the ONNX graphs).
pub type PhonemeId = i64;

/// Separator emitted after every id except eos.
pub const PAD_ID: PhonemeId = 0;
/// Beginning of sequence.
pub const BOS_ID: PhonemeId = 1;
/// End of sequence.
pub const EOS_ID: PhonemeId = 2;

pub const PAD: &str = "_";
pub const BOS: &str = "^";
pub const EOS: &str = "$";

/// Size of the model's symbol embedding, reserved ids included.
/// Larger than any shipped table to leave room for new phonemes.
pub const MAX_PHONEMES: usize = 256;

// ─── Built-in data ────────────────────────────────────────────────────────────

/// espeak-ng IPA table shared by every espeak voice.
const ESPEAK_SYMBOLS: &[(&str, PhonemeId)] = &[
    ("_", 0), ("^", 1), ("$", 2), (" ", 3), ("!", 4), ("'", 5), ("(", 6), (")", 7),
    (",", 8), ("-", 9), (".", 10), (":", 11), (";", 12), ("?", 13),
    ("a", 14), ("b", 15), ("c", 16), ("d", 17), ("e", 18), ("f", 19), ("h", 20),
    ("i", 21), ("j", 22), ("k", 23), ("l", 24), ("m", 25), ("n", 26), ("o", 27),
    ("p", 28), ("q", 29), ("r", 30), ("s", 31), ("t", 32), ("u", 33), ("v", 34),
    ("w", 35), ("x", 36), ("y", 37), ("z", 38),
    ("æ", 39), ("ç", 40), ("ð", 41), ("ø", 42), ("ħ", 43), ("ŋ", 44), ("œ", 45),
    ("ǀ", 46), ("ǁ", 47), ("ǂ", 48), ("ǃ", 49), ("ɐ", 50), ("ɑ", 51), ("ɒ", 52),
    ("ɓ", 53), ("ɔ", 54), ("ɕ", 55), ("ɖ", 56), ("ɗ", 57), ("ɘ", 58), ("ə", 59),
    ("ɚ", 60), ("ɛ", 61), ("ɜ", 62), ("ɞ", 63), ("ɟ", 64), ("ɠ", 65), ("ɡ", 66),
    ("ɢ", 67), ("ɣ", 68), ("ɤ", 69), ("ɥ", 70), ("ɦ", 71), ("ɧ", 72), ("ɨ", 73),
    ("ɪ", 74), ("ɫ", 75), ("ɬ", 76), ("ɭ", 77), ("ɮ", 78), ("ɯ", 79), ("ɰ", 80),
    ("ɱ", 81), ("ɲ", 82), ("ɳ", 83), ("ɴ", 84), ("ɵ", 85), ("ɶ", 86), ("ɸ", 87),
    ("ɹ", 88), ("ɺ", 89), ("ɻ", 90), ("ɽ", 91), ("ɾ", 92), ("ʀ", 93), ("ʁ", 94),
    ("ʂ", 95), ("ʃ", 96), ("ʄ", 97), ("ʈ", 98), ("ʉ", 99), ("ʊ", 100), ("ʋ", 101),
    ("ʌ", 102), ("ʍ", 103), ("ʎ", 104), ("ʏ", 105), ("ʐ", 106), ("ʑ", 107),
    ("ʒ", 108), ("ʔ", 109), ("ʕ", 110), ("ʘ", 111), ("ʙ", 112), ("ʛ", 113),
    ("ʜ", 114), ("ʝ", 115), ("ʟ", 116), ("ʡ", 117), ("ʢ", 118), ("ʲ", 119),
    ("ˈ", 120), ("ˌ", 121), ("ː", 122), ("ˑ", 123), ("˞", 124), ("β", 125),
    ("θ", 126), ("χ", 127), ("ᵻ", 128), ("ⱱ", 129),
    ("0", 130), ("1", 131), ("2", 132), ("3", 133), ("4", 134), ("5", 135),
    ("6", 136), ("7", 137), ("8", 138), ("9", 139),
    ("\u{0327}", 140), ("\u{0303}", 141), ("\u{032A}", 142), ("\u{032F}", 143),
    ("\u{0329}", 144), ("ʰ", 145), ("ˤ", 146), ("ε", 147), ("↓", 148), ("#", 149),
    ("\"", 150), ("↑", 151), ("\u{033A}", 152), ("\u{033B}", 153),
    ("g", 154), ("ʦ", 155), ("X", 156), ("\u{031D}", 157), ("\u{030A}", 158),
    ("ɝ", 159), ("ʷ", 160),
];

/// Ukrainian alphabet after case folding and NFD.  `й` and `ї` decompose, so
/// their combining breve / diaeresis get ids of their own.
const UK_SYMBOLS: &[(&str, PhonemeId)] = &[
    ("_", 0), ("^", 1), ("$", 2), (" ", 3), ("!", 4), ("'", 5), (",", 6), ("-", 7),
    (".", 8), (":", 9), (";", 10), ("?", 11),
    ("а", 12), ("б", 13), ("в", 14), ("г", 15), ("ґ", 16), ("д", 17), ("е", 18),
    ("є", 19), ("ж", 20), ("з", 21), ("и", 22), ("і", 23), ("ї", 24), ("й", 25),
    ("к", 26), ("л", 27), ("м", 28), ("н", 29), ("о", 30), ("п", 31), ("р", 32),
    ("с", 33), ("т", 34), ("у", 35), ("ф", 36), ("х", 37), ("ц", 38), ("ч", 39),
    ("ш", 40), ("щ", 41), ("ь", 42), ("ю", 43), ("я", 44),
    ("\u{0301}", 45), ("\u{0306}", 46), ("\u{0308}", 47),
];

const BUILTIN_CODEPOINT_LANGUAGES: &[(&str, &[(&str, PhonemeId)])] = &[("uk", UK_SYMBOLS)];

static BUILTIN: Lazy<Arc<SymbolTables>> = Lazy::new(|| Arc::new(SymbolTables::builtin()));

// ─── SymbolTable ──────────────────────────────────────────────────────────────

/// Immutable token → id mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    ids: HashMap<String, PhonemeId>,
}

impl SymbolTable {
    /// Build a table, rejecting ids outside `0..MAX_PHONEMES` and duplicate
    /// tokens.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, PhonemeId)>,
        S: Into<String>,
    {
        let mut ids = HashMap::new();
        for (token, id) in pairs {
            let token = token.into();
            check_id(&token, id)?;
            if ids.insert(token.clone(), id).is_some() {
                return Err(Error::symbol_table(format!("duplicate entry for {token:?}")));
            }
        }
        Ok(Self { ids })
    }

    /// Build a table from the `phoneme_id_map` layout used by voice
    /// `config.json` files: every token maps to a one-element id list.
    pub fn from_id_map(map: &BTreeMap<String, Vec<PhonemeId>>) -> Result<Self> {
        let pairs = map
            .iter()
            .map(|(token, ids)| match ids.as_slice() {
                [id] => Ok((token.clone(), *id)),
                _ => Err(Error::symbol_table(format!(
                    "{token:?} must map to exactly one id, got {ids:?}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_pairs(pairs)
    }

    /// Inverse of [`from_id_map`](Self::from_id_map).
    pub fn to_id_map(&self) -> BTreeMap<String, Vec<PhonemeId>> {
        self.ids.iter().map(|(t, &id)| (t.clone(), vec![id])).collect()
    }

    // Built-in data is checked by the unit tests below.
    fn from_static(pairs: &[(&str, PhonemeId)]) -> Self {
        Self { ids: pairs.iter().map(|&(t, id)| (t.to_owned(), id)).collect() }
    }

    pub fn get(&self, token: &str) -> Option<PhonemeId> {
        self.ids.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Highest id in the table, if any.
    pub fn max_id(&self) -> Option<PhonemeId> {
        self.ids.values().copied().max()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PhonemeId)> {
        self.ids.iter().map(|(t, &id)| (t.as_str(), id))
    }
}

fn check_id(token: &str, id: PhonemeId) -> Result<()> {
    if id < 0 || id as usize >= MAX_PHONEMES {
        return Err(Error::symbol_table(format!(
            "id {id} for {token:?} is outside 0..{MAX_PHONEMES}"
        )));
    }
    Ok(())
}

// ─── SymbolTables ─────────────────────────────────────────────────────────────

/// On-disk bundle layout read by [`SymbolTables::from_json_file`].
#[derive(Debug, Serialize, Deserialize)]
struct TableBundle {
    espeak: BTreeMap<String, Vec<PhonemeId>>,
    #[serde(default)]
    codepoints: BTreeMap<String, BTreeMap<String, Vec<PhonemeId>>>,
}

/// Every table the encoders need, loaded once and shared through an [`Arc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTables {
    linguistic: SymbolTable,
    codepoints: BTreeMap<String, SymbolTable>,
}

impl SymbolTables {
    pub fn new(linguistic: SymbolTable, codepoints: BTreeMap<String, SymbolTable>) -> Self {
        Self { linguistic, codepoints }
    }

    /// Tables compiled into the crate: the espeak-ng IPA table and the
    /// codepoint alphabets.
    pub fn builtin() -> Self {
        let codepoints = BUILTIN_CODEPOINT_LANGUAGES
            .iter()
            .map(|&(lang, pairs)| (lang.to_owned(), SymbolTable::from_static(pairs)))
            .collect();
        Self { linguistic: SymbolTable::from_static(ESPEAK_SYMBOLS), codepoints }
    }

    /// Process-wide shared copy of [`builtin`](Self::builtin).
    pub fn shared() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Load a table bundle:
    /// `{"espeak": {"a": [14], …}, "codepoints": {"uk": {"а": [12], …}}}`.
    ///
    /// Any failure here is fatal for the caller: there is no degraded mode
    /// without tables.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::symbol_table(format!("cannot read {}: {e}", path.display()))
        })?;
        let tables = Self::from_json_slice(&bytes)?;
        info!(
            path = %path.display(),
            linguistic = tables.linguistic.len(),
            languages = tables.codepoints.len(),
            "loaded symbol tables"
        );
        Ok(tables)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let bundle: TableBundle = serde_json::from_slice(bytes)
            .map_err(|e| Error::symbol_table(format!("malformed table JSON: {e}")))?;
        let linguistic = SymbolTable::from_id_map(&bundle.espeak)?;
        let codepoints = bundle
            .codepoints
            .iter()
            .map(|(lang, map)| Ok((lang.clone(), SymbolTable::from_id_map(map)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { linguistic, codepoints })
    }

    /// Serialise back to the bundle layout.
    pub fn to_json(&self) -> Result<String> {
        let bundle = TableBundle {
            espeak: self.linguistic.to_id_map(),
            codepoints: self
                .codepoints
                .iter()
                .map(|(lang, t)| (lang.clone(), t.to_id_map()))
                .collect(),
        };
        Ok(serde_json::to_string(&bundle)?)
    }

    /// Replace the linguistic table (e.g. with a voice's own id map).
    pub fn with_linguistic(mut self, table: SymbolTable) -> Self {
        self.linguistic = table;
        self
    }

    /// Add or replace the codepoint table for `language`.
    pub fn with_codepoints(mut self, language: impl Into<String>, table: SymbolTable) -> Self {
        self.codepoints.insert(language.into(), table);
        self
    }

    pub fn linguistic(&self) -> &SymbolTable {
        &self.linguistic
    }

    /// Codepoint table for `language`; an unsupported language is a
    /// configuration error.
    pub fn codepoints(&self, language: &str) -> Result<&SymbolTable> {
        self.codepoints.get(language).ok_or_else(|| {
            Error::configuration(format!(
                "no codepoint table for language '{language}' (available: {:?})",
                self.codepoint_languages().collect::<Vec<_>>()
            ))
        })
    }

    pub fn codepoint_languages(&self) -> impl Iterator<Item = &str> {
        self.codepoints.keys().map(String::as_str)
    }

    pub fn lookup_linguistic(&self, token: &str) -> Option<PhonemeId> {
        self.linguistic.get(token)
    }

    pub fn lookup_codepoints(&self, language: &str, token: &str) -> Option<PhonemeId> {
        self.codepoints.get(language)?.get(token)
    }

    pub const fn max_vocabulary_size() -> usize {
        MAX_PHONEMES
    }
}

impl Default for SymbolTables {
    fn default() -> Self {
        Self::builtin()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_valid(pairs: &[(&str, PhonemeId)]) {
        let table = SymbolTable::from_pairs(pairs.iter().copied()).expect("invalid built-in table");
        assert_eq!(table.len(), pairs.len());
        let ids: HashSet<_> = pairs.iter().map(|&(_, id)| id).collect();
        assert_eq!(ids.len(), pairs.len(), "built-in ids must be unique");
        assert_eq!(table.get(PAD), Some(PAD_ID));
        assert_eq!(table.get(BOS), Some(BOS_ID));
        assert_eq!(table.get(EOS), Some(EOS_ID));
    }

    #[test]
    fn test_builtin_tables_valid() {
        assert_valid(ESPEAK_SYMBOLS);
        for &(_, pairs) in BUILTIN_CODEPOINT_LANGUAGES {
            assert_valid(pairs);
        }
    }

    #[test]
    fn test_builtin_tokens_are_single_codepoints() {
        for &(token, _) in ESPEAK_SYMBOLS.iter().chain(UK_SYMBOLS) {
            assert_eq!(token.chars().count(), 1, "{token:?}");
        }
    }

    #[test]
    fn test_known_ids() {
        let tables = SymbolTables::builtin();
        assert_eq!(tables.lookup_linguistic("l"), Some(24));
        assert_eq!(tables.lookup_linguistic("ˈ"), Some(120));
        assert_eq!(tables.lookup_linguistic("\u{0327}"), Some(140));
        assert_eq!(tables.lookup_linguistic("!"), Some(4));
        assert_eq!(tables.lookup_codepoints("uk", "в"), Some(14));
        assert_eq!(tables.lookup_codepoints("uk", "\u{0301}"), Some(45));
    }

    #[test]
    fn test_missing_lookups() {
        let tables = SymbolTables::shared();
        assert_eq!(tables.lookup_linguistic("\u{0000}"), None);
        assert_eq!(tables.lookup_linguistic("中"), None);
        // Same surface character, different vocabularies.
        assert_eq!(tables.lookup_codepoints("uk", "a"), None);
        assert_eq!(tables.lookup_codepoints("xx", "а"), None);
        assert!(tables.codepoints("xx").is_err());
    }

    #[test]
    fn test_max_vocabulary() {
        assert_eq!(SymbolTables::max_vocabulary_size(), 256);
        let tables = SymbolTables::builtin();
        assert!(tables.linguistic().max_id().unwrap() < MAX_PHONEMES as PhonemeId);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = SymbolTable::from_pairs([("a", 256)]).unwrap_err();
        assert!(err.is_fatal());
        assert!(SymbolTable::from_pairs([("a", -1)]).is_err());
        assert!(SymbolTable::from_pairs([("a", 3), ("a", 4)]).is_err());
    }

    #[test]
    fn test_id_map_requires_single_id() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![14, 15]);
        assert!(SymbolTable::from_id_map(&map).is_err());
    }

    #[test]
    fn test_json_roundtrip_via_file() {
        let tables = SymbolTables::builtin();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, tables.to_json().unwrap()).unwrap();

        let loaded = SymbolTables::from_json_file(&path).unwrap();
        assert_eq!(loaded, tables);
    }

    #[test]
    fn test_corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{\"espeak\": {\"a\": [999]}}").unwrap();
        assert!(SymbolTables::from_json_file(&path).unwrap_err().is_fatal());

        std::fs::write(&path, b"not json").unwrap();
        assert!(SymbolTables::from_json_file(&path).unwrap_err().is_fatal());

        let missing = dir.path().join("nope.json");
        assert!(SymbolTables::from_json_file(&missing).unwrap_err().is_fatal());
    }

    #[test]
    fn test_with_codepoints_adds_language() {
        let de = SymbolTable::from_pairs([("ä", 3)]).unwrap();
        let tables = SymbolTables::builtin().with_codepoints("de", de);
        assert_eq!(tables.lookup_codepoints("de", "ä"), Some(3));
        assert_eq!(tables.codepoint_languages().collect::<Vec<_>>(), ["de", "uk"]);
    }
}
