//! Linguistic phonemisation — adapter around a rule-based G2P engine.
//!
//! The engine (espeak-ng in practice, see [`crate::espeak`]) is reached through
//! the [`PhonemeEngine`] trait and reports one [`Clause`] at a time: the IPA
//! for the clause plus the punctuation that ended it.  This module turns that
//! stream into sentences of single-codepoint tokens:
//!
//! 1. `(en)`-style language-switch flags are dropped (unless
//!    [`EspeakConfig::keep_language_flags`]).
//! 2. The optional phoneme map is applied.
//! 3. The clause terminator is appended as a token; `,` `:` `;` are followed
//!    by a space token.
//! 4. `.` `?` `!` close the current sentence.
//!
//! Text is forwarded to the engine untouched.  Sentence boundaries come from
//! surface orthography, so callers must capitalise sentence-initial letters if
//! they want "Test 1. Test 2." split in two.

use std::path::Path;

use tracing::debug;

use crate::{
    error::Result,
    tokenize::{mapped_tokens, PhonemeMap},
    Sentence, Utterance,
};

/// Punctuation the engine can report as a clause terminator.
#[cfg(any(feature = "espeak", test))]
pub(crate) const CLAUSE_TERMINATORS: &[char] = &['.', ',', '?', '!', ':', ';'];

// ─── Engine boundary ──────────────────────────────────────────────────────────

/// One clause as produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// IPA for the clause, already NFD-decomposed by the engine.
    pub phonemes: String,
    /// Punctuation that ended the clause, if any.
    pub terminator: Option<char>,
}

impl Clause {
    pub fn new(phonemes: impl Into<String>, terminator: Option<char>) -> Self {
        Self { phonemes: phonemes.into(), terminator }
    }
}

/// A rule-based grapheme-to-phoneme engine.
///
/// Implementations fail with [`Error::Configuration`](crate::Error::Configuration)
/// when `voice` is unknown or `data_path` does not hold the engine's data.
pub trait PhonemeEngine: Send + Sync {
    fn clauses(&self, text: &str, voice: &str, data_path: &Path) -> Result<Vec<Clause>>;
}

// ─── Configuration ────────────────────────────────────────────────────────────

/// Options for [`phonemize_linguistic`].
#[derive(Debug, Clone)]
pub struct EspeakConfig {
    /// espeak-ng voice, e.g. `"en-us"` or `"de"`.
    pub voice: String,

    pub period: char,
    pub comma: char,
    pub question: char,
    pub exclamation: char,
    pub colon: char,
    pub semicolon: char,
    pub space: char,

    /// Keep `(lang)` switch flags in the output.
    pub keep_language_flags: bool,

    /// Per-token substitutions, applied after decomposition.
    pub phoneme_map: Option<PhonemeMap>,
}

impl EspeakConfig {
    /// Defaults for `voice`, including its built-in phoneme map if it has one.
    pub fn new(voice: impl Into<String>) -> Self {
        let voice = voice.into();
        let phoneme_map = default_phoneme_map(&voice);
        Self {
            voice,
            period: '.',
            comma: ',',
            question: '?',
            exclamation: '!',
            colon: ':',
            semicolon: ';',
            space: ' ',
            keep_language_flags: false,
            phoneme_map,
        }
    }
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self::new("en-us")
    }
}

/// Built-in phoneme substitutions per voice.
pub fn default_phoneme_map(voice: &str) -> Option<PhonemeMap> {
    match voice {
        // espeak-ng emits "c" where Brazilian Portuguese models expect "k".
        "pt-br" => Some(PhonemeMap::from([("c".to_string(), vec!["k".to_string()])])),
        _ => None,
    }
}

// ─── Adapter ──────────────────────────────────────────────────────────────────

/// Phonemise `text` with `engine`, grouping the result into sentences.
///
/// Empty sentences (e.g. from empty input) are dropped.
pub fn phonemize_linguistic(
    engine: &dyn PhonemeEngine,
    text: &str,
    config: &EspeakConfig,
    data_path: &Path,
) -> Result<Utterance> {
    let clauses = engine.clauses(text, &config.voice, data_path)?;

    let mut sentences: Utterance = Vec::new();
    let mut current: Option<Sentence> = None;

    for clause in &clauses {
        let sentence = current.get_or_insert_with(Sentence::new);
        push_clause_phonemes(sentence, &clause.phonemes, config);

        let push = |sentence: &mut Sentence, c: char| sentence.push(String::from(c));
        match clause.terminator {
            Some('.') => push(sentence, config.period),
            Some('?') => push(sentence, config.question),
            Some('!') => push(sentence, config.exclamation),
            Some(',') => {
                push(sentence, config.comma);
                push(sentence, config.space);
            }
            Some(':') => {
                push(sentence, config.colon);
                push(sentence, config.space);
            }
            Some(';') => {
                push(sentence, config.semicolon);
                push(sentence, config.space);
            }
            _ => {}
        }

        if matches!(clause.terminator, Some('.' | '?' | '!')) {
            sentences.extend(current.take());
        }
    }
    sentences.extend(current.take());
    sentences.retain(|s| !s.is_empty());

    debug!(
        voice = %config.voice,
        clauses = clauses.len(),
        sentences = sentences.len(),
        "linguistic phonemisation"
    );
    Ok(sentences)
}

/// The phoneme map runs first; `(lang)` flags are then dropped from the
/// mapped tokens.
fn push_clause_phonemes(sentence: &mut Sentence, phonemes: &str, config: &EspeakConfig) {
    let mapped = mapped_tokens(phonemes, config.phoneme_map.as_ref());
    if config.keep_language_flags {
        sentence.extend(mapped);
        return;
    }

    let mut in_flag = false;
    for token in mapped {
        if in_flag {
            in_flag = token != ")";
        } else if token == "(" {
            in_flag = true;
        } else {
            sentence.push(token);
        }
    }
}

/// Find the punctuation that ended a clause.
///
/// `cursor` is the engine's byte offset into `text` after the clause, or
/// `None` once all text is consumed.  espeak-ng leaves the cursor one
/// character past the clause, so that character is skipped before looking back
/// over whitespace.
#[cfg(any(feature = "espeak", test))]
pub(crate) fn clause_terminator(text: &str, cursor: Option<usize>) -> Option<char> {
    let mut end = match cursor {
        None => text.len(),
        Some(offset) => offset.saturating_sub(1).min(text.len()),
    };
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end]
        .trim_end()
        .chars()
        .last()
        .filter(|c| CLAUSE_TERMINATORS.contains(c))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;

    /// Replays canned clauses for known inputs.
    struct ScriptedEngine {
        voices: Vec<&'static str>,
        script: HashMap<&'static str, Vec<Clause>>,
    }

    impl PhonemeEngine for ScriptedEngine {
        fn clauses(&self, text: &str, voice: &str, data_path: &Path) -> Result<Vec<Clause>> {
            if data_path.as_os_str().is_empty() {
                return Err(Error::configuration("missing data path"));
            }
            if !self.voices.contains(&voice) {
                return Err(Error::configuration(format!("unknown voice '{voice}'")));
            }
            Ok(self.script.get(text).cloned().unwrap_or_default())
        }
    }

    fn engine() -> ScriptedEngine {
        let mut script = HashMap::new();
        script.insert("licht!", vec![Clause::new("lˈɪc\u{0327}t", Some('!'))]);
        script.insert(
            "this, is: a; test.",
            vec![
                Clause::new("ðˈɪs", Some(',')),
                Clause::new("ɪz", Some(':')),
                Clause::new("ˈeɪ", Some(';')),
                Clause::new("tˈɛst", Some('.')),
            ],
        );
        script.insert(
            "Test 1. Test 2.",
            vec![Clause::new("tˈɛst wˈʌn", Some('.')), Clause::new("tˈɛst tˈuː", Some('.'))],
        );
        script.insert("Hello, world", vec![Clause::new("həlˈoʊ", Some(',')), Clause::new("wˈɜːld", None)]);
        script.insert("bonjour", vec![Clause::new("(fr)bɔ̃ʒˈuʁ(en)", None)]);
        script.insert("casa", vec![Clause::new("kˈazɐ", None), Clause::new("c", None)]);
        script.insert("", vec![Clause::new("", None)]);
        ScriptedEngine { voices: vec!["de", "en-us", "pt-br"], script }
    }

    fn run(text: &str, voice: &str) -> Result<Utterance> {
        phonemize_linguistic(&engine(), text, &EspeakConfig::new(voice), Path::new("/data"))
    }

    fn render(utt: &Utterance) -> Vec<String> {
        utt.iter().map(|s| s.concat()).collect()
    }

    #[test]
    fn test_licht_tokens() {
        let utt = run("licht!", "de").unwrap();
        assert_eq!(utt, vec![vec!["l", "ˈ", "ɪ", "c", "\u{0327}", "t", "!"]]);
    }

    #[test]
    fn test_clause_punctuation_and_spaces() {
        let utt = run("this, is: a; test.", "en-us").unwrap();
        assert_eq!(render(&utt), ["ðˈɪs, ɪz: ˈeɪ; tˈɛst."]);
    }

    #[test]
    fn test_sentence_split() {
        let utt = run("Test 1. Test 2.", "en-us").unwrap();
        assert_eq!(render(&utt), ["tˈɛst wˈʌn.", "tˈɛst tˈuː."]);
    }

    #[test]
    fn test_unterminated_tail_is_kept() {
        let utt = run("Hello, world", "en-us").unwrap();
        assert_eq!(render(&utt), ["həlˈoʊ, wˈɜːld"]);
    }

    #[test]
    fn test_language_flags_filtered() {
        let utt = run("bonjour", "en-us").unwrap();
        assert_eq!(render(&utt), ["bɔ̃ʒˈuʁ"]);

        let mut config = EspeakConfig::new("en-us");
        config.keep_language_flags = true;
        let utt = phonemize_linguistic(&engine(), "bonjour", &config, Path::new("/data")).unwrap();
        assert_eq!(render(&utt), ["(fr)bɔ̃ʒˈuʁ(en)"]);
    }

    #[test]
    fn test_map_applies_before_flag_filter() {
        // A mapped-away "(" no longer opens a flag.
        let mut config = EspeakConfig::new("en-us");
        config.phoneme_map = Some(PhonemeMap::from([("(".to_string(), vec!["ʔ".to_string()])]));
        let utt = phonemize_linguistic(&engine(), "bonjour", &config, Path::new("/data")).unwrap();
        assert_eq!(render(&utt), ["ʔfr)bɔ̃ʒˈuʁʔen)"]);

        // A token mapped onto "(" opens one that runs to the next ")".
        config.phoneme_map = Some(PhonemeMap::from([("ʒ".to_string(), vec!["(".to_string()])]));
        let utt = phonemize_linguistic(&engine(), "bonjour", &config, Path::new("/data")).unwrap();
        assert_eq!(render(&utt), ["bɔ̃"]);
    }

    #[test]
    fn test_pt_br_default_map() {
        let utt = run("casa", "pt-br").unwrap();
        assert_eq!(render(&utt), ["kˈazɐk"]);
        assert!(default_phoneme_map("en-us").is_none());
    }

    #[test]
    fn test_custom_punctuation_symbols() {
        let mut config = EspeakConfig::new("de");
        config.exclamation = '¡';
        let utt = phonemize_linguistic(&engine(), "licht!", &config, Path::new("/data")).unwrap();
        assert_eq!(utt[0].last().map(String::as_str), Some("¡"));
    }

    #[test]
    fn test_empty_input() {
        assert!(run("", "en-us").unwrap().is_empty());
    }

    #[test]
    fn test_configuration_errors_propagate() {
        let err = run("licht!", "xx-unknown").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = phonemize_linguistic(&engine(), "licht!", &EspeakConfig::new("de"), Path::new(""))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_clause_terminator_scan() {
        let text = "Test 1. Test 2.";
        // Cursor sits one character past "Test 1. ", i.e. on the 'e'.
        assert_eq!(clause_terminator(text, Some(9)), Some('.'));
        assert_eq!(clause_terminator(text, None), Some('.'));
        assert_eq!(clause_terminator("licht!", None), Some('!'));
        assert_eq!(clause_terminator("this, is", Some(7)), Some(','));
        assert_eq!(clause_terminator("no punctuation", None), None);
        assert_eq!(clause_terminator("", None), None);
        // Multi-byte text: offsets inside a character are walked back.
        assert_eq!(clause_terminator("мир. да", Some(10)), Some('.'));
    }
}
