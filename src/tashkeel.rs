//! Arabic diacritization ("tashkeel") restorer.
//!
//! Pipeline for one call to [`Restorer::restore`]:
//!
//! 1. strip existing harakat (U+064C–U+0652),
//! 2. map every remaining codepoint to the model's input vocabulary
//!    (unknown → `UNK_ID`), pad with `PAD_ID` to [`MAX_INPUT_CHARS`],
//! 3. run the sequence-labelling model ([`DiacritizationModel`]),
//! 4. take the arg-max class per character and insert that class's mark(s)
//!    right after the character.
//!
//! Input longer than [`MAX_INPUT_CHARS`] is not rejected: the tail is copied
//! through without predictions.
//!
//! Because step 1 removes the input's harakat, restoring diacritized text
//! replaces its marks with the model's predictions.

use std::{collections::HashMap, path::Path};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Fixed input width of the model.
pub const MAX_INPUT_CHARS: usize = 315;

const PAD_ID: i32 = 0;
const UNK_ID: i32 = 1;

/// Classes that never produce a mark.
const INVALID_CLASSES: &[usize] = &[UNK_ID as usize, 8];

/// Harakat removed before prediction.
/// Fathatan (U+064B) is not among them and survives restoration.
const HARAKAT: &[char] = &[
    '\u{064C}', '\u{064D}', '\u{064E}', '\u{064F}', '\u{0650}', '\u{0651}', '\u{0652}',
];

/// Codepoint → input id.
const INPUT_VOCAB: &[(char, i32)] = &[
    ('\u{0009}', 8), ('\u{0020}', 28), ('\u{00a0}', 84), ('\u{00ab}', 74),
    ('\u{00ad}', 40), ('\u{00b0}', 5), ('\u{00b4}', 110), ('\u{00bb}', 30),
    ('\u{03ad}', 69), ('\u{03af}', 112), ('\u{03b1}', 47), ('\u{03b3}', 80),
    ('\u{03b5}', 7), ('\u{03b8}', 51), ('\u{03b9}', 36), ('\u{03ba}', 35),
    ('\u{03bc}', 54), ('\u{03bd}', 63), ('\u{03bf}', 114), ('\u{03c0}', 116),
    ('\u{03c1}', 26), ('\u{03c3}', 27), ('\u{03c4}', 78), ('\u{03c5}', 20),
    ('\u{03c7}', 14), ('\u{03c8}', 12), ('\u{03c9}', 89), ('\u{03cc}', 77),
    ('\u{03ce}', 103), ('\u{05d5}', 64), ('\u{061b}', 17), ('\u{061f}', 101),
    ('\u{0621}', 120), ('\u{0622}', 15), ('\u{0623}', 73), ('\u{0624}', 50),
    ('\u{0625}', 119), ('\u{0626}', 56), ('\u{0627}', 68), ('\u{0628}', 118),
    ('\u{0629}', 107), ('\u{062a}', 22), ('\u{062b}', 71), ('\u{062c}', 59),
    ('\u{062d}', 86), ('\u{062e}', 19), ('\u{062f}', 104), ('\u{0630}', 97),
    ('\u{0631}', 65), ('\u{0632}', 92), ('\u{0633}', 82), ('\u{0634}', 18),
    ('\u{0635}', 75), ('\u{0636}', 111), ('\u{0637}', 93), ('\u{0638}', 11),
    ('\u{0639}', 95), ('\u{063a}', 24), ('\u{0640}', 9), ('\u{0641}', 46),
    ('\u{0642}', 38), ('\u{0643}', 72), ('\u{0644}', 29), ('\u{0645}', 48),
    ('\u{0646}', 81), ('\u{0647}', 49), ('\u{0648}', 6), ('\u{0649}', 39),
    ('\u{064a}', 70), ('\u{066a}', 91), ('\u{0670}', 45), ('\u{0671}', 67),
    ('\u{06cc}', 105), ('\u{06d2}', 37), ('\u{06f5}', 109), ('\u{06f7}', 106),
    ('\u{06f8}', 10), ('\u{200b}', 52), ('\u{200d}', 31), ('\u{200e}', 117),
    ('\u{200f}', 60), ('\u{2013}', 42), ('\u{2018}', 34), ('\u{2019}', 41),
    ('\u{201c}', 55), ('\u{201d}', 85), ('\u{2022}', 62), ('\u{2026}', 23),
    ('\u{202b}', 94), ('\u{202c}', 108), ('\u{2030}', 115), ('\u{fb90}', 53),
    ('\u{fd3e}', 44), ('\u{fd3f}', 25), ('\u{fe81}', 16), ('\u{fe82}', 96),
    ('\u{fe83}', 87), ('\u{fe84}', 61), ('\u{fe87}', 57), ('\u{fe88}', 58),
    ('\u{fe8b}', 100), ('\u{fe8c}', 90), ('\u{fe91}', 32), ('\u{fe92}', 113),
    ('\u{fe94}', 76), ('\u{fed3}', 33), ('\u{fedb}', 13), ('\u{fedf}', 99),
    ('\u{fee0}', 66), ('\u{fee3}', 43), ('\u{fee7}', 102), ('\u{fef4}', 88),
    ('\u{fef5}', 83), ('\u{fef7}', 98), ('\u{fef9}', 21), ('\u{fefb}', 79),
];

/// Output class → marks inserted after the character.
const OUTPUT_VOCAB: &[(usize, &str)] = &[
    (4, "\u{0640}"),
    (5, "\u{064e}"),
    (6, "\u{064f}\u{0651}"),
    (7, "\u{064e}\u{0651}"),
    (8, "\u{0640}"),
    (9, "\u{0651}\u{0650}"),
    (10, "\u{0651}"),
    (11, "\u{0652}\u{0651}"),
    (12, "\u{0651}\u{064d}"),
    (13, "\u{0650}\u{0651}"),
    (14, "\u{064d}\u{0651}"),
    (15, "\u{064c}\u{0651}"),
    (16, "\u{0651}\u{064e}"),
    (17, "\u{064f}"),
    (18, "\u{0651}\u{064c}"),
    (19, "\u{0651}\u{064b}"),
    (20, "\u{0652}"),
    (21, "\u{064d}"),
    (22, "\u{0650}"),
    (23, "\u{0651}\u{064f}"),
    (24, "\u{064b}\u{0651}"),
    (25, "\u{064c}"),
    (26, "\u{064b}"),
    (27, "\u{0651}\u{0651}"),
];

static INPUT_IDS: Lazy<HashMap<char, i32>> = Lazy::new(|| INPUT_VOCAB.iter().copied().collect());

fn marks_for_class(class: usize) -> Option<&'static str> {
    if INVALID_CLASSES.contains(&class) {
        return None;
    }
    OUTPUT_VOCAB.iter().find(|&&(id, _)| id == class).map(|&(_, marks)| marks)
}

// ─── Model boundary ───────────────────────────────────────────────────────────

/// Per-position class scores returned by a [`DiacritizationModel`]
/// (`positions × classes`, row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    positions: usize,
    classes: usize,
    scores: Vec<f32>,
}

impl ClassScores {
    pub fn new(positions: usize, classes: usize, scores: Vec<f32>) -> Result<Self> {
        if positions.checked_mul(classes) != Some(scores.len()) {
            return Err(Error::restoration(format!(
                "model returned {} scores for {positions}×{classes}",
                scores.len()
            )));
        }
        Ok(Self { positions, classes, scores })
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Best class at `position`; ties and all-non-positive rows resolve to
    /// the lowest index.
    pub fn argmax(&self, position: usize) -> usize {
        let row = &self.scores[position * self.classes..(position + 1) * self.classes];
        let mut best = (0usize, 0.0f32);
        for (class, &score) in row.iter().enumerate() {
            if score > best.1 {
                best = (class, score);
            }
        }
        best.0
    }
}

/// A loaded sequence-labelling model.
///
/// `input_ids` always has [`MAX_INPUT_CHARS`] entries.
pub trait DiacritizationModel: Send + Sync {
    fn predict(&self, input_ids: &[f32]) -> Result<ClassScores>;
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Remove harakat, keeping every other character.
pub fn strip_harakat(text: &str) -> String {
    text.chars().filter(|c| !HARAKAT.contains(c)).collect()
}

/// Stripped text → fixed-width model input.
pub fn encode_input(stripped: &str) -> Vec<f32> {
    let mut ids: Vec<f32> = stripped
        .chars()
        .take(MAX_INPUT_CHARS)
        .map(|c| INPUT_IDS.get(&c).copied().unwrap_or(UNK_ID) as f32)
        .collect();
    ids.resize(MAX_INPUT_CHARS, PAD_ID as f32);
    ids
}

// ─── Restorer ─────────────────────────────────────────────────────────────────

/// Loaded once, then shared; `restore` takes `&self`.
pub struct Restorer {
    model: Box<dyn DiacritizationModel>,
}

impl std::fmt::Debug for Restorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Restorer").finish_non_exhaustive()
    }
}

impl Restorer {
    pub fn new(model: impl DiacritizationModel + 'static) -> Self {
        Self { model: Box::new(model) }
    }

    /// Load the ONNX tashkeel model at `path`.  Failure is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(crate::model::OnnxTashkeelModel::load(path)?))
    }

    /// Return `text` with predicted diacritics inserted.
    pub fn restore(&self, text: &str) -> Result<String> {
        let stripped = strip_harakat(text);
        let n_chars = stripped.chars().count();
        if n_chars > MAX_INPUT_CHARS {
            warn!(
                chars = n_chars,
                max = MAX_INPUT_CHARS,
                "tashkeel input truncated; tail left undiacritized"
            );
        }

        let scores = self.model.predict(&encode_input(&stripped))?;
        if scores.classes() == 0 {
            return Err(Error::restoration("model returned no classes"));
        }

        let mut out = String::with_capacity(stripped.len() * 2);
        for (i, c) in stripped.chars().enumerate() {
            out.push(c);
            if i < scores.positions() {
                if let Some(marks) = marks_for_class(scores.argmax(i)) {
                    out.push_str(marks);
                }
            }
        }

        debug!(chars = n_chars, "tashkeel restored");
        Ok(out)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSES: usize = 28;

    /// Predicts a fixed class per input id; padding gets class 0.
    struct LookupModel {
        by_input: HashMap<i32, usize>,
    }

    impl DiacritizationModel for LookupModel {
        fn predict(&self, input_ids: &[f32]) -> Result<ClassScores> {
            assert_eq!(input_ids.len(), MAX_INPUT_CHARS);
            let mut scores = vec![0.01f32; input_ids.len() * CLASSES];
            for (pos, &id) in input_ids.iter().enumerate() {
                let class = self.by_input.get(&(id as i32)).copied().unwrap_or(0);
                scores[pos * CLASSES + class] = 0.9;
            }
            ClassScores::new(input_ids.len(), CLASSES, scores)
        }
    }

    struct BrokenModel;

    impl DiacritizationModel for BrokenModel {
        fn predict(&self, _input_ids: &[f32]) -> Result<ClassScores> {
            ClassScores::new(MAX_INPUT_CHARS, CLASSES, vec![0.0; 3])
        }
    }

    /// م → fatha, ر → sukun, ح → fatha, ب → fathatan, ا → nothing.
    fn marhaban_model() -> Restorer {
        let by_input = HashMap::from([(48, 5), (65, 20), (86, 5), (118, 26), (68, 0)]);
        Restorer::new(LookupModel { by_input })
    }

    #[test]
    fn test_marhaban() {
        let out = marhaban_model().restore("مرحبا").unwrap();
        assert_eq!(out, "مَرْحَبًا");
    }

    #[test]
    fn test_deterministic() {
        let restorer = marhaban_model();
        let text = "مرحبا بكم";
        assert_eq!(restorer.restore(text).unwrap(), restorer.restore(text).unwrap());
    }

    #[test]
    fn test_existing_marks_replaced() {
        let restorer = marhaban_model();
        // Wrong marks on input are overwritten by the prediction.
        assert_eq!(restorer.restore("مُرِحبا").unwrap(), "مَرْحَبًا");
    }

    #[test]
    fn test_strip_and_encode() {
        assert_eq!(strip_harakat("مَرْحَبا"), "مرحبا");
        assert_eq!(strip_harakat("بً"), "بً");
        let ids = encode_input("مx");
        assert_eq!(ids.len(), MAX_INPUT_CHARS);
        assert_eq!(ids[0], 48.0);
        assert_eq!(ids[1], UNK_ID as f32);
        assert!(ids[2..].iter().all(|&id| id == PAD_ID as f32));
    }

    #[test]
    fn test_long_input_tail_passthrough() {
        let restorer = marhaban_model();
        let text = "م".repeat(MAX_INPUT_CHARS + 2);
        let out = restorer.restore(&text).unwrap();
        let expected = format!("{}{}", "مَ".repeat(MAX_INPUT_CHARS), "مم");
        assert_eq!(out, expected);
    }

    #[test]
    fn test_invalid_classes_insert_nothing() {
        assert_eq!(marks_for_class(UNK_ID as usize), None);
        assert_eq!(marks_for_class(8), None);
        assert_eq!(marks_for_class(0), None);
        assert_eq!(marks_for_class(26), Some("\u{064b}"));
    }

    #[test]
    fn test_malformed_output_is_restoration_error() {
        let err = Restorer::new(BrokenModel).restore("مرحبا").unwrap_err();
        assert!(matches!(err, Error::Restoration(_)));
    }

    #[test]
    fn test_argmax_ties_and_zero_rows() {
        let scores = ClassScores::new(2, 3, vec![0.0, 0.0, 0.0, 0.2, 0.5, 0.5]).unwrap();
        assert_eq!(scores.argmax(0), 0);
        assert_eq!(scores.argmax(1), 1);
    }

    #[test]
    fn test_vocab_ids_unique() {
        let mut ids: Vec<_> = INPUT_VOCAB.iter().map(|&(_, id)| id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), INPUT_VOCAB.len());
        assert!(ids.iter().all(|&id| id > UNK_ID));
    }
}
