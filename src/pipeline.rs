//! [`Phonemizer`]: one handle over tables, engine and restorer.
//!
//! | Operation                                        | Needs                |
//! |--------------------------------------------------|----------------------|
//! | [`phonemize_linguistic`](Phonemizer::phonemize_linguistic) | an engine  |
//! | [`phonemize_codepoints`](Phonemizer::phonemize_codepoints) | nothing    |
//! | [`encode_linguistic`](Phonemizer::encode_linguistic)       | tables     |
//! | [`encode_codepoints`](Phonemizer::encode_codepoints)       | tables     |
//! | [`restore_diacritics`](Phonemizer::restore_diacritics)     | a restorer |
//!
//! Asking for a stage that was not configured is a
//! [`Configuration`](crate::Error::Configuration) error.  The handle is cheap
//! to clone and `Send + Sync`; the tally passed to the encoders is the
//! caller's own.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{Error, Result},
    ids::{phonemes_to_ids, utterance_to_ids, IdConfig, MissingPhonemes},
    phonemize::{self, EspeakConfig, PhonemeEngine},
    symbols::{PhonemeId, SymbolTables},
    tashkeel::Restorer,
    tokenize::{self, CodepointsConfig},
    Utterance,
};

#[derive(Clone)]
pub struct Phonemizer {
    tables: Arc<SymbolTables>,
    engine: Option<Arc<dyn PhonemeEngine>>,
    data_path: PathBuf,
    restorer: Option<Arc<Restorer>>,
    id_config: IdConfig,
}

impl fmt::Debug for Phonemizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phonemizer")
            .field("engine", &self.engine.is_some())
            .field("data_path", &self.data_path)
            .field("restorer", &self.restorer.is_some())
            .field("id_config", &self.id_config)
            .finish_non_exhaustive()
    }
}

impl Default for Phonemizer {
    fn default() -> Self {
        Self::new(SymbolTables::shared())
    }
}

impl Phonemizer {
    pub fn new(tables: Arc<SymbolTables>) -> Self {
        Self {
            tables,
            engine: None,
            data_path: PathBuf::new(),
            restorer: None,
            id_config: IdConfig::default(),
        }
    }

    /// Use `engine` for linguistic phonemisation, with its data under
    /// `data_path`.
    pub fn with_engine(self, engine: impl PhonemeEngine + 'static, data_path: impl Into<PathBuf>) -> Self {
        self.with_shared_engine(Arc::new(engine), data_path)
    }

    pub fn with_shared_engine(
        mut self,
        engine: Arc<dyn PhonemeEngine>,
        data_path: impl Into<PathBuf>,
    ) -> Self {
        self.engine = Some(engine);
        self.data_path = data_path.into();
        self
    }

    /// Use espeak-ng with the data directory at `data_path` (empty for the
    /// library default).
    #[cfg(feature = "espeak")]
    pub fn with_espeak(self, data_path: impl Into<PathBuf>) -> Self {
        self.with_engine(crate::espeak::EspeakEngine::new(), data_path)
    }

    pub fn with_restorer(self, restorer: Restorer) -> Self {
        self.with_shared_restorer(Arc::new(restorer))
    }

    pub fn with_shared_restorer(mut self, restorer: Arc<Restorer>) -> Self {
        self.restorer = Some(restorer);
        self
    }

    pub fn with_id_config(mut self, id_config: IdConfig) -> Self {
        self.id_config = id_config;
        self
    }

    pub fn tables(&self) -> &SymbolTables {
        &self.tables
    }

    pub fn id_config(&self) -> &IdConfig {
        &self.id_config
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn has_restorer(&self) -> bool {
        self.restorer.is_some()
    }

    // ── Phonemisation ─────────────────────────────────────────────────────────

    pub fn phonemize_linguistic(&self, text: &str, config: &EspeakConfig) -> Result<Utterance> {
        let engine = self
            .engine
            .as_deref()
            .ok_or_else(|| Error::configuration("no phoneme engine configured"))?;
        phonemize::phonemize_linguistic(engine, text, config, &self.data_path)
    }

    pub fn phonemize_codepoints(&self, text: &str, config: &CodepointsConfig) -> Utterance {
        tokenize::phonemize_codepoints(text, config)
    }

    // ── Encoding ──────────────────────────────────────────────────────────────

    /// Encode one sentence from the linguistic backend.
    pub fn encode_linguistic<S: AsRef<str>>(
        &self,
        sentence: &[S],
        missing: &mut MissingPhonemes,
    ) -> Vec<PhonemeId> {
        phonemes_to_ids(sentence, self.tables.linguistic(), &self.id_config, missing)
    }

    /// Encode one sentence from the codepoint backend with `language`'s table.
    pub fn encode_codepoints<S: AsRef<str>>(
        &self,
        sentence: &[S],
        language: &str,
        missing: &mut MissingPhonemes,
    ) -> Result<Vec<PhonemeId>> {
        let table = self.tables.codepoints(language)?;
        Ok(phonemes_to_ids(sentence, table, &self.id_config, missing))
    }

    pub fn encode_utterance_linguistic<S: AsRef<str>>(
        &self,
        utterance: &[Vec<S>],
        missing: &mut MissingPhonemes,
    ) -> Vec<Vec<PhonemeId>> {
        utterance_to_ids(utterance, self.tables.linguistic(), &self.id_config, missing)
    }

    pub fn encode_utterance_codepoints<S: AsRef<str>>(
        &self,
        utterance: &[Vec<S>],
        language: &str,
        missing: &mut MissingPhonemes,
    ) -> Result<Vec<Vec<PhonemeId>>> {
        let table = self.tables.codepoints(language)?;
        Ok(utterance_to_ids(utterance, table, &self.id_config, missing))
    }

    // ── Diacritization ────────────────────────────────────────────────────────

    pub fn restore_diacritics(&self, text: &str) -> Result<String> {
        self.restorer
            .as_deref()
            .ok_or_else(|| Error::configuration("no diacritization model loaded"))?
            .restore(text)
    }
}
