//! Error type shared by every stage of the pipeline.
//!
//! | Variant          | Raised by                                   | Recoverable |
//! |------------------|---------------------------------------------|-------------|
//! | `Configuration`  | unknown voice / language, bad data path     | per call    |
//! | `InvalidInput`   | text the engine cannot accept (NUL bytes)   | per call    |
//! | `Restoration`    | malformed tashkeel input or model output    | per call    |
//! | `SymbolTable`    | unreadable or invalid id table              | fatal       |
//! | `ModelLoad`      | ONNX model cannot be opened                 | fatal       |
//!
//! Symbols missing from a table are *not* errors: they are counted in
//! [`MissingPhonemes`](crate::ids::MissingPhonemes) and dropped.

use std::path::PathBuf;

/// Main error type for phonemisation, encoding and restoration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad voice, language or resource path.  Never retried internally.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input text cannot be handed to a backend (e.g. interior NUL byte).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The diacritization model rejected the input or produced garbage.
    #[error("restoration failed: {0}")]
    Restoration(String),

    /// A phoneme/id table could not be loaded or violates its invariants.
    #[error("invalid symbol table: {0}")]
    SymbolTable(String),

    /// The diacritization model could not be loaded.
    #[error("model load failed for {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    /// Fetching a model file from the HuggingFace Hub failed.
    #[error("download failed: {0}")]
    Download(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn restoration(msg: impl Into<String>) -> Self {
        Self::Restoration(msg.into())
    }

    pub fn symbol_table(msg: impl Into<String>) -> Self {
        Self::SymbolTable(msg.into())
    }

    /// `true` for errors that leave the process unable to continue
    /// (table or model data is unusable).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SymbolTable(_) | Self::ModelLoad { .. })
    }
}
