//! [`PhonemeEngine`] backed by the `libespeak-ng` C library.
//!
//! Calls the espeak-ng C API directly instead of spawning a subprocess, so it
//! also works where `fork`/`exec` is forbidden (iOS) or no `espeak-ng` binary
//! exists (Android).  Linking is handled by `build.rs` when the `espeak`
//! feature is enabled.
//!
//! espeak-ng keeps global state: every call is serialised through one lock and
//! the library is initialised once per process, with the first data path that
//! initialises successfully.  Asking for a different data path afterwards is a
//! configuration error.

use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_int, c_void},
    path::{Path, PathBuf},
    sync::Mutex,
};

use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    error::{Error, Result},
    normalize::decompose,
    phonemize::{clause_terminator, Clause, PhonemeEngine},
};

// ─── FFI bindings ─────────────────────────────────────────────────────────────

extern "C" {
    /// Set the directory that contains `espeak-ng-data/`.
    /// `NULL` selects the library's compiled-in default.
    fn espeak_ng_InitializePath(path: *const c_char);

    /// Initialise the phoneme tables.  Returns ENS_OK (0) on success.
    fn espeak_ng_Initialize(context: *mut c_void) -> c_int;

    /// Select the voice.  Returns EE_OK (0) on success.
    fn espeak_ng_SetVoiceByName(name: *const c_char) -> c_int;

    /// Translate one clause of text to phonemes.
    ///
    /// `textptr` is advanced past the clause, or set to `NULL` once the whole
    /// text is consumed.  The returned buffer is overwritten by the next call.
    fn espeak_TextToPhonemes(
        textptr: *mut *const c_void,
        textmode: c_int,
        phonememode: c_int,
    ) -> *const c_char;
}

/// `textmode` value: input is UTF-8.
const CHARS_UTF8: c_int = 1;

/// `phonememode` value: output IPA (bit 1 set).
const PHONEMES_IPA: c_int = 0x02;

// ─── Global state ─────────────────────────────────────────────────────────────

/// Serialises every call into the espeak-ng library.
static LOCK: Mutex<()> = Mutex::new(());

/// Data path the library was initialised with.  Unset until the first
/// successful initialisation, so a bad path can be corrected and retried.
static INITIALIZED: OnceCell<PathBuf> = OnceCell::new();

/// An empty path means "use the compiled-in default"; anything else must be
/// an existing directory.
fn check_data_path(data_path: &Path) -> Result<()> {
    if !data_path.as_os_str().is_empty() && !data_path.is_dir() {
        return Err(Error::configuration(format!(
            "espeak-ng data directory not found: {}",
            data_path.display()
        )));
    }
    Ok(())
}

/// Must be called with [`LOCK`] held.
fn ensure_initialized(data_path: &Path) -> Result<()> {
    check_data_path(data_path)?;

    if let Some(current) = INITIALIZED.get() {
        if current != data_path {
            return Err(Error::configuration(format!(
                "espeak-ng is already initialised with {}; cannot switch to {}",
                current.display(),
                data_path.display()
            )));
        }
        return Ok(());
    }

    let path_cstr = if data_path.as_os_str().is_empty() {
        None
    } else {
        Some(CString::new(data_path.to_string_lossy().as_bytes()).map_err(|_| {
            Error::configuration("espeak-ng data path contains a null byte")
        })?)
    };
    let path_ptr: *const c_char = path_cstr.as_ref().map_or(std::ptr::null(), |c| c.as_ptr());

    // SAFETY: `path_ptr` is NULL or a valid C string outliving both calls;
    // access is serialised by LOCK.
    let status = unsafe {
        espeak_ng_InitializePath(path_ptr);
        espeak_ng_Initialize(std::ptr::null_mut())
    };
    if status != 0 {
        return Err(Error::configuration(format!(
            "espeak_ng_Initialize failed for {} (status {:#010x})",
            data_path.display(),
            status
        )));
    }

    info!(data_path = %data_path.display(), "espeak-ng initialised");
    let _ = INITIALIZED.set(data_path.to_path_buf());
    Ok(())
}

// ─── Engine ───────────────────────────────────────────────────────────────────

/// The espeak-ng engine.  Zero-sized: all state lives in the C library.
#[derive(Debug, Default, Clone, Copy)]
pub struct EspeakEngine;

impl EspeakEngine {
    pub fn new() -> Self {
        Self
    }

    /// `true` if espeak-ng initialises with `data_path`.
    pub fn is_available(data_path: &Path) -> bool {
        let _guard = LOCK.lock().unwrap_or_else(|p| p.into_inner());
        ensure_initialized(data_path).is_ok()
    }
}

impl PhonemeEngine for EspeakEngine {
    fn clauses(&self, text: &str, voice: &str, data_path: &Path) -> Result<Vec<Clause>> {
        let _guard = LOCK.lock().unwrap_or_else(|p| p.into_inner());
        ensure_initialized(data_path)?;

        let voice_c = CString::new(voice)
            .map_err(|_| Error::configuration("voice name contains a null byte"))?;
        // SAFETY: valid C string; serialised by LOCK.
        let rc = unsafe { espeak_ng_SetVoiceByName(voice_c.as_ptr()) };
        if rc != 0 {
            return Err(Error::configuration(format!("unknown espeak-ng voice '{voice}'")));
        }

        let text_c = CString::new(text)
            .map_err(|_| Error::invalid_input("text contains a null byte"))?;
        let base = text_c.as_ptr() as usize;

        // Cursor that espeak_TextToPhonemes advances one clause at a time.
        let mut current: *const c_void = text_c.as_ptr() as *const c_void;
        let mut clauses = Vec::new();

        while !current.is_null() {
            // SAFETY: `current` points into `text_c`, which outlives the loop.
            let phonemes_ptr =
                unsafe { espeak_TextToPhonemes(&mut current, CHARS_UTF8, PHONEMES_IPA) };

            // Copy out before the next call overwrites the internal buffer.
            let phonemes = if phonemes_ptr.is_null() {
                String::new()
            } else {
                // SAFETY: non-null pointer to a NUL-terminated buffer owned by espeak-ng.
                unsafe { CStr::from_ptr(phonemes_ptr) }
                    .to_str()
                    .map_err(|_| Error::invalid_input("espeak-ng returned non-UTF-8 phonemes"))?
                    .to_owned()
            };

            let cursor = (!current.is_null()).then(|| (current as usize).saturating_sub(base));
            clauses.push(Clause {
                // Decompose, e.g. "ç" -> "c" + U+0327
                phonemes: decompose(&phonemes),
                terminator: clause_terminator(text, cursor),
            });
        }

        Ok(clauses)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
