//! C FFI: phonemisation, id encoding and tashkeel for non-Rust callers.
//!
//! Functions are `#[no_mangle] extern "C"`; structured results are returned as
//! UTF-8 JSON strings so that Swift / Kotlin / Python callers need nothing but
//! a JSON parser.
//!
//! ## Memory contract
//!
//! | Function                            | Caller frees with          |
//! |-------------------------------------|----------------------------|
//! | [`piper_phonemize_codepoints`]      | [`piper_free_string`]      |
//! | `piper_phonemize_espeak`            | [`piper_free_string`]      |
//! | [`piper_phoneme_ids_codepoints`]    | [`piper_free_string`]      |
//! | [`piper_phoneme_ids_espeak`]        | [`piper_free_string`]      |
//! | [`piper_tashkeel_load`]             | [`piper_tashkeel_free`]    |
//! | [`piper_tashkeel_run`]              | [`piper_free_string`]      |
//!
//! Every function returns `NULL` on failure and logs the reason.

use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::{
    ids::{phonemes_to_ids, IdConfig, MissingPhonemes},
    normalize::Casing,
    symbols::{PhonemeId, SymbolTable, SymbolTables},
    tashkeel::Restorer,
    tokenize::{phonemize_codepoints, CodepointsConfig},
};

/// Opaque handle to a loaded tashkeel model.
pub struct PiperTashkeelHandle {
    restorer: Restorer,
}

/// JSON shape returned by the id encoders.
#[derive(Serialize)]
struct EncodedSentence<'a> {
    phoneme_ids: Vec<PhonemeId>,
    missing: &'a MissingPhonemes,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Borrowed C string → owned `String`; `None` for NULL.
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Heap-allocate an owned C string.  Returns null on interior nul bytes.
fn to_c_str(s: &str) -> *const c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => std::ptr::null(),
    }
}

fn to_json<T: Serialize>(value: &T) -> *const c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_c_str(&json),
        Err(e) => {
            warn!("ffi: cannot serialise result: {e}");
            std::ptr::null()
        }
    }
}

fn encode_json(phonemes_json: &str, table: &SymbolTable) -> *const c_char {
    let phonemes: Vec<String> = match serde_json::from_str(phonemes_json) {
        Ok(p) => p,
        Err(e) => {
            warn!("ffi: phonemes must be a JSON array of strings: {e}");
            return std::ptr::null();
        }
    };
    let mut missing = MissingPhonemes::new();
    let phoneme_ids = phonemes_to_ids(&phonemes, table, &IdConfig::default(), &mut missing);
    to_json(&EncodedSentence { phoneme_ids, missing: &missing })
}

// ─── Phonemisation ───────────────────────────────────────────────────────────

/// Split `text` into codepoint tokens.
///
/// @param text    UTF-8 text.
/// @param casing  `"ignore"`, `"lower"`, `"upper"`, `"fold"`, or `NULL` for fold.
/// @return        JSON `[["t","o","k"]]` (always one sentence).
#[no_mangle]
pub unsafe extern "C" fn piper_phonemize_codepoints(
    text: *const c_char,
    casing: *const c_char,
) -> *const c_char {
    let Some(text) = (unsafe { cstr_to_string(text) }) else {
        warn!("ffi: piper_phonemize_codepoints: null text");
        return std::ptr::null();
    };
    let casing = match unsafe { cstr_to_string(casing) } {
        None => Casing::default(),
        Some(s) => match s.parse::<Casing>() {
            Ok(c) => c,
            Err(e) => {
                warn!("ffi: {e}");
                return std::ptr::null();
            }
        },
    };
    to_json(&phonemize_codepoints(&text, &CodepointsConfig::with_casing(casing)))
}

/// Phonemise `text` with espeak-ng.
///
/// @param text       UTF-8 text.
/// @param voice      espeak-ng voice, e.g. `"en-us"`.
/// @param data_path  Directory holding `espeak-ng-data/`, or `NULL` for the
///                   library default.
/// @return           JSON array of sentences of phoneme tokens.
#[cfg(feature = "espeak")]
#[no_mangle]
pub unsafe extern "C" fn piper_phonemize_espeak(
    text: *const c_char,
    voice: *const c_char,
    data_path: *const c_char,
) -> *const c_char {
    let (Some(text), Some(voice)) = (unsafe { cstr_to_string(text) }, unsafe {
        cstr_to_string(voice)
    }) else {
        warn!("ffi: piper_phonemize_espeak: null argument");
        return std::ptr::null();
    };
    let data_path = unsafe { cstr_to_string(data_path) }.unwrap_or_default();

    match crate::phonemize::phonemize_linguistic(
        &crate::espeak::EspeakEngine::new(),
        &text,
        &crate::phonemize::EspeakConfig::new(voice),
        Path::new(&data_path),
    ) {
        Ok(utterance) => to_json(&utterance),
        Err(e) => {
            warn!("ffi: espeak phonemisation failed: {e}");
            std::ptr::null()
        }
    }
}

// ─── Id encoding ─────────────────────────────────────────────────────────────

/// Encode one sentence of codepoint tokens with `language`'s built-in table.
///
/// @param language       e.g. `"uk"`.
/// @param phonemes_json  JSON array of tokens, e.g. `["в","е"]`.
/// @return               JSON `{"phoneme_ids":[…],"missing":{"tok":n}}`.
#[no_mangle]
pub unsafe extern "C" fn piper_phoneme_ids_codepoints(
    language: *const c_char,
    phonemes_json: *const c_char,
) -> *const c_char {
    let (Some(language), Some(phonemes)) = (unsafe { cstr_to_string(language) }, unsafe {
        cstr_to_string(phonemes_json)
    }) else {
        warn!("ffi: piper_phoneme_ids_codepoints: null argument");
        return std::ptr::null();
    };
    let tables = SymbolTables::shared();
    match tables.codepoints(&language) {
        Ok(table) => encode_json(&phonemes, table),
        Err(e) => {
            warn!("ffi: {e}");
            std::ptr::null()
        }
    }
}

/// Encode one sentence of espeak-ng phonemes with the built-in IPA table.
///
/// @param phonemes_json  JSON array of tokens.
/// @return               JSON `{"phoneme_ids":[…],"missing":{"tok":n}}`.
#[no_mangle]
pub unsafe extern "C" fn piper_phoneme_ids_espeak(phonemes_json: *const c_char) -> *const c_char {
    let Some(phonemes) = (unsafe { cstr_to_string(phonemes_json) }) else {
        warn!("ffi: piper_phoneme_ids_espeak: null argument");
        return std::ptr::null();
    };
    encode_json(&phonemes, SymbolTables::shared().linguistic())
}

// ─── Tashkeel ────────────────────────────────────────────────────────────────

/// Load a tashkeel ONNX model.
///
/// @param model_path  UTF-8 path to the `.onnx` file.
/// @return            Handle, or `NULL` on failure.  Free with
///                    [`piper_tashkeel_free`].
#[no_mangle]
pub unsafe extern "C" fn piper_tashkeel_load(model_path: *const c_char) -> *mut PiperTashkeelHandle {
    let Some(path) = (unsafe { cstr_to_string(model_path) }) else {
        warn!("ffi: piper_tashkeel_load: null path");
        return std::ptr::null_mut();
    };
    match Restorer::load(Path::new(&path)) {
        Ok(restorer) => Box::into_raw(Box::new(PiperTashkeelHandle { restorer })),
        Err(e) => {
            warn!("ffi: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Diacritize `text`.
///
/// @return  Heap-allocated UTF-8 text, or `NULL` on failure.
#[no_mangle]
pub unsafe extern "C" fn piper_tashkeel_run(
    handle: *const PiperTashkeelHandle,
    text: *const c_char,
) -> *const c_char {
    if handle.is_null() {
        warn!("ffi: piper_tashkeel_run: null handle");
        return std::ptr::null();
    }
    let Some(text) = (unsafe { cstr_to_string(text) }) else {
        warn!("ffi: piper_tashkeel_run: null text");
        return std::ptr::null();
    };
    let h = unsafe { &*handle };
    match h.restorer.restore(&text) {
        Ok(out) => to_c_str(&out),
        Err(e) => {
            warn!("ffi: {e}");
            std::ptr::null()
        }
    }
}

/// Destroy a tashkeel handle.
#[no_mangle]
pub unsafe extern "C" fn piper_tashkeel_free(handle: *mut PiperTashkeelHandle) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// Free any string returned by this API.
#[no_mangle]
pub unsafe extern "C" fn piper_free_string(s: *const c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s as *mut c_char) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Take ownership of a returned string.
    fn take(ptr: *const c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
        unsafe { piper_free_string(ptr) };
        Some(s)
    }

    #[test]
    fn test_codepoints_json() {
        let text = CString::new("ВЕСЕ́ЛКА").unwrap();
        let out = take(unsafe { piper_phonemize_codepoints(text.as_ptr(), std::ptr::null()) });
        let utt: Vec<Vec<String>> = serde_json::from_str(&out.unwrap()).unwrap();
        assert_eq!(utt, vec![vec!["в", "е", "с", "е", "\u{0301}", "л", "к", "а"]]);

        let bad = CString::new("sideways").unwrap();
        assert!(take(unsafe { piper_phonemize_codepoints(text.as_ptr(), bad.as_ptr()) }).is_none());
    }

    #[test]
    fn test_ids_codepoints_json() {
        let lang = CString::new("uk").unwrap();
        let phonemes = CString::new(r#"["в","е","с","е","́","л","к","а"]"#).unwrap();
        let out = take(unsafe { piper_phoneme_ids_codepoints(lang.as_ptr(), phonemes.as_ptr()) });
        let value: serde_json::Value = serde_json::from_str(&out.unwrap()).unwrap();
        assert_eq!(
            value["phoneme_ids"],
            serde_json::json!([1, 0, 14, 0, 18, 0, 33, 0, 18, 0, 45, 0, 27, 0, 26, 0, 12, 0, 2])
        );
        assert_eq!(value["missing"], serde_json::json!({}));
    }

    #[test]
    fn test_ids_espeak_reports_missing() {
        let phonemes = CString::new(r#"["\u0000","\u0000","\u0000"]"#).unwrap();
        let out = take(unsafe { piper_phoneme_ids_espeak(phonemes.as_ptr()) });
        let value: serde_json::Value = serde_json::from_str(&out.unwrap()).unwrap();
        assert_eq!(value["phoneme_ids"], serde_json::json!([1, 0, 2]));
        assert_eq!(value["missing"]["\u{0000}"], 3);
    }

    #[test]
    fn test_null_and_bad_arguments() {
        assert!(take(unsafe { piper_phoneme_ids_espeak(std::ptr::null()) }).is_none());
        let not_json = CString::new("[1,2").unwrap();
        assert!(take(unsafe { piper_phoneme_ids_espeak(not_json.as_ptr()) }).is_none());
        let lang = CString::new("xx").unwrap();
        let phonemes = CString::new("[]").unwrap();
        assert!(
            take(unsafe { piper_phoneme_ids_codepoints(lang.as_ptr(), phonemes.as_ptr()) }).is_none()
        );
        assert!(unsafe { piper_tashkeel_load(std::ptr::null()) }.is_null());
        assert!(take(unsafe { piper_tashkeel_run(std::ptr::null(), not_json.as_ptr()) }).is_none());
        unsafe { piper_tashkeel_free(std::ptr::null_mut()) };
    }
}
