//! HuggingFace Hub downloader for the tashkeel model.
//!
//! Files are cached in the HuggingFace Hub cache directory
//! (`~/.cache/huggingface/hub` by default), so only the first call touches the
//! network.

use std::path::PathBuf;

use hf_hub::api::sync::Api;
use tracing::info;

use crate::{
    error::{Error, Result},
    tashkeel::Restorer,
};

/// Model filename used when the caller does not name one.
pub const DEFAULT_TASHKEEL_FILE: &str = "model.onnx";

/// Download `filename` from the model repository `repo_id` and return its
/// local path.
pub fn fetch_model(repo_id: &str, filename: &str) -> Result<PathBuf> {
    if repo_id.is_empty() || filename.is_empty() {
        return Err(Error::configuration("repository id and filename must not be empty"));
    }

    info!(repo = repo_id, file = filename, "fetching from HuggingFace Hub");
    let api = Api::new()
        .map_err(|e| Error::Download(format!("cannot initialise HuggingFace Hub client: {e}")))?;
    api.model(repo_id.to_string())
        .get(filename)
        .map_err(|e| Error::Download(format!("'{filename}' from '{repo_id}': {e}")))
}

/// Download a tashkeel ONNX model and load it.
///
/// ```no_run
/// let restorer = piper_phonemize::download::load_restorer_from_hub(
///     "my-org/libtashkeel",
///     None,
/// ).unwrap();
/// println!("{}", restorer.restore("مرحبا").unwrap());
/// ```
pub fn load_restorer_from_hub(repo_id: &str, filename: Option<&str>) -> Result<Restorer> {
    let path = fetch_model(repo_id, filename.unwrap_or(DEFAULT_TASHKEEL_FILE))?;
    Restorer::load(&path)
}
