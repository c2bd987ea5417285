//! ONNX Runtime backend for the tashkeel model.
//!
//! Uses [`ort`] for inference.  The model has a single input and output:
//!
//! | Name                | Shape                    | dtype   |
//! |---------------------|--------------------------|---------|
//! | `embedding_7_input` | `[1, 315]`               | float32 |
//! | `dense_7`           | `[1, 315, n_classes]`    | float32 |

use std::{path::Path, sync::Mutex};

use ort::{session::Session, value::Tensor};
use tracing::info;

use crate::{
    error::{Error, Result},
    tashkeel::{ClassScores, DiacritizationModel},
};

/// A loaded tashkeel model.  Inference is serialised through the session lock.
pub struct OnnxTashkeelModel {
    session: Mutex<Session>,
}

impl OnnxTashkeelModel {
    /// Load the model from an ONNX file.
    pub fn load(model_path: &Path) -> Result<Self> {
        let load_err = |e: ort::Error| Error::ModelLoad {
            path: model_path.to_path_buf(),
            message: e.to_string(),
        };

        if !model_path.is_file() {
            return Err(Error::ModelLoad {
                path: model_path.to_path_buf(),
                message: "file not found".into(),
            });
        }

        let session = Session::builder()
            .map_err(load_err)?
            .commit_from_file(model_path)
            .map_err(load_err)?;

        info!(path = %model_path.display(), "tashkeel model loaded");
        Ok(Self { session: Mutex::new(session) })
    }
}

impl DiacritizationModel for OnnxTashkeelModel {
    fn predict(&self, input_ids: &[f32]) -> Result<ClassScores> {
        let restoration = |e: ort::Error| Error::restoration(e.to_string());

        let t_input = Tensor::<f32>::from_array(([1usize, input_ids.len()], input_ids.to_vec()))
            .map_err(restoration)?;

        let mut session = self.session.lock().unwrap_or_else(|p| p.into_inner());
        let outputs = session.run(ort::inputs![t_input]).map_err(restoration)?;

        let (shape, scores) = outputs[0].try_extract_tensor::<f32>().map_err(restoration)?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        // Expected [1, positions, classes].
        let (positions, classes) = match dims.as_slice() {
            &[1, positions, classes] if positions >= 0 && classes >= 0 => {
                (positions as usize, classes as usize)
            }
            _ => {
                return Err(Error::restoration(format!(
                    "unexpected tashkeel output shape {dims:?}"
                )))
            }
        };

        ClassScores::new(positions, classes, scores.to_vec())
    }
}
