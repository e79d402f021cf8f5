//! ONNX model loading and inference.

use anyhow::{Context, Result};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Raw classifier output for a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutput {
    /// Predicted class label
    pub label: i64,
    /// Class probabilities indexed by label, when the model exposes them
    pub probabilities: Option<Vec<f64>>,
}

/// A fitted binary classifier over encoded feature rows.
pub trait Classifier: Send + Sync {
    /// Predict the class of a `[1, n_columns]` input row.
    fn predict(&self, features: Array2<f32>) -> Result<ClassifierOutput>;
}

/// ONNX classifier exported from the training pipeline.
///
/// Output 0 is the label tensor, output 1 (when present) the
/// `[n_rows, n_classes]` probability tensor.
pub struct OnnxClassifier {
    session: Mutex<Session>,
}

impl OnnxClassifier {
    /// Load ONNX model from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .commit_from_file(path.as_ref())
            .with_context(|| format!("Failed to load ONNX model {}", path.as_ref().display()))?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: Array2<f32>) -> Result<ClassifierOutput> {
        if features.nrows() != 1 {
            anyhow::bail!("Expected a single input row, got {}", features.nrows());
        }

        let input_tensor = Tensor::from_array(features)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock session: {}", e))?;

        let outputs = session.run(ort::inputs![input_tensor])?;

        if outputs.len() == 0 {
            anyhow::bail!("Model produced no outputs");
        }

        let (_, labels) = outputs[0]
            .try_extract_tensor::<i64>()
            .context("Failed to extract label tensor")?;
        let label = *labels
            .first()
            .ok_or_else(|| anyhow::anyhow!("Empty label tensor"))?;

        // Classifiers exported without probabilities have a single output
        let probabilities = if outputs.len() >= 2 {
            let (shape, probs_data) = outputs[1]
                .try_extract_tensor::<f32>()
                .context("Failed to extract probability tensor")?;

            let shape_dims: Vec<i64> = shape.iter().copied().collect();
            if shape_dims.len() != 2 || shape_dims[1] < 2 {
                anyhow::bail!(
                    "Unexpected probability shape: {:?}, expected [1, n_classes]",
                    shape_dims
                );
            }

            let n_classes = shape_dims[1] as usize;
            Some(probs_data[..n_classes].iter().map(|&p| p as f64).collect())
        } else {
            None
        };

        Ok(ClassifierOutput {
            label,
            probabilities,
        })
    }
}

/// Thread-safe model handle for use in web handlers.
pub type SharedModel = Arc<dyn Classifier>;

/// Load the ONNX model into a shared handle.
pub fn create_shared_model<P: AsRef<Path>>(path: P) -> Result<SharedModel> {
    let model = OnnxClassifier::load(path)?;
    Ok(Arc::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_model_fails() {
        let result = OnnxClassifier::load("does/not/exist.onnx");
        assert!(result.is_err());
    }
}
