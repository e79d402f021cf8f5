//! Model metadata: the feature contract of the exported pipeline.
//!
//! The metadata file lists the columns the pipeline was fit on, the columns its
//! preprocessing drops before the estimator, and the ordinal order of each
//! categorical column. Encoding a [`FeatureVector`] for the ONNX graph goes
//! through here.

use anyhow::Context;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{PredictError, SchemaMismatch};
use crate::features::{FeatureValue, FeatureVector, QualityLabel, FEATURE_NAMES};

fn default_home_win_label() -> i64 {
    1
}

fn default_features() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_categories() -> HashMap<String, Vec<String>> {
    let ladder: Vec<String> = QualityLabel::LADDER
        .iter()
        .map(|l| l.as_str().to_string())
        .collect();
    HashMap::from([
        ("home_quality".to_string(), ladder.clone()),
        ("visitor_quality".to_string(), ladder),
    ])
}

/// Declarative description of the fitted pipeline.
///
/// JSON format:
/// ```json
/// {
///   "name": "logreg_no_percents",
///   "features": ["home_game_number", "..."],
///   "drop_columns": ["home_wins_percent", "visitor_wins_percent"],
///   "categories": {"home_quality": ["Muy Débil", "Débil", "Promedio", "Fuerte", "Muy Fuerte"]},
///   "home_win_label": 1
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    /// Columns the pipeline expects, in input order
    #[serde(default = "default_features")]
    pub features: Vec<String>,
    /// Columns discarded by preprocessing before the estimator
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Ordinal category order per categorical column
    #[serde(default = "default_categories")]
    pub categories: HashMap<String, Vec<String>>,
    /// Class label meaning "home team wins"
    #[serde(default = "default_home_win_label")]
    pub home_win_label: i64,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            name: None,
            trained_at: None,
            features: default_features(),
            drop_columns: Vec::new(),
            categories: default_categories(),
            home_win_label: default_home_win_label(),
        }
    }
}

impl ModelMetadata {
    /// Load metadata from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model metadata {}", path.display()))?;
        let metadata: ModelMetadata = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model metadata {}", path.display()))?;
        Ok(metadata)
    }

    /// Compare produced column names with the declared feature list.
    ///
    /// Also rejects a feature list with repeated names and drop columns the
    /// list does not contain.
    pub fn check(&self, features: &FeatureVector) -> Result<(), SchemaMismatch> {
        let produced: BTreeSet<&str> = features.names().iter().copied().collect();
        let mut expected = BTreeSet::new();
        let mut duplicated = BTreeSet::new();
        for name in &self.features {
            if !expected.insert(name.as_str()) {
                duplicated.insert(name.as_str());
            }
        }

        let mismatch = SchemaMismatch {
            missing: expected
                .difference(&produced)
                .map(|s| s.to_string())
                .collect(),
            unexpected: produced
                .difference(&expected)
                .map(|s| s.to_string())
                .collect(),
            duplicated: duplicated.into_iter().map(String::from).collect(),
            unknown_drops: self
                .drop_columns
                .iter()
                .filter(|c| !expected.contains(c.as_str()))
                .cloned()
                .collect(),
        };

        if mismatch.is_empty() {
            Ok(())
        } else {
            Err(mismatch)
        }
    }

    /// Columns that reach the estimator, in declared order.
    pub fn model_columns(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|f| !self.drop_columns.contains(f))
            .map(String::as_str)
            .collect()
    }

    /// Encode a feature row as the estimator's `[1, n]` input tensor.
    pub fn encode(&self, features: &FeatureVector) -> Result<Array2<f32>, PredictError> {
        let columns: HashMap<&str, FeatureValue> = features.columns().into_iter().collect();
        let model_columns = self.model_columns();
        let mut input = Array2::<f32>::zeros((1, model_columns.len()));

        for (j, name) in model_columns.iter().enumerate() {
            let value = columns.get(name).ok_or_else(|| SchemaMismatch {
                missing: vec![name.to_string()],
                ..SchemaMismatch::default()
            })?;
            input[[0, j]] = self.encode_value(name, value)?;
        }

        Ok(input)
    }

    fn encode_value(&self, name: &str, value: &FeatureValue) -> Result<f32, PredictError> {
        match value {
            FeatureValue::Number(v) => {
                if self.categories.contains_key(name) {
                    return Err(PredictError::UnknownCategory {
                        feature: name.to_string(),
                        value: v.to_string(),
                    });
                }
                Ok(*v as f32)
            }
            FeatureValue::Category(label) => {
                let order = self
                    .categories
                    .get(name)
                    .ok_or_else(|| PredictError::NotNumeric(name.to_string()))?;
                order
                    .iter()
                    .position(|c| c == label.as_str())
                    .map(|i| i as f32)
                    .ok_or_else(|| PredictError::UnknownCategory {
                        feature: name.to_string(),
                        value: label.to_string(),
                    })
            }
        }
    }
}
