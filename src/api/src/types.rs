//! Request and response types for the prediction API.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::features::{FeatureVector, Side, TeamSeasonStats};

/// One side of a matchup: a team name from the season table, or raw stats.
#[derive(Debug, Clone)]
pub enum TeamInput {
    Name(String),
    Stats(NamedTeamStats),
}

// Hand-written so a bad stats object reports the offending field.
impl<'de> Deserialize<'de> for TeamInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(name) => Ok(TeamInput::Name(name)),
            value @ Value::Object(_) => NamedTeamStats::deserialize(value)
                .map(TeamInput::Stats)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "expected a team name or a stats object, got {}",
                other
            ))),
        }
    }
}

/// Raw season stats with an optional display name.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedTeamStats {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub stats: TeamSeasonStats,
}

/// Prediction (or feature) request for a single game
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub home: TeamInput,
    pub visitor: TeamInput,
}

/// Derived features for a matchup
#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub home_team: String,
    pub visitor_team: String,
    pub features: FeatureVector,
}

/// Prediction result for a matchup
#[derive(Debug, Clone, Serialize)]
pub struct MatchPrediction {
    pub home_team: String,
    pub visitor_team: String,
    pub winner: Side,
    pub winner_team: String,
    /// Raw class label returned by the classifier
    pub label: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_win_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_win_probability: Option<f64>,
    pub features: FeatureVector,
}

/// Team list response
#[derive(Debug, Serialize)]
pub struct TeamsResponse {
    pub teams: Vec<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Model info response
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
    pub num_features: usize,
    pub feature_names: Vec<String>,
    pub drop_columns: Vec<String>,
    pub model_columns: Vec<String>,
    pub home_win_label: i64,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
