//! Error types for feature derivation and prediction.

use std::fmt;
use thiserror::Error;

use crate::features::Side;

/// Invalid raw team statistics or matchup.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("cannot compute win percentage with zero games played")]
    DivisionByZero,

    #[error("{side} team has no games played")]
    NoGamesPlayed { side: Side },

    #[error("{side} team has {wins} wins in {games_played} games")]
    WinsExceedGames {
        side: Side,
        wins: u32,
        games_played: u32,
    },

    #[error("{side} team has a non-finite {field}: {value}")]
    NonFiniteRating {
        side: Side,
        field: &'static str,
        value: f64,
    },

    #[error("{side} team has a {field} of {value} in {games_played} games")]
    StreakExceedsGames {
        side: Side,
        field: &'static str,
        value: i32,
        games_played: u32,
    },

    #[error("home and visitor are the same team: {0}")]
    SameTeam(String),

    #[error("unknown team: {0}")]
    UnknownTeam(String),

    #[error("missing team stat fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("team {team} has no value for {field}")]
    MissingValue { team: String, field: String },
}

/// Produced feature names do not match the model's declared feature list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaMismatch {
    /// Expected by the model but not produced
    pub missing: Vec<String>,
    /// Produced but not expected by the model
    pub unexpected: Vec<String>,
    /// Listed more than once in the model's feature list
    pub duplicated: Vec<String>,
    /// Drop columns that are not in the model's feature list
    pub unknown_drops: Vec<String>,
}

impl SchemaMismatch {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.duplicated.is_empty()
            && self.unknown_drops.is_empty()
    }
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feature schema mismatch")?;
        if !self.missing.is_empty() {
            write!(f, "; missing: [{}]", self.missing.join(", "))?;
        }
        if !self.unexpected.is_empty() {
            write!(f, "; unexpected: [{}]", self.unexpected.join(", "))?;
        }
        if !self.duplicated.is_empty() {
            write!(f, "; duplicated: [{}]", self.duplicated.join(", "))?;
        }
        if !self.unknown_drops.is_empty() {
            write!(f, "; unknown drop columns: [{}]", self.unknown_drops.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaMismatch {}

/// Errors surfaced by the predictor.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    #[error("feature {feature} has value {value:?} outside the model's categories")]
    UnknownCategory { feature: String, value: String },

    #[error("feature {0} is not numeric")]
    NotNumeric(String),

    #[error("model prediction failed: {0:#}")]
    Prediction(#[source] anyhow::Error),
}
