//! Matchup resolution and prediction.
//!
//! Resolves both sides of a request, derives the feature row, checks it
//! against the model metadata and runs the classifier.

use crate::error::{InputError, PredictError};
use crate::features::{derive, FeatureVector, Side, TeamSeasonStats};
use crate::model::SharedModel;
use crate::schema::ModelMetadata;
use crate::teams::TeamTable;
use crate::types::{MatchPrediction, TeamInput};

/// A team with its resolved season stats.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTeam {
    pub name: Option<String>,
    pub stats: TeamSeasonStats,
}

impl ResolvedTeam {
    /// Name for display, falling back to the side.
    pub fn display_name(&self, side: Side) -> String {
        self.name.clone().unwrap_or_else(|| side.to_string())
    }
}

/// Resolve one side of a request against the season table.
pub fn resolve_team(teams: &TeamTable, input: &TeamInput) -> Result<ResolvedTeam, InputError> {
    match input {
        TeamInput::Name(name) => {
            let canonical = teams
                .canonical_name(name)
                .ok_or_else(|| InputError::UnknownTeam(name.clone()))?;
            Ok(ResolvedTeam {
                name: Some(canonical.to_string()),
                stats: teams.lookup(canonical)?.clone(),
            })
        }
        TeamInput::Stats(named) => Ok(ResolvedTeam {
            name: named.name.clone(),
            stats: named.stats.clone(),
        }),
    }
}

/// Guard against a team playing itself, then derive the feature row.
pub fn build_features(
    home: &ResolvedTeam,
    visitor: &ResolvedTeam,
) -> Result<FeatureVector, InputError> {
    if let (Some(h), Some(v)) = (&home.name, &visitor.name) {
        if h.trim().eq_ignore_ascii_case(v.trim()) {
            return Err(InputError::SameTeam(h.clone()));
        }
    }
    derive(&home.stats, &visitor.stats)
}

/// Runs the fitted classifier over derived features.
pub struct Predictor {
    model: SharedModel,
    metadata: ModelMetadata,
}

impl Predictor {
    pub fn new(model: SharedModel, metadata: ModelMetadata) -> Self {
        Self { model, metadata }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Predict the winner of a home/visitor matchup.
    pub fn predict(
        &self,
        home: &ResolvedTeam,
        visitor: &ResolvedTeam,
    ) -> Result<MatchPrediction, PredictError> {
        let features = build_features(home, visitor)?;
        self.metadata.check(&features)?;
        let input = self.metadata.encode(&features)?;

        let output = self.model.predict(input).map_err(PredictError::Prediction)?;

        let home_label = self.metadata.home_win_label;
        let visitor_label = if home_label == 0 { 1 } else { 0 };

        let winner = if output.label == home_label {
            Side::Home
        } else if output.label == visitor_label {
            Side::Visitor
        } else {
            return Err(PredictError::Prediction(anyhow::anyhow!(
                "Unexpected class label {} (home wins = {})",
                output.label,
                home_label
            )));
        };

        let probability = |label: i64| {
            output
                .probabilities
                .as_ref()
                .and_then(|p| usize::try_from(label).ok().and_then(|i| p.get(i).copied()))
        };

        let home_team = home.display_name(Side::Home);
        let visitor_team = visitor.display_name(Side::Visitor);

        tracing::debug!(
            "{} vs {}: label {} -> {} wins",
            home_team,
            visitor_team,
            output.label,
            winner
        );

        Ok(MatchPrediction {
            winner_team: match winner {
                Side::Home => home_team.clone(),
                Side::Visitor => visitor_team.clone(),
            },
            home_team,
            visitor_team,
            winner,
            label: output.label,
            home_win_probability: probability(home_label),
            visitor_win_probability: probability(visitor_label),
            features,
        })
    }
}
