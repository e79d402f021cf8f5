//! API route handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{InputError, PredictError};
use crate::features::Side;
use crate::predictor::{build_features, resolve_team, Predictor, ResolvedTeam};
use crate::teams::TeamTable;
use crate::types::{
    ErrorResponse, FeaturesResponse, HealthResponse, MatchPrediction, ModelInfoResponse,
    PredictRequest, TeamsResponse,
};

/// Application state shared across handlers.
pub struct AppState {
    pub predictor: Predictor,
    pub teams: TeamTable,
    pub config: AppConfig,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::UnknownTeam(_) => ApiError::not_found(err.to_string()),
            _ => ApiError::bad_request(err.to_string()),
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Input(input) => input.into(),
            other => {
                tracing::error!("Prediction failed: {}", other);
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Model info endpoint.
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfoResponse> {
    let metadata = state.predictor.metadata();
    Json(ModelInfoResponse {
        model_path: state.config.model.path.clone(),
        name: metadata.name.clone(),
        trained_at: metadata.trained_at,
        num_features: metadata.features.len(),
        feature_names: metadata.features.clone(),
        drop_columns: metadata.drop_columns.clone(),
        model_columns: metadata
            .model_columns()
            .into_iter()
            .map(String::from)
            .collect(),
        home_win_label: metadata.home_win_label,
    })
}

/// Team list endpoint.
pub async fn teams(State(state): State<Arc<AppState>>) -> Json<TeamsResponse> {
    Json(TeamsResponse {
        teams: state.teams.names().into_iter().map(String::from).collect(),
    })
}

fn resolve_matchup(
    teams: &TeamTable,
    req: &PredictRequest,
) -> Result<(ResolvedTeam, ResolvedTeam), ApiError> {
    let home = resolve_team(teams, &req.home)?;
    let visitor = resolve_team(teams, &req.visitor)?;
    Ok((home, visitor))
}

/// Feature derivation endpoint.
pub async fn features(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<FeaturesResponse>, ApiError> {
    let Json(req) = payload?;
    let (home, visitor) = resolve_matchup(&state.teams, &req)?;
    let features = build_features(&home, &visitor)?;

    Ok(Json(FeaturesResponse {
        home_team: home.display_name(Side::Home),
        visitor_team: visitor.display_name(Side::Visitor),
        features,
    }))
}

/// Prediction endpoint.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<MatchPrediction>, ApiError> {
    let Json(req) = payload?;
    let (home, visitor) = resolve_matchup(&state.teams, &req)?;

    // ONNX inference is synchronous
    let prediction = tokio::task::spawn_blocking(move || state.predictor.predict(&home, &visitor))
        .await
        .map_err(|e| ApiError::internal(format!("prediction task failed: {}", e)))??;

    tracing::info!(
        "Predicted {} vs {}: {} wins",
        prediction.home_team,
        prediction.visitor_team,
        prediction.winner_team
    );

    Ok(Json(prediction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaMismatch;
    use crate::model::{Classifier, ClassifierOutput};
    use crate::schema::ModelMetadata;
    use axum::body::to_bytes;
    use ndarray::Array2;

    struct HomeWins;

    impl Classifier for HomeWins {
        fn predict(&self, _features: Array2<f32>) -> anyhow::Result<ClassifierOutput> {
            Ok(ClassifierOutput {
                label: 1,
                probabilities: Some(vec![0.3, 0.7]),
            })
        }
    }

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            predictor: Predictor::new(Arc::new(HomeWins), ModelMetadata::default()),
            teams: TeamTable::default(),
            config: AppConfig::default(),
        })
    }

    async fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    const RAW_MATCHUP: &str = r#"{
        "home": {"name": "Celtics", "offensive_rating": 115.0, "defensive_rating": 108.0,
                 "wins": 50, "games_played": 60, "streak": 3},
        "visitor": {"name": "Heat", "offensive_rating": 108.0, "defensive_rating": 112.0,
                    "wins": 35, "games_played": 60, "streak": -2}
    }"#;

    #[tokio::test]
    async fn test_missing_stat_is_bad_request_with_json_body() {
        let body = r#"{
            "home": {"offensive_rating": 115.0, "wins": 50, "games_played": 60, "streak": 3},
            "visitor": "Miami Heat"
        }"#;
        let payload = Json::<PredictRequest>::from_bytes(body.as_bytes());
        let err = predict(State(state()), payload).await.unwrap_err();

        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "400 Bad Request");
        assert!(json["message"].as_str().unwrap().contains("defensive_rating"));
    }

    #[tokio::test]
    async fn test_negative_stat_is_bad_request() {
        let body = RAW_MATCHUP.replace("\"wins\": 35", "\"wins\": -35");
        let payload = Json::<PredictRequest>::from_bytes(body.as_bytes());
        let err = features(State(state()), payload).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_handler_runs_model() {
        let payload = Json::<PredictRequest>::from_bytes(RAW_MATCHUP.as_bytes());
        let Json(prediction) = predict(State(state()), payload).await.unwrap();

        assert_eq!(prediction.winner, Side::Home);
        assert_eq!(prediction.winner_team, "Celtics");
        assert_eq!(prediction.home_win_probability, Some(0.7));
    }

    #[tokio::test]
    async fn test_unknown_team_is_not_found() {
        let body = r#"{"home": "Boston Celtics", "visitor": "Miami Heat"}"#;
        let payload = Json::<PredictRequest>::from_bytes(body.as_bytes());
        let err = features(State(state()), payload).await.unwrap_err();

        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "unknown team: Boston Celtics");
    }

    #[test]
    fn test_input_errors_map_to_client_status() {
        let err: ApiError = InputError::SameTeam("Miami Heat".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = InputError::UnknownTeam("Nets".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "unknown team: Nets");

        let err: ApiError = PredictError::Input(InputError::NoGamesPlayed { side: Side::Home }).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_side_errors_map_to_internal() {
        let err: ApiError = PredictError::Schema(SchemaMismatch {
            missing: vec!["home_last_10".to_string()],
            ..SchemaMismatch::default()
        })
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("home_last_10"));

        let err: ApiError = PredictError::Prediction(anyhow::anyhow!("session poisoned")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
