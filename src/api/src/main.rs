//! NBA Prediction API
//!
//! REST API and CLI that derives matchup features from team season stats and
//! serves predictions from an exported classifier.

mod cli;
mod config;
mod error;
mod features;
mod model;
mod predictor;
mod routes;
mod schema;
mod teams;
mod types;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{load_metadata, load_teams, Cli, Commands};
use crate::config::AppConfig;
use crate::model::create_shared_model;
use crate::predictor::Predictor;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Predict {
            matchup,
            model,
            metadata,
        } => cli::run_predict(matchup, model, metadata).await,
        Commands::Features { matchup } => cli::run_features(matchup).await,
        Commands::Teams { teams } => cli::run_teams(teams).await,
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nba_predict=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    config.override_server(host, port);

    tracing::info!("Configuration loaded");
    tracing::info!("Model path: {}", config.model.path);

    // Load team stats
    let teams = load_teams(&config, None)?;
    if teams.is_empty() {
        tracing::warn!("No teams found in {}; only raw-stat requests will work", config.data.teams_path);
    } else {
        tracing::info!("Loaded stats for {} teams from {}", teams.len(), config.data.teams_path);
    }

    // Load model and its feature contract
    tracing::info!("Loading ONNX model...");
    let model = create_shared_model(&config.model.path)?;
    let metadata = load_metadata(config.model.metadata_path.as_deref())?;
    tracing::info!(
        "Model loaded successfully ({} features, {} reach the estimator)",
        metadata.features.len(),
        metadata.model_columns().len()
    );

    // Create application state
    let state = Arc::new(AppState {
        predictor: Predictor::new(model, metadata),
        teams,
        config: config.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/model/info", get(routes::model_info))
        .route("/teams", get(routes::teams))
        .route("/features", post(routes::features))
        .route("/predict", post(routes::predict))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
