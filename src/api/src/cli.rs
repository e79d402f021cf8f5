//! CLI commands for nba-predict.
//!
//! Supports API server mode, one-off predictions and feature inspection.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::features::{FeatureValue, Side};
use crate::model::create_shared_model;
use crate::predictor::{build_features, resolve_team, Predictor, ResolvedTeam};
use crate::schema::ModelMetadata;
use crate::teams::TeamTable;
use crate::types::{FeaturesResponse, MatchPrediction, PredictRequest, TeamInput};

#[derive(Parser)]
#[command(name = "nba-predict")]
#[command(version, about = "NBA match prediction API and CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where a matchup comes from: two team names or a request JSON file.
#[derive(Args, Debug, Clone)]
pub struct MatchupArgs {
    /// Home team name (as listed in the team stats CSV)
    #[arg(long, requires = "visitor", conflicts_with = "input")]
    pub home: Option<String>,

    /// Visitor team name
    #[arg(long, requires = "home", conflicts_with = "input")]
    pub visitor: Option<String>,

    /// Request JSON file ({"home": ..., "visitor": ...})
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Team stats CSV override
    #[arg(short, long)]
    pub teams: Option<PathBuf>,

    /// Output format (json, table)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Predict the winner of a single game
    Predict {
        #[command(flatten)]
        matchup: MatchupArgs,

        /// Model path override
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Model metadata JSON override
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Print the derived feature row for a game without running the model
    Features {
        #[command(flatten)]
        matchup: MatchupArgs,
    },

    /// List teams in the stats CSV
    Teams {
        /// Team stats CSV override
        #[arg(short, long)]
        teams: Option<PathBuf>,
    },
}

/// Load the team table, honouring a path override.
pub fn load_teams(config: &AppConfig, path: Option<&PathBuf>) -> anyhow::Result<TeamTable> {
    let path = path
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| config.data.teams_path.clone());
    let delimiter = config.data.delimiter_byte()?;
    TeamTable::from_csv(&path, delimiter)
        .with_context(|| format!("Failed to load team stats from {}", path))
}

/// Load model metadata, falling back to the built-in feature contract.
pub fn load_metadata(path: Option<&str>) -> anyhow::Result<ModelMetadata> {
    match path {
        Some(p) if std::path::Path::new(p).exists() => ModelMetadata::from_file(p),
        Some(p) => {
            tracing::warn!("Model metadata {} not found, using built-in feature list", p);
            Ok(ModelMetadata::default())
        }
        None => Ok(ModelMetadata::default()),
    }
}

fn read_request(args: &MatchupArgs) -> anyhow::Result<PredictRequest> {
    if let Some(path) = &args.input {
        let input_json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(serde_json::from_str(&input_json)?);
    }

    match (&args.home, &args.visitor) {
        (Some(home), Some(visitor)) => Ok(PredictRequest {
            home: TeamInput::Name(home.clone()),
            visitor: TeamInput::Name(visitor.clone()),
        }),
        _ => anyhow::bail!("Provide --home and --visitor, or --input FILE"),
    }
}

fn needs_team_table(req: &PredictRequest) -> bool {
    matches!(req.home, TeamInput::Name(_)) || matches!(req.visitor, TeamInput::Name(_))
}

fn resolve_matchup(
    config: &AppConfig,
    args: &MatchupArgs,
) -> anyhow::Result<(ResolvedTeam, ResolvedTeam)> {
    let req = read_request(args)?;

    let teams = if needs_team_table(&req) {
        let table = load_teams(config, args.teams.as_ref())?;
        eprintln!("Loaded stats for {} teams", table.len());
        table
    } else {
        TeamTable::default()
    };

    let home = resolve_team(&teams, &req.home)?;
    let visitor = resolve_team(&teams, &req.visitor)?;
    Ok((home, visitor))
}

/// Run a single prediction from the command line.
pub async fn run_predict(
    matchup: MatchupArgs,
    model_path: Option<PathBuf>,
    metadata_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    if let Some(path) = model_path {
        config.model.path = path.to_string_lossy().to_string();
    }
    if let Some(path) = metadata_path {
        config.model.metadata_path = Some(path.to_string_lossy().to_string());
    }

    let (home, visitor) = resolve_matchup(&config, &matchup)?;

    eprintln!("Loading model from: {}", config.model.path);
    let model = create_shared_model(&config.model.path)?;
    let metadata = load_metadata(config.model.metadata_path.as_deref())?;
    eprintln!("Model loaded successfully");

    let predictor = Predictor::new(model, metadata);
    let prediction = predictor.predict(&home, &visitor)?;

    match matchup.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&prediction)?),
        "table" => print_prediction(&prediction),
        other => {
            eprintln!("Unknown format: {}. Using JSON.", other);
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
    }

    Ok(())
}

/// Print the feature row for a matchup.
pub async fn run_features(matchup: MatchupArgs) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let (home, visitor) = resolve_matchup(&config, &matchup)?;
    let features = build_features(&home, &visitor)?;

    let response = FeaturesResponse {
        home_team: home.display_name(Side::Home),
        visitor_team: visitor.display_name(Side::Visitor),
        features,
    };

    match matchup.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&response)?),
        "table" => print_features(&response),
        other => {
            eprintln!("Unknown format: {}. Using JSON.", other);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// List the teams in the stats CSV.
pub async fn run_teams(teams_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let table = load_teams(&config, teams_path.as_ref())?;

    for name in table.names() {
        println!("{}", name);
    }

    Ok(())
}

fn format_value(value: &FeatureValue) -> String {
    match value {
        FeatureValue::Number(v) if v.fract() == 0.0 => format!("{}", v),
        FeatureValue::Number(v) => format!("{:.4}", v),
        FeatureValue::Category(label) => label.to_string(),
    }
}

/// Print the feature row in table format.
fn print_features(response: &FeaturesResponse) {
    println!("{} (home) vs {} (visitor)", response.home_team, response.visitor_team);
    println!();
    println!("=== Features ===");
    for (name, value) in response.features.columns() {
        println!("  {:<26} {:>12}", name, format_value(&value));
    }
}

/// Print a prediction in table format.
fn print_prediction(prediction: &MatchPrediction) {
    println!(
        "{} (home) vs {} (visitor)",
        prediction.home_team, prediction.visitor_team
    );
    println!();
    println!("=== Prediction ===");
    println!("  Winner: {} ({})", prediction.winner_team, prediction.winner);
    println!("  Label:  {}", prediction.label);

    if let (Some(home), Some(visitor)) = (
        prediction.home_win_probability,
        prediction.visitor_win_probability,
    ) {
        println!();
        println!("=== Win Probabilities ===");
        println!("  {:>24}: {:.2}%", prediction.home_team, home * 100.0);
        println!("  {:>24}: {:.2}%", prediction.visitor_team, visitor * 100.0);
    }

    let features = &prediction.features;
    println!();
    println!("=== Key Differences ===");
    println!("  wins_percent_diff:     {:+.4}", features.wins_percent_diff);
    println!("  net_rating_diff:       {:+.2}", features.net_rating_diff);
    println!("  estimated_point_diff:  {:+.2}", features.estimated_point_diff);
    println!("  streak_diff:           {:+}", features.streak_diff);
    println!(
        "  quality:               {} vs {}",
        features.home_quality, features.visitor_quality
    );
}
