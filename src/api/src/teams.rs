//! Current-season team statistics loaded from CSV.

use anyhow::Context;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::InputError;
use crate::features::TeamSeasonStats;

/// Columns the season CSV must provide.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "TEAM",
    "GP",
    "W",
    "OffRtg",
    "DefRtg",
    "streak",
    "streak_as_local",
    "streak_as_visitor",
];

/// Season stats keyed by team name.
#[derive(Debug, Clone, Default)]
pub struct TeamTable {
    teams: BTreeMap<String, TeamSeasonStats>,
}

impl TeamTable {
    /// Load the table from a delimited CSV file with a header row.
    ///
    /// Expected columns: TEAM, GP, W, OffRtg, DefRtg, streak,
    /// streak_as_local, streak_as_visitor. Extra columns are ignored.
    pub fn from_csv<P: AsRef<Path>>(path: P, delimiter: u8) -> anyhow::Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .map_parse_options(|opts| opts.with_separator(delimiter))
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .with_context(|| format!("Failed to read team stats {}", path.as_ref().display()))?;

        Self::from_dataframe(&df)
    }

    fn from_dataframe(df: &DataFrame) -> anyhow::Result<Self> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| df.column(c).is_err())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(InputError::MissingFields(missing).into());
        }

        let names = df.column("TEAM")?.cast(&DataType::String)?;
        let names = names.str()?;
        let games = df.column("GP")?.cast(&DataType::Int64)?;
        let games = games.i64()?;
        let wins = df.column("W")?.cast(&DataType::Int64)?;
        let wins = wins.i64()?;
        let off = df.column("OffRtg")?.cast(&DataType::Float64)?;
        let off = off.f64()?;
        let def = df.column("DefRtg")?.cast(&DataType::Float64)?;
        let def = def.f64()?;
        let streak = df.column("streak")?.cast(&DataType::Int64)?;
        let streak = streak.i64()?;
        let home_streak = df.column("streak_as_local")?.cast(&DataType::Int64)?;
        let home_streak = home_streak.i64()?;
        let away_streak = df.column("streak_as_visitor")?.cast(&DataType::Int64)?;
        let away_streak = away_streak.i64()?;

        let mut teams = BTreeMap::new();

        for i in 0..df.height() {
            let Some(name) = names.get(i).map(str::trim).filter(|n| !n.is_empty()) else {
                tracing::warn!("Skipping team stats row {} without a team name", i);
                continue;
            };

            let missing_value = |field: &str| InputError::MissingValue {
                team: name.to_string(),
                field: field.to_string(),
            };

            let stats = TeamSeasonStats {
                offensive_rating: off.get(i).ok_or_else(|| missing_value("OffRtg"))?,
                defensive_rating: def.get(i).ok_or_else(|| missing_value("DefRtg"))?,
                wins: count(wins.get(i)).ok_or_else(|| missing_value("W"))?,
                games_played: count(games.get(i)).ok_or_else(|| missing_value("GP"))?,
                streak: signed(streak.get(i)).ok_or_else(|| missing_value("streak"))?,
                home_streak: signed(home_streak.get(i))
                    .ok_or_else(|| missing_value("streak_as_local"))?,
                away_streak: signed(away_streak.get(i))
                    .ok_or_else(|| missing_value("streak_as_visitor"))?,
            };

            teams.insert(name.to_string(), stats);
        }

        tracing::debug!("Loaded stats for {} teams", teams.len());
        Ok(Self { teams })
    }

    /// Look up a team by name; exact match first, then case-insensitive.
    pub fn get(&self, name: &str) -> Option<&TeamSeasonStats> {
        self.canonical_name(name)
            .and_then(|team| self.teams.get(team))
    }

    /// Like [`TeamTable::get`], failing with [`InputError::UnknownTeam`].
    pub fn lookup(&self, name: &str) -> Result<&TeamSeasonStats, InputError> {
        self.get(name)
            .ok_or_else(|| InputError::UnknownTeam(name.to_string()))
    }

    /// Canonical name of a team, resolving case differences.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        if let Some((team, _)) = self.teams.get_key_value(name) {
            return Some(team.as_str());
        }
        let lowered = name.to_lowercase();
        self.teams
            .keys()
            .find(|team| team.to_lowercase() == lowered)
            .map(String::as_str)
    }

    /// Team names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.teams.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

fn count(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn signed(value: Option<i64>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}
