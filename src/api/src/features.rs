//! Feature derivation for the match classifier.
//!
//! Turns two teams' season statistics into the 32-column row the trained
//! pipeline was fit on. Column names and order follow the training frame.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InputError;

/// Win-percentage gap above which one team counts as much better.
pub const MUCH_BETTER_THRESHOLD: f64 = 0.20;

/// Win-percentage gap at or below which teams count as evenly matched.
pub const EVENLY_MATCHED_THRESHOLD: f64 = 0.10;

/// Streak length (in either direction) that counts as extreme.
pub const EXTREME_STREAK: i32 = 6;

/// Feature names in training-frame order.
pub const FEATURE_NAMES: [&str; 32] = [
    "home_game_number",
    "home_streak",
    "home_home_streak",
    "home_away_streak",
    "home_offensive_rating",
    "home_defensive_rating",
    "visitor_game_number",
    "visitor_streak",
    "visitor_home_streak",
    "visitor_away_streak",
    "visitor_offensive_rating",
    "visitor_defensive_rating",
    "home_last_10",
    "visitor_last_10",
    "home_wins_percent",
    "visitor_wins_percent",
    "wins_percent_diff",
    "offensive_rating_diff",
    "defensive_rating_diff",
    "net_rating_diff",
    "home_estimated_points",
    "visitor_estimated_points",
    "estimated_point_diff",
    "home_streak_extreme",
    "visitor_streak_extreme",
    "streak_extreme_diff",
    "streak_diff",
    "home_quality",
    "visitor_quality",
    "home_much_better",
    "visitor_much_better",
    "teams_evenly_matched",
];

/// Which side of the matchup a team plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Visitor,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => write!(f, "home"),
            Side::Visitor => write!(f, "visitor"),
        }
    }
}

/// Current-season aggregates for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonStats {
    /// Points scored per 100 possessions
    pub offensive_rating: f64,
    /// Points allowed per 100 possessions
    pub defensive_rating: f64,
    pub wins: u32,
    pub games_played: u32,
    /// Signed current streak (positive = winning)
    pub streak: i32,
    /// Signed streak in home games
    #[serde(default)]
    pub home_streak: i32,
    /// Signed streak in away games
    #[serde(default)]
    pub away_streak: i32,
}

impl TeamSeasonStats {
    /// Check the raw stats before any feature is derived from them.
    pub fn validate(&self, side: Side) -> Result<(), InputError> {
        if self.games_played == 0 {
            return Err(InputError::NoGamesPlayed { side });
        }
        if self.wins > self.games_played {
            return Err(InputError::WinsExceedGames {
                side,
                wins: self.wins,
                games_played: self.games_played,
            });
        }
        for (field, value) in [
            ("offensive_rating", self.offensive_rating),
            ("defensive_rating", self.defensive_rating),
        ] {
            if !value.is_finite() {
                return Err(InputError::NonFiniteRating { side, field, value });
            }
        }
        for (field, value) in [
            ("streak", self.streak),
            ("home_streak", self.home_streak),
            ("away_streak", self.away_streak),
        ] {
            if value.unsigned_abs() > self.games_played {
                return Err(InputError::StreakExceedsGames {
                    side,
                    field,
                    value,
                    games_played: self.games_played,
                });
            }
        }
        Ok(())
    }

    pub fn win_percent(&self) -> Result<f64, InputError> {
        win_percent(self.wins, self.games_played)
    }
}

/// Team strength bucket derived from win percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityLabel {
    #[serde(rename = "Muy Débil")]
    VeryWeak,
    #[serde(rename = "Débil")]
    Weak,
    #[serde(rename = "Promedio")]
    Average,
    #[serde(rename = "Fuerte")]
    Strong,
    #[serde(rename = "Muy Fuerte")]
    VeryStrong,
    #[serde(rename = "Desconocido")]
    Unknown,
}

impl QualityLabel {
    /// Ladder order, weakest first. `Unknown` is not part of the ladder.
    pub const LADDER: [QualityLabel; 5] = [
        QualityLabel::VeryWeak,
        QualityLabel::Weak,
        QualityLabel::Average,
        QualityLabel::Strong,
        QualityLabel::VeryStrong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::VeryWeak => "Muy Débil",
            QualityLabel::Weak => "Débil",
            QualityLabel::Average => "Promedio",
            QualityLabel::Strong => "Fuerte",
            QualityLabel::VeryStrong => "Muy Fuerte",
            QualityLabel::Unknown => "Desconocido",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bounds (exclusive) of each ladder bucket, weakest first.
const QUALITY_THRESHOLDS: [(f64, QualityLabel); 4] = [
    (0.35, QualityLabel::VeryWeak),
    (0.45, QualityLabel::Weak),
    (0.55, QualityLabel::Average),
    (0.65, QualityLabel::Strong),
];

/// Season win percentage.
pub fn win_percent(wins: u32, games_played: u32) -> Result<f64, InputError> {
    if games_played == 0 {
        return Err(InputError::DivisionByZero);
    }
    Ok(wins as f64 / games_played as f64)
}

/// Bucket a win percentage into a quality label.
pub fn quality_label(win_percent: f64) -> QualityLabel {
    if win_percent.is_nan() {
        return QualityLabel::Unknown;
    }
    QUALITY_THRESHOLDS
        .iter()
        .find(|(upper, _)| win_percent < *upper)
        .map(|(_, label)| *label)
        .unwrap_or(QualityLabel::VeryStrong)
}

/// +1 for a long winning streak, -1 for a long losing streak, else 0.
pub fn streak_extreme(streak: i32) -> i8 {
    if streak >= EXTREME_STREAK {
        1
    } else if streak <= -EXTREME_STREAK {
        -1
    } else {
        0
    }
}

/// Expected points for a team against an opponent's defense.
///
/// Kept in this exact shape (not `(own + opp) / 2`) so the values match the
/// training data bit for bit.
pub fn estimated_points(own_offensive_rating: f64, opp_defensive_rating: f64) -> f64 {
    own_offensive_rating - (own_offensive_rating - opp_defensive_rating) / 2.0
}

/// A single column value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(QualityLabel),
}

/// The derived row fed to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    // Home base (6)
    pub home_game_number: u32,
    pub home_streak: i32,
    pub home_home_streak: i32,
    pub home_away_streak: i32,
    pub home_offensive_rating: f64,
    pub home_defensive_rating: f64,
    // Visitor base (6)
    pub visitor_game_number: u32,
    pub visitor_streak: i32,
    pub visitor_home_streak: i32,
    pub visitor_away_streak: i32,
    pub visitor_offensive_rating: f64,
    pub visitor_defensive_rating: f64,
    // Form (4)
    pub home_last_10: f64,
    pub visitor_last_10: f64,
    pub home_wins_percent: f64,
    pub visitor_wins_percent: f64,
    // Differences (4)
    pub wins_percent_diff: f64,
    pub offensive_rating_diff: f64,
    pub defensive_rating_diff: f64,
    pub net_rating_diff: f64,
    // Estimated points (3)
    pub home_estimated_points: f64,
    pub visitor_estimated_points: f64,
    pub estimated_point_diff: f64,
    // Streaks (4)
    pub home_streak_extreme: i8,
    pub visitor_streak_extreme: i8,
    pub streak_extreme_diff: i8,
    pub streak_diff: i64,
    // Categories and flags (5)
    pub home_quality: QualityLabel,
    pub visitor_quality: QualityLabel,
    pub home_much_better: u8,
    pub visitor_much_better: u8,
    pub teams_evenly_matched: u8,
}

impl FeatureVector {
    /// Columns in training-frame order.
    pub fn columns(&self) -> Vec<(&'static str, FeatureValue)> {
        use FeatureValue::{Category, Number};

        let values = [
            Number(self.home_game_number as f64),
            Number(self.home_streak as f64),
            Number(self.home_home_streak as f64),
            Number(self.home_away_streak as f64),
            Number(self.home_offensive_rating),
            Number(self.home_defensive_rating),
            Number(self.visitor_game_number as f64),
            Number(self.visitor_streak as f64),
            Number(self.visitor_home_streak as f64),
            Number(self.visitor_away_streak as f64),
            Number(self.visitor_offensive_rating),
            Number(self.visitor_defensive_rating),
            Number(self.home_last_10),
            Number(self.visitor_last_10),
            Number(self.home_wins_percent),
            Number(self.visitor_wins_percent),
            Number(self.wins_percent_diff),
            Number(self.offensive_rating_diff),
            Number(self.defensive_rating_diff),
            Number(self.net_rating_diff),
            Number(self.home_estimated_points),
            Number(self.visitor_estimated_points),
            Number(self.estimated_point_diff),
            Number(self.home_streak_extreme as f64),
            Number(self.visitor_streak_extreme as f64),
            Number(self.streak_extreme_diff as f64),
            Number(self.streak_diff as f64),
            Category(self.home_quality),
            Category(self.visitor_quality),
            Number(self.home_much_better as f64),
            Number(self.visitor_much_better as f64),
            Number(self.teams_evenly_matched as f64),
        ];

        FEATURE_NAMES.iter().copied().zip(values).collect()
    }

    /// Column names in training-frame order.
    pub fn names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

/// Derive the feature row for a home/visitor matchup.
pub fn derive(home: &TeamSeasonStats, visitor: &TeamSeasonStats) -> Result<FeatureVector, InputError> {
    home.validate(Side::Home)?;
    visitor.validate(Side::Visitor)?;

    let home_win_percent = home.win_percent()?;
    let visitor_win_percent = visitor.win_percent()?;

    let wins_percent_diff = home_win_percent - visitor_win_percent;
    let offensive_rating_diff = home.offensive_rating - visitor.offensive_rating;
    let defensive_rating_diff = home.defensive_rating - visitor.defensive_rating;
    let net_rating_diff = offensive_rating_diff + defensive_rating_diff;

    let home_estimated_points = estimated_points(home.offensive_rating, visitor.defensive_rating);
    let visitor_estimated_points = estimated_points(visitor.offensive_rating, home.defensive_rating);

    let home_streak_extreme = streak_extreme(home.streak);
    let visitor_streak_extreme = streak_extreme(visitor.streak);

    Ok(FeatureVector {
        home_game_number: home.games_played,
        home_streak: home.streak,
        home_home_streak: home.home_streak,
        home_away_streak: home.away_streak,
        home_offensive_rating: home.offensive_rating,
        home_defensive_rating: home.defensive_rating,
        visitor_game_number: visitor.games_played,
        visitor_streak: visitor.streak,
        visitor_home_streak: visitor.home_streak,
        visitor_away_streak: visitor.away_streak,
        visitor_offensive_rating: visitor.offensive_rating,
        visitor_defensive_rating: visitor.defensive_rating,
        // No dedicated last-10 data; season form stands in for it.
        home_last_10: home_win_percent,
        visitor_last_10: visitor_win_percent,
        home_wins_percent: home_win_percent,
        visitor_wins_percent: visitor_win_percent,
        wins_percent_diff,
        offensive_rating_diff,
        defensive_rating_diff,
        net_rating_diff,
        home_estimated_points,
        visitor_estimated_points,
        estimated_point_diff: home_estimated_points - visitor_estimated_points,
        home_streak_extreme,
        visitor_streak_extreme,
        streak_extreme_diff: home_streak_extreme - visitor_streak_extreme,
        streak_diff: i64::from(home.streak) - i64::from(visitor.streak),
        home_quality: quality_label(home_win_percent),
        visitor_quality: quality_label(visitor_win_percent),
        home_much_better: (wins_percent_diff > MUCH_BETTER_THRESHOLD) as u8,
        visitor_much_better: (wins_percent_diff < -MUCH_BETTER_THRESHOLD) as u8,
        teams_evenly_matched: (wins_percent_diff.abs() <= EVENLY_MATCHED_THRESHOLD) as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(off: f64, def: f64, wins: u32, games: u32, streak: i32) -> TeamSeasonStats {
        TeamSeasonStats {
            offensive_rating: off,
            defensive_rating: def,
            wins,
            games_played: games,
            streak,
            home_streak: 0,
            away_streak: 0,
        }
    }

    fn column(fv: &FeatureVector, name: &str) -> Option<FeatureValue> {
        fv.columns()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    fn scenario() -> (TeamSeasonStats, TeamSeasonStats) {
        (stats(115.0, 108.0, 50, 60, 3), stats(108.0, 112.0, 35, 60, -2))
    }

    #[test]
    fn test_win_percent() {
        assert!((win_percent(50, 60).unwrap() - 0.8333).abs() < 1e-4);
        assert_eq!(win_percent(0, 10).unwrap(), 0.0);
        assert_eq!(win_percent(82, 82).unwrap(), 1.0);
        assert_eq!(win_percent(0, 0), Err(InputError::DivisionByZero));
    }

    #[test]
    fn test_win_percent_in_unit_range() {
        for games in 1..=82 {
            for wins in 0..=games {
                let pct = win_percent(wins, games).unwrap();
                assert!((0.0..=1.0).contains(&pct), "{}/{} -> {}", wins, games, pct);
            }
        }
    }

    #[test]
    fn test_quality_label_ladder() {
        assert_eq!(quality_label(0.0), QualityLabel::VeryWeak);
        assert_eq!(quality_label(0.3499), QualityLabel::VeryWeak);
        assert_eq!(quality_label(0.40), QualityLabel::Weak);
        assert_eq!(quality_label(0.50), QualityLabel::Average);
        assert_eq!(quality_label(0.60), QualityLabel::Strong);
        assert_eq!(quality_label(0.80), QualityLabel::VeryStrong);
        assert_eq!(quality_label(1.0), QualityLabel::VeryStrong);
        assert_eq!(quality_label(f64::NAN), QualityLabel::Unknown);
    }

    #[test]
    fn test_quality_label_boundaries_go_up() {
        assert_eq!(quality_label(0.35), QualityLabel::Weak);
        assert_eq!(quality_label(0.45), QualityLabel::Average);
        assert_eq!(quality_label(0.55), QualityLabel::Strong);
        assert_eq!(quality_label(0.65), QualityLabel::VeryStrong);
        // 21/60 lands exactly on 0.35
        assert_eq!(quality_label(win_percent(21, 60).unwrap()), QualityLabel::Weak);
    }

    #[test]
    fn test_quality_label_serializes_to_spanish() {
        assert_eq!(
            serde_json::to_string(&QualityLabel::VeryWeak).unwrap(),
            "\"Muy Débil\""
        );
        let label: QualityLabel = serde_json::from_str("\"Promedio\"").unwrap();
        assert_eq!(label, QualityLabel::Average);
        assert_eq!(QualityLabel::Unknown.to_string(), "Desconocido");
    }

    #[test]
    fn test_streak_extreme() {
        assert_eq!(streak_extreme(6), 1);
        assert_eq!(streak_extreme(12), 1);
        assert_eq!(streak_extreme(5), 0);
        assert_eq!(streak_extreme(0), 0);
        assert_eq!(streak_extreme(-5), 0);
        assert_eq!(streak_extreme(-6), -1);
        assert_eq!(streak_extreme(-9), -1);
    }

    #[test]
    fn test_estimated_points() {
        assert_eq!(estimated_points(115.0, 112.0), 113.5);
        assert_eq!(estimated_points(108.0, 108.0), 108.0);
        assert_eq!(estimated_points(100.0, 120.0), 110.0);
    }

    #[test]
    fn test_derive_scenario() {
        let (home, visitor) = scenario();
        let fv = derive(&home, &visitor).unwrap();

        assert!((fv.wins_percent_diff - 0.25).abs() < 1e-9);
        assert_eq!(fv.home_much_better, 1);
        assert_eq!(fv.visitor_much_better, 0);
        assert_eq!(fv.teams_evenly_matched, 0);
        assert_eq!(fv.offensive_rating_diff, 7.0);
        assert_eq!(fv.defensive_rating_diff, -4.0);
        assert_eq!(fv.net_rating_diff, 3.0);
        assert_eq!(fv.home_quality, QualityLabel::VeryStrong);
        // 35/60 = 0.5833 sits in [0.55, 0.65)
        assert_eq!(fv.visitor_quality, QualityLabel::Strong);
        assert_eq!(fv.home_streak_extreme, 0);
        assert_eq!(fv.visitor_streak_extreme, 0);
        assert_eq!(fv.streak_extreme_diff, 0);
        assert_eq!(fv.streak_diff, 5);
        assert_eq!(fv.home_estimated_points, 113.5);
        assert_eq!(fv.visitor_estimated_points, 108.0);
        assert_eq!(fv.estimated_point_diff, 5.5);
    }

    #[test]
    fn test_derive_pass_through() {
        let (mut home, visitor) = scenario();
        home.home_streak = 4;
        home.away_streak = -1;
        let fv = derive(&home, &visitor).unwrap();

        assert_eq!(fv.home_game_number, 60);
        assert_eq!(fv.visitor_game_number, 60);
        assert_eq!(fv.home_home_streak, 4);
        assert_eq!(fv.home_away_streak, -1);
        assert_eq!(fv.home_offensive_rating, 115.0);
        assert_eq!(fv.visitor_defensive_rating, 112.0);
        assert_eq!(fv.home_last_10, fv.home_wins_percent);
        assert_eq!(fv.visitor_last_10, fv.visitor_wins_percent);
    }

    #[test]
    fn test_evenly_matched() {
        let home = stats(110.0, 110.0, 30, 60, 0);
        let visitor = stats(110.0, 110.0, 27, 60, 0);
        let fv = derive(&home, &visitor).unwrap();

        assert!((fv.home_wins_percent - 0.50).abs() < 1e-9);
        assert!((fv.visitor_wins_percent - 0.45).abs() < 1e-9);
        assert_eq!(fv.teams_evenly_matched, 1);
        assert_eq!(fv.home_much_better, 0);
        assert_eq!(fv.visitor_much_better, 0);
    }

    #[test]
    fn test_swap_symmetry() {
        let home = stats(117.2, 109.4, 48, 61, 7);
        let visitor = stats(111.9, 113.6, 22, 60, -6);
        let fv = derive(&home, &visitor).unwrap();
        let swapped = derive(&visitor, &home).unwrap();

        assert_eq!(fv.wins_percent_diff, -swapped.wins_percent_diff);
        assert_eq!(fv.offensive_rating_diff, -swapped.offensive_rating_diff);
        assert_eq!(fv.net_rating_diff, -swapped.net_rating_diff);
        assert_eq!(fv.estimated_point_diff, -swapped.estimated_point_diff);
        assert_eq!(fv.streak_diff, -swapped.streak_diff);
        assert_eq!(fv.home_much_better, swapped.visitor_much_better);
        assert_eq!(fv.visitor_much_better, swapped.home_much_better);
        assert_eq!(fv.teams_evenly_matched, swapped.teams_evenly_matched);
        assert_eq!(fv.home_streak_extreme, 1);
        assert_eq!(fv.visitor_streak_extreme, -1);
        assert_eq!(fv.streak_extreme_diff, 2);
    }

    #[test]
    fn test_net_rating_is_sum_of_diffs() {
        let cases = [
            (stats(112.3, 107.9, 40, 55, 2), stats(109.1, 115.4, 20, 56, -3)),
            (stats(101.7, 118.2, 10, 50, -8), stats(121.6, 104.3, 45, 51, 9)),
            (stats(0.1, 0.2, 1, 1, 0), stats(0.3, 0.7, 0, 1, 0)),
        ];
        for (home, visitor) in cases {
            let fv = derive(&home, &visitor).unwrap();
            assert_eq!(fv.net_rating_diff, fv.offensive_rating_diff + fv.defensive_rating_diff);
        }
    }

    #[test]
    fn test_derive_rejects_invalid_input() {
        let (home, visitor) = scenario();

        let no_games = stats(110.0, 110.0, 0, 0, 0);
        assert_eq!(
            derive(&no_games, &visitor),
            Err(InputError::NoGamesPlayed { side: Side::Home })
        );
        assert_eq!(
            derive(&home, &no_games),
            Err(InputError::NoGamesPlayed { side: Side::Visitor })
        );

        let too_many_wins = stats(110.0, 110.0, 61, 60, 0);
        assert!(matches!(
            derive(&home, &too_many_wins),
            Err(InputError::WinsExceedGames { side: Side::Visitor, .. })
        ));

        let nan_rating = stats(f64::NAN, 110.0, 30, 60, 0);
        assert!(matches!(
            derive(&nan_rating, &visitor),
            Err(InputError::NonFiniteRating { side: Side::Home, field: "offensive_rating", .. })
        ));
    }

    #[test]
    fn test_streak_longer_than_season_is_rejected() {
        let (home, visitor) = scenario();

        let runaway = stats(110.0, 110.0, 30, 60, i32::MAX);
        assert_eq!(
            derive(&runaway, &visitor),
            Err(InputError::StreakExceedsGames {
                side: Side::Home,
                field: "streak",
                value: i32::MAX,
                games_played: 60,
            })
        );

        let mut bad_away = stats(110.0, 110.0, 30, 60, 0);
        bad_away.away_streak = -61;
        assert!(matches!(
            derive(&home, &bad_away),
            Err(InputError::StreakExceedsGames { side: Side::Visitor, field: "away_streak", .. })
        ));

        // A full-season streak is still valid
        let perfect = stats(110.0, 110.0, 60, 60, 60);
        assert_eq!(derive(&perfect, &visitor).unwrap().streak_diff, 62);
    }

    #[test]
    fn test_streak_diff_does_not_overflow() {
        let home = stats(110.0, 110.0, 30, u32::MAX, i32::MAX);
        let visitor = stats(110.0, 110.0, 30, u32::MAX, i32::MIN);
        let fv = derive(&home, &visitor).unwrap();
        assert_eq!(fv.streak_diff, i64::from(i32::MAX) - i64::from(i32::MIN));
    }

    #[test]
    fn test_columns_follow_feature_names() {
        let (home, visitor) = scenario();
        let fv = derive(&home, &visitor).unwrap();
        let columns = fv.columns();

        assert_eq!(columns.len(), FEATURE_NAMES.len());
        for ((name, _), expected) in columns.iter().zip(FEATURE_NAMES.iter()) {
            assert_eq!(name, expected);
        }
        assert_eq!(column(&fv, "net_rating_diff"), Some(FeatureValue::Number(3.0)));
        assert_eq!(
            column(&fv, "home_quality"),
            Some(FeatureValue::Category(QualityLabel::VeryStrong))
        );
        assert_eq!(column(&fv, "home_pace"), None);
    }

    #[test]
    fn test_stats_deserialize_with_default_venue_streaks() {
        let json = r#"{"offensive_rating": 114.2, "defensive_rating": 110.8,
                       "wins": 41, "games_played": 70, "streak": -2}"#;
        let stats: TeamSeasonStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.home_streak, 0);
        assert_eq!(stats.away_streak, 0);
        assert_eq!(stats.wins, 41);
    }
}
