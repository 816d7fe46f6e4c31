use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// A side that has not scored all season still gets a tiny scoring rate so the
// Poisson model stays defined.
const MIN_LAMBDA: f64 = 0.05;

/// Season totals for one team, split by venue. Fields are optional because
/// providers routinely omit splits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonStats {
    #[serde(default)]
    pub goals_scored_home: Option<u32>,
    #[serde(default)]
    pub goals_conceded_home: Option<u32>,
    #[serde(default)]
    pub goals_scored_away: Option<u32>,
    #[serde(default)]
    pub goals_conceded_away: Option<u32>,
    #[serde(default)]
    pub matches_home: Option<u32>,
    #[serde(default)]
    pub matches_away: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeagueAverages {
    pub avg_goals_scored_home: f64,
    pub avg_goals_conceded_home: f64,
    pub avg_goals_scored_away: f64,
    pub avg_goals_conceded_away: f64,
}

impl LeagueAverages {
    fn validate(&self) -> EngineResult<()> {
        let fields = [
            ("avg_goals_scored_home", self.avg_goals_scored_home),
            ("avg_goals_conceded_home", self.avg_goals_conceded_home),
            ("avg_goals_scored_away", self.avg_goals_scored_away),
            ("avg_goals_conceded_away", self.avg_goals_conceded_away),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::invalid(format!(
                    "league average {name} must be > 0 (got {value})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home_lambda: f64,
    pub away_lambda: f64,
}

impl ExpectedGoals {
    pub fn new(home_lambda: f64, away_lambda: f64) -> EngineResult<Self> {
        for (side, lambda) in [("home", home_lambda), ("away", away_lambda)] {
            if !lambda.is_finite() || lambda <= 0.0 {
                return Err(EngineError::invalid(format!(
                    "{side} expected goals must be > 0 (got {lambda})"
                )));
            }
        }
        Ok(Self {
            home_lambda,
            away_lambda,
        })
    }
}

/// Per-match averages for the venue a team plays at in this fixture.
#[derive(Debug, Clone, Copy)]
struct VenueForm {
    scored: f64,
    conceded: f64,
}

fn venue_form(
    side: &str,
    goals_scored: Option<u32>,
    goals_conceded: Option<u32>,
    matches: Option<u32>,
) -> EngineResult<VenueForm> {
    let scored = goals_scored.ok_or_else(|| EngineError::missing(&format!("{side} goals scored")))?;
    let conceded =
        goals_conceded.ok_or_else(|| EngineError::missing(&format!("{side} goals conceded")))?;
    let matches = matches.ok_or_else(|| EngineError::missing(&format!("{side} matches played")))?;
    if matches == 0 {
        return Err(EngineError::DataUnavailable(format!(
            "{side} has no matches played"
        )));
    }
    let n = f64::from(matches);
    Ok(VenueForm {
        scored: f64::from(scored) / n,
        conceded: f64::from(conceded) / n,
    })
}

/// Attack/defence strength model: each side's venue average relative to the
/// league average for that venue, scaled back by the league scoring rate.
pub fn estimate_expected_goals(
    home: &TeamSeasonStats,
    away: &TeamSeasonStats,
    league: &LeagueAverages,
) -> EngineResult<ExpectedGoals> {
    let home_form = venue_form(
        "home team at home",
        home.goals_scored_home,
        home.goals_conceded_home,
        home.matches_home,
    )?;
    let away_form = venue_form(
        "away team away",
        away.goals_scored_away,
        away.goals_conceded_away,
        away.matches_away,
    )?;
    league.validate()?;

    let home_attack = home_form.scored / league.avg_goals_scored_home;
    let home_defense = home_form.conceded / league.avg_goals_conceded_home;
    let away_attack = away_form.scored / league.avg_goals_scored_away;
    let away_defense = away_form.conceded / league.avg_goals_conceded_away;

    let home_lambda = home_attack * away_defense * league.avg_goals_scored_home;
    let away_lambda = away_attack * home_defense * league.avg_goals_scored_away;

    ExpectedGoals::new(home_lambda.max(MIN_LAMBDA), away_lambda.max(MIN_LAMBDA))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn league() -> LeagueAverages {
        LeagueAverages {
            avg_goals_scored_home: 1.5,
            avg_goals_conceded_home: 1.1,
            avg_goals_scored_away: 1.2,
            avg_goals_conceded_away: 1.4,
        }
    }

    fn team(scored_h: u32, conceded_h: u32, scored_a: u32, conceded_a: u32) -> TeamSeasonStats {
        TeamSeasonStats {
            goals_scored_home: Some(scored_h),
            goals_conceded_home: Some(conceded_h),
            goals_scored_away: Some(scored_a),
            goals_conceded_away: Some(conceded_a),
            matches_home: Some(19),
            matches_away: Some(19),
        }
    }

    #[test]
    fn league_average_teams_reproduce_league_rates() {
        let home = TeamSeasonStats {
            goals_scored_home: Some(30),
            goals_conceded_home: Some(22),
            matches_home: Some(20),
            ..TeamSeasonStats::default()
        };
        let away = TeamSeasonStats {
            goals_scored_away: Some(24),
            goals_conceded_away: Some(28),
            matches_away: Some(20),
            ..TeamSeasonStats::default()
        };
        let xg = estimate_expected_goals(&home, &away, &league()).unwrap();
        assert!((xg.home_lambda - 1.5).abs() < 1e-12);
        assert!((xg.away_lambda - 1.2).abs() < 1e-12);
    }

    #[test]
    fn stronger_attack_raises_home_lambda() {
        let strong = team(45, 15, 30, 20);
        let weak = team(20, 30, 15, 35);
        let xg = estimate_expected_goals(&strong, &weak, &league()).unwrap();
        // home_attack = (45/19)/1.5, away_defense = (35/19)/1.4
        let expected = (45.0 / 19.0) / 1.5 * ((35.0 / 19.0) / 1.4) * 1.5;
        assert!((xg.home_lambda - expected).abs() < 1e-12);
        assert!(xg.home_lambda > xg.away_lambda);
    }

    #[test]
    fn missing_split_is_data_unavailable() {
        let mut home = team(30, 20, 20, 25);
        home.goals_conceded_home = None;
        let err = estimate_expected_goals(&home, &team(20, 20, 20, 20), &league()).unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable(_)));
    }

    #[test]
    fn zero_league_average_is_invalid_input() {
        let mut averages = league();
        averages.avg_goals_conceded_away = 0.0;
        let err = estimate_expected_goals(&team(30, 20, 20, 25), &team(20, 20, 20, 20), &averages)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn goalless_side_keeps_positive_rate() {
        let home = team(30, 20, 20, 25);
        let away = team(10, 10, 0, 30);
        let xg = estimate_expected_goals(&home, &away, &league()).unwrap();
        assert!(xg.away_lambda > 0.0);
    }
}
