use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::distribution::{DEFAULT_MAX_GOALS, DistributionStrategy};
use crate::feed::DEFAULT_BOOKMAKER;
use crate::market::GoalLine;
use crate::markets::MarketConfig;
use crate::pipeline::PipelineConfig;
use crate::stats::{AggregateOptions, DEFAULT_MIN_LEAGUE_BETS};
use crate::store;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub strategy: DistributionStrategy,
    pub max_goals: u32,
    pub goal_lines: Vec<GoalLine>,
    pub min_league_bets: usize,
    pub allowed_leagues: Option<HashSet<u32>>,
    pub preferred_bookmaker: u32,
    pub db_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: DistributionStrategy::default(),
            max_goals: DEFAULT_MAX_GOALS,
            goal_lines: vec![GoalLine::DEFAULT],
            min_league_bets: DEFAULT_MIN_LEAGUE_BETS,
            allowed_leagues: None,
            preferred_bookmaker: DEFAULT_BOOKMAKER,
            db_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Reads `.env` (if any) and `VALUE_*` variables. Unparseable values fall
    /// back to defaults with a warning.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let strategy = match get("VALUE_STRATEGY").map(|v| v.parse::<DistributionStrategy>()) {
            Some(Ok(strategy)) => strategy,
            Some(Err(err)) => {
                warn!(error = %err, "ignoring VALUE_STRATEGY");
                defaults.strategy
            }
            None => defaults.strategy,
        };

        let max_goals = get("VALUE_MAX_GOALS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.max_goals)
            .clamp(1, 15);

        let goal_lines = get("VALUE_OU_LINES")
            .map(|raw| {
                let mut lines = Vec::new();
                for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    match part.parse::<f64>().map(GoalLine::new) {
                        Ok(Ok(line)) => lines.push(line),
                        _ => warn!(line = part, "ignoring goal line"),
                    }
                }
                lines.sort();
                lines.dedup();
                lines
            })
            .filter(|lines| !lines.is_empty())
            .unwrap_or(defaults.goal_lines);

        let min_league_bets = get("VALUE_MIN_LEAGUE_BETS")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.min_league_bets);

        let allowed_leagues = get("VALUE_ALLOWED_LEAGUES")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|p| p.trim().parse::<u32>().ok())
                    .filter(|id| *id != 0)
                    .collect::<HashSet<u32>>()
            })
            .filter(|ids| !ids.is_empty());

        let preferred_bookmaker = get("VALUE_PREFERRED_BOOKMAKER")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.preferred_bookmaker);

        let db_path = get("VALUE_DB_PATH")
            .map(PathBuf::from)
            .or_else(store::default_db_path);

        let log_level = get("VALUE_LOG_LEVEL").unwrap_or(defaults.log_level);

        Self {
            strategy,
            max_goals,
            goal_lines,
            min_league_bets,
            allowed_leagues,
            preferred_bookmaker,
            db_path,
            log_level,
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            market: MarketConfig {
                strategy: self.strategy,
                max_goals: self.max_goals,
                goal_lines: self.goal_lines.clone(),
            },
            allowed_leagues: self.allowed_leagues.clone(),
            preferred_bookmaker: self.preferred_bookmaker,
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            min_league_bets: self.min_league_bets,
        }
    }
}
