use std::collections::{HashMap, HashSet};
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::estimator::{ExpectedGoals, LeagueAverages, TeamSeasonStats, estimate_expected_goals};
use crate::feed::{DEFAULT_BOOKMAKER, odds_from_response};
use crate::market::{Market, MarketProbabilitySet, OddsSet, Selection};
use crate::markets::{MarketConfig, derive_market_probabilities};
use crate::settlement::{FinalScore, SettlementReport, settle_fixture};
use crate::value::{FixtureKey, ValueBet, find_value_bets};

/// Everything the providers supply for one fixture. Absent pieces surface as
/// `DataUnavailable` for that fixture only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureInput {
    pub fixture: FixtureKey,
    #[serde(default)]
    pub league_id: Option<u32>,
    #[serde(default)]
    pub home: Option<TeamSeasonStats>,
    #[serde(default)]
    pub away: Option<TeamSeasonStats>,
    #[serde(default)]
    pub league_averages: Option<LeagueAverages>,
    #[serde(default)]
    pub odds: Option<OddsSet>,
    /// Raw provider `odds` body, used when `odds` is absent.
    #[serde(default)]
    pub odds_response: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Estimate,
    Markets,
    Value,
    Sink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Estimate => "estimate",
            Stage::Markets => "markets",
            Stage::Value => "value",
            Stage::Sink => "sink",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureFailure {
    pub fixture_id: u64,
    pub stage: Stage,
    pub reason: String,
    /// Set when the failure came from the engine rather than the sink.
    pub error: Option<EngineError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureAnalysis {
    pub fixture: FixtureKey,
    pub expected_goals: ExpectedGoals,
    pub probabilities: MarketProbabilitySet,
    pub value_bets: Vec<ValueBet>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub analyzed: usize,
    pub skipped_league: usize,
    pub skipped_existing: usize,
    pub stored: Vec<ValueBet>,
    pub failures: Vec<FixtureFailure>,
}

/// Destination for detected bets. Implementations must never hold two entries
/// with the same (fixture, market, selection).
pub trait BetSink {
    fn contains_fixture(&self, fixture_id: u64) -> Result<bool>;

    /// Stores the bets that are not already present; returns how many were new.
    fn create(&mut self, fixture: &FixtureKey, bets: &[ValueBet]) -> Result<usize>;

    /// Records a terminal outcome. Returns `false` when the stored bet is
    /// missing or already terminal.
    fn update_outcome(&mut self, bet: &ValueBet) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub market: MarketConfig,
    /// `None` analyzes every league.
    pub allowed_leagues: Option<HashSet<u32>>,
    /// Bookmaker picked out of raw `odds_response` bodies.
    pub preferred_bookmaker: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            allowed_leagues: None,
            preferred_bookmaker: DEFAULT_BOOKMAKER,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

fn stage_failure(fixture_id: u64, stage: Stage, error: EngineError) -> FixtureFailure {
    FixtureFailure {
        fixture_id,
        stage,
        reason: error.to_string(),
        error: Some(error),
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn league_allowed(&self, input: &FixtureInput) -> bool {
        match (&self.config.allowed_leagues, input.league_id) {
            (None, _) => true,
            (Some(allowed), Some(id)) => allowed.contains(&id),
            (Some(_), None) => false,
        }
    }

    fn estimate(&self, input: &FixtureInput) -> EngineResult<ExpectedGoals> {
        let home = input.home.as_ref().ok_or_else(|| EngineError::missing("home team stats"))?;
        let away = input.away.as_ref().ok_or_else(|| EngineError::missing("away team stats"))?;
        let league = input
            .league_averages
            .as_ref()
            .ok_or_else(|| EngineError::missing("league averages"))?;
        estimate_expected_goals(home, away, league)
    }

    fn odds(&self, input: &FixtureInput) -> EngineResult<OddsSet> {
        if let Some(odds) = &input.odds {
            return Ok(odds.clone());
        }
        match &input.odds_response {
            Some(body) => odds_from_response(body, self.config.preferred_bookmaker),
            None => Err(EngineError::missing("bookmaker odds")),
        }
    }

    /// Stages 1-4 for a single fixture.
    pub fn analyze(&self, input: &FixtureInput) -> Result<FixtureAnalysis, FixtureFailure> {
        let id = input.fixture.id;
        let expected_goals = self
            .estimate(input)
            .map_err(|e| stage_failure(id, Stage::Estimate, e))?;
        let probabilities = derive_market_probabilities(expected_goals, &self.config.market)
            .map_err(|e| stage_failure(id, Stage::Markets, e))?;
        let odds = self
            .odds(input)
            .map_err(|e| stage_failure(id, Stage::Value, e))?;
        let value_bets = find_value_bets(&input.fixture, &probabilities, &odds);
        Ok(FixtureAnalysis {
            fixture: input.fixture.clone(),
            expected_goals,
            probabilities,
            value_bets,
        })
    }

    /// Runs every fixture, isolating failures so one bad fixture never stops
    /// the batch. Fixtures the sink already knows are skipped.
    pub fn run_batch(&self, inputs: &[FixtureInput], sink: &mut dyn BetSink) -> BatchReport {
        let mut report = BatchReport::default();

        for input in inputs {
            let fixture_id = input.fixture.id;
            if !self.league_allowed(input) {
                report.skipped_league += 1;
                continue;
            }
            match sink.contains_fixture(fixture_id) {
                Ok(true) => {
                    debug!(fixture_id, "fixture already analyzed");
                    report.skipped_existing += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(fixture_id, stage = %Stage::Sink, error = %err, "sink lookup failed");
                    report.failures.push(FixtureFailure {
                        fixture_id,
                        stage: Stage::Sink,
                        reason: format!("{err:#}"),
                        error: None,
                    });
                    continue;
                }
            }

            let analysis = match self.analyze(input) {
                Ok(analysis) => analysis,
                Err(failure) => {
                    warn!(
                        fixture_id,
                        stage = %failure.stage,
                        error = %failure.reason,
                        "skipping fixture"
                    );
                    report.failures.push(failure);
                    continue;
                }
            };
            report.analyzed += 1;

            for bet in &analysis.value_bets {
                debug!(
                    fixture_id,
                    market = %bet.market,
                    selection = %bet.selection,
                    probability = bet.probability,
                    odds = bet.odds,
                    edge = bet.edge,
                    "value bet"
                );
            }
            if analysis.value_bets.is_empty() {
                continue;
            }

            match sink.create(&analysis.fixture, &analysis.value_bets) {
                Ok(_) => report.stored.extend(analysis.value_bets),
                Err(err) => {
                    warn!(fixture_id, stage = %Stage::Sink, error = %err, "storing bets failed");
                    report.failures.push(FixtureFailure {
                        fixture_id,
                        stage: Stage::Sink,
                        reason: format!("{err:#}"),
                        error: None,
                    });
                }
            }
        }

        info!(
            fixtures = inputs.len(),
            analyzed = report.analyzed,
            value_bets = report.stored.len(),
            failures = report.failures.len(),
            "batch complete"
        );
        report
    }
}

/// In-process sink keyed by (fixture, market, selection).
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    bets: Vec<ValueBet>,
    index: HashMap<(u64, Market, Selection), usize>,
    fixtures: HashSet<u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bets(&self) -> &[ValueBet] {
        &self.bets
    }

    pub fn into_bets(self) -> Vec<ValueBet> {
        self.bets
    }

    pub fn settle(&mut self, fixture_id: u64, score: Option<FinalScore>) -> SettlementReport {
        settle_fixture(&mut self.bets, fixture_id, score)
    }
}

impl BetSink for MemorySink {
    fn contains_fixture(&self, fixture_id: u64) -> Result<bool> {
        Ok(self.fixtures.contains(&fixture_id))
    }

    fn create(&mut self, fixture: &FixtureKey, bets: &[ValueBet]) -> Result<usize> {
        self.fixtures.insert(fixture.id);
        let mut created = 0usize;
        for bet in bets {
            if self.index.contains_key(&bet.key()) {
                continue;
            }
            self.index.insert(bet.key(), self.bets.len());
            self.bets.push(bet.clone());
            created += 1;
        }
        Ok(created)
    }

    fn update_outcome(&mut self, bet: &ValueBet) -> Result<bool> {
        let Some(idx) = self.index.get(&bet.key()).copied() else {
            return Ok(false);
        };
        let stored = &mut self.bets[idx];
        if stored.outcome().is_terminal() || !bet.outcome().is_terminal() {
            return Ok(false);
        }
        stored.outcome = bet.outcome();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::Outcome;

    fn fixture(id: u64) -> FixtureKey {
        FixtureKey {
            id,
            league: "Serie A".to_string(),
        }
    }

    #[test]
    fn memory_sink_rejects_duplicates() {
        let mut sink = MemorySink::new();
        let bet = ValueBet::new(&fixture(1), Market::OneXTwo, Selection::Home, 0.6, 2.0);
        assert_eq!(sink.create(&fixture(1), &[bet.clone(), bet.clone()]).unwrap(), 1);
        assert_eq!(sink.create(&fixture(1), &[bet]).unwrap(), 0);
        assert_eq!(sink.bets().len(), 1);
        assert!(sink.contains_fixture(1).unwrap());
    }

    #[test]
    fn memory_sink_updates_outcome_once() {
        let mut sink = MemorySink::new();
        let mut bet = ValueBet::new(&fixture(1), Market::OneXTwo, Selection::Home, 0.6, 2.0);
        sink.create(&fixture(1), std::slice::from_ref(&bet)).unwrap();
        assert!(!sink.update_outcome(&bet).unwrap());

        bet.settle(Some(FinalScore::new(1, 0))).unwrap();
        assert!(sink.update_outcome(&bet).unwrap());

        let loser = ValueBet::restore(
            &fixture(1),
            Market::OneXTwo,
            Selection::Home,
            0.6,
            2.0,
            Outcome::Loss,
        );
        assert!(!sink.update_outcome(&loser).unwrap());
        assert_eq!(sink.bets()[0].outcome(), Outcome::Win);
    }

    #[test]
    fn allow_list_requires_league_id() {
        let pipeline = Pipeline::new(PipelineConfig {
            allowed_leagues: Some(HashSet::from([39])),
            ..PipelineConfig::default()
        });
        let mut input = FixtureInput {
            fixture: fixture(5),
            league_id: None,
            home: None,
            away: None,
            league_averages: None,
            odds: None,
            odds_response: None,
        };
        assert!(!pipeline.league_allowed(&input));
        input.league_id = Some(39);
        assert!(pipeline.league_allowed(&input));
    }
}
