use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::distribution::{DistributionStrategy, ScoreDistribution, Skellam, ThreeWay};
use crate::error::{EngineError, EngineResult};
use crate::estimator::ExpectedGoals;
use crate::market::{GoalLine, Market, MarketProbabilitySet, Selection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub strategy: DistributionStrategy,
    pub max_goals: u32,
    pub goal_lines: Vec<GoalLine>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            strategy: DistributionStrategy::default(),
            max_goals: crate::distribution::DEFAULT_MAX_GOALS,
            goal_lines: vec![GoalLine::DEFAULT],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoWay {
    pub first: f64,
    pub second: f64,
}

fn normalized(parts: &[f64]) -> EngineResult<Vec<f64>> {
    let sum: f64 = parts.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(EngineError::invalid(
            "score grid carries no mass for this market",
        ));
    }
    Ok(parts.iter().map(|p| p / sum).collect())
}

/// Home/draw/away from the grid, renormalized by the grid's total mass.
pub fn one_x_two_from_grid(grid: &ScoreDistribution) -> EngineResult<ThreeWay> {
    let mut home = 0.0;
    let mut draw = 0.0;
    let mut away = 0.0;
    for (h, a, p) in grid.cells() {
        match h.cmp(&a) {
            Ordering::Greater => home += p,
            Ordering::Equal => draw += p,
            Ordering::Less => away += p,
        }
    }
    let parts = normalized(&[home, draw, away])?;
    Ok(ThreeWay {
        home: parts[0],
        draw: parts[1],
        away: parts[2],
    })
}

/// Over/under mass around `line`. On integer lines the `total == line` cells
/// belong to neither side.
pub fn over_under_from_grid(grid: &ScoreDistribution, line: GoalLine) -> EngineResult<TwoWay> {
    let mut over = 0.0;
    let mut under = 0.0;
    for (h, a, p) in grid.cells() {
        match line.compare_total(h + a) {
            Ordering::Greater => over += p,
            Ordering::Less => under += p,
            Ordering::Equal => {}
        }
    }
    let parts = normalized(&[over, under])?;
    Ok(TwoWay {
        first: parts[0],
        second: parts[1],
    })
}

/// Both-teams-to-score as `(yes, no)`; `no` is row 0 plus column 0 minus the
/// shared 0-0 cell.
pub fn btts_from_grid(grid: &ScoreDistribution) -> EngineResult<TwoWay> {
    let total = grid.total_mass();
    if !total.is_finite() || total <= 0.0 {
        return Err(EngineError::invalid("score grid carries no mass for BTTS"));
    }
    let no_mass = grid.home_marginal(0) + grid.away_marginal(0) - grid.prob(0, 0);
    let no = (no_mass / total).clamp(0.0, 1.0);
    Ok(TwoWay {
        first: 1.0 - no,
        second: no,
    })
}

pub fn derive_market_probabilities(
    xg: ExpectedGoals,
    cfg: &MarketConfig,
) -> EngineResult<MarketProbabilitySet> {
    let grid = ScoreDistribution::from_expected_goals(xg, cfg.max_goals)?;
    let one_x_two = match cfg.strategy {
        DistributionStrategy::Grid => one_x_two_from_grid(&grid)?,
        DistributionStrategy::ClosedForm => Skellam::new(xg)?.one_x_two(),
    };

    let mut out = MarketProbabilitySet::new();
    out.insert(Market::OneXTwo, Selection::Home, one_x_two.home)?;
    out.insert(Market::OneXTwo, Selection::Draw, one_x_two.draw)?;
    out.insert(Market::OneXTwo, Selection::Away, one_x_two.away)?;

    for line in &cfg.goal_lines {
        let ou = over_under_from_grid(&grid, *line)?;
        let market = Market::OverUnder(*line);
        out.insert(market, Selection::Over, ou.first)?;
        out.insert(market, Selection::Under, ou.second)?;
    }

    let btts = btts_from_grid(&grid)?;
    out.insert(Market::BothTeamsScore, Selection::Yes, btts.first)?;
    out.insert(Market::BothTeamsScore, Selection::No, btts.second)?;
    Ok(out)
}
