use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{Discrete, Poisson};

use crate::error::{EngineError, EngineResult};
use crate::estimator::ExpectedGoals;

pub const DEFAULT_MAX_GOALS: u32 = 5;
const MAX_GRID_GOALS: u32 = 30;

/// How 1X2 probabilities are produced. Over/Under and BTTS always use the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionStrategy {
    Grid,
    #[default]
    ClosedForm,
}

impl FromStr for DistributionStrategy {
    type Err = EngineError;

    fn from_str(raw: &str) -> EngineResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "grid" | "poisson" => Ok(Self::Grid),
            "closed-form" | "closed_form" | "skellam" => Ok(Self::ClosedForm),
            other => Err(EngineError::invalid(format!(
                "unknown distribution strategy {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreeWay {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl ThreeWay {
    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }
}

fn poisson(lambda: f64) -> EngineResult<Poisson> {
    Poisson::new(lambda)
        .map_err(|err| EngineError::invalid(format!("poisson rate {lambda}: {err}")))
}

fn poisson_pmfs(lambda: f64, max_k: usize) -> EngineResult<Vec<f64>> {
    let dist = poisson(lambda)?;
    Ok((0..=max_k as u64).map(|k| dist.pmf(k)).collect())
}

/// Independent-Poisson scoreline grid over `[0, max_goals]²`.
///
/// Mass beyond `max_goals` is dropped, so `total_mass()` is below 1. Callers
/// that need a proper distribution renormalize by it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDistribution {
    max_goals: u32,
    // Row-major: index = home_goals * (max_goals + 1) + away_goals.
    cells: Vec<f64>,
}

impl ScoreDistribution {
    pub fn from_expected_goals(xg: ExpectedGoals, max_goals: u32) -> EngineResult<Self> {
        if max_goals > MAX_GRID_GOALS {
            return Err(EngineError::invalid(format!(
                "max_goals {max_goals} exceeds {MAX_GRID_GOALS}"
            )));
        }
        let home = poisson_pmfs(xg.home_lambda, max_goals as usize)?;
        let away = poisson_pmfs(xg.away_lambda, max_goals as usize)?;

        let cells = home
            .iter()
            .flat_map(|p_h| away.iter().map(move |p_a| p_h * p_a))
            .collect();
        Ok(Self { max_goals, cells })
    }

    pub fn max_goals(&self) -> u32 {
        self.max_goals
    }

    fn side(&self) -> usize {
        self.max_goals as usize + 1
    }

    pub fn prob(&self, home_goals: u32, away_goals: u32) -> f64 {
        if home_goals > self.max_goals || away_goals > self.max_goals {
            return 0.0;
        }
        self.cells[home_goals as usize * self.side() + away_goals as usize]
    }

    /// `(home_goals, away_goals, mass)` for every cell.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        let side = self.side();
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, p)| ((idx / side) as u32, (idx % side) as u32, *p))
    }

    pub fn total_mass(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// Mass where the home side scored `goals`.
    pub fn home_marginal(&self, goals: u32) -> f64 {
        (0..=self.max_goals).map(|a| self.prob(goals, a)).sum()
    }

    /// Mass where the away side scored `goals`.
    pub fn away_marginal(&self, goals: u32) -> f64 {
        (0..=self.max_goals).map(|h| self.prob(h, goals)).sum()
    }
}

/// Distribution of `home_goals - away_goals` for independent Poisson sides.
///
/// Both Poisson tails are carried far enough that the dropped mass is below
/// double precision, which removes the truncation bias of the grid.
#[derive(Debug, Clone)]
pub struct Skellam {
    home: Vec<f64>,
    away: Vec<f64>,
}

fn tail_len(lambda: f64) -> usize {
    (lambda + 12.0 * lambda.sqrt() + 25.0).ceil() as usize
}

impl Skellam {
    pub fn new(xg: ExpectedGoals) -> EngineResult<Self> {
        Ok(Self {
            home: poisson_pmfs(xg.home_lambda, tail_len(xg.home_lambda))?,
            away: poisson_pmfs(xg.away_lambda, tail_len(xg.away_lambda))?,
        })
    }

    fn mass_where(&self, keep: impl Fn(i64) -> bool) -> f64 {
        let mut total = 0.0;
        for (i, p_h) in self.home.iter().enumerate() {
            for (j, p_a) in self.away.iter().enumerate() {
                if keep(i as i64 - j as i64) {
                    total += p_h * p_a;
                }
            }
        }
        total
    }

    /// P(difference == k)
    pub fn pmf(&self, k: i64) -> f64 {
        self.mass_where(|d| d == k)
    }

    /// P(difference <= k)
    pub fn cdf(&self, k: i64) -> f64 {
        self.mass_where(|d| d <= k)
    }

    /// P(difference > k)
    pub fn sf(&self, k: i64) -> f64 {
        self.mass_where(|d| d > k)
    }

    pub fn one_x_two(&self) -> ThreeWay {
        ThreeWay {
            home: self.sf(0),
            draw: self.pmf(0),
            away: self.cdf(-1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xg(h: f64, a: f64) -> ExpectedGoals {
        ExpectedGoals::new(h, a).unwrap()
    }

    #[test]
    fn grid_cell_is_product_of_marginals() {
        let grid = ScoreDistribution::from_expected_goals(xg(1.6, 1.1), 5).unwrap();
        let expected = (-1.6f64).exp() * 1.6 * (-1.1f64).exp() * 1.1f64.powi(2) / 2.0;
        assert!((grid.prob(1, 2) - expected).abs() < 1e-12);
        assert_eq!(grid.prob(6, 0), 0.0);
        assert_eq!(grid.cells().count(), 36);
    }

    #[test]
    fn grid_truncation_leaves_mass_below_one() {
        let grid = ScoreDistribution::from_expected_goals(xg(2.8, 2.2), 5).unwrap();
        let total = grid.total_mass();
        assert!(total < 1.0);
        assert!(total > 0.8);
    }

    #[test]
    fn grid_rejects_oversized_bound() {
        assert!(ScoreDistribution::from_expected_goals(xg(1.0, 1.0), 31).is_err());
    }

    #[test]
    fn skellam_parts_cover_the_whole_line() {
        let sk = Skellam::new(xg(1.45, 1.05)).unwrap();
        let parts = sk.one_x_two();
        assert!((parts.sum() - 1.0).abs() < 1e-12);
        assert!((sk.cdf(0) + sk.sf(0) - 1.0).abs() < 1e-12);
        assert!(parts.home > parts.away);
    }

    #[test]
    fn skellam_is_symmetric_for_equal_rates() {
        let sk = Skellam::new(xg(1.3, 1.3)).unwrap();
        assert!((sk.pmf(2) - sk.pmf(-2)).abs() < 1e-14);
        let parts = sk.one_x_two();
        assert!((parts.home - parts.away).abs() < 1e-12);
    }

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!("grid".parse::<DistributionStrategy>().unwrap(), DistributionStrategy::Grid);
        assert_eq!(
            "Skellam".parse::<DistributionStrategy>().unwrap(),
            DistributionStrategy::ClosedForm
        );
        assert!("normal".parse::<DistributionStrategy>().is_err());
    }
}
