use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::settlement::Outcome;
use crate::value::ValueBet;

pub const DEFAULT_MIN_LEAGUE_BETS: usize = 10;

/// Half-open `[lower, upper)` range, closed on the right when `upper_inclusive`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub upper_inclusive: bool,
    pub label: &'static str,
}

impl Bin {
    const fn open(lower: f64, upper: f64, label: &'static str) -> Self {
        Self {
            lower,
            upper,
            upper_inclusive: false,
            label,
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && (x < self.upper || (self.upper_inclusive && x == self.upper))
    }
}

pub const ODDS_BINS: &[Bin] = &[
    Bin::open(1.0, 1.5, "1.0-1.5"),
    Bin::open(1.5, 2.0, "1.5-2.0"),
    Bin::open(2.0, 2.5, "2.0-2.5"),
    Bin::open(2.5, 3.0, "2.5-3.0"),
    Bin::open(3.0, 4.0, "3.0-4.0"),
    Bin::open(4.0, f64::INFINITY, "4.0+"),
];

pub const VALUE_BINS: &[Bin] = &[
    Bin::open(1.0, 1.1, "1.0-1.1"),
    Bin::open(1.1, 1.2, "1.1-1.2"),
    Bin::open(1.2, 1.4, "1.2-1.4"),
    Bin::open(1.4, 1.6, "1.4-1.6"),
    Bin::open(1.6, 2.0, "1.6-2.0"),
    Bin::open(2.0, f64::INFINITY, "2.0+"),
];

pub const PROBABILITY_BINS: &[Bin] = &[
    Bin::open(0.0, 0.4, "<40%"),
    Bin::open(0.4, 0.5, "40-50%"),
    Bin::open(0.5, 0.6, "50-60%"),
    Bin::open(0.6, 0.7, "60-70%"),
    Bin::open(0.7, 0.8, "70-80%"),
    Bin::open(0.8, 0.9, "80-90%"),
    Bin {
        lower: 0.9,
        upper: 1.0,
        upper_inclusive: true,
        label: "90-100%",
    },
];

/// Index of the bin holding `x`, or `None` when it falls outside the table.
pub fn bin_index(bins: &[Bin], x: f64) -> Option<usize> {
    bins.iter().position(|bin| bin.contains(x))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    League,
    Market,
    OddsRange,
    ValueRange,
    ProbabilityRange,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::League,
        Dimension::Market,
        Dimension::OddsRange,
        Dimension::ValueRange,
        Dimension::ProbabilityRange,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Dimension::League => "League",
            Dimension::Market => "Market",
            Dimension::OddsRange => "Odds range",
            Dimension::ValueRange => "Value range",
            Dimension::ProbabilityRange => "Probability range",
        }
    }

    // Categorical keys sort by label (rank 0); binned keys by bin position.
    fn group_key(self, bet: &ValueBet) -> Option<(usize, String)> {
        let binned = |bins: &[Bin], x: f64| {
            bin_index(bins, x).map(|idx| (idx, bins[idx].label.to_string()))
        };
        match self {
            Dimension::League => Some((0, bet.league.clone())),
            Dimension::Market => Some((0, bet.market.label())),
            Dimension::OddsRange => binned(ODDS_BINS, bet.odds),
            Dimension::ValueRange => binned(VALUE_BINS, bet.edge),
            Dimension::ProbabilityRange => binned(PROBABILITY_BINS, bet.probability),
        }
    }
}

impl FromStr for Dimension {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "league" => Ok(Dimension::League),
            "market" => Ok(Dimension::Market),
            "odds" | "odds_range" => Ok(Dimension::OddsRange),
            "value" | "value_range" => Ok(Dimension::ValueRange),
            "prob" | "probability" | "probability_range" => Ok(Dimension::ProbabilityRange),
            other => Err(EngineError::invalid(format!("unknown dimension {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// Applied to the league dimension only.
    pub min_league_bets: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            min_league_bets: DEFAULT_MIN_LEAGUE_BETS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsBucket {
    pub key: String,
    pub bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub win_rate: f64,
    /// Flat one-unit stakes.
    pub profit: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    bets: usize,
    wins: usize,
    losses: usize,
    pushes: usize,
    profit: f64,
}

impl Tally {
    fn add(&mut self, bet: &ValueBet) {
        self.bets += 1;
        match bet.outcome() {
            Outcome::Win => {
                self.wins += 1;
                self.profit += bet.odds - 1.0;
            }
            Outcome::Loss => {
                self.losses += 1;
                self.profit -= 1.0;
            }
            Outcome::Push => self.pushes += 1,
            Outcome::Pending => {}
        }
    }

    fn rates(&self) -> (f64, f64) {
        if self.bets == 0 {
            return (0.0, 0.0);
        }
        let n = self.bets as f64;
        (self.wins as f64 / n, self.profit / n)
    }

    fn into_bucket(self, key: String) -> StatsBucket {
        let (win_rate, roi) = self.rates();
        StatsBucket {
            key,
            bets: self.bets,
            wins: self.wins,
            losses: self.losses,
            pushes: self.pushes,
            win_rate,
            profit: self.profit,
            roi,
        }
    }
}

/// Groups settled bets along `dimension`, best ROI first.
///
/// Pending bets are ignored. Pushes count toward `bets` but not toward
/// profit. Values outside a bin table are dropped. Equal ROIs keep label or
/// bin order.
pub fn aggregate(
    bets: &[ValueBet],
    dimension: Dimension,
    opts: &AggregateOptions,
) -> Vec<StatsBucket> {
    let mut groups: BTreeMap<(usize, String), Tally> = BTreeMap::new();
    for bet in bets.iter().filter(|b| b.outcome().is_terminal()) {
        let Some(key) = dimension.group_key(bet) else {
            continue;
        };
        groups.entry(key).or_default().add(bet);
    }

    let mut out: Vec<StatsBucket> = groups
        .into_iter()
        .filter(|(_, tally)| dimension != Dimension::League || tally.bets >= opts.min_league_bets)
        .map(|((_, label), tally)| tally.into_bucket(label))
        .collect();
    out.sort_by(|a, b| b.roi.total_cmp(&a.roi));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total: usize,
    pub pending: usize,
    pub settled: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub win_rate: f64,
    pub profit: f64,
    pub roi: f64,
}

/// Headline numbers over every bet; rates cover settled bets only.
pub fn summarize(bets: &[ValueBet]) -> PerformanceSummary {
    let mut tally = Tally::default();
    let mut pending = 0usize;
    for bet in bets {
        if bet.outcome().is_terminal() {
            tally.add(bet);
        } else {
            pending += 1;
        }
    }
    let (win_rate, roi) = tally.rates();
    PerformanceSummary {
        total: bets.len(),
        pending,
        settled: tally.bets,
        wins: tally.wins,
        losses: tally.losses,
        pushes: tally.pushes,
        win_rate,
        profit: tally.profit,
        roi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Market, Selection};
    use crate::value::FixtureKey;

    fn settled(league: &str, odds: f64, outcome: Outcome) -> ValueBet {
        let fixture = FixtureKey {
            id: 1,
            league: league.to_string(),
        };
        ValueBet::restore(&fixture, Market::OneXTwo, Selection::Home, 0.6, odds, outcome)
    }

    #[test]
    fn odds_boundary_goes_to_upper_bin() {
        assert_eq!(bin_index(ODDS_BINS, 1.5), Some(1));
        assert_eq!(bin_index(ODDS_BINS, 1.4999), Some(0));
        assert_eq!(bin_index(ODDS_BINS, 12.0), Some(5));
        assert_eq!(bin_index(ODDS_BINS, 0.99), None);
    }

    #[test]
    fn value_table_edges() {
        assert_eq!(bin_index(VALUE_BINS, 1.1), Some(1));
        assert_eq!(bin_index(VALUE_BINS, 1.0999), Some(0));
        assert_eq!(bin_index(VALUE_BINS, 2.0), Some(5));
        assert_eq!(bin_index(VALUE_BINS, 1.0), Some(0));
        assert_eq!(bin_index(VALUE_BINS, 0.98), None);
    }

    #[test]
    fn probability_table_closes_at_one() {
        assert_eq!(bin_index(PROBABILITY_BINS, 1.0), Some(6));
        assert_eq!(bin_index(PROBABILITY_BINS, 0.0), Some(0));
        assert_eq!(bin_index(PROBABILITY_BINS, 1.01), None);
    }

    #[test]
    fn pending_bets_are_ignored() {
        let bets = vec![
            settled("A", 2.0, Outcome::Pending),
            settled("A", 2.0, Outcome::Win),
        ];
        let rows = aggregate(&bets, Dimension::Market, &AggregateOptions::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bets, 1);
        assert!((rows[0].profit - 1.0).abs() < 1e-12);
    }

    #[test]
    fn push_counts_in_denominator_only() {
        let bets = vec![
            settled("A", 2.5, Outcome::Win),
            settled("A", 2.5, Outcome::Push),
        ];
        let rows = aggregate(&bets, Dimension::Market, &AggregateOptions::default());
        assert_eq!(rows[0].bets, 2);
        assert_eq!(rows[0].pushes, 1);
        assert!((rows[0].win_rate - 0.5).abs() < 1e-12);
        assert!((rows[0].roi - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        for dim in Dimension::ALL {
            assert!(aggregate(&[], dim, &AggregateOptions::default()).is_empty());
        }
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.roi, 0.0);
    }

    #[test]
    fn summary_separates_pending() {
        let bets = vec![
            settled("A", 2.0, Outcome::Win),
            settled("A", 3.0, Outcome::Loss),
            settled("B", 1.8, Outcome::Pending),
        ];
        let summary = summarize(&bets);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.settled, 2);
        assert!(summary.profit.abs() < 1e-12);
    }

    #[test]
    fn dimension_names_parse() {
        assert_eq!("odds".parse::<Dimension>().unwrap(), Dimension::OddsRange);
        assert_eq!(
            "probability-range".parse::<Dimension>().unwrap(),
            Dimension::ProbabilityRange
        );
        assert!("team".parse::<Dimension>().is_err());
    }
}
