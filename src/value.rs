use serde::{Deserialize, Serialize};

use crate::market::{Market, MarketProbabilitySet, OddsSet, Selection};
use crate::settlement::Outcome;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixtureKey {
    pub id: u64,
    pub league: String,
}

/// A flagged selection. `outcome` starts as `Pending` and moves to a terminal
/// state exactly once, through `ValueBet::settle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBet {
    pub fixture_id: u64,
    pub league: String,
    pub market: Market,
    pub selection: Selection,
    pub probability: f64,
    pub odds: f64,
    pub edge: f64,
    pub(crate) outcome: Outcome,
}

impl ValueBet {
    pub fn new(
        fixture: &FixtureKey,
        market: Market,
        selection: Selection,
        probability: f64,
        odds: f64,
    ) -> Self {
        Self {
            fixture_id: fixture.id,
            league: fixture.league.clone(),
            market,
            selection,
            probability,
            odds,
            edge: probability * odds,
            outcome: Outcome::Pending,
        }
    }

    /// Rebuilds a bet whose outcome was recorded elsewhere.
    pub fn restore(
        fixture: &FixtureKey,
        market: Market,
        selection: Selection,
        probability: f64,
        odds: f64,
        outcome: Outcome,
    ) -> Self {
        Self {
            outcome,
            ..Self::new(fixture, market, selection, probability, odds)
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Identity used for de-duplication: one entry per fixture/market/selection.
    pub fn key(&self) -> (u64, Market, Selection) {
        (self.fixture_id, self.market, self.selection)
    }
}

pub fn is_value(edge: f64) -> bool {
    edge > 1.0
}

/// Selections priced in both inputs whose `probability × odds` exceeds 1.
///
/// Output follows market order (1X2, Over/Under by line, BTTS) and selection
/// order within each market. Markets without odds are skipped.
pub fn find_value_bets(
    fixture: &FixtureKey,
    probs: &MarketProbabilitySet,
    odds: &OddsSet,
) -> Vec<ValueBet> {
    probs
        .iter()
        .filter_map(|(market, selection, probability)| {
            let price = odds.get(market, selection)?;
            is_value(probability * price)
                .then(|| ValueBet::new(fixture, market, selection, probability, price))
        })
        .collect()
}
