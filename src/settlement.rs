use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::market::{Market, Selection};
use crate::value::ValueBet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Outcome {
    #[default]
    Pending,
    Win,
    Loss,
    Push,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pending => "Pending",
            Outcome::Win => "Win",
            Outcome::Loss => "Loss",
            Outcome::Push => "Push",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "" => Some(Outcome::Pending),
            "win" => Some(Outcome::Win),
            "loss" => Some(Outcome::Loss),
            "push" => Some(Outcome::Push),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub home: u32,
    pub away: u32,
}

impl FinalScore {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    pub fn total(self) -> u32 {
        self.home + self.away
    }
}

fn win_or_loss(won: bool) -> Outcome {
    if won { Outcome::Win } else { Outcome::Loss }
}

/// Terminal outcome of `selection` in `market` for a finished match.
pub fn resolve(market: Market, selection: Selection, score: FinalScore) -> EngineResult<Outcome> {
    let (h, a) = (score.home, score.away);
    let outcome = match (market, selection) {
        (Market::OneXTwo, Selection::Home) => win_or_loss(h > a),
        (Market::OneXTwo, Selection::Draw) => win_or_loss(h == a),
        (Market::OneXTwo, Selection::Away) => win_or_loss(a > h),
        (Market::OverUnder(line), Selection::Over | Selection::Under) => {
            match (line.compare_total(score.total()), selection) {
                (Ordering::Equal, _) => Outcome::Push,
                (Ordering::Greater, Selection::Over) | (Ordering::Less, Selection::Under) => {
                    Outcome::Win
                }
                _ => Outcome::Loss,
            }
        }
        (Market::BothTeamsScore, Selection::Yes) => win_or_loss(h > 0 && a > 0),
        (Market::BothTeamsScore, Selection::No) => win_or_loss(h == 0 || a == 0),
        _ => return Err(EngineError::unsupported(market.label(), selection.label())),
    };
    Ok(outcome)
}

impl ValueBet {
    /// Moves a pending bet to its terminal outcome.
    ///
    /// A bet that is already terminal keeps its outcome regardless of the
    /// score passed in. `None` (match not finished) leaves it pending. On an
    /// unsupported market/selection pair the bet stays pending and the error
    /// is returned.
    pub fn settle(&mut self, score: Option<FinalScore>) -> EngineResult<Outcome> {
        if self.outcome.is_terminal() {
            return Ok(self.outcome);
        }
        let Some(score) = score else {
            return Ok(Outcome::Pending);
        };
        self.outcome = resolve(self.market, self.selection, score)?;
        Ok(self.outcome)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementReport {
    pub settled: usize,
    pub already_terminal: usize,
    pub still_pending: usize,
    pub errors: Vec<EngineError>,
}

/// Settles every bet belonging to `fixture_id`.
pub fn settle_fixture(
    bets: &mut [ValueBet],
    fixture_id: u64,
    score: Option<FinalScore>,
) -> SettlementReport {
    let mut report = SettlementReport::default();
    for bet in bets.iter_mut().filter(|b| b.fixture_id == fixture_id) {
        if bet.outcome().is_terminal() {
            report.already_terminal += 1;
            continue;
        }
        match bet.settle(score) {
            Ok(Outcome::Pending) => report.still_pending += 1,
            Ok(_) => report.settled += 1,
            Err(err) => {
                report.still_pending += 1;
                report.errors.push(err);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::GoalLine;
    use crate::value::FixtureKey;

    fn bet(market: Market, selection: Selection) -> ValueBet {
        let fixture = FixtureKey {
            id: 7,
            league: "Ligue 1".to_string(),
        };
        ValueBet::new(&fixture, market, selection, 0.55, 2.0)
    }

    #[test]
    fn second_settle_keeps_first_outcome() {
        let mut b = bet(Market::OneXTwo, Selection::Home);
        assert_eq!(b.settle(Some(FinalScore::new(2, 1))).unwrap(), Outcome::Win);
        assert_eq!(b.settle(Some(FinalScore::new(0, 3))).unwrap(), Outcome::Win);
        assert_eq!(b.outcome(), Outcome::Win);
    }

    #[test]
    fn unfinished_match_stays_pending() {
        let mut b = bet(Market::BothTeamsScore, Selection::Yes);
        assert_eq!(b.settle(None).unwrap(), Outcome::Pending);
        assert_eq!(b.settle(Some(FinalScore::new(1, 0))).unwrap(), Outcome::Loss);
    }

    #[test]
    fn mismatched_pair_is_rejected_and_stays_pending() {
        let mut b = bet(Market::OneXTwo, Selection::Over);
        let err = b.settle(Some(FinalScore::new(1, 1))).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedMarket { .. }));
        assert_eq!(b.outcome(), Outcome::Pending);
    }

    #[test]
    fn half_goal_line_never_pushes() {
        let line = Market::OverUnder(GoalLine::DEFAULT);
        for (h, a) in [(0, 0), (1, 1), (2, 1), (3, 3)] {
            let out = resolve(line, Selection::Over, FinalScore::new(h, a)).unwrap();
            assert_ne!(out, Outcome::Push);
        }
    }

    #[test]
    fn fixture_settlement_counts_each_bet() {
        let mut bets = vec![
            bet(Market::OneXTwo, Selection::Draw),
            bet(Market::OneXTwo, Selection::Over),
            bet(Market::BothTeamsScore, Selection::No),
        ];
        bets[2].outcome = Outcome::Win;
        let report = settle_fixture(&mut bets, 7, Some(FinalScore::new(0, 0)));
        assert_eq!(report.settled, 1);
        assert_eq!(report.already_terminal, 1);
        assert_eq!(report.still_pending, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(bets[0].outcome(), Outcome::Win);
    }

    #[test]
    fn outcome_labels_round_trip() {
        for o in [Outcome::Pending, Outcome::Win, Outcome::Loss, Outcome::Push] {
            assert_eq!(Outcome::parse(o.as_str()), Some(o));
        }
        assert_eq!(Outcome::parse("void"), None);
    }
}
