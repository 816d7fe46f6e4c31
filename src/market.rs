use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Goal line for Over/Under markets, stored in half-goal units so settlement
/// comparisons stay in integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct GoalLine {
    half_goals: u16,
}

impl GoalLine {
    pub const DEFAULT: GoalLine = GoalLine { half_goals: 5 };

    pub fn new(line: f64) -> EngineResult<Self> {
        if !line.is_finite() || line < 0.0 {
            return Err(EngineError::invalid(format!("goal line {line} must be >= 0")));
        }
        let doubled = line * 2.0;
        if doubled.fract() != 0.0 || doubled > f64::from(u16::MAX) {
            return Err(EngineError::invalid(format!(
                "goal line {line} is not a multiple of 0.5"
            )));
        }
        Ok(Self {
            half_goals: doubled as u16,
        })
    }

    pub fn value(self) -> f64 {
        f64::from(self.half_goals) / 2.0
    }

    pub fn is_integer(self) -> bool {
        self.half_goals % 2 == 0
    }

    /// Compares a match total against the line: `Greater` means over.
    pub fn compare_total(self, total_goals: u32) -> std::cmp::Ordering {
        (total_goals * 2).cmp(&u32::from(self.half_goals))
    }

    fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().replace('_', ".");
        let line = normalized.parse::<f64>().ok()?;
        Self::new(line).ok()
    }
}

impl Default for GoalLine {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for GoalLine {
    type Error = EngineError;

    fn try_from(line: f64) -> EngineResult<Self> {
        GoalLine::new(line)
    }
}

impl From<GoalLine> for f64 {
    fn from(line: GoalLine) -> Self {
        line.value()
    }
}

impl fmt::Display for GoalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.half_goals / 2)
        } else {
            write!(f, "{}.5", self.half_goals / 2)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Market {
    OneXTwo,
    OverUnder(GoalLine),
    BothTeamsScore,
}

impl Market {
    pub fn selections(self) -> &'static [Selection] {
        match self {
            Market::OneXTwo => &[Selection::Home, Selection::Draw, Selection::Away],
            Market::OverUnder(_) => &[Selection::Over, Selection::Under],
            Market::BothTeamsScore => &[Selection::Yes, Selection::No],
        }
    }

    pub fn supports(self, selection: Selection) -> bool {
        self.selections().contains(&selection)
    }

    /// Stable map key, e.g. `1x2`, `ou_2_5`, `btts`.
    pub fn key(self) -> String {
        match self {
            Market::OneXTwo => "1x2".to_string(),
            Market::OverUnder(line) => format!("ou_{}", line.to_string().replace('.', "_")),
            Market::BothTeamsScore => "btts".to_string(),
        }
    }

    /// Display label, e.g. `1X2`, `O/U 2.5`, `BTTS`.
    pub fn label(self) -> String {
        match self {
            Market::OneXTwo => "1X2".to_string(),
            Market::OverUnder(line) => format!("O/U {line}"),
            Market::BothTeamsScore => "BTTS".to_string(),
        }
    }

    /// Accepts either the key or the label form.
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let s = raw.trim().to_ascii_lowercase();
        let parsed = match s.as_str() {
            "1x2" | "match winner" => Some(Market::OneXTwo),
            "btts" | "both teams score" => Some(Market::BothTeamsScore),
            _ => s
                .strip_prefix("ou_")
                .or_else(|| s.strip_prefix("o/u "))
                .and_then(GoalLine::parse)
                .map(Market::OverUnder),
        };
        parsed.ok_or_else(|| EngineError::unsupported(raw.trim(), "-"))
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<Market> for String {
    fn from(market: Market) -> Self {
        market.key()
    }
}

impl TryFrom<String> for Market {
    type Error = EngineError;

    fn try_from(raw: String) -> EngineResult<Self> {
        Market::parse(&raw)
    }
}

/// Declaration order doubles as the reporting order within a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Selection {
    Home,
    Draw,
    Away,
    Over,
    Under,
    Yes,
    No,
}

impl Selection {
    pub fn label(self) -> &'static str {
        match self {
            Selection::Home => "Home",
            Selection::Draw => "Draw",
            Selection::Away => "Away",
            Selection::Over => "Over",
            Selection::Under => "Under",
            Selection::Yes => "Yes",
            Selection::No => "No",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" | "1" => Some(Selection::Home),
            "draw" | "x" => Some(Selection::Draw),
            "away" | "2" => Some(Selection::Away),
            "over" => Some(Selection::Over),
            "under" => Some(Selection::Under),
            "yes" => Some(Selection::Yes),
            "no" => Some(Selection::No),
            _ => None,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type Book = BTreeMap<Market, BTreeMap<Selection, f64>>;

fn check_pair(market: Market, selection: Selection) -> EngineResult<()> {
    if market.supports(selection) {
        Ok(())
    } else {
        Err(EngineError::unsupported(market.label(), selection.label()))
    }
}

fn flatten(book: &Book) -> impl Iterator<Item = (Market, Selection, f64)> + '_ {
    book.iter().flat_map(|(market, sels)| {
        sels.iter()
            .map(move |(selection, value)| (*market, *selection, *value))
    })
}

/// Modeled probabilities keyed by market then selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Book", into = "Book")]
pub struct MarketProbabilitySet {
    markets: Book,
}

impl MarketProbabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, market: Market, selection: Selection, prob: f64) -> EngineResult<()> {
        check_pair(market, selection)?;
        if !prob.is_finite() || !(0.0..=1.0).contains(&prob) {
            return Err(EngineError::invalid(format!(
                "probability {prob} for {market}/{selection} outside [0, 1]"
            )));
        }
        self.markets.entry(market).or_default().insert(selection, prob);
        Ok(())
    }

    pub fn get(&self, market: Market, selection: Selection) -> Option<f64> {
        self.markets.get(&market)?.get(&selection).copied()
    }

    pub fn market(&self, market: Market) -> Option<&BTreeMap<Selection, f64>> {
        self.markets.get(&market)
    }

    pub fn markets(&self) -> impl Iterator<Item = Market> + '_ {
        self.markets.keys().copied()
    }

    /// Market order, then selection order.
    pub fn iter(&self) -> impl Iterator<Item = (Market, Selection, f64)> + '_ {
        flatten(&self.markets)
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

impl TryFrom<Book> for MarketProbabilitySet {
    type Error = EngineError;

    fn try_from(book: Book) -> EngineResult<Self> {
        let mut out = Self::new();
        for (market, selection, prob) in flatten(&book) {
            out.insert(market, selection, prob)?;
        }
        Ok(out)
    }
}

impl From<MarketProbabilitySet> for Book {
    fn from(set: MarketProbabilitySet) -> Self {
        set.markets
    }
}

/// Decimal bookmaker odds keyed by market then selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Book", into = "Book")]
pub struct OddsSet {
    markets: Book,
}

impl OddsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, market: Market, selection: Selection, odds: f64) -> EngineResult<()> {
        check_pair(market, selection)?;
        if !odds.is_finite() || odds < 1.0 {
            return Err(EngineError::invalid(format!(
                "decimal odds {odds} for {market}/{selection} must be >= 1"
            )));
        }
        self.markets.entry(market).or_default().insert(selection, odds);
        Ok(())
    }

    pub fn get(&self, market: Market, selection: Selection) -> Option<f64> {
        self.markets.get(&market)?.get(&selection).copied()
    }

    pub fn market(&self, market: Market) -> Option<&BTreeMap<Selection, f64>> {
        self.markets.get(&market)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Market, Selection, f64)> + '_ {
        flatten(&self.markets)
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Sum of inverse odds over a complete market; above 1 is the bookmaker margin.
    pub fn overround(&self, market: Market) -> Option<f64> {
        let prices = self.complete_market(market)?;
        Some(prices.iter().map(|(_, odds)| 1.0 / odds).sum())
    }

    /// Margin-free implied probabilities for a complete market.
    pub fn implied_probabilities(&self, market: Market) -> Option<BTreeMap<Selection, f64>> {
        let prices = self.complete_market(market)?;
        let sum: f64 = prices.iter().map(|(_, odds)| 1.0 / odds).sum();
        if sum <= 0.0 {
            return None;
        }
        Some(
            prices
                .into_iter()
                .map(|(selection, odds)| (selection, (1.0 / odds) / sum))
                .collect(),
        )
    }

    fn complete_market(&self, market: Market) -> Option<Vec<(Selection, f64)>> {
        let book = self.markets.get(&market)?;
        market
            .selections()
            .iter()
            .map(|selection| book.get(selection).map(|odds| (*selection, *odds)))
            .collect()
    }
}

impl TryFrom<Book> for OddsSet {
    type Error = EngineError;

    fn try_from(book: Book) -> EngineResult<Self> {
        let mut out = Self::new();
        for (market, selection, odds) in flatten(&book) {
            out.insert(market, selection, odds)?;
        }
        Ok(out)
    }
}

impl From<OddsSet> for Book {
    fn from(set: OddsSet) -> Self {
        set.markets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_line_rejects_quarter_lines() {
        assert!(GoalLine::new(2.25).is_err());
        assert!(GoalLine::new(-0.5).is_err());
        assert!(GoalLine::new(f64::NAN).is_err());
        assert_eq!(GoalLine::new(2.5).unwrap(), GoalLine::DEFAULT);
    }

    #[test]
    fn market_keys_parse_back() {
        let line = GoalLine::new(3.0).unwrap();
        assert_eq!(Market::OverUnder(line).key(), "ou_3");
        assert_eq!(Market::OverUnder(GoalLine::DEFAULT).key(), "ou_2_5");
        assert_eq!(Market::parse("ou_2_5").unwrap(), Market::OverUnder(GoalLine::DEFAULT));
        assert_eq!(Market::parse("O/U 3").unwrap(), Market::OverUnder(line));
        assert_eq!(Market::parse("1X2").unwrap(), Market::OneXTwo);
        assert!(matches!(
            Market::parse("corners"),
            Err(EngineError::UnsupportedMarket { .. })
        ));
    }

    #[test]
    fn markets_order_by_declaration_then_line() {
        let mut markets = vec![
            Market::BothTeamsScore,
            Market::OverUnder(GoalLine::new(3.5).unwrap()),
            Market::OneXTwo,
            Market::OverUnder(GoalLine::new(1.5).unwrap()),
        ];
        markets.sort();
        assert_eq!(markets[0], Market::OneXTwo);
        assert_eq!(markets[1], Market::OverUnder(GoalLine::new(1.5).unwrap()));
        assert_eq!(markets[3], Market::BothTeamsScore);
    }

    #[test]
    fn odds_set_rejects_mismatched_selection() {
        let mut odds = OddsSet::new();
        assert!(odds.insert(Market::OneXTwo, Selection::Over, 2.0).is_err());
        assert!(odds.insert(Market::OneXTwo, Selection::Home, 0.9).is_err());
    }

    #[test]
    fn implied_probabilities_remove_margin() {
        let mut odds = OddsSet::new();
        odds.insert(Market::OneXTwo, Selection::Home, 2.10).unwrap();
        odds.insert(Market::OneXTwo, Selection::Draw, 3.40).unwrap();
        odds.insert(Market::OneXTwo, Selection::Away, 3.60).unwrap();
        let implied = odds.implied_probabilities(Market::OneXTwo).unwrap();
        let sum: f64 = implied.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(odds.overround(Market::OneXTwo).unwrap() > 1.0);
        assert!(odds.implied_probabilities(Market::BothTeamsScore).is_none());
    }

    #[test]
    fn odds_set_json_uses_string_keys() {
        let raw = r#"{"1x2":{"Home":2.1,"Draw":3.4,"Away":3.6},"ou_2_5":{"Over":1.9}}"#;
        let odds: OddsSet = serde_json::from_str(raw).unwrap();
        assert_eq!(odds.get(Market::OneXTwo, Selection::Draw), Some(3.4));
        assert_eq!(
            odds.get(Market::OverUnder(GoalLine::DEFAULT), Selection::Over),
            Some(1.9)
        );
        let bad = r#"{"btts":{"Home":2.0}}"#;
        assert!(serde_json::from_str::<OddsSet>(bad).is_err());
    }
}
