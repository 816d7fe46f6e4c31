//! Parsers for provider payloads (API-Football v3 shapes). Transport lives
//! outside this crate; these functions only turn response bodies into the
//! engine's input types.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::estimator::TeamSeasonStats;
use crate::market::{GoalLine, Market, OddsSet, Selection};
use crate::settlement::FinalScore;

const FINISHED_STATUSES: &[&str] = &["FT", "AET", "PEN"];

pub const DEFAULT_BOOKMAKER: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureResult {
    pub fixture_id: u64,
    pub status: String,
    /// Only set once the status says the match is over.
    pub score: Option<FinalScore>,
}

fn parse_root(raw: &str, what: &str) -> EngineResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(EngineError::DataUnavailable(format!("empty {what} payload")));
    }
    serde_json::from_str(trimmed)
        .map_err(|err| EngineError::invalid(format!("invalid {what} json: {err}")))
}

fn as_u32(value: &Value) -> Option<u32> {
    if let Some(num) = value.as_u64() {
        return u32::try_from(num).ok();
    }
    value.as_str().and_then(|s| s.trim().parse::<u32>().ok())
}

fn as_f64(value: &Value) -> Option<f64> {
    if let Some(num) = value.as_f64() {
        return Some(num);
    }
    value.as_str().and_then(|s| s.trim().parse::<f64>().ok())
}

fn pointer_u32(value: &Value, path: &str) -> Option<u32> {
    value.pointer(path).and_then(as_u32)
}

/// `teams/statistics` body. Missing numbers stay `None`.
pub fn parse_team_statistics_json(raw: &str) -> EngineResult<TeamSeasonStats> {
    let root = parse_root(raw, "team statistics")?;
    let stats = root.get("response").unwrap_or(&root);
    if !stats.is_object() {
        return Err(EngineError::DataUnavailable(
            "team statistics response is empty".to_string(),
        ));
    }
    Ok(TeamSeasonStats {
        goals_scored_home: pointer_u32(stats, "/goals/for/total/home"),
        goals_conceded_home: pointer_u32(stats, "/goals/against/total/home"),
        goals_scored_away: pointer_u32(stats, "/goals/for/total/away"),
        goals_conceded_away: pointer_u32(stats, "/goals/against/total/away"),
        matches_home: pointer_u32(stats, "/fixtures/played/home"),
        matches_away: pointer_u32(stats, "/fixtures/played/away"),
    })
}

fn market_for_bet(name: &str) -> Option<BetKind> {
    match name.trim().to_ascii_lowercase().as_str() {
        "match winner" | "1x2" => Some(BetKind::MatchWinner),
        "goals over/under" | "over/under" => Some(BetKind::GoalsOverUnder),
        "both teams score" | "both teams to score" => Some(BetKind::BothTeamsScore),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum BetKind {
    MatchWinner,
    GoalsOverUnder,
    BothTeamsScore,
}

/// Splits `"Over 2.5"` into `(Over, 2.5)`.
fn parse_goal_line_value(label: &str) -> Option<(Selection, GoalLine)> {
    let mut parts = label.split_whitespace();
    let selection = Selection::parse(parts.next()?)?;
    if !matches!(selection, Selection::Over | Selection::Under) {
        return None;
    }
    let line = parts.next()?.parse::<f64>().ok()?;
    Some((selection, GoalLine::new(line).ok()?))
}

/// `odds` body. Prefers `preferred_bookmaker`, else the first one listed.
/// Individual prices that fail to parse or fall below 1.0 are skipped.
pub fn parse_odds_response_json(raw: &str, preferred_bookmaker: u32) -> EngineResult<OddsSet> {
    let root = parse_root(raw, "odds")?;
    odds_from_response(&root, preferred_bookmaker)
}

/// Same as [`parse_odds_response_json`] for an already decoded body.
pub fn odds_from_response(root: &Value, preferred_bookmaker: u32) -> EngineResult<OddsSet> {
    let bookmakers = root
        .pointer("/response/0/bookmakers")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .ok_or_else(|| EngineError::DataUnavailable("no bookmakers in odds response".to_string()))?;

    let bookmaker = bookmakers
        .iter()
        .find(|b| b.get("id").and_then(as_u32) == Some(preferred_bookmaker))
        .unwrap_or(&bookmakers[0]);

    let mut odds = OddsSet::new();
    let bets = bookmaker
        .get("bets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for bet in bets {
        let Some(kind) = bet.get("name").and_then(Value::as_str).and_then(market_for_bet) else {
            continue;
        };
        let values = bet
            .get("values")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in values {
            let Some(label) = entry.get("value").and_then(Value::as_str) else {
                continue;
            };
            let Some(price) = entry.get("odd").and_then(as_f64) else {
                continue;
            };
            let pick = match kind {
                BetKind::MatchWinner => Selection::parse(label).map(|s| (Market::OneXTwo, s)),
                BetKind::GoalsOverUnder => {
                    parse_goal_line_value(label).map(|(s, line)| (Market::OverUnder(line), s))
                }
                BetKind::BothTeamsScore => {
                    Selection::parse(label).map(|s| (Market::BothTeamsScore, s))
                }
            };
            let Some((market, selection)) = pick else {
                continue;
            };
            // Invalid prices are dropped one selection at a time.
            let _ = odds.insert(market, selection, price);
        }
    }

    if odds.is_empty() {
        return Err(EngineError::DataUnavailable(
            "odds response carries no supported market".to_string(),
        ));
    }
    Ok(odds)
}

fn parse_fixture_entry(entry: &Value) -> Option<FixtureResult> {
    let fixture_id = entry.pointer("/fixture/id").and_then(Value::as_u64)?;
    let status = entry
        .pointer("/fixture/status/short")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();
    let finished = FINISHED_STATUSES.contains(&status.as_str());
    let score = match (
        pointer_u32(entry, "/goals/home"),
        pointer_u32(entry, "/goals/away"),
    ) {
        (Some(home), Some(away)) if finished => Some(FinalScore::new(home, away)),
        _ => None,
    };
    Some(FixtureResult {
        fixture_id,
        status,
        score,
    })
}

/// `fixtures` body. Entries without a fixture id are skipped.
pub fn parse_fixture_results_json(raw: &str) -> EngineResult<Vec<FixtureResult>> {
    let root = parse_root(raw, "fixtures")?;
    let entries = match root.get("response") {
        Some(Value::Array(list)) => list.as_slice(),
        Some(_) | None => {
            return parse_fixture_entry(&root)
                .map(|r| vec![r])
                .ok_or_else(|| EngineError::missing("fixture id"));
        }
    };
    Ok(entries.iter().filter_map(parse_fixture_entry).collect())
}

/// Final scores keyed by fixture id, from either a `fixtures` body (root has a
/// `response` key) or a plain map `{"<id>": {"home": 2, "away": 1} | null}`.
pub fn parse_final_scores_json(raw: &str) -> EngineResult<HashMap<u64, Option<FinalScore>>> {
    let root = parse_root(raw, "results")?;
    if root.get("response").is_some() {
        let results = parse_fixture_results_json(raw)?;
        return Ok(results
            .into_iter()
            .map(|r| (r.fixture_id, r.score))
            .collect());
    }

    let map: HashMap<String, Option<FinalScore>> = serde_json::from_value(root)
        .map_err(|err| EngineError::invalid(format!("invalid score map: {err}")))?;
    let mut out = HashMap::with_capacity(map.len());
    for (id, score) in map {
        let fixture_id = id
            .trim()
            .parse::<u64>()
            .map_err(|_| EngineError::invalid(format!("fixture id {id:?} is not a number")))?;
        out.insert(fixture_id, score);
    }
    Ok(out)
}
