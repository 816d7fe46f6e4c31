use value_engine::market::{GoalLine, Market, Selection};
use value_engine::settlement::Outcome;
use value_engine::stats::{AggregateOptions, Dimension, aggregate, summarize};
use value_engine::value::{FixtureKey, ValueBet};

fn bet(league: &str, market: Market, odds: f64, outcome: Outcome) -> ValueBet {
    let fixture = FixtureKey {
        id: 1,
        league: league.to_string(),
    };
    let selection = market.selections()[0];
    ValueBet::restore(&fixture, market, selection, 0.62, odds, outcome)
}

#[test]
fn profit_and_roi_for_mixed_results() {
    let bets = vec![
        bet("Serie A", Market::OneXTwo, 2.0, Outcome::Win),
        bet("Serie A", Market::OneXTwo, 1.5, Outcome::Win),
        bet("Serie A", Market::OneXTwo, 3.0, Outcome::Loss),
    ];
    let rows = aggregate(&bets, Dimension::Market, &AggregateOptions::default());
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.key, "1X2");
    assert_eq!(row.bets, 3);
    assert!((row.profit - 0.5).abs() < 1e-9);
    assert!((row.roi - 0.5 / 3.0).abs() < 1e-9);
    assert!((row.win_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn odds_on_bin_edge_use_upper_bin() {
    let bets = vec![bet("Serie A", Market::OneXTwo, 1.5, Outcome::Win)];
    let rows = aggregate(&bets, Dimension::OddsRange, &AggregateOptions::default());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "1.5-2.0");
}

#[test]
fn small_leagues_are_excluded() {
    let mut bets = Vec::new();
    for _ in 0..9 {
        bets.push(bet("Eredivisie", Market::OneXTwo, 4.0, Outcome::Win));
    }
    for i in 0..10 {
        let outcome = if i % 2 == 0 { Outcome::Win } else { Outcome::Loss };
        bets.push(bet("Ligue 1", Market::OneXTwo, 2.1, outcome));
    }

    let leagues = aggregate(&bets, Dimension::League, &AggregateOptions::default());
    assert_eq!(leagues.len(), 1);
    assert_eq!(leagues[0].key, "Ligue 1");
    assert_eq!(leagues[0].bets, 10);

    // The threshold does not apply to other dimensions.
    let markets = aggregate(&bets, Dimension::Market, &AggregateOptions::default());
    assert_eq!(markets[0].bets, 19);

    let relaxed = AggregateOptions { min_league_bets: 1 };
    let leagues = aggregate(&bets, Dimension::League, &relaxed);
    assert_eq!(leagues[0].key, "Eredivisie");
}

#[test]
fn rows_are_sorted_by_roi() {
    let ou = Market::OverUnder(GoalLine::DEFAULT);
    let bets = vec![
        bet("Serie A", Market::OneXTwo, 2.0, Outcome::Loss),
        bet("Serie A", ou, 2.0, Outcome::Win),
        bet("Serie A", Market::BothTeamsScore, 1.8, Outcome::Push),
    ];
    let rows = aggregate(&bets, Dimension::Market, &AggregateOptions::default());
    let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["O/U 2.5", "BTTS", "1X2"]);
    for pair in rows.windows(2) {
        assert!(pair[0].roi >= pair[1].roi);
    }
}

#[test]
fn summary_counts_pending_separately() {
    let bets = vec![
        bet("Serie A", Market::OneXTwo, 2.0, Outcome::Win),
        bet("Serie A", Market::OneXTwo, 2.0, Outcome::Pending),
        bet("Serie A", Market::OneXTwo, 2.0, Outcome::Push),
    ];
    let summary = summarize(&bets);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.settled, 2);
    assert_eq!(summary.pushes, 1);
    assert!((summary.roi - 0.5).abs() < 1e-9);
}

#[test]
fn value_range_groups_by_edge() {
    // edges: 0.55 × 2.0 = 1.1 (lower edge of 1.1-1.2), 1.04 and 2.4
    let fixture = FixtureKey {
        id: 4,
        league: "Serie A".to_string(),
    };
    let bets = vec![
        ValueBet::restore(&fixture, Market::OneXTwo, Selection::Home, 0.55, 2.0, Outcome::Win),
        ValueBet::restore(&fixture, Market::OneXTwo, Selection::Draw, 0.52, 2.0, Outcome::Loss),
        ValueBet::restore(&fixture, Market::BothTeamsScore, Selection::Yes, 0.8, 3.0, Outcome::Loss),
    ];
    let rows = aggregate(&bets, Dimension::ValueRange, &AggregateOptions::default());
    let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["1.1-1.2", "1.0-1.1", "2.0+"]);
    assert!((rows[0].roi - 1.0).abs() < 1e-9);
    assert_eq!(rows[1].bets, 1);
    assert_eq!(rows[2].bets, 1);
}
