use std::fs;

use anyhow::{Context, Result, anyhow};
use tracing::warn;

use value_engine::cli;
use value_engine::config::EngineConfig;
use value_engine::feed;
use value_engine::store::BetStore;
use value_engine::telemetry;

fn main() -> Result<()> {
    let config = EngineConfig::from_env();
    telemetry::init_tracing(&config.log_level);

    let args = cli::args();
    let input_path = cli::positional_arg(&args)
        .ok_or_else(|| anyhow!("usage: settle_bets <results.json> [--db path]"))?;
    let raw = fs::read_to_string(&input_path)
        .with_context(|| format!("read {}", input_path.display()))?;
    let scores = feed::parse_final_scores_json(&raw)
        .with_context(|| format!("parse {}", input_path.display()))?;

    let db_path = cli::parse_db_path_arg(&args)
        .or_else(|| config.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let mut store = BetStore::open(&db_path)?;

    let mut settled = 0usize;
    let mut waiting = 0usize;
    for fixture_id in store.pending_fixture_ids()? {
        let score = scores.get(&fixture_id).copied().flatten();
        let report = store.settle_fixture(fixture_id, score)?;
        settled += report.settled;
        waiting += report.still_pending;
        for err in &report.errors {
            warn!(fixture_id, stage = "settlement", error = %err, "bet left pending");
        }
    }

    println!("Settlement complete");
    println!("DB: {}", db_path.display());
    println!("settled={settled} still_pending={waiting}");
    Ok(())
}
