use std::fs;

use anyhow::{Context, Result, anyhow};

use value_engine::cli;
use value_engine::config::EngineConfig;
use value_engine::pipeline::{FixtureInput, Pipeline};
use value_engine::store::BetStore;
use value_engine::telemetry;

fn main() -> Result<()> {
    let config = EngineConfig::from_env();
    telemetry::init_tracing(&config.log_level);

    let args = cli::args();
    let input_path = cli::positional_arg(&args)
        .ok_or_else(|| anyhow!("usage: value_scan <fixtures.json> [--db path]"))?;
    let raw = fs::read_to_string(&input_path)
        .with_context(|| format!("read {}", input_path.display()))?;
    let fixtures: Vec<FixtureInput> =
        serde_json::from_str(&raw).context("parse fixture batch json")?;

    let db_path = cli::parse_db_path_arg(&args)
        .or_else(|| config.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let mut store = BetStore::open(&db_path)?;

    let pipeline = Pipeline::new(config.pipeline());
    let report = pipeline.run_batch(&fixtures, &mut store);

    println!("Value scan ({:?}, max_goals={})", config.strategy, config.max_goals);
    println!("DB: {}", db_path.display());
    println!(
        "fixtures={} analyzed={} skipped_league={} skipped_existing={} failures={}",
        fixtures.len(),
        report.analyzed,
        report.skipped_league,
        report.skipped_existing,
        report.failures.len()
    );
    for bet in &report.stored {
        println!(
            "  fixture {} [{}] {} {} prob={:.2}% odds={:.2} value={:.3}",
            bet.fixture_id,
            bet.league,
            bet.market,
            bet.selection,
            bet.probability * 100.0,
            bet.odds,
            bet.edge
        );
    }
    for failure in report.failures.iter().take(10) {
        println!(
            "  skipped fixture {} at {}: {}",
            failure.fixture_id, failure.stage, failure.reason
        );
    }
    Ok(())
}
