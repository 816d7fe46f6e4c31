use anyhow::{Context, Result};

use value_engine::cli;
use value_engine::config::EngineConfig;
use value_engine::stats::{self, Dimension};
use value_engine::store::BetStore;
use value_engine::telemetry;

fn main() -> Result<()> {
    let config = EngineConfig::from_env();
    telemetry::init_tracing(&config.log_level);

    let db_path = cli::parse_db_path_arg(&cli::args())
        .or_else(|| config.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let store = BetStore::open(&db_path)?;
    let bets = store.load_bets(None)?;

    let summary = stats::summarize(&bets);
    println!("Value bet performance");
    println!("DB: {}", db_path.display());
    println!(
        "bets={} pending={} settled={} win_rate={:.2}% profit={:+.2}u roi={:+.2}%",
        summary.total,
        summary.pending,
        summary.settled,
        summary.win_rate * 100.0,
        summary.profit,
        summary.roi * 100.0
    );

    let opts = config.aggregate_options();
    for dimension in Dimension::ALL {
        let rows = stats::aggregate(&bets, dimension, &opts);
        println!();
        println!("{}", dimension.title());
        if rows.is_empty() {
            println!("  (no settled bets)");
            continue;
        }
        for row in rows {
            println!(
                "  {:<18} n={:<5} win={:>6.2}% profit={:>+8.2}u roi={:>+7.2}%",
                row.key,
                row.bets,
                row.win_rate * 100.0,
                row.profit,
                row.roi * 100.0
            );
        }
    }
    Ok(())
}
