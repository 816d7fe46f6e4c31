use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::market::{Market, Selection};
use crate::pipeline::BetSink;
use crate::settlement::{FinalScore, Outcome, SettlementReport};
use crate::value::{FixtureKey, ValueBet};

const CACHE_DIR: &str = "value_engine";
const DB_FILE: &str = "value_bets.sqlite";

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR).join(DB_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(DB_FILE))
}

/// SQLite persistence for value bets.
pub struct BetStore {
    conn: Connection,
}

impl BetStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Bets in insertion order, optionally restricted to one outcome.
    pub fn load_bets(&self, outcome: Option<Outcome>) -> Result<Vec<ValueBet>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT fixture_id, league, market, selection, probability, odds, outcome
                 FROM value_bets
                 WHERE ?1 IS NULL OR outcome = ?1
                 ORDER BY id",
            )
            .context("prepare bet query")?;
        let filter = outcome.map(Outcome::as_str);
        let rows = stmt
            .query_map(params![filter], |row| {
                Ok(StoredBet {
                    fixture_id: row.get::<_, i64>(0)?,
                    league: row.get(1)?,
                    market: row.get(2)?,
                    selection: row.get(3)?,
                    probability: row.get(4)?,
                    odds: row.get(5)?,
                    outcome: row.get(6)?,
                })
            })
            .context("query bets")?;

        let mut out = Vec::new();
        for row in rows {
            let stored = row.context("read bet row")?;
            out.push(stored.into_bet()?);
        }
        Ok(out)
    }

    pub fn pending_fixture_ids(&self) -> Result<Vec<u64>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT fixture_id FROM value_bets
                 WHERE outcome = 'Pending' ORDER BY fixture_id",
            )
            .context("prepare pending fixture query")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .context("query pending fixtures")?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .context("read pending fixtures")?;
        Ok(ids.into_iter().map(|id| id as u64).collect())
    }

    /// Settles the pending bets of one fixture and writes the results back.
    pub fn settle_fixture(
        &mut self,
        fixture_id: u64,
        score: Option<FinalScore>,
    ) -> Result<SettlementReport> {
        let bets = self
            .load_bets(Some(Outcome::Pending))?
            .into_iter()
            .filter(|b| b.fixture_id == fixture_id)
            .collect::<Vec<_>>();
        self.settle_loaded(bets, fixture_id, score)
    }

    // Rows settled by another writer since `bets` was read count as
    // already terminal, not settled.
    fn settle_loaded(
        &mut self,
        mut bets: Vec<ValueBet>,
        fixture_id: u64,
        score: Option<FinalScore>,
    ) -> Result<SettlementReport> {
        let mut report = crate::settlement::settle_fixture(&mut bets, fixture_id, score);
        for bet in bets.iter().filter(|b| b.outcome().is_terminal()) {
            if !self.update_outcome(bet)? {
                report.settled = report.settled.saturating_sub(1);
                report.already_terminal += 1;
            }
        }
        Ok(report)
    }
}

struct StoredBet {
    fixture_id: i64,
    league: String,
    market: String,
    selection: String,
    probability: f64,
    odds: f64,
    outcome: String,
}

impl StoredBet {
    fn into_bet(self) -> Result<ValueBet> {
        let market = Market::parse(&self.market)?;
        let selection = Selection::parse(&self.selection)
            .ok_or_else(|| anyhow!("unknown selection {:?}", self.selection))?;
        let outcome = Outcome::parse(&self.outcome)
            .ok_or_else(|| anyhow!("unknown outcome {:?}", self.outcome))?;
        let fixture = FixtureKey {
            id: self.fixture_id as u64,
            league: self.league,
        };
        Ok(ValueBet::restore(
            &fixture,
            market,
            selection,
            self.probability,
            self.odds,
            outcome,
        ))
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS fixtures (
            fixture_id INTEGER PRIMARY KEY,
            league TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS value_bets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL REFERENCES fixtures(fixture_id),
            league TEXT NOT NULL,
            market TEXT NOT NULL,
            selection TEXT NOT NULL,
            probability REAL NOT NULL,
            odds REAL NOT NULL,
            edge REAL NOT NULL,
            outcome TEXT NOT NULL DEFAULT 'Pending',
            created_at TEXT NOT NULL,
            settled_at TEXT NULL,
            UNIQUE(fixture_id, market, selection)
        );
        CREATE INDEX IF NOT EXISTS idx_value_bets_outcome ON value_bets(outcome);
        CREATE INDEX IF NOT EXISTS idx_value_bets_league ON value_bets(league);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl BetSink for BetStore {
    fn contains_fixture(&self, fixture_id: u64) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM fixtures WHERE fixture_id = ?1",
                params![fixture_id as i64],
                |_| Ok(()),
            )
            .optional()
            .context("lookup fixture")?;
        Ok(found.is_some())
    }

    fn create(&mut self, fixture: &FixtureKey, bets: &[ValueBet]) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().context("begin bet transaction")?;
        tx.execute(
            "INSERT OR IGNORE INTO fixtures(fixture_id, league, created_at) VALUES (?1, ?2, ?3)",
            params![fixture.id as i64, fixture.league, now],
        )
        .context("insert fixture")?;

        let mut created = 0usize;
        for bet in bets {
            created += tx
                .execute(
                    "INSERT OR IGNORE INTO value_bets(
                        fixture_id, league, market, selection, probability, odds, edge,
                        outcome, created_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        bet.fixture_id as i64,
                        bet.league,
                        bet.market.key(),
                        bet.selection.label(),
                        bet.probability,
                        bet.odds,
                        bet.edge,
                        bet.outcome().as_str(),
                        now
                    ],
                )
                .context("insert value bet")?;
        }
        tx.commit().context("commit bet transaction")?;
        Ok(created)
    }

    fn update_outcome(&mut self, bet: &ValueBet) -> Result<bool> {
        if !bet.outcome().is_terminal() {
            return Ok(false);
        }
        let changed = self
            .conn
            .execute(
                "UPDATE value_bets SET outcome = ?1, settled_at = ?2
                 WHERE fixture_id = ?3 AND market = ?4 AND selection = ?5
                   AND outcome = 'Pending'",
                params![
                    bet.outcome().as_str(),
                    Utc::now().to_rfc3339(),
                    bet.fixture_id as i64,
                    bet.market.key(),
                    bet.selection.label()
                ],
            )
            .context("update bet outcome")?;
        Ok(changed == 1)
    }
}
