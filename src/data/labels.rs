use crate::error::{Result, TradepulseError};
use crate::types::{Direction, ExitType, LabelRecord, Timeframe};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

/// Write boundary for generated labels, keyed by (symbol, timeframe,
/// timestamp, direction). Label sets are append-only and regenerated
/// wholesale when the policy changes; there is no partial mutation.
pub trait LabelStore: Send + Sync {
    /// Swap every (symbol, timeframe) partition present in `records` in one
    /// transaction
    fn replace_labels(&self, timeframe: Timeframe, records: &[LabelRecord]) -> Result<()>;

    fn fetch_labels(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<LabelRecord>>;

    fn count(&self, timeframe: Timeframe) -> Result<usize>;
}

pub struct SqliteLabelStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLabelStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder().max_size(4).build(manager)?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS labels (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                direction TEXT NOT NULL,
                score REAL NOT NULL,
                realized_return REAL NOT NULL,
                mfe REAL NOT NULL,
                mae REAL NOT NULL,
                bars_held INTEGER NOT NULL,
                exit_type TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe, timestamp, direction)
            );
            CREATE INDEX IF NOT EXISTS idx_labels_timeframe ON labels(timeframe);",
        )?;
        Ok(())
    }
}

impl LabelStore for SqliteLabelStore {
    fn replace_labels(&self, timeframe: Timeframe, records: &[LabelRecord]) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let mut symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();

        for symbol in symbols {
            tx.execute(
                "DELETE FROM labels WHERE symbol = ?1 AND timeframe = ?2",
                params![symbol, timeframe.as_str()],
            )?;
        }

        for record in records {
            tx.execute(
                "INSERT INTO labels
                 (symbol, timeframe, timestamp, direction, score, realized_return,
                  mfe, mae, bars_held, exit_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.symbol,
                    record.timeframe.as_str(),
                    record.timestamp,
                    record.direction.as_str(),
                    record.score,
                    record.realized_return,
                    record.mfe,
                    record.mae,
                    record.bars_held as i64,
                    record.exit_type.as_label(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn fetch_labels(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<LabelRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT symbol, timeframe, timestamp, direction, score, realized_return,
                    mfe, mae, bars_held, exit_type
             FROM labels WHERE symbol = ?1 AND timeframe = ?2
             ORDER BY timestamp, direction",
        )?;
        let rows = stmt.query_map(params![symbol, timeframe.as_str()], |row| {
            let tf: String = row.get(1)?;
            let direction: String = row.get(3)?;
            let exit_type: String = row.get(9)?;
            Ok((
                row.get::<_, String>(0)?,
                tf,
                row.get::<_, chrono::DateTime<chrono::Utc>>(2)?,
                direction,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, i64>(8)?,
                exit_type,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (symbol, tf, timestamp, direction, score, realized_return, mfe, mae, bars, exit) =
                row?;
            records.push(LabelRecord {
                symbol,
                timeframe: Timeframe::from_str(&tf)?,
                timestamp,
                direction: Direction::from_str(&direction)?,
                score,
                realized_return,
                mfe,
                mae,
                bars_held: bars as usize,
                exit_type: ExitType::from_label(&exit)?,
            });
        }
        Ok(records)
    }

    fn count(&self, timeframe: Timeframe) -> Result<usize> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM labels WHERE timeframe = ?1",
            params![timeframe.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Test double that keeps everything in memory
#[derive(Default)]
pub struct InMemoryLabelStore {
    records: Mutex<Vec<LabelRecord>>,
}

impl InMemoryLabelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LabelStore for InMemoryLabelStore {
    fn replace_labels(&self, timeframe: Timeframe, records: &[LabelRecord]) -> Result<()> {
        let mut stored = self
            .records
            .lock()
            .map_err(|e| TradepulseError::Database(e.to_string()))?;
        let symbols: Vec<&String> = records.iter().map(|r| &r.symbol).collect();
        stored.retain(|r| !(r.timeframe == timeframe && symbols.contains(&&r.symbol)));
        stored.extend_from_slice(records);
        Ok(())
    }

    fn fetch_labels(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<LabelRecord>> {
        let stored = self
            .records
            .lock()
            .map_err(|e| TradepulseError::Database(e.to_string()))?;
        Ok(stored
            .iter()
            .filter(|r| r.symbol == symbol && r.timeframe == timeframe)
            .cloned()
            .collect())
    }

    fn count(&self, timeframe: Timeframe) -> Result<usize> {
        let stored = self
            .records
            .lock()
            .map_err(|e| TradepulseError::Database(e.to_string()))?;
        Ok(stored.iter().filter(|r| r.timeframe == timeframe).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(symbol: &str, hour: i64, direction: Direction) -> LabelRecord {
        LabelRecord {
            symbol: symbol.to_string(),
            timeframe: Timeframe::H1,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::hours(hour),
            direction,
            score: 0.01,
            realized_return: 0.01,
            mfe: 0.015,
            mae: -0.002,
            bars_held: 3,
            exit_type: ExitType::TrailingStop,
        }
    }

    #[test]
    fn test_round_trip() {
        let store = SqliteLabelStore::in_memory().unwrap();
        let records = vec![
            record("BTCUSDT", 0, Direction::Long),
            record("BTCUSDT", 0, Direction::Short),
            record("BTCUSDT", 1, Direction::Long),
        ];
        store.replace_labels(Timeframe::H1, &records).unwrap();

        let fetched = store.fetch_labels("BTCUSDT", Timeframe::H1).unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].exit_type, ExitType::TrailingStop);
        assert_eq!(store.count(Timeframe::H1).unwrap(), 3);
    }

    #[test]
    fn test_replace_is_wholesale_per_symbol() {
        let store = SqliteLabelStore::in_memory().unwrap();
        store
            .replace_labels(
                Timeframe::H1,
                &[
                    record("BTCUSDT", 0, Direction::Long),
                    record("BTCUSDT", 1, Direction::Long),
                    record("ETHUSDT", 0, Direction::Long),
                ],
            )
            .unwrap();

        // Regenerating BTCUSDT replaces its partition and leaves ETHUSDT alone
        store
            .replace_labels(Timeframe::H1, &[record("BTCUSDT", 5, Direction::Long)])
            .unwrap();

        assert_eq!(store.fetch_labels("BTCUSDT", Timeframe::H1).unwrap().len(), 1);
        assert_eq!(store.fetch_labels("ETHUSDT", Timeframe::H1).unwrap().len(), 1);
    }
}
