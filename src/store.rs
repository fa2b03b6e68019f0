// Snapshot Station - Snapshot Store
// Append-only persistence for valid and discarded snapshots (SQLite + WAL)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::model::{DiscardReason, DiscardedSnapshot, TimeRange, ValidSnapshot};

/// Persistence failure. Never silently swallowed: the poller logs and
/// abandons the tick, the query service surfaces it as a request failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("tags encoding error: {0}")]
    Tags(#[from] serde_json::Error),

    #[error("unrepresentable timestamp in row: {0}")]
    BadTimestamp(i64),

    #[error("unknown reason in row: {0}")]
    BadReason(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Handle to the two append-only snapshot relations.
///
/// Cheap to clone; the poller (single writer) and the query handlers (many
/// readers) share one connection behind a mutex, so every append is atomic
/// with respect to concurrent reads and visible once the call returns.
#[derive(Clone)]
pub struct SnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotStore {
    /// Wrap a connection and create the schema if it does not exist yet.
    pub fn new(conn: Connection) -> Result<Self, StoreError> {
        setup_schema(&conn)?;
        Ok(SnapshotStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Append one valid snapshot.
    pub fn append_valid(&self, snapshot: &ValidSnapshot) -> Result<(), StoreError> {
        let tags = serde_json::to_string(&snapshot.tags)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO valid_snapshots (time_ms, value, tags) VALUES (?1, ?2, ?3)",
            params![snapshot.time.timestamp_millis(), snapshot.value, tags],
        )?;

        Ok(())
    }

    /// Append one discarded snapshot with its reason.
    pub fn append_discarded(&self, snapshot: &DiscardedSnapshot) -> Result<(), StoreError> {
        let tags = serde_json::to_string(&snapshot.tags)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO discarded_snapshots (time_ms, value, tags, reason, discarded_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.time.timestamp_millis(),
                snapshot.value,
                tags,
                snapshot.reason.as_str(),
                snapshot.discarded_at.timestamp_millis(),
            ],
        )?;

        Ok(())
    }

    /// Valid snapshots with `time` in the closed interval, ascending by
    /// time; ties keep insertion order.
    pub fn valid_in_range(&self, range: &TimeRange) -> Result<Vec<ValidSnapshot>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT time_ms, value, tags FROM valid_snapshots
             WHERE time_ms >= ?1 AND time_ms <= ?2
             ORDER BY time_ms ASC, id ASC",
        )?;

        let rows = stmt.query_map(
            params![
                range.start.timestamp_millis(),
                range.end.timestamp_millis()
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (time_ms, value, tags) = row?;
            snapshots.push(ValidSnapshot {
                time: instant_from_ms(time_ms)?,
                value,
                tags: serde_json::from_str(&tags)?,
            });
        }

        Ok(snapshots)
    }

    /// Discarded snapshots in the closed interval, optionally restricted to
    /// one discard reason. Same ordering guarantee as `valid_in_range`.
    pub fn discarded_in_range(
        &self,
        range: &TimeRange,
        reason: Option<DiscardReason>,
    ) -> Result<Vec<DiscardedSnapshot>, StoreError> {
        let conn = self.lock()?;

        let sql_all = "SELECT time_ms, value, tags, reason, discarded_at_ms
             FROM discarded_snapshots
             WHERE time_ms >= ?1 AND time_ms <= ?2
             ORDER BY time_ms ASC, id ASC";
        let sql_by_reason = "SELECT time_ms, value, tags, reason, discarded_at_ms
             FROM discarded_snapshots
             WHERE time_ms >= ?1 AND time_ms <= ?2 AND reason = ?3
             ORDER BY time_ms ASC, id ASC";

        let start_ms = range.start.timestamp_millis();
        let end_ms = range.end.timestamp_millis();

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        };

        let mut snapshots = Vec::new();
        let mut push = |raw: (i64, f64, String, String, i64)| -> Result<(), StoreError> {
            let (time_ms, value, tags, reason, discarded_at_ms) = raw;
            snapshots.push(DiscardedSnapshot {
                time: instant_from_ms(time_ms)?,
                value,
                tags: serde_json::from_str(&tags)?,
                reason: reason
                    .parse::<DiscardReason>()
                    .map_err(|_| StoreError::BadReason(reason))?,
                discarded_at: instant_from_ms(discarded_at_ms)?,
            });
            Ok(())
        };

        match reason {
            Some(reason) => {
                let mut stmt = conn.prepare(sql_by_reason)?;
                let rows = stmt.query_map(params![start_ms, end_ms, reason.as_str()], map_row)?;
                for row in rows {
                    push(row?)?;
                }
            }
            None => {
                let mut stmt = conn.prepare(sql_all)?;
                let rows = stmt.query_map(params![start_ms, end_ms], map_row)?;
                for row in rows {
                    push(row?)?;
                }
            }
        }

        Ok(snapshots)
    }
}

fn instant_from_ms(time_ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(time_ms).ok_or(StoreError::BadTimestamp(time_ms))
}

fn setup_schema(conn: &Connection) -> Result<(), StoreError> {
    // WAL keeps readers unblocked while the poller writes
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS valid_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time_ms INTEGER NOT NULL,
            value REAL NOT NULL,
            tags TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS discarded_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time_ms INTEGER NOT NULL,
            value REAL NOT NULL,
            tags TEXT NOT NULL,
            reason TEXT NOT NULL,
            discarded_at_ms INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_valid_time ON valid_snapshots(time_ms)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_discarded_time ON discarded_snapshots(time_ms)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn store() -> SnapshotStore {
        SnapshotStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, min, 0).unwrap()
    }

    fn valid(time: DateTime<Utc>, value: f64) -> ValidSnapshot {
        ValidSnapshot {
            time,
            value,
            tags: vec!["night".to_string()],
        }
    }

    fn discarded(time: DateTime<Utc>, reason: DiscardReason) -> DiscardedSnapshot {
        DiscardedSnapshot {
            time,
            value: 5.0,
            tags: vec!["night".to_string()],
            reason,
            discarded_at: at(12, 0),
        }
    }

    #[test]
    fn test_append_and_query_round_trip() {
        let store = store();
        let snapshot = valid(at(1, 30), 12.37);

        store.append_valid(&snapshot).unwrap();

        let got = store.valid_in_range(&TimeRange::unbounded()).unwrap();
        assert_eq!(got, vec![snapshot]);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let store = store();
        store.append_valid(&valid(at(1, 0), 1.0)).unwrap();
        store.append_valid(&valid(at(2, 0), 2.0)).unwrap();
        store.append_valid(&valid(at(3, 0), 3.0)).unwrap();

        let range = TimeRange {
            start: at(1, 0),
            end: at(2, 0),
        };
        let got = store.valid_in_range(&range).unwrap();

        assert_eq!(got.len(), 2);
        assert_eq!(got[0].value, 1.0);
        assert_eq!(got[1].value, 2.0);
    }

    #[test]
    fn test_results_ordered_by_time_then_insertion() {
        let store = store();
        store.append_valid(&valid(at(3, 0), 3.0)).unwrap();
        store.append_valid(&valid(at(1, 0), 1.0)).unwrap();
        store.append_valid(&valid(at(1, 0), 1.5)).unwrap();

        let got = store.valid_in_range(&TimeRange::unbounded()).unwrap();
        let values: Vec<f64> = got.iter().map(|s| s.value).collect();

        assert_eq!(values, vec![1.0, 1.5, 3.0]);
    }

    #[test]
    fn test_discarded_ordered_by_time_then_insertion() {
        let store = store();
        let mut first = discarded(at(1, 0), DiscardReason::Age);
        first.value = 1.0;
        let mut second = discarded(at(1, 0), DiscardReason::System);
        second.value = 1.5;
        let mut later = discarded(at(3, 0), DiscardReason::Age);
        later.value = 3.0;

        store.append_discarded(&later).unwrap();
        store.append_discarded(&first).unwrap();
        store.append_discarded(&second).unwrap();

        let got = store
            .discarded_in_range(&TimeRange::unbounded(), None)
            .unwrap();
        let values: Vec<f64> = got.iter().map(|s| s.value).collect();

        assert_eq!(values, vec![1.0, 1.5, 3.0]);
    }

    #[test]
    fn test_query_is_idempotent() {
        let store = store();
        store.append_valid(&valid(at(1, 0), 1.0)).unwrap();
        store.append_valid(&valid(at(2, 0), 2.0)).unwrap();

        let range = TimeRange::unbounded();
        let first = store.valid_in_range(&range).unwrap();
        let second = store.valid_in_range(&range).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_discarded_round_trip_keeps_reason_and_discarded_at() {
        let store = store();
        let snapshot = discarded(at(1, 0), DiscardReason::Age);

        store.append_discarded(&snapshot).unwrap();

        let got = store
            .discarded_in_range(&TimeRange::unbounded(), None)
            .unwrap();
        assert_eq!(got, vec![snapshot]);
    }

    #[test]
    fn test_reason_filter_returns_matching_subset() {
        let store = store();
        store
            .append_discarded(&discarded(at(1, 0), DiscardReason::Age))
            .unwrap();
        store
            .append_discarded(&discarded(at(2, 0), DiscardReason::System))
            .unwrap();
        store
            .append_discarded(&discarded(at(3, 0), DiscardReason::Age))
            .unwrap();

        let all = store
            .discarded_in_range(&TimeRange::unbounded(), None)
            .unwrap();
        let aged = store
            .discarded_in_range(&TimeRange::unbounded(), Some(DiscardReason::Age))
            .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(aged.len(), 2);
        assert!(aged.iter().all(|s| s.reason == DiscardReason::Age));
        assert!(aged.iter().all(|s| all.contains(s)));
    }

    #[test]
    fn test_reason_filter_with_no_matches_is_empty() {
        let store = store();
        store
            .append_discarded(&discarded(at(1, 0), DiscardReason::Age))
            .unwrap();

        let got = store
            .discarded_in_range(&TimeRange::unbounded(), Some(DiscardReason::System))
            .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn test_stores_are_disjoint() {
        let store = store();
        store.append_valid(&valid(at(1, 0), 1.0)).unwrap();
        store
            .append_discarded(&discarded(at(2, 0), DiscardReason::Suspect))
            .unwrap();

        assert_eq!(store.valid_in_range(&TimeRange::unbounded()).unwrap().len(), 1);
        assert_eq!(
            store
                .discarded_in_range(&TimeRange::unbounded(), None)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_reads_see_writes_from_a_clone() {
        let store = store();
        let writer = store.clone();

        writer.append_valid(&valid(at(1, 0), 1.0)).unwrap();

        let got = store.valid_in_range(&TimeRange::unbounded()).unwrap();
        assert_eq!(got.len(), 1);
    }
}
