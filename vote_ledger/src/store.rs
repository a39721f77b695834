use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use snafu::prelude::*;

use crate::config::*;

/// Persistence for vote records.
///
/// Implementations keep at most one record per (household, topic) pair and
/// apply `upsert` batches as a whole: if the call fails, none of the batch is
/// visible.
pub trait VoteStore: Send + Sync {
    /// Inserts the records, replacing any existing record of the same pair.
    fn upsert(&self, records: &[VoteRecord]) -> LedgerResult<()>;

    /// All the records of one topic, read as a single snapshot.
    fn topic_records(&self, topic_id: &str) -> LedgerResult<Vec<VoteRecord>>;

    /// The topics a household has voted on, sorted.
    fn household_topics(&self, household_id: &str) -> LedgerResult<Vec<String>>;

    fn contains(&self, household_id: &str, topic_id: &str) -> LedgerResult<bool>;

    /// Every record, sorted by topic then household.
    fn records(&self) -> LedgerResult<Vec<VoteRecord>>;

    /// Removes every record and returns how many were removed.
    fn clear(&self) -> LedgerResult<usize>;
}

/// In-process store: one concurrent map of households per topic.
///
/// Writes to different pairs only contend when they hash to the same shard.
#[derive(Debug, Default)]
pub struct MemoryStore {
    votes: DashMap<String, DashMap<String, VoteRecord>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl VoteStore for MemoryStore {
    fn upsert(&self, records: &[VoteRecord]) -> LedgerResult<()> {
        for r in records {
            if let Some(topic) = self.votes.get(&r.topic_id) {
                topic.insert(r.household_id.clone(), r.clone());
                continue;
            }
            self.votes
                .entry(r.topic_id.clone())
                .or_default()
                .insert(r.household_id.clone(), r.clone());
        }
        Ok(())
    }

    fn topic_records(&self, topic_id: &str) -> LedgerResult<Vec<VoteRecord>> {
        let res = self
            .votes
            .get(topic_id)
            .map(|topic| topic.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default();
        Ok(res)
    }

    fn household_topics(&self, household_id: &str) -> LedgerResult<Vec<String>> {
        let mut res: Vec<String> = self
            .votes
            .iter()
            .filter(|topic| topic.value().contains_key(household_id))
            .map(|topic| topic.key().clone())
            .collect();
        res.sort();
        Ok(res)
    }

    fn contains(&self, household_id: &str, topic_id: &str) -> LedgerResult<bool> {
        Ok(self
            .votes
            .get(topic_id)
            .map_or(false, |topic| topic.contains_key(household_id)))
    }

    fn records(&self) -> LedgerResult<Vec<VoteRecord>> {
        let mut res: Vec<VoteRecord> = Vec::new();
        for topic in self.votes.iter() {
            res.extend(topic.value().iter().map(|e| e.value().clone()));
        }
        res.sort_by(|a, b| {
            (&a.topic_id, &a.household_id).cmp(&(&b.topic_id, &b.household_id))
        });
        Ok(res)
    }

    fn clear(&self) -> LedgerResult<usize> {
        let mut cleared: usize = 0;
        self.votes.retain(|_, topic| {
            cleared += topic.len();
            false
        });
        Ok(cleared)
    }
}

// household, topic, choice, recorded_at
type RawVote = (String, String, String, String);

const UPSERT_VOTE: &str = "INSERT INTO votes (household, topic, choice, recorded_at)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(household, topic)
     DO UPDATE SET choice = excluded.choice, recorded_at = excluded.recorded_at";

/// On-disk store backed by a single SQLite table.
///
/// The (household, topic) primary key enforces the uniqueness of votes. Each
/// `upsert` batch runs in one transaction.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<SqliteStore> {
        info!("Opening vote database {:?}", path.as_ref());
        let conn = Connection::open(path).context(StorageSnafu {})?;
        SqliteStore::from_connection(conn)
    }

    pub fn open_in_memory() -> LedgerResult<SqliteStore> {
        let conn = Connection::open_in_memory().context(StorageSnafu {})?;
        SqliteStore::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> LedgerResult<SqliteStore> {
        conn.busy_timeout(Duration::from_secs(5))
            .context(StorageSnafu {})?;
        SqliteStore::init_schema(&conn).context(StorageSnafu {})?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Creates the votes table if it does not exist yet.
    pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS votes (
                household TEXT NOT NULL,
                topic TEXT NOT NULL,
                choice TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (household, topic)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_votes_topic ON votes(topic)",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn.lock().ok().context(StorageLockSnafu {})
    }

    fn query_votes(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> LedgerResult<Vec<VoteRecord>> {
        let mut stmt = conn.prepare_cached(sql).context(StorageSnafu {})?;
        let rows = stmt
            .query_map(args, raw_vote)
            .context(StorageSnafu {})?;
        let mut res: Vec<VoteRecord> = Vec::new();
        for row in rows {
            let raw = row.context(StorageSnafu {})?;
            res.push(decode_vote(raw)?);
        }
        Ok(res)
    }
}

fn raw_vote(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVote> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_vote(raw: RawVote) -> LedgerResult<VoteRecord> {
    let (household_id, topic_id, choice_s, recorded_at_s) = raw;
    let choice = choice_s.parse::<Choice>().ok().context(CorruptRecordSnafu {
        household_id: &household_id,
        topic_id: &topic_id,
        detail: format!("choice {:?}", choice_s),
    })?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_s)
        .ok()
        .context(CorruptRecordSnafu {
            household_id: &household_id,
            topic_id: &topic_id,
            detail: format!("timestamp {:?}", recorded_at_s),
        })?
        .with_timezone(&Utc);
    Ok(VoteRecord {
        household_id,
        topic_id,
        choice,
        recorded_at,
    })
}

impl VoteStore for SqliteStore {
    fn upsert(&self, records: &[VoteRecord]) -> LedgerResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context(StorageSnafu {})?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_VOTE).context(StorageSnafu {})?;
            for r in records {
                debug!(
                    "upsert: household {} topic {} -> {}",
                    r.household_id, r.topic_id, r.choice
                );
                stmt.execute(params![
                    r.household_id,
                    r.topic_id,
                    r.choice.as_str(),
                    r.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                ])
                .context(StorageSnafu {})?;
            }
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit().context(StorageSnafu {})?;
        Ok(())
    }

    fn topic_records(&self, topic_id: &str) -> LedgerResult<Vec<VoteRecord>> {
        let conn = self.lock()?;
        SqliteStore::query_votes(
            &conn,
            "SELECT household, topic, choice, recorded_at FROM votes WHERE topic = ?1",
            &[&topic_id],
        )
    }

    fn household_topics(&self, household_id: &str) -> LedgerResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached("SELECT topic FROM votes WHERE household = ?1 ORDER BY topic")
            .context(StorageSnafu {})?;
        let rows = stmt
            .query_map(params![household_id], |row| row.get::<_, String>(0))
            .context(StorageSnafu {})?;
        let mut res: Vec<String> = Vec::new();
        for row in rows {
            res.push(row.context(StorageSnafu {})?);
        }
        Ok(res)
    }

    fn contains(&self, household_id: &str, topic_id: &str) -> LedgerResult<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM votes WHERE household = ?1 AND topic = ?2",
                params![household_id, topic_id],
                |_| Ok(()),
            )
            .optional()
            .context(StorageSnafu {})?;
        Ok(found.is_some())
    }

    fn records(&self) -> LedgerResult<Vec<VoteRecord>> {
        let conn = self.lock()?;
        SqliteStore::query_votes(
            &conn,
            "SELECT household, topic, choice, recorded_at FROM votes ORDER BY topic, household",
            &[],
        )
    }

    fn clear(&self) -> LedgerResult<usize> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM votes", [])
            .context(StorageSnafu {})
    }
}
