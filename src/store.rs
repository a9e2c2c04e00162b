//! Repositories the scheduler reads from and the store it writes to.
//!
//! All three are backed by one SQLite database through [`SqliteStore`].
//! Replacing a term's grid is a single transaction: either the old grid is
//! still there or the new one is, never a mix.

use async_trait::async_trait;
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use std::str::FromStr;

use crate::data::{Assignment, BuildResult, Entry, Term, TermId};
use crate::error::SchedulerError;

#[async_trait]
pub trait TermRepository {
    async fn get_current_term(&self) -> Result<Option<Term>, SchedulerError>;
}

#[async_trait]
pub trait AssignmentRepository {
    async fn list_assignments(&self) -> Result<Vec<Assignment>, SchedulerError>;
}

#[async_trait]
pub trait TimetableStore {
    /// Atomically replaces every stored entry of `term_id` with `entries`.
    async fn replace_term_entries(
        &self,
        term_id: TermId,
        entries: &[Entry],
    ) -> Result<BuildResult, SchedulerError>;

    async fn list_term_entries(&self, term_id: TermId) -> Result<Vec<Entry>, SchedulerError>;
}

/// Drops later entries that reuse a (classroom, day, period) key.
pub fn dedup_entries(entries: &[Entry]) -> Vec<Entry> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|e| seen.insert((e.classroom_id, e.day, e.period)))
        .cloned()
        .collect()
}

/// Deduplicates `entries` and replaces the term's stored grid with them.
pub async fn persist<S>(store: &S, term_id: TermId, entries: &[Entry]) -> Result<BuildResult, SchedulerError>
where
    S: TimetableStore + ?Sized,
{
    let deduped = dedup_entries(entries);
    if deduped.len() != entries.len() {
        debug!(
            "Dropped {} duplicate (classroom, day, period) entries before persisting.",
            entries.len() - deduped.len()
        );
    }
    store.replace_term_entries(term_id, &deduped).await
}

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS terms (
        id          INTEGER PRIMARY KEY,
        name        TEXT    NOT NULL,
        is_current  INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teaching_assignments (
        id                 INTEGER PRIMARY KEY,
        teacher_id         INTEGER NOT NULL,
        teacher_full_name  TEXT    NOT NULL DEFAULT '',
        classroom_id       INTEGER NOT NULL,
        subject_id         INTEGER NOT NULL,
        subject_name       TEXT    NOT NULL DEFAULT '',
        weekly_count       INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timetable_entries (
        id            INTEGER PRIMARY KEY,
        term_id       INTEGER NOT NULL,
        classroom_id  INTEGER NOT NULL,
        subject_id    INTEGER NOT NULL,
        teacher_id    INTEGER NOT NULL,
        day           INTEGER NOT NULL,
        period        INTEGER NOT NULL,
        UNIQUE (term_id, classroom_id, day, period)
    )
    "#,
];

/// SQLite-backed term, assignment and timetable storage.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn connect(url: &str) -> Result<Self, SchedulerError> {
        info!("Connecting to SQLite at {url}...");
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // An in-memory database lives only as long as its single connection.
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("SQLite store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), SchedulerError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Adds a term; a current term demotes any previously current one.
    pub async fn insert_term(&self, name: &str, is_current: bool) -> Result<TermId, SchedulerError> {
        let mut tx = self.pool.begin().await?;
        if is_current {
            sqlx::query("UPDATE terms SET is_current = 0 WHERE is_current = 1")
                .execute(&mut *tx)
                .await?;
        }
        let id = sqlx::query("INSERT INTO terms (name, is_current) VALUES (?, ?)")
            .bind(name)
            .bind(is_current)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        tx.commit().await?;
        Ok(id)
    }

    pub async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), SchedulerError> {
        sqlx::query(
            r#"
            INSERT INTO teaching_assignments
                (teacher_id, teacher_full_name, classroom_id, subject_id, subject_name, weekly_count)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment.teacher_id)
        .bind(&assignment.teacher_full_name)
        .bind(assignment.classroom_id)
        .bind(assignment.subject_id)
        .bind(&assignment.subject_name)
        .bind(i64::from(assignment.weekly_count))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TermRepository for SqliteStore {
    async fn get_current_term(&self) -> Result<Option<Term>, SchedulerError> {
        let row = sqlx::query(
            "SELECT id, name FROM terms WHERE is_current = 1 ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Term {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        }))
    }
}

#[async_trait]
impl AssignmentRepository for SqliteStore {
    async fn list_assignments(&self) -> Result<Vec<Assignment>, SchedulerError> {
        let rows = sqlx::query(
            r#"
            SELECT teacher_id, teacher_full_name, classroom_id, subject_id, subject_name, weekly_count
            FROM teaching_assignments
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(assignment_from_row).collect()
    }
}

#[async_trait]
impl TimetableStore for SqliteStore {
    async fn replace_term_entries(
        &self,
        term_id: TermId,
        entries: &[Entry],
    ) -> Result<BuildResult, SchedulerError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM timetable_entries WHERE term_id = ?")
                .bind(term_id)
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query("DELETE FROM timetable_entries WHERE term_id = ?")
            .bind(term_id)
            .execute(&mut *tx)
            .await?;

        for e in entries {
            sqlx::query(
                r#"
                INSERT INTO timetable_entries
                    (term_id, classroom_id, subject_id, teacher_id, day, period)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(term_id)
            .bind(e.classroom_id)
            .bind(e.subject_id)
            .bind(e.teacher_id)
            .bind(i64::from(e.day))
            .bind(i64::from(e.period))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "Replaced {} stored entries for term {} with {} new entries",
            existing,
            term_id,
            entries.len()
        );

        Ok(BuildResult {
            created: entries.len() as u64,
            replaced_existing: u64::try_from(existing).unwrap_or(0),
        })
    }

    async fn list_term_entries(&self, term_id: TermId) -> Result<Vec<Entry>, SchedulerError> {
        let rows = sqlx::query(
            r#"
            SELECT term_id, classroom_id, subject_id, teacher_id, day, period
            FROM timetable_entries
            WHERE term_id = ?
            ORDER BY day, period, classroom_id
            "#,
        )
        .bind(term_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T, SchedulerError> {
    T::try_from(value)
        .map_err(|_| SchedulerError::InvalidRow(format!("{column} out of range: {value}")))
}

fn assignment_from_row(row: &SqliteRow) -> Result<Assignment, SchedulerError> {
    let weekly_count: i64 = row.try_get("weekly_count")?;
    Ok(Assignment {
        teacher_id: row.try_get("teacher_id")?,
        classroom_id: row.try_get("classroom_id")?,
        subject_id: row.try_get("subject_id")?,
        // Non-positive counts carry no obligation.
        weekly_count: narrow(weekly_count.max(0), "weekly_count")?,
        teacher_full_name: row.try_get("teacher_full_name")?,
        subject_name: row.try_get("subject_name")?,
    })
}

fn entry_from_row(row: &SqliteRow) -> Result<Entry, SchedulerError> {
    Ok(Entry {
        classroom_id: row.try_get("classroom_id")?,
        subject_id: row.try_get("subject_id")?,
        teacher_id: row.try_get("teacher_id")?,
        day: narrow(row.try_get("day")?, "day")?,
        period: narrow(row.try_get("period")?, "period")?,
        term_id: row.try_get("term_id")?,
    })
}
