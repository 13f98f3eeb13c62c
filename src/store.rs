//! Durable storage for papers and their section summaries.
//!
//! Schema:
//! - papers: id, filename (unique), file_path, upload_date
//! - summaries: id, paper_id → papers, section_title, summary_text, page, created_at
//!
//! Every `save_summary` is its own autocommitted statement, so a crash after
//! unit N leaves units 1..=N on disk.

use crate::error::StoreError;
use crate::output::{Paper, StoredSummary, SummaryRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS papers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    file_path TEXT NOT NULL,
    upload_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    paper_id INTEGER NOT NULL,
    section_title TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    page INTEGER DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (paper_id) REFERENCES papers(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_summaries_paper ON summaries(paper_id);
";

/// Where summaries are written as they are produced.
pub trait SummaryStore: Send + Sync {
    /// Persist one record and return the stored row.
    fn save_summary(&self, paper_id: i64, record: &SummaryRecord)
        -> Result<StoredSummary, StoreError>;

    /// All summaries of a paper in insertion order.
    fn paper_summaries(&self, paper_id: i64) -> Result<Vec<StoredSummary>, StoreError>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(&path)?;
        debug!("Opened summary database {}", path.as_ref().display());
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Register a paper. An already registered filename returns the existing row.
    pub fn save_paper(&self, filename: &str, file_path: &str) -> Result<Paper, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO papers (filename, file_path, upload_date) VALUES (?1, ?2, ?3)",
            params![filename, file_path, Utc::now()],
        )?;
        let paper = conn.query_row(
            "SELECT id, filename, file_path, upload_date FROM papers WHERE filename = ?1",
            params![filename],
            row_to_paper,
        )?;
        Ok(paper)
    }

    pub fn paper(&self, id: i64) -> Result<Option<Paper>, StoreError> {
        let conn = self.conn()?;
        let paper = conn
            .query_row(
                "SELECT id, filename, file_path, upload_date FROM papers WHERE id = ?1",
                params![id],
                row_to_paper,
            )
            .optional()?;
        Ok(paper)
    }

    /// Newest first.
    pub fn all_papers(&self) -> Result<Vec<Paper>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, filename, file_path, upload_date FROM papers
             ORDER BY upload_date DESC, id DESC",
        )?;
        let papers = stmt
            .query_map([], row_to_paper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(papers)
    }
}

impl SummaryStore for SqliteStore {
    fn save_summary(
        &self,
        paper_id: i64,
        record: &SummaryRecord,
    ) -> Result<StoredSummary, StoreError> {
        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row("SELECT id FROM papers WHERE id = ?1", params![paper_id], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::UnknownPaper(paper_id));
        }

        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO summaries (paper_id, section_title, summary_text, page, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                paper_id,
                record.section_title,
                record.summary,
                record.page,
                created_at
            ],
        )?;

        Ok(StoredSummary {
            id: conn.last_insert_rowid(),
            paper_id,
            section_title: record.section_title.clone(),
            summary_text: record.summary.clone(),
            page: record.page,
            created_at,
        })
    }

    fn paper_summaries(&self, paper_id: i64) -> Result<Vec<StoredSummary>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, paper_id, section_title, summary_text, COALESCE(page, 1), created_at
             FROM summaries WHERE paper_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![paper_id], row_to_summary)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_paper(row: &Row<'_>) -> rusqlite::Result<Paper> {
    Ok(Paper {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_path: row.get(2)?,
        upload_date: row.get::<_, DateTime<Utc>>(3)?,
    })
}

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<StoredSummary> {
    Ok(StoredSummary {
        id: row.get(0)?,
        paper_id: row.get(1)?,
        section_title: row.get(2)?,
        summary_text: row.get(3)?,
        page: row.get(4)?,
        created_at: row.get::<_, DateTime<Utc>>(5)?,
    })
}

/// In-process store for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredSummary>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all papers.
    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SummaryStore for MemoryStore {
    fn save_summary(
        &self,
        paper_id: i64,
        record: &SummaryRecord,
    ) -> Result<StoredSummary, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        let stored = StoredSummary {
            id: rows.len() as i64 + 1,
            paper_id,
            section_title: record.section_title.clone(),
            summary_text: record.summary.clone(),
            page: record.page,
            created_at: Utc::now(),
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    fn paper_summaries(&self, paper_id: i64) -> Result<Vec<StoredSummary>, StoreError> {
        let rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows
            .iter()
            .filter(|r| r.paper_id == paper_id)
            .cloned()
            .collect())
    }
}
