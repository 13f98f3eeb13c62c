//! Result types produced by a digest run.

use crate::config::SummaryMode;
use crate::error::UnitError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One section summary, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub section_title: String,
    pub summary: String,
    /// 1-based page the section starts on; 1 when unknown.
    pub page: u32,
}

impl SummaryRecord {
    pub fn new(section_title: impl Into<String>, summary: impl Into<String>, page: u32) -> Self {
        Self {
            section_title: section_title.into(),
            summary: summary.into(),
            page,
        }
    }
}

/// A summary row read back from a [`crate::store::SummaryStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSummary {
    pub id: i64,
    pub paper_id: i64,
    pub section_title: String,
    pub summary_text: String,
    pub page: u32,
    pub created_at: DateTime<Utc>,
}

impl StoredSummary {
    /// Drop the storage metadata.
    pub fn record(&self) -> SummaryRecord {
        SummaryRecord::new(&self.section_title, &self.summary_text, self.page)
    }
}

/// A registered paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub upload_date: DateTime<Utc>,
}

/// Everything that happened while digesting one paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestReport {
    pub paper_id: i64,
    pub mode: SummaryMode,
    /// Saved rows, in document traversal order.
    pub saved: Vec<StoredSummary>,
    /// Units that were skipped, in the order they failed.
    pub failures: Vec<UnitError>,
    pub stats: DigestStats,
}

impl DigestReport {
    /// True when at least one unit was summarised and none failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.saved.is_empty()
    }
}

/// Counters for a digest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestStats {
    /// Pages in the PDF.
    pub total_pages: usize,
    /// Pages that produced text after cropping.
    pub text_pages: usize,
    /// Records the orchestrator attempted to emit.
    pub units: usize,
    pub saved: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}
