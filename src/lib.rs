//! # paper-digest
//!
//! Split PDF research papers into their numbered sections and summarize each
//! one with an LLM.
//!
//! ## Why this crate?
//!
//! Papers are long and readers mostly want "what does each section say".
//! Numbered headings (`1 Introduction`, `3.2 Training`) survive text
//! extraction far better than fonts or layout, so this crate recovers the
//! section tree from plain page text and sends one section at a time to a
//! model. As an alternative it can send the whole paper once and recover a
//! JSON section list from whatever the model answers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   cropped per-page text via pdfium (spawn_blocking)
//!  ├─ 3. Sections  fold lines into a section/subsection tree
//!  ├─ 4. Model     one call per unit, or one call for the whole document
//!  ├─ 5. Recover   clean plain summaries / parse the JSON section list
//!  └─ 6. Persist   one SQLite row per summary, in document order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_digest::{digest_new_paper, DigestConfig, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = DigestConfig::default();
//!     let store = SqliteStore::open("papers.db")?;
//!     let report = digest_new_paper("paper.pdf", &store, &config).await?;
//!     for row in &report.saved {
//!         println!("p.{} {}: {}", row.page, row.section_title, row.summary_text);
//!     }
//!     eprintln!("{} skipped", report.failures.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-digest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paper-digest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CropBand, DigestConfig, DigestConfigBuilder, DocumentDelivery, SummaryMode};
pub use digest::{
    digest_new_paper, digest_pages, digest_paper, digest_paper_sync, inspect_sections,
    persist_stream,
};
pub use error::{DigestError, ModelError, PageFault, StoreError, UnitError};
pub use output::{DigestReport, DigestStats, Paper, StoredSummary, SummaryRecord};
pub use pipeline::extract::{extract_pages, extract_sections, DocumentSource, PageTexts};
pub use pipeline::llm::{ModelReply, Role, SummaryModel, Turn};
pub use pipeline::response::{parse_summary_response, ParseFailure, ParsedEntry};
pub use pipeline::sections::{build_sections, Section, SectionTree, Subsection, SummaryUnit};
pub use progress::{DigestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{MemoryStore, SqliteStore, SummaryStore};
pub use stream::{resolve_model, summarize_document, summarize_pages, SummaryStream};
