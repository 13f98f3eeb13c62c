//! Eager entry points: summarize a paper and persist every record.
//!
//! These drive a [`SummaryStream`] to completion, saving each record before
//! the next one is requested. One bad unit or one failed save is recorded in
//! [`DigestReport::failures`] and the run moves on; only request-scoped
//! problems surface as `Err(DigestError)`.

use crate::config::DigestConfig;
use crate::error::{DigestError, UnitError};
use crate::output::{DigestReport, DigestStats};
use crate::pipeline::extract::{ExtractedPages, PageTexts};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::SummaryModel;
use crate::pipeline::sections::{build_sections, SectionTree};
use crate::store::{SqliteStore, SummaryStore};
use crate::stream::{self, SummaryStream};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Summarize `input` and persist the records under an existing `paper_id`.
///
/// # Errors
/// Returns `Err(DigestError)` only for request-scoped failures:
/// - no usable model credential (checked before the input is touched)
/// - file not found, not a PDF, unreadable or encrypted
/// - whole-document call failed or its reply could not be parsed
pub async fn digest_paper(
    input_str: impl AsRef<str>,
    store: &dyn SummaryStore,
    paper_id: i64,
    config: &DigestConfig,
) -> Result<DigestReport, DigestError> {
    let input_str = input_str.as_ref();
    info!("Digesting paper {}: {}", paper_id, input_str);

    let model = stream::resolve_model(config)?;
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run(&resolved, model, store, paper_id, config).await
}

/// Register `input` in `store` (by file name) and digest it.
///
/// Re-digesting a file name that is already registered appends to that paper.
pub async fn digest_new_paper(
    input_str: impl AsRef<str>,
    store: &SqliteStore,
    config: &DigestConfig,
) -> Result<DigestReport, DigestError> {
    let input_str = input_str.as_ref();

    let model = stream::resolve_model(config)?;
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let paper = store.save_paper(&resolved.file_name(), &resolved.origin())?;
    info!("Registered '{}' as paper {}", paper.filename, paper.id);

    run(&resolved, model, store, paper.id, config).await
}

/// Synchronous wrapper around [`digest_paper`].
///
/// Creates a temporary tokio runtime. Do not call from inside an async
/// context.
pub fn digest_paper_sync(
    input_str: impl AsRef<str>,
    store: &dyn SummaryStore,
    paper_id: i64,
    config: &DigestConfig,
) -> Result<DigestReport, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(digest_paper(input_str, store, paper_id, config))
}

/// Summarize already-extracted pages and persist the records.
pub async fn digest_pages(
    pages: &PageTexts,
    model: Arc<dyn SummaryModel>,
    store: &dyn SummaryStore,
    paper_id: i64,
    config: &DigestConfig,
) -> Result<DigestReport, DigestError> {
    let start = Instant::now();
    let records = match stream::summarize_pages(pages, model, config).await {
        Ok(records) => records,
        Err(e) => {
            error!("Paper {} failed to summarize: {}", paper_id, e);
            return Err(e);
        }
    };

    let mut report = persist_stream(records, store, paper_id, config).await;
    report.stats.text_pages = pages.len();
    report.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

/// Drain `records` into `store`, collecting failures instead of stopping.
///
/// The next record is only requested once the previous one has been saved.
pub async fn persist_stream(
    mut records: SummaryStream,
    store: &dyn SummaryStore,
    paper_id: i64,
    config: &DigestConfig,
) -> DigestReport {
    let start = Instant::now();
    let mut saved = Vec::new();
    let mut failures = Vec::new();

    while let Some(item) = records.next().await {
        match item {
            Ok(record) => match store.save_summary(paper_id, &record) {
                Ok(row) => saved.push(row),
                Err(e) => {
                    warn!(
                        "Paper {}: could not save '{}': {}",
                        paper_id, record.section_title, e
                    );
                    failures.push(UnitError::PersistFailed {
                        unit: record.section_title,
                        detail: e.to_string(),
                    });
                }
            },
            Err(unit_err) => failures.push(unit_err),
        }
    }

    let units = saved.len() + failures.len();
    if let Some(cb) = &config.progress_callback {
        cb.on_digest_complete(units, saved.len());
    }

    if units == 0 {
        info!("Paper {}: nothing to summarize", paper_id);
    } else {
        info!(
            "Paper {}: {} summaries saved, {} units skipped",
            paper_id,
            saved.len(),
            failures.len()
        );
    }

    DigestReport {
        paper_id,
        mode: config.mode,
        stats: DigestStats {
            units,
            saved: saved.len(),
            failed: failures.len(),
            total_duration_ms: start.elapsed().as_millis() as u64,
            ..Default::default()
        },
        saved,
        failures,
    }
}

/// Extract the section tree of a PDF without calling any model.
pub async fn inspect_sections(
    input_str: impl AsRef<str>,
    config: &DigestConfig,
) -> Result<SectionTree, DigestError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let extracted = stream::extract_input(&resolved, config).await?;
    let tree = build_sections(&extracted.pages);
    if tree.is_empty() {
        info!("No sections detected in {}", resolved.file_name());
    }
    Ok(tree)
}

async fn run(
    resolved: &ResolvedInput,
    model: Arc<dyn SummaryModel>,
    store: &dyn SummaryStore,
    paper_id: i64,
    config: &DigestConfig,
) -> Result<DigestReport, DigestError> {
    let start = Instant::now();
    let ExtractedPages {
        pages, total_pages, ..
    } = stream::extract_input(resolved, config).await?;

    let mut report = digest_pages(&pages, model, store, paper_id, config).await?;
    report.stats.total_pages = total_pages;
    report.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SummaryRecord;
    use crate::store::MemoryStore;
    use futures::stream as fstream;

    #[tokio::test]
    async fn persist_stream_keeps_order_and_failures() {
        let items: Vec<Result<SummaryRecord, UnitError>> = vec![
            Ok(SummaryRecord::new("1 Intro", "a", 1)),
            Err(UnitError::EmptyResponse {
                unit: "1.1 Background".into(),
            }),
            Ok(SummaryRecord::new("2 Method", "b", 2)),
        ];
        let store = MemoryStore::new();
        let report = persist_stream(
            Box::pin(fstream::iter(items)),
            &store,
            7,
            &DigestConfig::default(),
        )
        .await;

        let titles: Vec<&str> = report
            .saved
            .iter()
            .map(|r| r.section_title.as_str())
            .collect();
        assert_eq!(titles, vec!["1 Intro", "2 Method"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.stats.units, 3);
        assert!(!report.is_complete());
        assert_eq!(store.paper_summaries(7).unwrap().len(), 2);
    }

    fn unconfigured() -> DigestConfig {
        DigestConfig::builder()
            .provider_name("nope-provider")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn digest_paper_checks_credentials_before_input() {
        let store = MemoryStore::new();
        let err = digest_paper("/definitely/missing.pdf", &store, 1, &unconfigured())
            .await
            .unwrap_err();
        assert!(
            matches!(err, DigestError::ProviderNotConfigured { .. }),
            "got {err:?}"
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn digest_new_paper_registers_nothing_without_credentials() {
        let store = SqliteStore::in_memory().unwrap();
        let err = digest_new_paper("/definitely/missing.pdf", &store, &unconfigured())
            .await
            .unwrap_err();
        assert!(
            matches!(err, DigestError::ProviderNotConfigured { .. }),
            "got {err:?}"
        );
        assert!(store.all_papers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_stream_is_an_empty_report() {
        let store = MemoryStore::new();
        let report = persist_stream(
            Box::pin(fstream::iter(Vec::<Result<SummaryRecord, UnitError>>::new())),
            &store,
            1,
            &DigestConfig::default(),
        )
        .await;
        assert_eq!(report.stats.units, 0);
        assert!(report.saved.is_empty() && report.failures.is_empty());
        assert!(!report.is_complete());
        assert!(store.is_empty());
    }
}
