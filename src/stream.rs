//! Streaming summarization API: emit section summaries as they are produced.
//!
//! Per-unit mode issues one model call per section/subsection, so a long
//! paper takes minutes. [`summarize_document`] returns a lazy stream that
//! runs the next call only when the consumer polls, which keeps at most one
//! unit in flight and lets the consumer persist each record before the next
//! request goes out.
//!
//! Whole-document mode makes its single call (or its page-by-page
//! conversation) before the stream is returned. A reply that cannot be
//! parsed is an `Err(DigestError::ParseFailure)` and no records are emitted.

use crate::config::{DigestConfig, DocumentDelivery, SummaryMode};
use crate::error::{DigestError, ModelError, UnitError};
use crate::output::SummaryRecord;
use crate::pipeline::extract::{self, ExtractedPages, PageTexts};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::{ModelReply, ProviderModel, SummaryModel, Turn};
use crate::pipeline::response::{parse_summary_response, ParsedEntry};
use crate::pipeline::sections::{build_sections, SummaryUnit};
use crate::pipeline::postprocess;
use crate::prompts;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{debug, error, info, warn};

/// A boxed stream of summary records, in document order.
pub type SummaryStream = Pin<Box<dyn Stream<Item = Result<SummaryRecord, UnitError>> + Send>>;

const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Summarize a PDF (path or URL), streaming records as they are ready.
///
/// The model is resolved before the input is touched, so a missing
/// credential fails fast with [`DigestError::ProviderNotConfigured`].
///
/// # Returns
/// - `Ok(SummaryStream)` — a stream of `Result<SummaryRecord, UnitError>`
/// - `Err(DigestError)` — request-scoped failure (unreadable PDF, no
///   provider, unparsable whole-document reply, …)
///
/// # Example
/// ```rust,no_run
/// use paper_digest::{summarize_document, DigestConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DigestConfig::default();
/// let mut stream = summarize_document("paper.pdf", &config).await?;
/// while let Some(item) = stream.next().await {
///     match item {
///         Ok(r) => println!("p.{} {}: {}", r.page, r.section_title, r.summary),
///         Err(e) => eprintln!("skipped: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn summarize_document(
    input_str: impl AsRef<str>,
    config: &DigestConfig,
) -> Result<SummaryStream, DigestError> {
    let input_str = input_str.as_ref();
    info!("Starting summarization: {} ({:?})", input_str, config.mode);

    let model = resolve_model(config)?;
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let extracted = extract_input(&resolved, config).await?;
    summarize_pages(&extracted.pages, model, config).await
}

/// Summarize already-extracted page texts with the given model.
pub async fn summarize_pages(
    pages: &PageTexts,
    model: Arc<dyn SummaryModel>,
    config: &DigestConfig,
) -> Result<SummaryStream, DigestError> {
    match config.mode {
        SummaryMode::PerUnit => Ok(per_unit_stream(pages, model, config)),
        SummaryMode::WholeDocument => {
            let records = whole_document(pages, model.as_ref(), config).await?;
            Ok(records_stream(records, config))
        }
    }
}

/// Extract cropped page texts from a resolved input.
pub(crate) async fn extract_input(
    resolved: &ResolvedInput,
    config: &DigestConfig,
) -> Result<ExtractedPages, DigestError> {
    let extracted = extract::extract_pdf_pages(
        resolved.path(),
        config.password.as_deref(),
        config.crop_band(),
    )
    .await?;

    if let Some(fault) = &extracted.stopped_at {
        warn!(
            "Only {} of {} pages were read ({})",
            fault.page - 1,
            extracted.total_pages,
            fault
        );
    }
    info!(
        "{} pages, {} with text",
        extracted.total_pages,
        extracted.pages.len()
    );
    Ok(extracted)
}

// ── Per-unit mode ────────────────────────────────────────────────────────

fn per_unit_stream(
    pages: &PageTexts,
    model: Arc<dyn SummaryModel>,
    config: &DigestConfig,
) -> SummaryStream {
    let tree = build_sections(pages);
    let units = tree.units();
    let total = units.len();

    if units.is_empty() {
        info!("No sections detected in {} text pages", pages.len());
    } else {
        info!(
            "Summarizing {} units ({} sections) with {}",
            total,
            tree.len(),
            model.name()
        );
    }

    let callback = config.progress_callback.clone();
    if let Some(cb) = &callback {
        cb.on_digest_start(total);
    }
    let template = config.unit_prompt.clone();

    let s = stream::iter(units.into_iter().enumerate()).then(move |(i, unit)| {
        let model = Arc::clone(&model);
        let cb = callback.clone();
        let template = template.clone();
        async move {
            let index = i + 1;
            if let Some(cb) = &cb {
                cb.on_unit_start(index, total, &unit.title);
            }

            let result = summarize_unit(model.as_ref(), &unit, template.as_deref()).await;

            match &result {
                Ok(record) => {
                    debug!("Unit {}/{} '{}' summarized", index, total, record.section_title);
                    if let Some(cb) = &cb {
                        cb.on_unit_complete(index, total, record.summary.len());
                    }
                }
                Err(e) => {
                    warn!("Unit {}/{} skipped: {}", index, total, e);
                    if let Some(cb) = &cb {
                        cb.on_unit_error(index, total, &e.to_string());
                    }
                }
            }
            result
        }
    });

    Box::pin(s)
}

async fn summarize_unit(
    model: &dyn SummaryModel,
    unit: &SummaryUnit,
    template: Option<&str>,
) -> Result<SummaryRecord, UnitError> {
    let turns = [Turn::user(prompts::unit_prompt(template, &unit.text))];

    let reply = model.complete(&turns).await.map_err(|e| match e {
        ModelError::EmptyResponse => UnitError::EmptyResponse {
            unit: unit.title.clone(),
        },
        other => UnitError::ModelFailed {
            unit: unit.title.clone(),
            detail: other.to_string(),
        },
    })?;

    let summary = postprocess::clean_summary(&reply.text);
    if summary.is_empty() {
        return Err(UnitError::EmptyResponse {
            unit: unit.title.clone(),
        });
    }

    Ok(SummaryRecord::new(&unit.title, summary, unit.page as u32))
}

// ── Whole-document mode ──────────────────────────────────────────────────

async fn whole_document(
    pages: &PageTexts,
    model: &dyn SummaryModel,
    config: &DigestConfig,
) -> Result<Vec<SummaryRecord>, DigestError> {
    if pages.is_empty() {
        info!("Document has no extractable text; nothing to summarize");
        return Ok(Vec::new());
    }

    let reply = match config.delivery {
        DocumentDelivery::SingleShot => single_shot(pages, model, config).await,
        DocumentDelivery::PageByPage => page_by_page(pages, model, config).await,
    }
    .map_err(|e| {
        error!("Whole-document summarization failed: {}", e);
        DigestError::ModelInvocation(e)
    })?;

    let entries = parse_summary_response(&reply.text).map_err(|failure| {
        error!(
            "Could not extract summaries from {}-byte model response",
            failure.raw_response.len()
        );
        DigestError::ParseFailure {
            raw_response: failure.raw_response,
        }
    })?;

    if entries.is_empty() {
        info!("Model returned an empty section list");
    } else {
        info!("Model identified {} sections", entries.len());
    }
    Ok(entries.into_iter().map(ParsedEntry::into_record).collect())
}

async fn single_shot(
    pages: &PageTexts,
    model: &dyn SummaryModel,
    config: &DigestConfig,
) -> Result<ModelReply, ModelError> {
    let document = prompts::paged_document(pages.iter().map(|(n, t)| (*n, t.as_str())));
    info!(
        "Sending {} pages ({} chars) in one request to {}",
        pages.len(),
        document.len(),
        model.name()
    );
    let prompt = prompts::document_prompt(config.document_prompt.as_deref(), &document);
    model.complete(&[Turn::user(prompt)]).await
}

async fn page_by_page(
    pages: &PageTexts,
    model: &dyn SummaryModel,
    config: &DigestConfig,
) -> Result<ModelReply, ModelError> {
    info!(
        "Sending {} pages one at a time to {}",
        pages.len(),
        model.name()
    );
    let mut turns = vec![Turn::system(prompts::PAGE_BY_PAGE_SYSTEM)];

    for (page_num, text) in pages {
        turns.push(Turn::user(prompts::page_turn(*page_num, text)));
        let ack = model.complete(&turns).await?;
        debug!("Page {} acknowledged ({} chars)", page_num, ack.text.len());
        turns.push(Turn::assistant(ack.text));
    }

    turns.push(Turn::user(prompts::final_request(
        config.document_prompt.as_deref(),
    )));
    model.complete(&turns).await
}

fn records_stream(records: Vec<SummaryRecord>, config: &DigestConfig) -> SummaryStream {
    let total = records.len();
    let callback = config.progress_callback.clone();
    if let Some(cb) = &callback {
        cb.on_digest_start(total);
    }

    let s = stream::iter(records.into_iter().enumerate()).map(move |(i, record)| {
        if let Some(cb) = &callback {
            cb.on_unit_complete(i + 1, total, record.summary.len());
        }
        Ok(record)
    });
    Box::pin(s)
}

// ── Model resolution ─────────────────────────────────────────────────────

/// Resolve the summarization model, from most-specific to least-specific.
///
/// 1. **Pre-built summarizer** (`config.summarizer`) — used as-is; this is
///    how tests inject scripted models.
/// 2. **Pre-built provider** (`config.provider`) — wrapped in [`ProviderModel`].
/// 3. **Named provider** (`config.provider_name` + optional `config.model`).
/// 4. **Environment pair** (`PAPER_DIGEST_PROVIDER` + `PAPER_DIGEST_MODEL`).
/// 5. **Gemini key** (`GEMINI_API_KEY`) with `gemini-2.0-flash-lite`.
/// 6. **OpenAI key** (`OPENAI_API_KEY`) with `gpt-4.1-nano`.
/// 7. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_model(config: &DigestConfig) -> Result<Arc<dyn SummaryModel>, DigestError> {
    if let Some(ref summarizer) = config.summarizer {
        return Ok(Arc::clone(summarizer));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderModel::new(provider, config)))
}

fn resolve_provider(config: &DigestConfig) -> Result<Arc<dyn LLMProvider>, DigestError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        return create_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        non_empty_env("PAPER_DIGEST_PROVIDER"),
        non_empty_env("PAPER_DIGEST_MODEL"),
    ) {
        return create_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(GEMINI_DEFAULT_MODEL);
        return create_provider("gemini", model);
    }

    if non_empty_env("OPENAI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL);
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DigestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY or OPENAI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn default_model_for(provider_name: &str) -> &'static str {
    match provider_name {
        "gemini" | "google" => GEMINI_DEFAULT_MODEL,
        _ => OPENAI_DEFAULT_MODEL,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DigestError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DigestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
