//! Error types for the paper-digest library.
//!
//! Two families reflect two distinct failure scopes:
//!
//! * [`DigestError`] — **Request-scoped**: the paper cannot be processed at
//!   all (unreadable PDF, missing credential, whole-document response that
//!   could not be parsed). Returned as `Err(DigestError)` from the top-level
//!   entry points so a service layer can report a user-visible failure.
//!
//! * [`UnitError`] — **Unit-scoped**: one section or subsection failed
//!   (model error, empty reply, failed save) while its siblings are fine.
//!   Yielded inside [`crate::stream::SummaryStream`] and collected into
//!   [`crate::output::DigestReport::failures`].
//!
//! [`ModelError`], [`StoreError`] and [`PageFault`] are the errors of the
//! three collaborator seams (model, store, document source).

use std::path::PathBuf;
use thiserror::Error;

/// All request-scoped errors returned by the paper-digest library.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// The document cannot be opened or paged at all.
    #[error("Cannot read PDF '{path}': {detail}")]
    DocumentRead { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// No usable credential / provider; raised before any network call.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The single whole-document model call failed.
    #[error("Whole-document summarization failed: {0}")]
    ModelInvocation(#[source] ModelError),

    /// None of the recovery strategies found structured data in the reply.
    #[error("Could not extract summaries from model response ({} bytes)", raw_response.len())]
    ParseFailure { raw_response: String },

    // ── Persistence errors ────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recovered failure for a single summarization unit.
///
/// The surrounding run continues with the next unit.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The model call failed after retries.
    #[error("Unit '{unit}': model call failed: {detail}")]
    ModelFailed { unit: String, detail: String },

    /// The model answered with nothing usable.
    #[error("Unit '{unit}': model returned an empty summary")]
    EmptyResponse { unit: String },

    /// The summary was produced but could not be saved.
    #[error("Unit '{unit}': failed to persist summary: {detail}")]
    PersistFailed { unit: String, detail: String },
}

impl UnitError {
    /// Title of the unit this failure belongs to.
    pub fn unit(&self) -> &str {
        match self {
            UnitError::ModelFailed { unit, .. }
            | UnitError::EmptyResponse { unit }
            | UnitError::PersistFailed { unit, .. } => unit,
        }
    }
}

/// Errors returned by a [`crate::pipeline::llm::SummaryModel`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// The provider returned an error on every attempt.
    #[error("LLM call failed after {retries} retries: {detail}")]
    Api { retries: u32, detail: String },

    /// The call did not complete within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The call succeeded but the reply was blank.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Errors returned by a [`crate::store::SummaryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("paper {0} does not exist")]
    UnknownPaper(i64),
}

/// A page-level failure reported by a [`crate::pipeline::extract::DocumentSource`].
#[derive(Debug, Clone, Error, PartialEq)]
#[error("page {page}: {detail}")]
pub struct PageFault {
    pub page: usize,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failure_display_mentions_size_not_body() {
        let e = DigestError::ParseFailure {
            raw_response: "I am sorry, I cannot help".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("25 bytes"), "got: {msg}");
        assert!(!msg.contains("sorry"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = DigestError::ProviderNotConfigured {
            provider: "gemini".into(),
            hint: "Set GEMINI_API_KEY".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn unit_error_exposes_unit_title() {
        let e = UnitError::PersistFailed {
            unit: "2.1 Setup".into(),
            detail: "disk full".into(),
        };
        assert_eq!(e.unit(), "2.1 Setup");
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn model_invocation_wraps_timeout() {
        let e = DigestError::ModelInvocation(ModelError::Timeout { secs: 30 });
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn page_fault_display() {
        let f = PageFault {
            page: 4,
            detail: "bad xref".into(),
        };
        assert_eq!(f.to_string(), "page 4: bad xref");
    }
}
