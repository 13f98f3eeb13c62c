//! Pipeline stages for paper summarization.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ sections ──▶ llm ──▶ postprocess
//! (URL/path) (pdfium)   (headings)   (chat)   (cleanup)
//!                 │                    ▲
//!                 └──── paged text ────┘──▶ response (JSON recovery)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`]  — cropped per-page text; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`sections`] — fold page lines into a section/subsection tree
//! 4. [`llm`]      — the [`llm::SummaryModel`] seam with retry/backoff
//! 5. [`postprocess`] — deterministic cleanup of page text and summaries
//! 6. [`response`] — recover structured entries from a whole-document reply

pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod response;
pub mod sections;
