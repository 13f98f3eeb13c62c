//! Progress-callback trait for per-unit summarization events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through a paper. Units are processed one
//! at a time, so events for a run never interleave.
//!
//! # Example
//!
//! ```rust
//! use paper_digest::{DigestConfig, DigestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl DigestProgressCallback for Counter {
//!     fn on_unit_complete(&self, index: usize, total: usize, _summary_len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("unit {index}/{total} done");
//!     }
//! }
//!
//! let config = DigestConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))) as Arc<dyn DigestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each unit.
///
/// All methods default to no-ops. `index` is 1-based.
pub trait DigestProgressCallback: Send + Sync {
    /// Called once the units are known (per-unit mode) or once the model
    /// reply has been parsed (whole-document mode).
    fn on_digest_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before the model request for a unit.
    fn on_unit_start(&self, index: usize, total: usize, title: &str) {
        let _ = (index, total, title);
    }

    /// Called when a unit produced a summary.
    fn on_unit_complete(&self, index: usize, total: usize, summary_len: usize) {
        let _ = (index, total, summary_len);
    }

    /// Called when the model produced no usable summary for a unit.
    fn on_unit_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once by [`crate::digest::persist_stream`] after the last record
    /// has been saved or skipped. Failed saves count as unsuccessful.
    fn on_digest_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;
