//! Progress-callback trait for batch processing events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::ProcessingConfigBuilder::progress_callback`] to receive
//! events as [`crate::process::process_batch`] and
//! [`crate::stream::process_stream`] work through their inputs.
//!
//! The trait is `Send + Sync` because documents of a batch are processed
//! concurrently; callbacks for different documents may interleave.
//!
//! # Example
//!
//! ```rust
//! use idscan::{ProcessingConfig, ProcessingProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FlagCounter {
//!     flagged: AtomicUsize,
//! }
//!
//! impl ProcessingProgressCallback for FlagCounter {
//!     fn on_document_complete(&self, _index: usize, _total: usize, _summary: &str, needs_review: bool) {
//!         if needs_review {
//!             self.flagged.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = ProcessingConfig::builder()
//!     .progress_callback(Arc::new(FlagCounter { flagged: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch entry points as each document moves through the
/// pipeline. All methods default to no-ops.
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called once before any document is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before classification of a document starts.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position of the input in the batch
    /// * `total`: batch size
    /// * `input`: the path or URL as supplied by the caller
    fn on_document_start(&self, index: usize, total: usize, input: &str) {
        let _ = (index, total, input);
    }

    /// Called when a document finishes without a fatal error.
    ///
    /// Terminal classifications (not recognized, unsupported) land here too;
    /// `summary` describes the outcome and `needs_review` is false for them.
    fn on_document_complete(&self, index: usize, total: usize, summary: &str, needs_review: bool) {
        let _ = (index, total, summary, needs_review);
    }

    /// Called when a document fails fatally.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    ///
    /// `processed` counts documents that produced extracted data.
    fn on_batch_complete(&self, total: usize, processed: usize) {
        let _ = (total, processed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessingConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        started: AtomicUsize,
        flagged: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ProcessingProgressCallback for TrackingCallback {
        fn on_document_start(&self, _index: usize, _total: usize, _input: &str) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _i: usize, _t: usize, _summary: &str, needs_review: bool) {
            if needs_review {
                self.flagged.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn tracking_callback_counts_events() {
        let cb = TrackingCallback {
            started: AtomicUsize::new(0),
            flagged: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };
        cb.on_batch_start(3);
        cb.on_document_start(1, 3, "a.png");
        cb.on_document_start(2, 3, "b.png");
        cb.on_document_complete(1, 3, "american_passport", true);
        cb.on_document_complete(2, 3, "not_a_document", false);
        cb.on_document_error(3, 3, "all models failed");
        cb.on_batch_complete(3, 1);

        assert_eq!(cb.started.load(Ordering::SeqCst), 2);
        assert_eq!(cb.flagged.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_callback_is_object_safe() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_error(1, 1, "boom");
    }
}
