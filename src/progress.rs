//! Progress-callback trait for per-document cleaning events.
//!
//! Inject an [`Arc<dyn CleanProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the batch runner processes each document.
//!
//! Callers can forward events to a channel, a log file or a terminal progress
//! bar without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because documents are cleaned concurrently.
//!
//! # Example
//!
//! ```rust
//! use edgequake_mdclean::{BatchConfig, CleanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl CleanProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: &str, markdown_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}: {markdown_len} bytes");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn CleanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch runner as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_document_*` may be called concurrently from
/// different tasks; protect shared state accordingly.
pub trait CleanProgressCallback: Send + Sync {
    /// Called once before any document is loaded.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a document is loaded.
    fn on_document_start(&self, index: &str) {
        let _ = index;
    }

    /// Called when a document's outputs have been written.
    ///
    /// `markdown_len` is the byte length of the cleaned Markdown.
    fn on_document_complete(&self, index: &str, markdown_len: usize) {
        let _ = (index, markdown_len);
    }

    /// Called when a document fails; the batch continues.
    fn on_document_error(&self, index: &str, error: &str) {
        let _ = (index, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CleanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn CleanProgressCallback>;
