//! Error types for the edgequake-mdclean library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CleanError`] — **Fatal**: the call cannot proceed at all (raw
//!   directory missing, nothing selected, invalid configuration). Returned as
//!   `Err(CleanError)` from the top-level `clean*` functions.
//!
//! * [`DocumentError`] — **Non-fatal**: a single document failed (unreadable
//!   `full.md`, output directory not writable) but every other document in
//!   the batch is fine. Stored inside [`crate::output::BatchOutput`] so one
//!   malformed document never halts the batch.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! document failure, log and continue, or collect all errors for a report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-mdclean library.
///
/// Document-level failures inside a batch use [`DocumentError`] and are
/// stored in [`crate::output::BatchOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum CleanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The raw transcription directory does not exist.
    #[error("Raw directory not found: '{path}'\nExpected one sub-directory per corpus index containing full.md.")]
    RawDirNotFound { path: PathBuf },

    /// The transcribed Markdown for an index is missing.
    #[error("Missing full.md for index '{index}': '{path}'")]
    MarkdownNotFound { index: String, path: PathBuf },

    /// The transcribed Markdown exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content manifest is not valid JSON or has an unexpected shape.
    #[error("Malformed content manifest '{path}': {detail}")]
    ManifestMalformed { path: PathBuf, detail: String },

    /// Selection produced no index to clean.
    #[error("No documents selected under '{path}'\nCheck --start/--limit or --indices.")]
    NoDocuments { path: PathBuf },

    // ── Batch outcome ─────────────────────────────────────────────────────
    /// Some documents were cleaned but at least one failed.
    ///
    /// Returned by [`crate::output::BatchOutput::into_result`] when the
    /// caller wants to treat any document failure as an error.
    #[error("{failed}/{total} documents failed during cleaning")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not persist removed reference text to the archive.
    #[error("Failed to archive removed references to '{path}': {source}")]
    ArchiveWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// Stored alongside successful results in [`crate::output::BatchOutput`].
/// A failed index never produces a [`crate::output::CleaningResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The raw Markdown could not be located or read.
    #[error("Document {index}: load failed: {detail}")]
    LoadFailed { index: String, detail: String },

    /// The cleaning task aborted before producing a result.
    #[error("Document {index}: cleaning aborted: {detail}")]
    CleanFailed { index: String, detail: String },

    /// Cleaned output or archive could not be written.
    #[error("Document {index}: write failed: {detail}")]
    WriteFailed { index: String, detail: String },
}

impl DocumentError {
    /// The corpus index this failure belongs to.
    pub fn index(&self) -> &str {
        match self {
            DocumentError::LoadFailed { index, .. }
            | DocumentError::CleanFailed { index, .. }
            | DocumentError::WriteFailed { index, .. } => index,
        }
    }
}
