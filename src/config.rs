//! Configuration types for corpus cleaning.
//!
//! Two layers of configuration exist because they have different lifetimes:
//!
//! * [`CleaningConfig`] — the four stage switches. It is `Copy`, threaded
//!   explicitly through every stage, and is all a pure
//!   [`crate::clean::clean_document`] call needs.
//! * [`BatchConfig`] — everything a batch run needs on top: where raw
//!   transcriptions live, where outputs and archives go, which indices to
//!   process and how many documents to clean at once. Built via its
//!   [`BatchConfigBuilder`].
//!
//! Nothing here reads the environment. The CLI maps flags (and their env
//! fallbacks) onto the builder; the engine only sees explicit values.

use crate::error::CleanError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Per-stage switches. Default: every stage enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Normalise LaTeX inside `$…$` / `$$…$$` spans.
    pub enable_math: bool,
    /// Drop orphan figure/scheme captions left behind by removed images.
    pub enable_caption_removal: bool,
    /// Replace table-image placeholders with tables from the manifest.
    pub enable_table_reconstruction: bool,
    /// Detect and archive the bibliography section.
    pub enable_reference_stripping: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            enable_math: true,
            enable_caption_removal: true,
            enable_table_reconstruction: true,
            enable_reference_stripping: true,
        }
    }
}

impl CleaningConfig {
    /// Only the basic cleaner runs; every optional stage is off.
    pub fn none() -> Self {
        Self {
            enable_math: false,
            enable_caption_removal: false,
            enable_table_reconstruction: false,
            enable_reference_stripping: false,
        }
    }
}

/// Configuration for a batch cleaning run.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_mdclean::{BatchConfig, BatchSelection};
///
/// let config = BatchConfig::builder()
///     .raw_dir("mineru_raw")
///     .out_dir("md_clean")
///     .selection(BatchSelection::Range { start: 0, limit: 10 })
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Directory holding one sub-directory per corpus index, each with a
    /// `full.md` and an optional `*_content_list.json`. Default: `mineru_raw`.
    pub raw_dir: PathBuf,

    /// Destination for `<index>.md` and `<index>.txt`. Default: `md_clean`.
    pub out_dir: PathBuf,

    /// Destination for archived reference sections. Default: `logs/removed_refs`.
    ///
    /// Each document writes `<archive_dir>/<index>.md`; writes are keyed by
    /// index so concurrent documents never touch the same file.
    pub archive_dir: PathBuf,

    /// Which indices to process. Default: all.
    pub selection: BatchSelection,

    /// Number of documents cleaned concurrently. Default: 8.
    ///
    /// Cleaning is CPU-bound regex work plus two small writes per document,
    /// so a value close to the core count saturates the machine.
    pub concurrency: usize,

    /// Stage switches passed to every document.
    pub cleaning: CleaningConfig,

    /// Optional per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("mineru_raw"),
            out_dir: PathBuf::from("md_clean"),
            archive_dir: PathBuf::from("logs/removed_refs"),
            selection: BatchSelection::default(),
            concurrency: 8,
            cleaning: CleaningConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("raw_dir", &self.raw_dir)
            .field("out_dir", &self.out_dir)
            .field("archive_dir", &self.archive_dir)
            .field("selection", &self.selection)
            .field("concurrency", &self.concurrency)
            .field("cleaning", &self.cleaning)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CleanProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl fmt::Debug for BatchConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl BatchConfigBuilder {
    pub fn raw_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.raw_dir = dir.into();
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.out_dir = dir.into();
        self
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.archive_dir = dir.into();
        self
    }

    pub fn selection(mut self, selection: BatchSelection) -> Self {
        self.config.selection = selection;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn cleaning(mut self, cleaning: CleaningConfig) -> Self {
        self.config.cleaning = cleaning;
        self
    }

    pub fn enable_math(mut self, v: bool) -> Self {
        self.config.cleaning.enable_math = v;
        self
    }

    pub fn enable_caption_removal(mut self, v: bool) -> Self {
        self.config.cleaning.enable_caption_removal = v;
        self
    }

    pub fn enable_table_reconstruction(mut self, v: bool) -> Self {
        self.config.cleaning.enable_table_reconstruction = v;
        self
    }

    pub fn enable_reference_stripping(mut self, v: bool) -> Self {
        self.config.cleaning.enable_reference_stripping = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, CleanError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(CleanError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        for (name, dir) in [
            ("raw_dir", &c.raw_dir),
            ("out_dir", &c.out_dir),
            ("archive_dir", &c.archive_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(CleanError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if let BatchSelection::Indices(ref indices) = c.selection {
            if indices.iter().any(|i| i.trim().is_empty()) {
                return Err(CleanError::InvalidConfig(
                    "Explicit indices must not be blank".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Selection ────────────────────────────────────────────────────────────

/// Specifies which corpus indices a batch run processes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchSelection {
    /// Every index discovered under the raw directory (default).
    #[default]
    All,
    /// A window of the sorted discovered indices. `limit == 0` means "to the end".
    Range { start: usize, limit: usize },
    /// Exactly these indices, deduplicated, in the order given.
    Indices(Vec<String>),
}

impl BatchSelection {
    /// Apply the selection to the sorted list of discovered indices.
    ///
    /// `Indices` ignores `discovered` entirely: explicit indices are processed
    /// even when discovery would not have found them, so a missing one is
    /// reported as a per-document failure rather than silently skipped.
    pub fn apply(&self, discovered: &[String]) -> Vec<String> {
        match self {
            BatchSelection::All => discovered.to_vec(),
            BatchSelection::Range { start, limit } => {
                let start = (*start).min(discovered.len());
                let end = if *limit == 0 {
                    discovered.len()
                } else {
                    start.saturating_add(*limit).min(discovered.len())
                };
                discovered[start..end].to_vec()
            }
            BatchSelection::Indices(indices) => {
                let mut seen = std::collections::HashSet::new();
                indices
                    .iter()
                    .map(|i| i.trim().to_string())
                    .filter(|i| seen.insert(i.clone()))
                    .collect()
            }
        }
    }

    /// Whether the selection needs the raw directory to be listed.
    pub fn needs_discovery(&self) -> bool {
        !matches!(self, BatchSelection::Indices(_))
    }
}
