//! # edgequake-mdclean
//!
//! Clean machine-transcribed Markdown into a corpus fit for language-model
//! data mining.
//!
//! ## Why this crate?
//!
//! PDF→Markdown services (MinerU and friends) produce text that is mostly
//! right but noisy: references to figure crops that were never shipped,
//! captions floating without their figure, tables flattened into images,
//! LaTeX with tokenizer spacing (`CO _ { 2 }`), and a bibliography that
//! dominates every n-gram statistic. This crate removes or repairs each of
//! those conservatively and keeps everything it deletes from the
//! bibliography so the decision can be audited.
//!
//! ## Pipeline Overview
//!
//! ```text
//! <raw_dir>/<index>/full.md (+ *_content_list.json)
//!  │
//!  ├─ 1. Load        raw Markdown + optional manifest
//!  ├─ 2. Basic       drop figure images, strip invisible chars, whitespace
//!  ├─ 3. Math        tighten LaTeX spacing inside $…$ / $$…$$
//!  ├─ 4. Captions    delete orphan "Figure N." blocks
//!  ├─ 5. Tables      table-image placeholders → inline HTML tables
//!  ├─ 6. References  title match, then tail-density heuristics
//!  └─ 7. Output      <out_dir>/<index>.md, .txt; removed refs archived
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_mdclean::{clean_batch, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .raw_dir("mineru_raw")
//!         .out_dir("md_clean")
//!         .build()?;
//!     let output = clean_batch(&config).await?;
//!     eprintln!(
//!         "{} cleaned, {} failed, {} bibliographies cut by title",
//!         output.stats.cleaned_documents,
//!         output.stats.failed_documents,
//!         output.stats.title_matches
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdclean` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-mdclean = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod clean;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::RemovalArchiver;
pub use clean::{clean_batch, clean_batch_sync, clean_document, clean_index, clean_markdown};
pub use config::{BatchConfig, BatchConfigBuilder, BatchSelection, CleaningConfig};
pub use error::{CleanError, DocumentError};
pub use output::{
    BatchOutput, BatchStats, CleaningResult, CleaningStats, RemovalReason, RemovedSpan,
};
pub use pipeline::input::{ContentKind, ContentListEntry, Document};
pub use progress::{CleanProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{clean_stream, DocumentStream};
