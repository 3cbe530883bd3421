//! Eager cleaning entry points.
//!
//! [`clean_document`] is the pure core: one loaded document in, one
//! [`CleaningResult`] out, no I/O. [`clean_batch`] wraps it with discovery,
//! bounded concurrency and atomic output files, and returns only once every
//! selected document has been attempted. Use [`crate::stream::clean_stream`]
//! instead to receive results as each document finishes.

use crate::archive::{write_atomic, RemovalArchiver};
use crate::config::{BatchConfig, CleaningConfig};
use crate::error::{CleanError, DocumentError};
use crate::output::{BatchOutput, BatchStats, CleaningResult, CleaningStats, RemovedSpan};
use crate::pipeline::input::{self, ContentListEntry, Document};
use crate::pipeline::{basic, captions, math, plaintext, references, tables};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run every enabled stage over one document.
///
/// Deterministic and free of I/O: the same document and configuration always
/// produce the same result.
///
/// # Example
/// ```rust
/// use edgequake_mdclean::{clean_document, CleaningConfig, Document};
///
/// let doc = Document::new("1", "Intro.\n\n![](images/f1.jpg)\n\n## References\n\n[1] A.\n", None);
/// let result = clean_document(&doc, &CleaningConfig::default());
/// assert_eq!(result.markdown, "Intro.\n");
/// assert!(result.removed.is_some());
/// ```
pub fn clean_document(doc: &Document, config: &CleaningConfig) -> CleaningResult {
    let mut stats = CleaningStats::default();

    // ── Stage 1: basic cleanup ───────────────────────────────────────────
    let basic = basic::basic_clean(doc, config);
    stats.images_removed = basic.images_removed;
    let mut text = basic.text;

    // ── Stage 2a: math ───────────────────────────────────────────────────
    if config.enable_math {
        let out = math::normalize_math(&text);
        stats.math_spans_normalized = out.spans_normalized;
        stats.malformed_math_spans = out.malformed_spans;
        text = out.text;
    }

    // ── Stage 2b: orphan captions ────────────────────────────────────────
    if config.enable_caption_removal {
        let out = captions::remove_orphan_captions(&text);
        stats.captions_removed = out.removed;
        text = out.text;
    }

    // ── Stage 2c: tables ─────────────────────────────────────────────────
    if config.enable_table_reconstruction {
        let out = tables::reconstruct_tables(doc, &text, config.enable_math);
        stats.tables_reconstructed = out.reconstructed;
        stats.unresolved_tables = out.unresolved;
        text = out.text;
    }

    // ── Stage 2d: references ─────────────────────────────────────────────
    let mut removed = None;
    if config.enable_reference_stripping {
        // Heuristic thresholds are relative to the document length, so a
        // removal can expose another block. Repeat until nothing changes.
        let mut spans = Vec::new();
        loop {
            let out = references::strip_references(&doc.index, &text);
            text = basic::normalize_whitespace(&out.text);
            if out.removed.is_empty() {
                break;
            }
            spans.extend(out.removed);
        }
        stats.reference_spans = spans.len();
        removed = merge_spans(spans);
    }

    // ── Plaintext ────────────────────────────────────────────────────────
    let plaintext = plaintext::to_plaintext(&text);

    debug!(
        "Index {}: {} images, {} captions, {} tables, {} reference spans",
        doc.index,
        stats.images_removed,
        stats.captions_removed,
        stats.tables_reconstructed,
        stats.reference_spans
    );

    CleaningResult {
        index: doc.index.clone(),
        markdown: text,
        plaintext,
        removed,
        stats,
    }
}

/// Clean Markdown that is already in memory.
pub fn clean_markdown(
    index: impl Into<String>,
    text: impl Into<String>,
    manifest: Option<Vec<ContentListEntry>>,
    config: &CleaningConfig,
) -> CleaningResult {
    clean_document(&Document::new(index, text, manifest), config)
}

/// Load `<raw_dir>/<index>` and clean it without writing anything.
pub async fn clean_index(
    raw_dir: impl AsRef<Path>,
    index: &str,
    config: &CleaningConfig,
) -> Result<CleaningResult, CleanError> {
    let doc = input::load_document(raw_dir.as_ref(), index).await?;
    let config = *config;
    tokio::task::spawn_blocking(move || clean_document(&doc, &config))
        .await
        .map_err(|e| CleanError::Internal(format!("cleaning task failed: {e}")))
}

/// Clean every selected document under `config.raw_dir`.
///
/// Writes `<out_dir>/<index>.md`, `<out_dir>/<index>.txt` and, when
/// references were removed, `<archive_dir>/<index>.md`.
///
/// # Returns
/// `Ok(BatchOutput)` even if some documents failed (check
/// `output.failures`, or call [`BatchOutput::into_result`]).
///
/// # Errors
/// Returns `Err(CleanError)` only for fatal errors:
/// - raw directory not found
/// - nothing selected
/// - output directory cannot be created
pub async fn clean_batch(config: &BatchConfig) -> Result<BatchOutput, CleanError> {
    let total_start = Instant::now();
    info!("Starting batch: {}", config.raw_dir.display());

    let indices = prepare_batch(config).await?;
    let total = indices.len();
    info!("Cleaning {} documents", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let archiver = RemovalArchiver::new(config.archive_dir.clone());
    let outcomes: Vec<Result<CleaningResult, DocumentError>> =
        stream::iter(indices.into_iter().map(|index| {
            let config = config.clone();
            let archiver = archiver.clone();
            async move { run_document(&config, &archiver, index).await }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let (mut results, mut failures): (Vec<_>, Vec<_>) = (Vec::new(), Vec::new());
    for outcome in outcomes {
        match outcome {
            Ok(r) => results.push(r),
            Err(e) => failures.push(e),
        }
    }
    results.sort_by(|a, b| a.index.cmp(&b.index));
    failures.sort_by(|a, b| a.index().cmp(b.index()));

    let mut stats = BatchStats::from_results(total, &results, &failures);
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Batch complete: {}/{} documents, {} failed, {}ms total",
        stats.cleaned_documents, total, stats.failed_documents, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, results.len());
    }

    Ok(BatchOutput {
        results,
        failures,
        stats,
    })
}

/// Synchronous wrapper around [`clean_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn clean_batch_sync(config: &BatchConfig) -> Result<BatchOutput, CleanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CleanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(clean_batch(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the selected indices and create the output directory.
pub(crate) async fn prepare_batch(config: &BatchConfig) -> Result<Vec<String>, CleanError> {
    let discovered = if config.selection.needs_discovery() {
        input::discover_indices(&config.raw_dir).await?
    } else {
        Vec::new()
    };
    let indices = config.selection.apply(&discovered);
    if indices.is_empty() {
        return Err(CleanError::NoDocuments {
            path: config.raw_dir.clone(),
        });
    }
    debug!("Selected {} of {} discovered indices", indices.len(), discovered.len());

    tokio::fs::create_dir_all(&config.out_dir)
        .await
        .map_err(|e| CleanError::OutputWriteFailed {
            path: config.out_dir.clone(),
            source: e,
        })?;
    Ok(indices)
}

/// Process one index end to end and fire its progress events.
pub(crate) async fn run_document(
    config: &BatchConfig,
    archiver: &RemovalArchiver,
    index: String,
) -> Result<CleaningResult, DocumentError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(&index);
    }
    let outcome = process_document(config, archiver, index.clone()).await;
    match &outcome {
        Ok(result) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_complete(&index, result.markdown.len());
            }
        }
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_error(&index, &e.to_string());
            }
        }
    }
    outcome
}

async fn process_document(
    config: &BatchConfig,
    archiver: &RemovalArchiver,
    index: String,
) -> Result<CleaningResult, DocumentError> {
    let doc = input::load_document(&config.raw_dir, &index)
        .await
        .map_err(|e| DocumentError::LoadFailed {
            index: index.clone(),
            detail: e.to_string(),
        })?;

    let cleaning = config.cleaning;
    let result = tokio::task::spawn_blocking(move || clean_document(&doc, &cleaning))
        .await
        .map_err(|e| DocumentError::CleanFailed {
            index: index.clone(),
            detail: e.to_string(),
        })?;

    let write_failed = |e: String| DocumentError::WriteFailed {
        index: index.clone(),
        detail: e,
    };

    if let Some(ref span) = result.removed {
        archiver
            .archive(span)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
    }

    for (ext, contents) in [("md", &result.markdown), ("txt", &result.plaintext)] {
        let path = config.out_dir.join(format!("{index}.{ext}"));
        write_atomic(&path, contents)
            .await
            .map_err(|e| write_failed(format!("'{}': {}", path.display(), e)))?;
    }

    Ok(result)
}

/// Fold the stripper's spans into the single span stored on the result.
///
/// Spans are joined in the order they were removed, separated by a blank
/// line. The merged span keeps the reason of the first.
fn merge_spans(spans: Vec<RemovedSpan>) -> Option<RemovedSpan> {
    let mut iter = spans.into_iter();
    let mut merged = iter.next()?;
    for span in iter {
        if !merged.text.ends_with('\n') {
            merged.text.push('\n');
        }
        merged.text.push('\n');
        merged.text.push_str(&span.text);
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RemovalReason;
    use crate::pipeline::input::ContentKind;

    #[test]
    fn test_stages_respect_switches() {
        let raw = "Text $CO _ { 2 }$.\n\nFigure 1. cap\n\n## References\n\n[1] A.\n";
        let result = clean_markdown("1", raw, None, &CleaningConfig::none());
        assert_eq!(result.markdown, raw);
        assert!(result.removed.is_none());
        assert_eq!(result.stats, CleaningStats::default());
    }

    #[test]
    fn test_full_pipeline() {
        let raw = "# Paper\n\nWe made $CO _ { 2 }$.\n\n![](images/f.jpg)\n\nFigure 1. A plot.\n\n![](images/t.jpg)\n\n## References\n\n[1] A. Smith, 2019.\n";
        let manifest = vec![ContentListEntry {
            kind: ContentKind::Table,
            table_rows: Some(vec![vec!["a".into(), "b".into()]]),
            table_body: None,
            caption: Some("Table 1".into()),
            footnote: None,
            position_hint: Some("images/t.jpg".into()),
        }];
        let result = clean_markdown("7", raw, Some(manifest), &CleaningConfig::default());

        assert!(result.markdown.contains("$CO_{2}$"));
        assert!(!result.markdown.contains("Figure 1"));
        assert!(result.markdown.contains("<tr><td>a</td><td>b</td></tr>"));
        assert!(!result.markdown.contains("References"));
        assert!(result.markdown.ends_with("<!-- table:end -->\n"));

        let removed = result.removed.unwrap();
        assert_eq!(removed.reason, RemovalReason::TitleMatch);
        assert_eq!(removed.text, "## References\n\n[1] A. Smith, 2019.\n");

        assert_eq!(result.stats.images_removed, 1);
        assert_eq!(result.stats.captions_removed, 1);
        assert_eq!(result.stats.tables_reconstructed, 1);
        assert_eq!(result.stats.math_spans_normalized, 1);
        assert!(result.plaintext.contains("a\tb"));
        assert!(!result.plaintext.contains('#'));
    }

    #[test]
    fn test_clean_document_is_idempotent() {
        let raw = "# T\n\nx $a _ { 1 }$ y\n\n\n![](i.png)\n\nScheme 2. c\n\nend\n";
        let once = clean_markdown("1", raw, None, &CleaningConfig::default());
        let twice = clean_markdown("1", once.markdown.clone(), None, &CleaningConfig::default());
        assert_eq!(once.markdown, twice.markdown);
        assert_eq!(once.plaintext, twice.plaintext);
    }

    #[test]
    fn test_table_cell_math_is_stable() {
        let manifest = vec![ContentListEntry {
            kind: ContentKind::Table,
            table_rows: Some(vec![vec!["Gas".into(), "$CO _ { 2 }$".into()]]),
            table_body: None,
            caption: None,
            footnote: None,
            position_hint: Some("images/t.jpg".into()),
        }];
        let raw = "Intro.\n\n![](images/t.jpg)\n\nEnd.\n";
        let config = CleaningConfig::default();

        let once = clean_markdown("1", raw, Some(manifest.clone()), &config);
        assert!(once.markdown.contains("<td>$CO_{2}$</td>"));

        let twice = clean_markdown("1", once.markdown.clone(), Some(manifest), &config);
        assert_eq!(once.markdown, twice.markdown);
    }

    fn prose(count: usize) -> String {
        "The catalyst remained stable under the conditions studied here.\n\n".repeat(count)
    }

    fn reference_run(first: usize, count: usize) -> String {
        (first..first + count)
            .map(|n| format!("[{n}] A. Smith, B. Jones, J. Catal. 2019, 12, 345.\n"))
            .collect()
    }

    #[test]
    fn test_reference_blocks_removed_until_stable() {
        // A 6-line block near 45% and a 20-line block near 65%. The first
        // block sits before the midpoint until the second one is gone.
        let raw = format!(
            "{}{}\n{}{}\n{}",
            prose(22),
            reference_run(1, 6),
            prose(5),
            reference_run(7, 20),
            prose(9)
        );
        let config = CleaningConfig::default();
        let once = clean_markdown("1", raw, None, &config);

        assert_eq!(once.stats.reference_spans, 2);
        assert!(!once.markdown.contains("A. Smith"));
        let removed = once.removed.as_ref().unwrap();
        assert_eq!(removed.reason, RemovalReason::HeuristicBlock);
        assert_eq!(removed.text.matches("A. Smith").count(), 26);

        let twice = clean_markdown("1", once.markdown.clone(), None, &config);
        assert_eq!(once.markdown, twice.markdown);
        assert!(twice.removed.is_none());
    }

    #[test]
    fn test_merge_spans() {
        let span = |t: &str| RemovedSpan {
            index: "1".into(),
            text: t.into(),
            reason: RemovalReason::HeuristicBlock,
        };
        assert!(merge_spans(Vec::new()).is_none());
        let merged = merge_spans(vec![span("a\nb\n"), span("c\n")]).unwrap();
        assert_eq!(merged.text, "a\nb\n\nc\n");
    }
}
