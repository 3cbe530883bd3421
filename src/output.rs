//! Result types produced by the cleaning pipeline.
//!
//! Everything here is `Serialize + Deserialize` so the CLI can emit it as
//! JSON (`--json`, `--report`) and callers can persist or diff runs.

use crate::error::{CleanError, DocumentError};
use serde::{Deserialize, Serialize};

/// Why the reference stripper removed a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalReason {
    /// A bibliography heading was found; everything from it onward was cut.
    TitleMatch,
    /// No heading, but a dense run of reference lines at the end of the
    /// document triggered whole-tail truncation.
    HeuristicWholeDoc,
    /// A reference-dense block in the second half was removed in place.
    HeuristicBlock,
}

/// Text deleted by the reference stripper, kept for audit and replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedSpan {
    /// Corpus index of the owning document.
    pub index: String,
    /// The removed lines, verbatim, with their line terminators.
    pub text: String,
    /// Which detection rule fired.
    pub reason: RemovalReason,
}

/// Counters describing what the stages did to one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    /// Non-table image references dropped by the basic cleaner.
    pub images_removed: usize,
    /// Math spans whose text changed under normalisation.
    pub math_spans_normalized: usize,
    /// Unbalanced `$`/`$$` delimiters left untouched.
    pub malformed_math_spans: usize,
    /// Orphan caption blocks deleted.
    pub captions_removed: usize,
    /// Table placeholders replaced by a structured table.
    pub tables_reconstructed: usize,
    /// Position hints of manifest tables with no placeholder in the text.
    pub unresolved_tables: Vec<String>,
    /// Number of separate spans the reference stripper removed.
    pub reference_spans: usize,
}

/// The terminal artifact for one document.
///
/// Only ever constructed once every stage has run; a document whose
/// processing aborted produces a [`DocumentError`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningResult {
    /// Corpus index shared with the upstream download/transcription step.
    pub index: String,
    /// Fully cleaned Markdown.
    pub markdown: String,
    /// Markup-free rendering of `markdown`.
    pub plaintext: String,
    /// Everything the reference stripper removed, if anything. Several
    /// heuristic blocks are concatenated in document order.
    pub removed: Option<RemovedSpan>,
    /// Per-stage counters.
    pub stats: CleaningStats,
}

/// Aggregate counters for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Indices selected for this run.
    pub total_documents: usize,
    /// Documents that produced a [`CleaningResult`].
    pub cleaned_documents: usize,
    /// Documents that failed with a [`DocumentError`].
    pub failed_documents: usize,
    /// Documents truncated at a bibliography heading.
    pub title_matches: usize,
    /// Documents truncated by the tail-density heuristic.
    pub heuristic_truncations: usize,
    /// Documents with reference blocks removed in place.
    pub heuristic_blocks: usize,
    /// Documents left with no reference removal.
    pub untouched_references: usize,
    /// Sum of images removed across documents.
    pub images_removed: usize,
    /// Sum of caption blocks removed across documents.
    pub captions_removed: usize,
    /// Sum of tables reconstructed across documents.
    pub tables_reconstructed: usize,
    /// Sum of unresolved table placeholders across documents.
    pub unresolved_tables: usize,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
}

impl BatchStats {
    /// Tally per-document results. Duration is filled in by the caller.
    pub fn from_results(
        total: usize,
        results: &[CleaningResult],
        failures: &[DocumentError],
    ) -> Self {
        let mut stats = BatchStats {
            total_documents: total,
            cleaned_documents: results.len(),
            failed_documents: failures.len(),
            ..Default::default()
        };
        for r in results {
            match r.removed.as_ref().map(|s| s.reason) {
                Some(RemovalReason::TitleMatch) => stats.title_matches += 1,
                Some(RemovalReason::HeuristicWholeDoc) => stats.heuristic_truncations += 1,
                Some(RemovalReason::HeuristicBlock) => stats.heuristic_blocks += 1,
                None => stats.untouched_references += 1,
            }
            stats.images_removed += r.stats.images_removed;
            stats.captions_removed += r.stats.captions_removed;
            stats.tables_reconstructed += r.stats.tables_reconstructed;
            stats.unresolved_tables += r.stats.unresolved_tables.len();
        }
        stats
    }
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Successful documents, sorted by index.
    pub results: Vec<CleaningResult>,
    /// Failed documents, sorted by index.
    pub failures: Vec<DocumentError>,
    /// Aggregate counters.
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Treat any document failure as an error.
    pub fn into_result(self) -> Result<Self, CleanError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(CleanError::PartialFailure {
                success: self.results.len(),
                failed: self.failures.len(),
                total: self.results.len() + self.failures.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: &str, reason: Option<RemovalReason>) -> CleaningResult {
        CleaningResult {
            index: index.into(),
            markdown: "body\n".into(),
            plaintext: "body\n".into(),
            removed: reason.map(|reason| RemovedSpan {
                index: index.into(),
                text: "[1] ref\n".into(),
                reason,
            }),
            stats: CleaningStats {
                images_removed: 2,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_stats_tally_reasons() {
        let results = vec![
            result("1", Some(RemovalReason::TitleMatch)),
            result("2", Some(RemovalReason::HeuristicBlock)),
            result("3", None),
        ];
        let failures = vec![DocumentError::LoadFailed {
            index: "4".into(),
            detail: "missing".into(),
        }];
        let stats = BatchStats::from_results(4, &results, &failures);
        assert_eq!(stats.cleaned_documents, 3);
        assert_eq!(stats.failed_documents, 1);
        assert_eq!(stats.title_matches, 1);
        assert_eq!(stats.heuristic_blocks, 1);
        assert_eq!(stats.untouched_references, 1);
        assert_eq!(stats.images_removed, 6);
    }

    #[test]
    fn test_into_result_partial_failure() {
        let output = BatchOutput {
            results: vec![result("1", None)],
            failures: vec![DocumentError::CleanFailed {
                index: "2".into(),
                detail: "aborted".into(),
            }],
            stats: BatchStats::default(),
        };
        let err = output.into_result().unwrap_err();
        assert!(err.to_string().contains("1/2"));
    }

    #[test]
    fn test_result_json_shape() {
        let r = result("10019", Some(RemovalReason::HeuristicWholeDoc));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["removed"]["reason"], "HeuristicWholeDoc");
        assert_eq!(json["index"], "10019");
    }
}
