//! Stage 2d: bibliography detection and removal.
//!
//! ## Phase A: title match
//!
//! The first line whose normalised text equals a known bibliography title
//! (`References`, `## 6. Bibliography:`, `参考文献`, …) cuts the document:
//! that line and everything after it are removed.
//!
//! ## Phase B: heuristics
//!
//! Without a title, lines are scored against the reference-line grammar
//! below and the tail of the document is examined:
//!
//! 1. The first strong line in the final 40% is the candidate.
//! 2. If the candidate sits in the last 25% and at least half of the ten
//!    lines starting at it are strong, the document is cut at the candidate.
//! 3. Otherwise reference-dense blocks in the second half are removed in
//!    place, one span per block.
//! 4. Otherwise nothing is removed.
//!
//! Lines are split with their terminators, so for a truncation the kept text
//! followed by the removed text reproduces the input exactly.

use super::tables::protected_lines;
use crate::output::{RemovalReason, RemovedSpan};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Fraction of lines before the heuristic search window.
pub const TAIL_WINDOW_START: f64 = 0.6;
/// Fraction of lines before the region where whole-tail truncation may start.
pub const TRUNCATION_REGION_START: f64 = 0.75;
/// Lines examined from the candidate onward.
pub const LOOKAHEAD_LINES: usize = 10;
/// Strong lines required among [`LOOKAHEAD_LINES`].
pub const MIN_LOOKAHEAD_STRONG: usize = 5;
/// Fraction of lines before the region where block removal applies.
pub const BLOCK_REGION_START: f64 = 0.5;
/// Minimum non-blank lines in a removable block.
pub const MIN_BLOCK_LINES: usize = 5;
/// Minimum share of strong lines in a removable block.
pub const MIN_BLOCK_DENSITY: f64 = 0.6;
/// Score at which a line counts as a reference entry.
pub const STRONG_LINE_SCORE: u32 = 2;

/// Normalised headings that open a bibliography.
pub const BIBLIOGRAPHY_TITLES: &[&str] = &[
    "references",
    "references and notes",
    "notes and references",
    "cited references",
    "reference list",
    "bibliography",
    "works cited",
    "literature cited",
    "参考文献",
    "参考资料",
];

// ── Reference-line grammar ───────────────────────────────────────────────────

/// `[12]` or `[12a]` at the start of the line.
static RE_BRACKET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+]\s+)?\[\d{1,4}[a-z]?\]").unwrap());

static RE_DOI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b10\.\d{4,9}/\S+").unwrap());

/// `12.`, `12)` or `(12)` followed by whitespace at the start of the line.
static RE_ENUMERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+]\s+)?(?:\d{1,3}[.)]|\(\d{1,3}\))\s+").unwrap());

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}[a-z]?\b").unwrap());

static RE_JOURNAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\bPhys\.|\bChem\.|\bCatal\.|\bAngew\.|\bACS\s|\bAppl\.|\bCommun\.|\bJ\.\s|\bRev\.|\bSci\.|\bTechnol\.|\bSurf\.|\bLett\.|\bMater\.|\bNat\.|\bSoc\.|\bProc\.)",
    )
    .unwrap()
});

/// Volume/issue/page: `12, 345`, `7; 12-19`, `101, 1234–1240`.
static RE_VOLUME_PAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,4}\s*[,;]\s*\d{1,4}(?:[–\-]\d{1,4})?\b").unwrap());

static RE_ET_AL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bet\s+al\.").unwrap());

/// One scored signal of the reference-line grammar.
struct Signal {
    pattern: &'static Lazy<Regex>,
    weight: u32,
}

static SIGNALS: &[Signal] = &[
    Signal { pattern: &RE_BRACKET_MARKER, weight: 2 },
    Signal { pattern: &RE_DOI, weight: 2 },
    Signal { pattern: &RE_ENUMERATOR, weight: 1 },
    Signal { pattern: &RE_YEAR, weight: 1 },
    Signal { pattern: &RE_JOURNAL, weight: 1 },
    Signal { pattern: &RE_VOLUME_PAGES, weight: 1 },
    Signal { pattern: &RE_ET_AL, weight: 1 },
];

/// Sum of the weights of every signal present in `line`.
pub fn reference_line_score(line: &str) -> u32 {
    let s = line.trim();
    if s.is_empty() {
        return 0;
    }
    SIGNALS
        .iter()
        .filter(|sig| sig.pattern.is_match(s))
        .map(|sig| sig.weight)
        .sum()
}

/// Whether `line` looks like a bibliography entry.
pub fn is_strong_reference_line(line: &str) -> bool {
    reference_line_score(line) >= STRONG_LINE_SCORE
}

// ── Phase A: title match ─────────────────────────────────────────────────────

/// `6.`, `6.1`, `VI.` section numbering before a heading.
static RE_SECTION_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+(?:\.\d+)*\.?|[IVXLCDM]+\.)\s+").unwrap());

/// Reduce a heading line to comparable text: no heading or emphasis markup,
/// no section number, no trailing colon or period, lower case.
pub fn normalize_title(line: &str) -> String {
    let s = line.trim().trim_start_matches('#');
    let s: String = s.chars().filter(|c| !matches!(c, '*' | '_' | '`')).collect();
    let s = RE_SECTION_NUMBER.replace(s.trim(), "");
    let s = s.trim_end_matches([':', '：', '.', ' ', '\t']);
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_bibliography_title(line: &str) -> bool {
    let normalized = normalize_title(line);
    BIBLIOGRAPHY_TITLES.iter().any(|t| *t == normalized)
}

// ── Stripping ────────────────────────────────────────────────────────────────

/// Result of [`strip_references`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripOutcome {
    /// Text with the bibliography removed.
    pub text: String,
    /// Removed spans in document order; empty when nothing matched.
    pub removed: Vec<RemovedSpan>,
}

/// Detect and remove the bibliography of document `index`.
pub fn strip_references(index: &str, text: &str) -> StripOutcome {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let bare: Vec<&str> = lines
        .iter()
        .map(|l| l.trim_end_matches(['\n', '\r']))
        .collect();
    let protected = protected_lines(&bare);

    // Phase A
    if let Some(cut) = (0..bare.len()).find(|&i| !protected[i] && is_bibliography_title(bare[i])) {
        debug!("Index {}: bibliography title at line {}", index, cut);
        return truncate(index, &lines, cut, RemovalReason::TitleMatch);
    }

    // Phase B
    let strong: Vec<bool> = bare
        .iter()
        .zip(&protected)
        .map(|(line, &p)| !p && is_strong_reference_line(line))
        .collect();

    if let Some(cut) = find_truncation_point(&strong) {
        debug!("Index {}: dense reference tail from line {}", index, cut);
        return truncate(index, &lines, cut, RemovalReason::HeuristicWholeDoc);
    }

    let blocks = find_reference_blocks(&bare, &protected, &strong);
    if blocks.is_empty() {
        debug!("Index {}: no reference section found", index);
        return StripOutcome {
            text: text.to_string(),
            removed: Vec::new(),
        };
    }

    debug!("Index {}: removing {} reference blocks", index, blocks.len());
    let mut kept = String::with_capacity(text.len());
    let mut removed = Vec::with_capacity(blocks.len());
    let mut pos = 0usize;
    for (start, end) in blocks {
        kept.push_str(&lines[pos..start].concat());
        removed.push(RemovedSpan {
            index: index.to_string(),
            text: lines[start..end].concat(),
            reason: RemovalReason::HeuristicBlock,
        });
        pos = end;
    }
    kept.push_str(&lines[pos..].concat());

    StripOutcome {
        text: kept,
        removed,
    }
}

fn truncate(index: &str, lines: &[&str], cut: usize, reason: RemovalReason) -> StripOutcome {
    StripOutcome {
        text: lines[..cut].concat(),
        removed: vec![RemovedSpan {
            index: index.to_string(),
            text: lines[cut..].concat(),
            reason,
        }],
    }
}

fn fraction_of(n: usize, fraction: f64) -> usize {
    (n as f64 * fraction) as usize
}

/// Line at which the whole tail should be cut, if the tail is dense enough.
fn find_truncation_point(strong: &[bool]) -> Option<usize> {
    let n = strong.len();
    let window_start = fraction_of(n, TAIL_WINDOW_START);
    let candidate = (window_start..n).find(|&i| strong[i])?;
    if candidate < fraction_of(n, TRUNCATION_REGION_START) {
        return None;
    }
    let end = (candidate + LOOKAHEAD_LINES).min(n);
    let hits = strong[candidate..end].iter().filter(|&&s| s).count();
    (hits >= MIN_LOOKAHEAD_STRONG).then_some(candidate)
}

/// Half-open line ranges of reference-dense blocks in the second half.
///
/// A block is a run of non-blank lines. A blank gap joins two runs only when
/// the lines on both sides of it are strong, so a bibliography typeset with
/// blank lines between entries forms a single block while ordinary prose
/// paragraphs stay apart.
fn find_reference_blocks(bare: &[&str], protected: &[bool], strong: &[bool]) -> Vec<(usize, usize)> {
    let n = bare.len();
    let is_blank = |i: usize| bare[i].trim().is_empty();
    let mut blocks = Vec::new();

    let mut i = fraction_of(n, BLOCK_REGION_START);
    while i < n {
        if is_blank(i) || protected[i] {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        loop {
            while end < n && !is_blank(end) && !protected[end] {
                end += 1;
            }
            if end < n && is_blank(end) && strong[end - 1] {
                let mut next = end;
                while next < n && is_blank(next) {
                    next += 1;
                }
                if next < n && strong[next] {
                    end = next;
                    continue;
                }
            }
            break;
        }

        let non_blank = (start..end).filter(|&k| !is_blank(k)).count();
        let hits = (start..end).filter(|&k| strong[k]).count();
        if non_blank >= MIN_BLOCK_LINES && hits as f64 / non_blank as f64 >= MIN_BLOCK_DENSITY {
            blocks.push((start, end));
        }
        i = end;
    }
    blocks
}

// ── Tests ────────────────────────────────────────────────────────────────────
