//! Stage 2b: orphan caption removal.
//!
//! Figure images are dropped in stage 1, which leaves their captions
//! dangling in the running text. A caption starts with a keyword and a
//! number (`Figure 3.`, `Fig. S2`, `Scheme IV`, `图 1`) and runs to the next
//! blank line.

use super::basic::normalize_whitespace;
use super::tables::protected_lines;
use once_cell::sync::Lazy;
use regex::Regex;

/// Caption keyword followed by a numbering token.
///
/// Optional heading or emphasis markup may precede the keyword. The keyword
/// is case-insensitive; roman numerals must be upper case so that words like
/// `Chart comparing` are not read as `Chart C`. The supplementary `S` token
/// must be separated from the keyword, so `FIGURES 1` is not `Figure S1`.
static RE_CAPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:#+\s*|[*_]+\s*)?(?i:figure|fig\.?|scheme|schematic|graph|chart|图表|示意图|流程图|图)(?:\s*[.:：]?\s*(?:\d+[A-Za-z]?\b|[IVXLCDM]+\b)|(?:\s+|\s*[.:：]\s*)S\s*\d+[A-Za-z]?\b)",
    )
    .unwrap()
});

/// Result of [`remove_orphan_captions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionOutcome {
    pub text: String,
    pub removed: usize,
}

/// Whether `line` opens a figure/scheme caption.
pub fn is_caption_line(line: &str) -> bool {
    RE_CAPTION.is_match(line)
}

/// Delete each caption line through the next blank line, inclusive.
///
/// Lines inside reconstructed tables are left alone, and a caption block
/// never extends into one.
pub fn remove_orphan_captions(text: &str) -> CaptionOutcome {
    let lines: Vec<&str> = text.lines().collect();
    let protected = protected_lines(&lines);
    let mut kept = Vec::with_capacity(lines.len());
    let mut removed = 0usize;

    let mut i = 0usize;
    while i < lines.len() {
        if protected[i] || !is_caption_line(lines[i]) {
            kept.push(lines[i]);
            i += 1;
            continue;
        }

        removed += 1;
        let mut j = i;
        while j < lines.len() && !protected[j] && !lines[j].trim().is_empty() {
            j += 1;
        }
        if j < lines.len() && lines[j].trim().is_empty() {
            j += 1;
        }
        i = j;
    }

    CaptionOutcome {
        text: normalize_whitespace(&kept.join("\n")),
        removed,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_block_removed() {
        let input = "Para one.\n\nFigure 3. Yield over time\nfor catalyst A.\n\nPara two.\n";
        let out = remove_orphan_captions(input);
        assert_eq!(out.text, "Para one.\n\nPara two.\n");
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn test_caption_variants() {
        for line in [
            "Figure 1",
            "figure 12b: overview",
            "Fig. 2 shows",
            "FIG.3",
            "Fig. S4. Supplementary",
            "Figure S2",
            "Fig.S3 inset",
            "Scheme IV. Route",
            "Schematic 2",
            "Graph 1",
            "Chart 3:",
            "**Figure 5.** Bold caption",
            "## Fig. 6",
            "图 1 反应装置",
            "图表2",
            "示意图 3",
            "流程图1",
        ] {
            assert!(is_caption_line(line), "should match: {line}");
        }
    }

    #[test]
    fn test_caption_non_matches() {
        for line in [
            "Figures 1 and 2 show",
            "As shown in Figure 1, the yield",
            "Chart comparing methods",
            "Graphene oxide was used",
            "Figure",
            "Schemes of this kind",
            "FIGURES 1 AND 2 SHOW THE TREND",
            "SCHEMES 3-5 SUMMARISE",
        ] {
            assert!(!is_caption_line(line), "should not match: {line}");
        }
    }

    #[test]
    fn test_uppercase_plural_prose_is_kept() {
        let input = "Intro.\n\nFIGURES 1 AND 2 COMPARE\nTHE TWO ROUTES.\n\nEnd.\n";
        let out = remove_orphan_captions(input);
        assert_eq!(out.removed, 0);
        assert_eq!(out.text, input);
    }

    #[test]
    fn test_multiple_captions_left_to_right() {
        let input = "A\n\nFig. 1 first\n\nB\n\nScheme 2 second\nmore\n\nC\n";
        let out = remove_orphan_captions(input);
        assert_eq!(out.text, "A\n\nB\n\nC\n");
        assert_eq!(out.removed, 2);
    }

    #[test]
    fn test_caption_at_end_without_blank() {
        let out = remove_orphan_captions("Body\n\nFigure 9. Last");
        assert_eq!(out.text, "Body\n");
    }

    #[test]
    fn test_tables_are_protected() {
        let input = "<!-- table:start t.jpg -->\n<table>\n<tr><td>Figure 1</td></tr>\n</table>\n<!-- table:end -->\n";
        let out = remove_orphan_captions(input);
        assert_eq!(out.text, input);
        assert_eq!(out.removed, 0);
    }

    #[test]
    fn test_caption_stops_at_table() {
        let input = "Figure 2 caption\n<!-- table:start t.jpg -->\n<table>\n</table>\n<!-- table:end -->\n";
        let out = remove_orphan_captions(input);
        assert!(out.text.starts_with("<!-- table:start t.jpg -->"));
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn test_caption_removal_is_idempotent() {
        let input = "x\n\nFigure 1. a\n\ny\n";
        let once = remove_orphan_captions(input).text;
        assert_eq!(remove_orphan_captions(&once).text, once);
    }
}
