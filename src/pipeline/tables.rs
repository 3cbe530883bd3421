//! Stage 2c: table reconstruction.
//!
//! The layout service crops each table to an image and references it from
//! the Markdown like any figure. The manifest carries the recognised cell
//! text for that crop. Here every placeholder is swapped for an inline HTML
//! table fenced by comment markers:
//!
//! ```text
//! <!-- table:start images/abc.jpg -->
//! <p><em>Table 1. Yields</em></p>
//! <table>
//! <tr><td>Catalyst</td><td>Yield</td></tr>
//! </table>
//! <p><small>Reaction at 290 °C.</small></p>
//! <!-- table:end -->
//! ```
//!
//! The markers let later stages (and later runs) recognise a reconstructed
//! region: caption removal and reference detection never look inside one,
//! and a table already present is not reported as unresolved.
//!
//! Cell, caption and footnote text is inserted after the math stage has
//! run, so math spans in it are normalised here when that stage is enabled.

use super::basic::{basename, normalize_whitespace, RE_IMAGE};
use super::input::{ContentListEntry, Document};
use super::math::normalize_math;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

pub const TABLE_START_MARKER: &str = "<!-- table:start";
pub const TABLE_END_MARKER: &str = "<!-- table:end -->";

/// Result of [`reconstruct_tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    pub text: String,
    /// Placeholders replaced by a table.
    pub reconstructed: usize,
    /// Position hints that could not be resolved.
    pub unresolved: Vec<String>,
}

/// Replace each manifest table's placeholder with structured table markup.
///
/// An entry whose hint matches no placeholder is reported in
/// [`TableOutcome::unresolved`]. An entry with no rows is reported too, and
/// its placeholder dropped like any other figure. With `tidy_math`, math
/// spans inside inserted text are normalised.
pub fn reconstruct_tables(doc: &Document, text: &str, tidy_math: bool) -> TableOutcome {
    let mut current = text.to_string();
    let mut reconstructed = 0usize;
    let mut unresolved = Vec::new();

    for entry in doc.tables() {
        let Some(hint) = entry.position_hint.as_deref().filter(|h| !h.is_empty()) else {
            warn!("Index {}: table entry without position hint", doc.index);
            continue;
        };

        if already_reconstructed(&current, hint) {
            debug!("Index {}: table {} already present", doc.index, hint);
            continue;
        }

        let Some(range) = find_placeholder(&current, hint) else {
            warn!("Index {}: no placeholder for table {}", doc.index, hint);
            unresolved.push(hint.to_string());
            continue;
        };

        let Some(rows) = entry.rows() else {
            warn!("Index {}: table {} has no rows", doc.index, hint);
            current.replace_range(range, "");
            unresolved.push(hint.to_string());
            continue;
        };

        let block = render_table(hint, entry, &rows, tidy_math);
        current.replace_range(range, &format!("\n\n{block}\n\n"));
        reconstructed += 1;
    }

    if reconstructed > 0 {
        debug!("Index {}: reconstructed {} tables", doc.index, reconstructed);
    }

    TableOutcome {
        text: normalize_whitespace(&current),
        reconstructed,
        unresolved,
    }
}

/// Byte range of the first image reference pointing at `hint`.
fn find_placeholder(text: &str, hint: &str) -> Option<std::ops::Range<usize>> {
    let hint_base = basename(hint);
    RE_IMAGE
        .captures_iter(text)
        .find(|caps| {
            let target = &caps[2];
            target == hint || basename(target) == hint_base
        })
        .and_then(|caps| caps.get(0))
        .map(|m| m.range())
}

fn already_reconstructed(text: &str, hint: &str) -> bool {
    text.contains(&format!("{TABLE_START_MARKER} {hint} -->"))
}

/// Render one table. Row and column counts follow `rows` exactly.
pub fn render_table(
    hint: &str,
    entry: &ContentListEntry,
    rows: &[Vec<String>],
    tidy_math: bool,
) -> String {
    let escape = |text: &str| escape_cell(text, tidy_math);
    let mut out = format!("{TABLE_START_MARKER} {hint} -->\n");
    if let Some(caption) = entry.caption.as_deref() {
        out.push_str(&format!("<p><em>{}</em></p>\n", escape(caption)));
    }
    out.push_str("<table>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str("<td>");
            out.push_str(&escape(cell));
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    if let Some(footnote) = entry.footnote.as_deref() {
        out.push_str(&format!("<p><small>{}</small></p>\n", escape(footnote)));
    }
    out.push_str(TABLE_END_MARKER);
    out
}

fn escape_cell(text: &str, tidy_math: bool) -> String {
    let mut flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if tidy_math {
        flat = normalize_math(&flat).text;
    }
    html_escape::encode_text(&flat).into_owned()
}

// ── HTML table parsing ───────────────────────────────────────────────────────

static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());

static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]\s*>").unwrap());

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

/// Extract row-major cell text from an HTML `<table>`.
///
/// Nested markup inside cells is dropped and entities decoded. Spanning
/// attributes are ignored; each `<td>`/`<th>` is one cell.
pub fn rows_from_html(html: &str) -> Vec<Vec<String>> {
    RE_ROW
        .captures_iter(html)
        .map(|row| {
            RE_CELL
                .captures_iter(&row[1])
                .map(|cell| cell_text(&cell[1]))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Plain text of one cell's inner HTML.
pub(crate) fn cell_text(inner: &str) -> String {
    let stripped = RE_TAG.replace_all(inner, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Flags marking lines inside a reconstructed table, markers included.
///
/// An unterminated start marker protects nothing, so a stray comment cannot
/// shield the rest of a document from cleaning.
pub fn protected_lines(lines: &[&str]) -> Vec<bool> {
    let mut flags = vec![false; lines.len()];
    let mut i = 0usize;
    while i < lines.len() {
        if lines[i].trim_start().starts_with(TABLE_START_MARKER) {
            if let Some(offset) = lines[i..]
                .iter()
                .position(|l| l.trim() == TABLE_END_MARKER)
            {
                for flag in &mut flags[i..=i + offset] {
                    *flag = true;
                }
                i += offset + 1;
                continue;
            }
        }
        i += 1;
    }
    flags
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::ContentKind;

    fn table(hint: &str, rows: Vec<Vec<&str>>, caption: Option<&str>) -> ContentListEntry {
        ContentListEntry {
            kind: ContentKind::Table,
            table_rows: Some(
                rows.into_iter()
                    .map(|r| r.into_iter().map(String::from).collect())
                    .collect(),
            ),
            table_body: None,
            caption: caption.map(String::from),
            footnote: None,
            position_hint: Some(hint.into()),
        }
    }

    #[test]
    fn test_three_by_two_with_caption() {
        let entry = table(
            "images/t1.jpg",
            vec![vec!["A", "B"], vec!["1", "2"], vec!["3", "4"]],
            Some("Table 1. Results"),
        );
        let doc = Document::new("1", "", Some(vec![entry]));
        let text = "Intro\n\n![](images/t1.jpg)\n\nAfter\n";
        let out = reconstruct_tables(&doc, text, true);

        assert_eq!(out.reconstructed, 1);
        assert!(out.unresolved.is_empty());
        assert_eq!(out.text.matches("<tr>").count(), 3);
        for line in out.text.lines().filter(|l| l.starts_with("<tr>")) {
            assert_eq!(line.matches("<td>").count(), 2);
        }

        let lines: Vec<&str> = out.text.lines().collect();
        let cap = lines
            .iter()
            .position(|l| l.contains("Table 1. Results"))
            .unwrap();
        assert_eq!(lines[cap + 1], "<table>");
        assert!(!out.text.contains("!["));
    }

    #[test]
    fn test_basename_matching() {
        let entry = table("abc.jpg", vec![vec!["x"]], None);
        let doc = Document::new("1", "", Some(vec![entry]));
        let out = reconstruct_tables(&doc, "![](images/abc.jpg)\n", true);
        assert_eq!(out.reconstructed, 1);
        assert!(out.text.starts_with("<!-- table:start abc.jpg -->\n<table>\n"));
        assert!(out.text.ends_with("<!-- table:end -->\n"));
    }

    #[test]
    fn test_unmatched_is_reported() {
        let entry = table("images/missing.jpg", vec![vec!["x"]], None);
        let doc = Document::new("1", "", Some(vec![entry]));
        let out = reconstruct_tables(&doc, "Body\n", true);
        assert_eq!(out.reconstructed, 0);
        assert_eq!(out.unresolved, vec!["images/missing.jpg"]);
        assert_eq!(out.text, "Body\n");
    }

    #[test]
    fn test_reconstruction_is_idempotent() {
        let entry = table("images/t1.jpg", vec![vec!["a", "b"]], Some("Table 1"));
        let doc = Document::new("1", "", Some(vec![entry]));
        let once = reconstruct_tables(&doc, "x\n\n![](images/t1.jpg)\n", true);
        let twice = reconstruct_tables(&doc, &once.text, true);
        assert_eq!(once.text, twice.text);
        assert_eq!(twice.reconstructed, 0);
        assert!(twice.unresolved.is_empty());
    }

    #[test]
    fn test_cells_are_escaped() {
        let entry = table("t.jpg", vec![vec!["a < b", "x\ny"]], None);
        let doc = Document::new("1", "", Some(vec![entry]));
        let out = reconstruct_tables(&doc, "![](t.jpg)\n", true);
        assert!(out.text.contains("<tr><td>a &lt; b</td><td>x y</td></tr>"));
    }

    #[test]
    fn test_math_in_cells_is_normalized() {
        let mut entry = table(
            "t.jpg",
            vec![vec!["$CO _ { 2 }$", "x"]],
            Some("Table 2. $H _ { 2 }$ uptake"),
        );
        entry.footnote = Some("at $25 ^ { \\circ } C$".into());
        let doc = Document::new("1", "", Some(vec![entry]));

        let out = reconstruct_tables(&doc, "![](t.jpg)\n", true);
        assert!(out.text.contains("<td>$CO_{2}$</td>"));
        assert!(out.text.contains("<em>Table 2. $H_{2}$ uptake</em>"));
        assert!(!out.text.contains("^ {"));

        let raw = reconstruct_tables(&doc, "![](t.jpg)\n", false);
        assert!(raw.text.contains("<td>$CO _ { 2 }$</td>"));
    }

    #[test]
    fn test_rows_from_html() {
        let html = "<table><tr><th>Name</th><th>Value</th></tr>\
                    <tr><td><b>CO</b><sub>2</sub></td><td>1 &amp; 2</td></tr></table>";
        let rows = rows_from_html(html);
        assert_eq!(
            rows,
            vec![vec!["Name", "Value"], vec!["CO 2", "1 & 2"]]
        );
    }

    #[test]
    fn test_protected_lines() {
        let lines = vec![
            "a",
            "<!-- table:start t.jpg -->",
            "<table>",
            "</table>",
            "<!-- table:end -->",
            "b",
            "<!-- table:start dangling -->",
            "c",
        ];
        assert_eq!(
            protected_lines(&lines),
            vec![false, true, true, true, true, false, false, false]
        );
    }
}
