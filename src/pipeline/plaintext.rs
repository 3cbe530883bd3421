//! Plaintext export of cleaned Markdown.
//!
//! Markup is dropped, content kept: headings lose their `#`, links and
//! images keep their text, emphasis markers disappear and reconstructed
//! tables become one tab-separated line per row. Math spans are copied as
//! they are, since `_` and `*` inside them are notation, not emphasis.

use super::basic::normalize_whitespace;
use super::math::{split_math, Segment};
use super::tables::{cell_text, protected_lines, TABLE_END_MARKER, TABLE_START_MARKER};
use once_cell::sync::Lazy;
use regex::Regex;

/// Render `markdown` as plain text.
pub fn to_plaintext(markdown: &str) -> String {
    let lines = strip_block_markup(markdown);
    let inline = strip_inline_markup(&lines.join("\n"));
    normalize_whitespace(&inline)
}

// ── Block-level markup ───────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}(?:\s+|$)").unwrap());

static RE_BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:>\s?)+").unwrap());

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)[-*+]\s+").unwrap());

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:```|~~~)").unwrap());

static RE_PIPE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(?:\|\s*:?-{3,}:?\s*)*\|?\s*$").unwrap());

static RE_TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*<tr\b").unwrap());

static RE_TABLE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]\s*>").unwrap());

static RE_TABLE_TAG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*</?(?:table|thead|tbody|tfoot)\b[^>]*>\s*$").unwrap());

fn strip_block_markup(markdown: &str) -> Vec<String> {
    let lines: Vec<&str> = markdown.lines().collect();
    let protected = protected_lines(&lines);
    let mut out = Vec::with_capacity(lines.len());

    for (line, in_table) in lines.iter().zip(protected) {
        if in_table {
            if let Some(flat) = flatten_table_line(line) {
                out.push(flat);
            }
            continue;
        }
        if RE_FENCE.is_match(line) || RE_PIPE_SEPARATOR.is_match(line) {
            continue;
        }
        if line.trim_start().starts_with('|') {
            out.push(flatten_pipe_row(line));
            continue;
        }

        let s = RE_HEADING.replace(line, "");
        let s = RE_BLOCKQUOTE.replace(&s, "");
        let s = RE_BULLET.replace(&s, "$1");
        out.push(s.into_owned());
    }
    out
}

/// One line of a reconstructed table region, or `None` for pure markup.
fn flatten_table_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.starts_with(TABLE_START_MARKER)
        || trimmed == TABLE_END_MARKER
        || RE_TABLE_TAG_LINE.is_match(trimmed)
    {
        return None;
    }
    if RE_TABLE_ROW.is_match(trimmed) {
        let cells: Vec<String> = RE_TABLE_CELL
            .captures_iter(trimmed)
            .map(|c| cell_text(&c[1]))
            .collect();
        return Some(cells.join("\t"));
    }
    Some(cell_text(trimmed))
}

fn flatten_pipe_row(line: &str) -> String {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner
        .split('|')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\t")
}

// ── Inline markup ────────────────────────────────────────────────────────────

/// `![alt](target)`, keeping `alt`.
static RE_IMAGE_INLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());

/// `[text](url)`, keeping `text`.
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());

static RE_HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").unwrap());

static RE_STRONG_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*|__|~~|`").unwrap());

static RE_EM_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*[^*\s])?)\*").unwrap());

static RE_EM_UNDERSCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^A-Za-z0-9_])_([^_\s](?:[^_\n]*[^_\s])?)_($|[^A-Za-z0-9_])").unwrap()
});

fn strip_inline_markup(text: &str) -> String {
    let (segments, _) = split_math(text);
    let mut out = String::with_capacity(text.len());
    for segment in segments {
        match segment {
            Segment::Text(t) => out.push_str(&strip_inline_text(t)),
            Segment::Math { display, body } => {
                let delim = if display { "$$" } else { "$" };
                out.push_str(delim);
                out.push_str(body);
                out.push_str(delim);
            }
        }
    }
    out
}

fn strip_inline_text(text: &str) -> String {
    let s = RE_IMAGE_INLINE.replace_all(text, "$1");
    let s = RE_LINK.replace_all(&s, "$1");
    let s = RE_HTML_TAG.replace_all(&s, "");
    let s = RE_STRONG_MARKERS.replace_all(&s, "");
    let s = RE_EM_STAR.replace_all(&s, "$1");
    RE_EM_UNDERSCORE.replace_all(&s, "$1$2$3").into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_and_emphasis() {
        let md = "# Title\n\n## **Bold** heading\n\nSome *italic* and __strong__ and `code`.\n";
        assert_eq!(
            to_plaintext(md),
            "Title\n\nBold heading\n\nSome italic and strong and code.\n"
        );
    }

    #[test]
    fn test_links_and_images_keep_text() {
        let md = "See [the site](https://example.org) and ![a chart](img.png).\n";
        assert_eq!(to_plaintext(md), "See the site and a chart.\n");
    }

    #[test]
    fn test_math_untouched() {
        let md = "Rate of $k_{1} * k_{2}$ with _emphasis_ here.\n";
        assert_eq!(
            to_plaintext(md),
            "Rate of $k_{1} * k_{2}$ with emphasis here.\n"
        );
    }

    #[test]
    fn test_snake_case_words_survive() {
        let md = "The file_name_here stays.\n";
        assert_eq!(to_plaintext(md), "The file_name_here stays.\n");
    }

    #[test]
    fn test_reconstructed_table_flattened() {
        let md = "Before\n\n<!-- table:start t.jpg -->\n<p><em>Table 1. a &lt; b</em></p>\n<table>\n<tr><td>A</td><td>B</td></tr>\n<tr><td>1</td><td>2</td></tr>\n</table>\n<!-- table:end -->\n\nAfter\n";
        assert_eq!(
            to_plaintext(md),
            "Before\n\nTable 1. a < b\nA\tB\n1\t2\n\nAfter\n"
        );
    }

    #[test]
    fn test_pipe_table_and_fences() {
        let md = "| a | b |\n|---|:---:|\n| 1 | 2 |\n\n```\nlet x = 1;\n```\n";
        assert_eq!(to_plaintext(md), "a\tb\n1\t2\n\nlet x = 1;\n");
    }

    #[test]
    fn test_lists_and_quotes() {
        let md = "> quoted line\n\n- item one\n* item two\n1. numbered\n";
        assert_eq!(
            to_plaintext(md),
            "quoted line\n\nitem one\nitem two\n1. numbered\n"
        );
    }

    #[test]
    fn test_no_control_syntax_left() {
        let md = "## Results\n\n**Key** [finding](x) with ~~old~~ *new* values.\n";
        let plain = to_plaintext(md);
        for marker in ["#", "**", "](", "~~", "*"] {
            assert!(!plain.contains(marker), "{marker} left in {plain:?}");
        }
    }
}
