//! Stage 1: basic cleanup of transcribed Markdown.
//!
//! The layout service emits an image reference for every figure crop it
//! found. Those images are not shipped with the corpus, so their references
//! are pure noise, except for table crops, which the table reconstructor
//! later swaps for real table markup.
//!
//! ## Rule Order
//!
//! Normalise line endings and strip invisible characters first so that the
//! image regex and blank-line detection see clean input, then drop image
//! references (which may leave lines empty), and only then normalise
//! whitespace.

use super::input::Document;
use crate::config::CleaningConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Result of the basic cleaner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicOutcome {
    pub text: String,
    pub images_removed: usize,
}

/// Apply every stage-1 rule to the raw text of `doc`.
///
/// Image references whose target belongs to a manifest table are kept when
/// table reconstruction is enabled; they are the placeholders it needs.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip NUL and invisible Unicode (zero-width space, BOM, soft hyphen, …)
/// 3. Remove non-table image references
/// 4. Trim trailing whitespace, collapse blank runs, trim leading/trailing blanks
pub fn basic_clean(doc: &Document, config: &CleaningConfig) -> BasicOutcome {
    let reserved = if config.enable_table_reconstruction {
        reserved_targets(doc)
    } else {
        HashSet::new()
    };

    let s = normalise_line_endings(&doc.raw_text);
    let s = remove_invisible_chars(&s);
    let (s, images_removed) = remove_images(&s, &reserved);
    BasicOutcome {
        text: normalize_whitespace(&s),
        images_removed,
    }
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove NUL and invisible Unicode characters ─────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{0000}', '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Remove non-table image references ───────────────────────────────

/// `![alt](target)` with an optional `"title"`. Group 1 is the alt text,
/// group 2 the target.
pub(crate) static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"!\[([^\]]*)\]\(\s*([^)\s]*)(?:\s+"[^"]*")?\s*\)"#).unwrap());

/// Last path component of an image target, used for lenient matching.
pub(crate) fn basename(target: &str) -> &str {
    target.rsplit(['/', '\\']).next().unwrap_or(target)
}

/// Targets (full and basename) of manifest table entries.
fn reserved_targets(doc: &Document) -> HashSet<String> {
    doc.tables()
        .filter_map(|t| t.position_hint.as_deref())
        .flat_map(|hint| [hint.to_string(), basename(hint).to_string()])
        .filter(|t| !t.is_empty())
        .collect()
}

fn remove_images(input: &str, reserved: &HashSet<String>) -> (String, usize) {
    let mut removed = 0usize;
    let out = RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let target = &caps[2];
            if reserved.contains(target) || reserved.contains(basename(target)) {
                caps[0].to_string()
            } else {
                removed += 1;
                String::new()
            }
        })
        .into_owned();
    (out, removed)
}

// ── Rule 4: Whitespace normalisation ────────────────────────────────────────

/// Trim trailing whitespace per line, collapse runs of blank lines to a single
/// blank line, drop leading and trailing blank lines, and end non-empty output
/// with exactly one newline.
///
/// Shared with later stages that delete lines and with the plaintext exporter.
pub fn normalize_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_blank = true;
    for line in input.lines() {
        let line = line.trim_end();
        let blank = line.is_empty();
        if blank && prev_blank {
            continue;
        }
        out.push_str(line);
        out.push('\n');
        prev_blank = blank;
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::{ContentKind, ContentListEntry};

    fn table_entry(hint: &str) -> ContentListEntry {
        ContentListEntry {
            kind: ContentKind::Table,
            table_rows: Some(vec![vec!["a".into()]]),
            table_body: None,
            caption: None,
            footnote: None,
            position_hint: Some(hint.into()),
        }
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar\u{0000}";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "\n\n  \nalpha   \n\n\n\nbeta\t\n\n\n";
        assert_eq!(normalize_whitespace(input), "alpha\n\nbeta\n");
    }

    #[test]
    fn test_normalize_whitespace_empty() {
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace("\n \n\t\n"), "");
    }

    #[test]
    fn test_normalize_whitespace_keeps_indentation() {
        assert_eq!(normalize_whitespace("  code\n"), "  code\n");
    }

    #[test]
    fn test_removes_plain_images() {
        let doc = Document::new(
            "1",
            "Intro\n\n![](images/fig1.jpg)\n\nText with ![inline](a.png) image.\n",
            None,
        );
        let out = basic_clean(&doc, &CleaningConfig::default());
        assert_eq!(out.images_removed, 2);
        assert_eq!(out.text, "Intro\n\nText with  image.\n");
    }

    #[test]
    fn test_keeps_table_placeholders() {
        let doc = Document::new(
            "1",
            "![](images/t1.jpg)\n\n![](images/f1.jpg)\n",
            Some(vec![table_entry("t1.jpg")]),
        );
        let out = basic_clean(&doc, &CleaningConfig::default());
        assert_eq!(out.images_removed, 1);
        assert_eq!(out.text, "![](images/t1.jpg)\n");
    }

    #[test]
    fn test_table_placeholders_dropped_when_reconstruction_off() {
        let doc = Document::new(
            "1",
            "![](images/t1.jpg)\nbody\n",
            Some(vec![table_entry("images/t1.jpg")]),
        );
        let config = CleaningConfig {
            enable_table_reconstruction: false,
            ..Default::default()
        };
        let out = basic_clean(&doc, &config);
        assert_eq!(out.images_removed, 1);
        assert_eq!(out.text, "body\n");
    }

    #[test]
    fn test_basic_clean_is_idempotent() {
        let doc = Document::new("1", "a  \r\n\r\n\r\n![x](y.png)b\n\n", None);
        let once = basic_clean(&doc, &CleaningConfig::default()).text;
        let twice = basic_clean(&Document::new("1", once.clone(), None), &CleaningConfig::default()).text;
        assert_eq!(once, twice);
        assert_eq!(once, "a\n\nb\n");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("images/abc.jpg"), "abc.jpg");
        assert_eq!(basename("abc.jpg"), "abc.jpg");
        assert_eq!(basename(r"dir\abc.jpg"), "abc.jpg");
    }
}
