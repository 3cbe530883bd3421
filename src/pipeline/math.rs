//! Stage 2a: conservative math/chemistry normalisation.
//!
//! OCR engines emit LaTeX with tokenizer spacing baked in:
//! `\mathrm { C O } _ { 2 }` instead of `\mathrm{CO}_{2}`. The rules below
//! tighten that spacing and canonicalise a few aliases. They touch only the
//! inside of `$…$` and `$$…$$` spans. Everything outside is copied through
//! byte-for-byte, and an unbalanced delimiter leaves the rest of its span
//! untouched rather than guessing where the math ends.
//!
//! ## Rule Order
//!
//! (a) bold aliases, (b) brace spacing, (c) split sub/superscripts,
//! (d) degree units. Brace spacing must run before script merging so that
//! `_ { 2 }` is already `_ {2}` when the merge looks for `_ {`, and degree
//! normalisation runs last so it sees the tight `^{\circ}` form.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A piece of text split on math delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    /// Text outside math, including any unbalanced `$`.
    Text(&'a str),
    /// Math body without its delimiters.
    Math { display: bool, body: &'a str },
}

/// Result of [`normalize_math`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathOutcome {
    pub text: String,
    /// Spans whose body changed.
    pub spans_normalized: usize,
    /// Delimiters with no closing partner.
    pub malformed_spans: usize,
}

/// Normalise every math span in `text`.
pub fn normalize_math(text: &str) -> MathOutcome {
    let (segments, malformed_spans) = split_math(text);
    let mut out = String::with_capacity(text.len());
    let mut spans_normalized = 0usize;

    for segment in segments {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Math { display, body } => {
                let normalized = normalize_math_body(body);
                if normalized != body {
                    spans_normalized += 1;
                }
                let delim = if display { "$$" } else { "$" };
                out.push_str(delim);
                out.push_str(&normalized);
                out.push_str(delim);
            }
        }
    }

    MathOutcome {
        text: out,
        spans_normalized,
        malformed_spans,
    }
}

/// Split `text` into plain and math segments.
///
/// `$$…$$` may span lines; `$…$` must close on the same line. A backslash
/// escapes the next character, so `\$` is never a delimiter. Returns the
/// segments and the number of unbalanced delimiters found.
pub(crate) fn split_math(text: &str) -> (Vec<Segment<'_>>, usize) {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut malformed = 0usize;
    let mut plain_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'$') => {
                let body_start = i + 2;
                match find_closing(text, body_start, true) {
                    Some(end) => {
                        push_text(&mut segments, &text[plain_start..i]);
                        segments.push(Segment::Math {
                            display: true,
                            body: &text[body_start..end],
                        });
                        i = end + 2;
                        plain_start = i;
                    }
                    None => {
                        // Nothing after an unclosed `$$` can be trusted.
                        malformed += 1;
                        break;
                    }
                }
            }
            b'$' => {
                let body_start = i + 1;
                match find_closing(text, body_start, false) {
                    Some(end) if end > body_start => {
                        push_text(&mut segments, &text[plain_start..i]);
                        segments.push(Segment::Math {
                            display: false,
                            body: &text[body_start..end],
                        });
                        i = end + 1;
                        plain_start = i;
                    }
                    _ => {
                        malformed += 1;
                        i += 1;
                    }
                }
            }
            _ => i += 1,
        }
    }

    push_text(&mut segments, &text[plain_start..]);
    (segments, malformed)
}

fn push_text<'a>(segments: &mut Vec<Segment<'a>>, t: &'a str) {
    if !t.is_empty() {
        segments.push(Segment::Text(t));
    }
}

/// Byte offset of the closing delimiter, searching from `from`.
fn find_closing(text: &str, from: usize, display: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' if !display => return None,
            b'$' if display => {
                if bytes.get(j + 1) == Some(&b'$') {
                    return Some(j);
                }
                j += 1;
            }
            b'$' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

// ── Rule (a): bold aliases ───────────────────────────────────────────────────

/// `{\bf X}` → `\mathbf{X}`
static RE_BF_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s*\\bf\s+([^{}]*?)\s*\}").unwrap());

/// `\bf {` → `\mathbf{`
static RE_BF_CMD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\bf\s*\{").unwrap());

/// `\mathbf{12.5}` → `12.5`; bold digits carry no meaning in running text.
static RE_BOLD_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\mathbf\s*\{\s*([0-9][0-9.,\-\s]*?)\s*\}").unwrap());

fn rename_bold_aliases(body: &str) -> String {
    let s = RE_BF_GROUP.replace_all(body, r"\mathbf{$1}");
    let s = RE_BF_CMD.replace_all(&s, r"\mathbf{");
    RE_BOLD_NUMBER.replace_all(&s, "$1").into_owned()
}

// ── Rule (b): brace spacing ──────────────────────────────────────────────────

/// `\mathrm {` → `\mathrm{`
static RE_CMD_SPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(mathrm|mathbf|mathsf|mathit|mathcal|mathbb|boldsymbol|text|operatorname)\s+\{")
        .unwrap()
});

/// An innermost group with padding: `{ x }`.
static RE_PADDED_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s*([^{}]*?)\s*\}").unwrap());

/// Body of a font command that typesets formulas (`\mathrm{C O}`).
static RE_FORMULA_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\(?:mathrm|mathbf|mathsf)\{)([^{}]*)(\})").unwrap());

static RE_SPLIT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z0-9])\s+([A-Za-z0-9])").unwrap());

fn tighten_braces(body: &str) -> String {
    let s = RE_CMD_SPACE.replace_all(body, r"\$1{");
    let s = replace_unescaped_groups(&s);
    RE_FORMULA_GROUP
        .replace_all(&s, |caps: &Captures<'_>| {
            format!("{}{}{}", &caps[1], compact_formula(&caps[2]), &caps[3])
        })
        .into_owned()
}

/// Strip padding inside `{…}` unless the brace is an escaped literal (`\{`).
fn replace_unescaped_groups(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last = 0usize;
    for caps in RE_PADDED_GROUP.captures_iter(s) {
        let Some(m) = caps.get(0) else { continue };
        let inner = &caps[1];
        let escaped_open = s[..m.start()].ends_with('\\');
        let escaped_close = inner.ends_with('\\');
        out.push_str(&s[last..m.start()]);
        if escaped_open || escaped_close {
            out.push_str(m.as_str());
        } else {
            out.push('{');
            out.push_str(inner);
            out.push('}');
        }
        last = m.end();
    }
    out.push_str(&s[last..]);
    out
}

/// `C O` → `CO`, `H _ 2` → `H_2`. Repeated because matches share a character.
fn compact_formula(inner: &str) -> String {
    let mut s = inner.split_whitespace().collect::<Vec<_>>().join(" ");
    loop {
        let next = RE_SPLIT_TOKEN.replace_all(&s, "$1$2").into_owned();
        if next == s {
            break;
        }
        s = next;
    }
    s.replace(" _", "_").replace("_ ", "_").replace(" ^", "^").replace("^ ", "^")
}

// ── Rule (c): split sub/superscripts ────────────────────────────────────────

/// `CO _ {2}` → `CO_{2}`
static RE_SPLIT_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([_^])\s*\{").unwrap());

fn merge_scripts(body: &str) -> String {
    RE_SPLIT_SCRIPT.replace_all(body, "$1{").into_owned()
}

// ── Rule (d): degree units ───────────────────────────────────────────────────

/// `^{\circ} C`, `^\circ C`, `^{\circ}\mathrm{C}` → `^{\circ}\mathrm{C}`
static RE_DEGREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\^\s*(?:\{\s*\\circ\s*\}|\\circ)\s*(?:\\mathrm\{\s*([CFK])\s*\}|([CFK])\b)").unwrap()
});

/// `° C` → `^{\circ}\mathrm{C}`
static RE_DEGREE_SIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*°\s*(?:\\mathrm\{\s*([CFK])\s*\}|([CFK])\b)").unwrap());

fn normalize_degrees(body: &str) -> String {
    let s = RE_DEGREE.replace_all(body, r"^{\circ}\mathrm{$1$2}");
    RE_DEGREE_SIGN
        .replace_all(&s, r"^{\circ}\mathrm{$1$2}")
        .into_owned()
}

/// Apply rules (a)–(d) to one math body.
pub fn normalize_math_body(body: &str) -> String {
    let s = rename_bold_aliases(body);
    let s = tighten_braces(&s);
    let s = merge_scripts(&s);
    normalize_degrees(&s)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_script_collapses() {
        assert_eq!(normalize_math("$CO _ { 2 }$").text, "$CO_{2}$");
    }

    #[test]
    fn test_text_outside_math_untouched() {
        let input = "Keep  { this }  _ { as is } and $x ^ { 2 }$ then  { more }.";
        let out = normalize_math(input);
        assert_eq!(
            out.text,
            "Keep  { this }  _ { as is } and $x^{2}$ then  { more }."
        );
        assert_eq!(out.spans_normalized, 1);
    }

    #[test]
    fn test_bold_alias() {
        assert_eq!(normalize_math_body(r"\bf {v}"), r"\mathbf{v}");
        assert_eq!(normalize_math_body(r"{\bf F} = m a"), r"\mathbf{F} = m a");
        assert_eq!(normalize_math_body(r"\mathbf { 12 }"), "12");
    }

    #[test]
    fn test_formula_compaction() {
        assert_eq!(
            normalize_math_body(r"\mathrm { C O } _ { 2 }"),
            r"\mathrm{CO}_{2}"
        );
        assert_eq!(
            normalize_math_body(r"\mathrm { H } _ { 2 } \mathrm { O }"),
            r"\mathrm{H}_{2} \mathrm{O}"
        );
    }

    #[test]
    fn test_escaped_braces_preserved() {
        assert_eq!(normalize_math_body(r"\left\{ x \right\}"), r"\left\{ x \right\}");
    }

    #[test]
    fn test_degree_units() {
        assert_eq!(
            normalize_math_body(r"290 ^ { \circ } C"),
            r"290^{\circ}\mathrm{C}"
        );
        assert_eq!(normalize_math_body(r"25 ^\circ C"), r"25^{\circ}\mathrm{C}");
        assert_eq!(normalize_math_body("100 °C"), r"100^{\circ}\mathrm{C}");
        assert_eq!(
            normalize_math_body(r"5 ^ { \circ } \mathrm { C }"),
            r"5^{\circ}\mathrm{C}"
        );
    }

    #[test]
    fn test_degree_not_applied_to_words() {
        assert_eq!(normalize_math_body(r"x^{\circ} Cu"), r"x^{\circ} Cu");
    }

    #[test]
    fn test_display_math_multiline() {
        let input = "before\n$$\nE = m c ^ { 2 }\n$$\nafter";
        let out = normalize_math(input);
        assert_eq!(out.text, "before\n$$\nE = m c^{2}\n$$\nafter");
        assert_eq!(out.malformed_spans, 0);
    }

    #[test]
    fn test_unclosed_inline_is_skipped() {
        let input = "costs $5 today\nand $x _ { 1 }$ here";
        let out = normalize_math(input);
        assert_eq!(out.text, "costs $5 today\nand $x_{1}$ here");
        assert_eq!(out.malformed_spans, 1);
    }

    #[test]
    fn test_unclosed_display_leaves_rest() {
        let input = "$a _ { 1 }$ then $$ b _ { 2 } never closed";
        let out = normalize_math(input);
        assert_eq!(out.text, "$a_{1}$ then $$ b _ { 2 } never closed");
        assert_eq!(out.malformed_spans, 1);
    }

    #[test]
    fn test_escaped_dollar_is_not_delimiter() {
        let input = r"price \$ 5 and $y _ { 2 }$";
        assert_eq!(normalize_math(input).text, r"price \$ 5 and $y_{2}$");
    }

    #[test]
    fn test_math_normalization_is_idempotent() {
        let input = r"$\mathrm { C O } _ { 2 }$ at $290 ^ { \circ } C$ and $\bf { x }$";
        let once = normalize_math(input).text;
        let twice = normalize_math(&once);
        assert_eq!(once, twice.text);
        assert_eq!(twice.spans_normalized, 0);
    }

    #[test]
    fn test_split_math_segments() {
        let (segs, bad) = split_math("a $x$ b $$y$$");
        assert_eq!(bad, 0);
        assert_eq!(
            segs,
            vec![
                Segment::Text("a "),
                Segment::Math { display: false, body: "x" },
                Segment::Text(" b "),
                Segment::Math { display: true, body: "y" },
            ]
        );
    }
}
