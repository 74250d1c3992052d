//! Post-processing: deterministic cleanup of extracted page text and of
//! LLM answers.
//!
//! pdfium hands back text with Windows line endings, soft hyphens and long
//! runs of layout spaces; models occasionally wrap a plain answer in a code
//! fence. Each rule below is a small pure `&str → String` function so it can
//! be tested in isolation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw LLM answer for display.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence wrapping the whole answer
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to one
/// 6. Trim the whole answer
pub fn clean_answer(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Clean text extracted from one PDF page before it is chunked.
///
/// Line endings are normalised, invisible characters removed and runs of
/// horizontal whitespace squeezed to a single space.
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = RE_HORIZONTAL_SPACE.replace_all(&s, " ");
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Page text: squeeze horizontal whitespace ─────────────────────────────────

static RE_HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{3000}]{2,}").unwrap());
