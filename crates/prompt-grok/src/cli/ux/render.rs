//! Formatting of complete model answers: fenced code blocks are highlighted
//! by language, surrounding prose is tidied and highlighted as markdown.

use super::highlight::{highlight_block, markdown_syntax, syntax_for};
use super::presenter::Role;
use console::Style;
use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) const FENCE: &str = "```";

static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+\n").expect("valid regex"));
static INNER_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s").expect("valid regex"));

/// A piece of a response: either free text or a fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Prose(String),
    Code { lang: Option<String>, code: String },
}

/// Returns the language tag when `line` opens or closes a fence.
pub(crate) fn fence_info(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix(FENCE).map(str::trim)
}

/// Splits a response into alternating prose and code segments.
///
/// A fence that is never closed runs to the end of the text. Blank prose
/// and empty code blocks are dropped.
pub fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut open: Option<Option<String>> = None;

    for line in text.split_inclusive('\n') {
        match (&open, fence_info(line)) {
            (None, Some(info)) => {
                push_prose(&mut segments, std::mem::take(&mut buf));
                let lang = info.split_whitespace().next().map(str::to_string);
                open = Some(lang);
            }
            (Some(_), Some(_)) => {
                if let Some(lang) = open.take() {
                    push_code(&mut segments, lang, std::mem::take(&mut buf));
                }
            }
            _ => buf.push_str(line),
        }
    }

    match open {
        Some(lang) => push_code(&mut segments, lang, buf),
        None => push_prose(&mut segments, buf),
    }
    segments
}

fn push_prose(segments: &mut Vec<Segment>, text: String) {
    if !text.trim().is_empty() {
        segments.push(Segment::Prose(text));
    }
}

fn push_code(segments: &mut Vec<Segment>, lang: Option<String>, code: String) {
    if !code.trim().is_empty() {
        segments.push(Segment::Code { lang, code });
    }
}

/// Tidies prose: runs of blank lines become one blank line and repeated
/// spaces inside a line collapse to one. List items keep their indentation.
pub fn clean_response(text: &str) -> String {
    let text = text.trim();
    let text = BLANK_RUNS.replace_all(text, "\n\n");
    text.split('\n')
        .map(|line| {
            let indent_len = if LIST_MARKER.is_match(line) {
                line.len() - line.trim_start().len()
            } else {
                0
            };
            let (indent, rest) = line.split_at(indent_len);
            format!("{indent}{}", INNER_SPACES.replace_all(rest.trim(), " "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Highlights a prose segment as markdown in the role's colour.
pub fn render_prose(text: &str, role: Role) -> String {
    let mut cleaned = clean_response(text);
    cleaned.push('\n');
    highlight_block(&cleaned, markdown_syntax(), &role.style())
}

/// Highlights a code block by its language tag and pads it with a blank line.
pub fn render_code(code: &str, lang: Option<&str>) -> String {
    let mut out = highlight_block(code, syntax_for(lang), &Style::new());
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Renders a complete answer for the terminal.
pub fn render_response(text: &str, role: Role) -> String {
    split_segments(text)
        .iter()
        .map(|segment| match segment {
            Segment::Prose(prose) => render_prose(prose, role),
            Segment::Code { lang, code } => render_code(code, lang.as_deref()),
        })
        .collect()
}
