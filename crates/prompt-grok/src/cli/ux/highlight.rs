use console::Style;
use once_cell::sync::Lazy;
use syntect::{
    easy::HighlightLines,
    highlighting::{FontStyle, Style as SyntectStyle, Theme},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

pub(super) static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(two_face::syntax::extra_newlines);

static THEME: Lazy<Theme> = Lazy::new(|| {
    two_face::theme::extra()
        .get(two_face::theme::EmbeddedThemeName::Ansi)
        .clone()
});

/// Syntax for a fence language tag, plain text when the tag is missing or
/// unknown.
pub(super) fn syntax_for(lang: Option<&str>) -> &'static SyntaxReference {
    lang.and_then(|l| SYNTAX_SET.find_syntax_by_token(l))
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
}

pub(super) fn markdown_syntax() -> &'static SyntaxReference {
    SYNTAX_SET
        .find_syntax_by_extension("md")
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
}

pub(super) fn line_highlighter(syntax: &'static SyntaxReference) -> HighlightLines<'static> {
    HighlightLines::new(syntax, &THEME)
}

/// Highlights one line, falling back to `default` styling on parser errors.
pub(super) fn highlight_line(
    highlighter: &mut HighlightLines<'static>,
    line: &str,
    default: &Style,
) -> String {
    match highlighter.highlight_line(line, &SYNTAX_SET) {
        Ok(ranges) => to_ansi_terminal_escaped(&ranges, default),
        Err(_) => default.apply_to(line).to_string(),
    }
}

/// Highlights a whole block with a fresh highlighter.
pub(super) fn highlight_block(
    text: &str,
    syntax: &'static SyntaxReference,
    default: &Style,
) -> String {
    let mut highlighter = line_highlighter(syntax);
    LinesWithEndings::from(text)
        .map(|line| highlight_line(&mut highlighter, line, default))
        .collect()
}

/// Converts syntect's styled ranges to an ANSI-escaped string for terminals.
///
/// The ansi theme encodes a palette index in `r` when alpha is 0 and the
/// terminal default colour when alpha is 1; default-coloured text takes the
/// `default` style instead.
fn to_ansi_terminal_escaped(v: &[(SyntectStyle, &str)], default: &Style) -> String {
    let mut s = String::new();

    for &(ref hl_style, text) in v.iter() {
        // Keep line breaks outside escape sequences.
        let (body, newline) = match text.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (text, ""),
        };

        let mut style = if hl_style.foreground.a == 0 {
            match hl_style.foreground.r {
                0x00 => Style::new().black(),
                0x01 => Style::new().red(),
                0x02 => Style::new().green(),
                0x03 => Style::new().yellow(),
                0x04 => Style::new().blue(),
                0x05 => Style::new().magenta(),
                0x06 => Style::new().cyan(),
                0x07 => Style::new().white(),
                c => Style::new().color256(c),
            }
        } else {
            default.clone()
        };
        if hl_style.font_style.contains(FontStyle::BOLD) {
            style = style.bold();
        }
        if hl_style.font_style.contains(FontStyle::ITALIC) {
            style = style.italic();
        }
        if hl_style.font_style.contains(FontStyle::UNDERLINE) {
            style = style.underlined();
        }

        if !body.is_empty() {
            s.push_str(&style.apply_to(body).to_string());
        }
        s.push_str(newline);
    }

    s
}
