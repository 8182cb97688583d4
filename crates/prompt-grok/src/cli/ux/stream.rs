use super::highlight::{highlight_line, line_highlighter, syntax_for};
use super::presenter::Role;
use super::render::{FENCE, fence_info};
use console::Style;
use syntect::easy::HighlightLines;

/// Incremental renderer for streamed fragments.
///
/// Prose is printed as soon as it arrives. A line that might still turn out
/// to be a fence is held until it is decided, and code lines are held until
/// complete so they can be highlighted for their block's language. Fence
/// lines themselves are printed dimmed.
pub struct StreamRenderer {
    role: Role,
    pending: String,
    emitted: usize,
    code: Option<HighlightLines<'static>>,
    line_start: bool,
}

impl StreamRenderer {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            pending: String::new(),
            emitted: 0,
            code: None,
            line_start: true,
        }
    }

    /// Accepts the next fragment and returns what can be printed now.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);

        let mut out = String::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let emitted = std::mem::take(&mut self.emitted);
            self.emit_line(&line, emitted, &mut out);
        }
        self.emit_partial(&mut out);
        out
    }

    /// Flushes whatever is still held back.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        if self.pending.len() > self.emitted {
            let line = std::mem::take(&mut self.pending);
            let emitted = std::mem::take(&mut self.emitted);
            self.emit_line(&line, emitted, &mut out);
            self.line_start = false;
        }
        self.pending.clear();
        self.emitted = 0;
        self.code = None;
        out
    }

    /// True when the printed output ends with a newline.
    pub fn at_line_start(&self) -> bool {
        self.line_start && self.emitted == 0
    }

    #[cfg(test)]
    fn in_code_block(&self) -> bool {
        self.code.is_some()
    }

    fn emit_line(&mut self, line: &str, emitted: usize, out: &mut String) {
        self.line_start = true;
        if emitted == 0 {
            if let Some(info) = fence_info(line) {
                self.code = match self.code.take() {
                    Some(_) => None,
                    None => Some(line_highlighter(syntax_for(
                        info.split_whitespace().next(),
                    ))),
                };
                out.push_str(&paint(line, &Style::new().dim()));
                return;
            }
            if let Some(highlighter) = self.code.as_mut() {
                out.push_str(&highlight_line(highlighter, line, &Style::new()));
                return;
            }
        }
        out.push_str(&paint(&line[emitted..], &self.role.style()));
    }

    fn emit_partial(&mut self, out: &mut String) {
        if self.code.is_some() || self.pending.len() == self.emitted {
            return;
        }
        if self.emitted == 0 && could_be_fence(&self.pending) {
            return;
        }
        out.push_str(&paint(&self.pending[self.emitted..], &self.role.style()));
        self.emitted = self.pending.len();
        self.line_start = false;
    }
}

fn could_be_fence(partial: &str) -> bool {
    let trimmed = partial.trim_start();
    trimmed.starts_with(FENCE) || FENCE.starts_with(trimmed)
}

fn paint(text: &str, style: &Style) -> String {
    let (body, newline) = match text.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (text, ""),
    };
    if body.is_empty() {
        newline.to_string()
    } else {
        format!("{}{newline}", style.apply_to(body))
    }
}
