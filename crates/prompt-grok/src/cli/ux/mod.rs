mod highlight;
mod presenter;
mod progress;
mod render;
mod stream;

pub use presenter::{ChatMessageType, Role, format_usage_line, style_chat_text};
pub use progress::GenerationSpinner;
pub use render::render_response;
pub use stream::StreamRenderer;

use console::style;

/// Prints a formatted error message to stderr.
pub fn present_error(error: anyhow::Error) {
    let error_text = style("ERROR:").red().bold();
    eprintln!("\n{error_text} {error:#}");
}
