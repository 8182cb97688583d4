use std::io::stdout;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::Term;
use prompt_grok_core::config::Config;
use prompt_grok_core::get_completion_client;
use prompt_grok_core::model::{Model, ResponseMode};

mod input;
mod session;
mod test_utils;

pub use input::{CtrlC, EditorInput, InputEvent, InterruptSource, LineSource};
pub use session::{Session, SessionSettings, SessionState};

/// Starts an interactive session on the terminal and runs it to completion.
pub async fn execute(
    config: &Config,
    model: Model,
    mode: ResponseMode,
    help_text: String,
) -> Result<()> {
    let client = get_completion_client(config).context("Failed to create the API client")?;
    let settings = SessionSettings {
        model,
        mode,
        max_tokens: config.max_tokens,
        pricing: config.pricing.clone(),
        help_text,
        show_progress: Term::stderr().is_term(),
    };

    let mut input = EditorInput::new().context("Failed to initialize the line editor")?;
    let mut session = Session::new(Arc::from(client), settings, stdout());
    session.run(&mut input, &mut CtrlC).await
}
