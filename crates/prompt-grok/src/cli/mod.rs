//! prompt-grok cli definition and entrypoint.
pub mod chat;
pub mod ux;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use prompt_grok_core::config::{CONFIG_PATH_VAR, get_config};
use prompt_grok_core::model::{Model, ResponseMode};
use tracing::debug;

use crate::log::setup_logging;

const AFTER_HELP: &str = "\
Interactive commands:
  help    Show this help text
  exit    End the session (Ctrl+C or Ctrl+D at the prompt also exit)
  Ctrl+C  While a request is in flight, cancel it and return to the prompt

Configuration file (KEY=value lines, permissions must be 600):
  XAI_API_KEY                            API key (required)
  MAX_TOKENS                             Completion token limit [default: 1500]
  DEBUG_LOGGING                          Write debug logs when 'true' [default: false]
  XAI_BASE_URL                           API base URL [default: https://api.x.ai/v1]
  GROK_3_BETA_INPUT_PRICE_PER_1K         USD per 1K prompt tokens [default: 0.005]
  GROK_3_BETA_OUTPUT_PRICE_PER_1K        USD per 1K completion tokens [default: 0.015]
  GROK_3_MINI_BETA_INPUT_PRICE_PER_1K    USD per 1K prompt tokens [default: 0.002]
  GROK_3_MINI_BETA_OUTPUT_PRICE_PER_1K   USD per 1K completion tokens [default: 0.006]";

/// prompt-grok - chat with xAI's Grok models from the terminal.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_long_help = AFTER_HELP)]
struct Cli {
    /// Print the answer as it is generated instead of waiting for all of it.
    #[arg(long)]
    stream: bool,

    /// Model to chat with.
    #[arg(short, long, value_enum, default_value_t = ModelArg::Grok3Beta)]
    model: ModelArg,

    /// Configuration file [default: ~/.grok-prompt].
    #[arg(short, long, env = CONFIG_PATH_VAR)]
    config: Option<PathBuf>,

    /// Write debug logs to the data directory.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelArg {
    #[value(name = "grok-3-beta")]
    Grok3Beta,
    #[value(name = "grok-3-mini-beta")]
    Grok3MiniBeta,
}

impl From<ModelArg> for Model {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Grok3Beta => Model::Grok3Beta,
            ModelArg::Grok3MiniBeta => Model::Grok3MiniBeta,
        }
    }
}

/// The same text `--help` prints.
pub fn help_text() -> String {
    Cli::command().render_long_help().to_string()
}

/// Runs the main CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = get_config(cli.config.clone()).context("Failed to load configuration")?;

    if cli.verbose || config.debug_logging {
        setup_logging().context("Failed to set up logging")?;
    }
    debug!(path = %config.path.display(), "Configuration loaded");

    let model = Model::from(cli.model);
    config
        .pricing
        .rate(model.as_str())
        .context("No pricing configured for the selected model")?;

    chat::execute(
        &config,
        model,
        ResponseMode::from_stream_flag(cli.stream),
        help_text(),
    )
    .await
}
