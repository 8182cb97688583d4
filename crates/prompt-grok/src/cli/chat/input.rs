use anyhow::Result;
use async_trait::async_trait;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor, Helper, Highlighter, Validator};
use tracing::warn;

/// Words the session treats as commands rather than prompts.
pub const KEYWORDS: [&str; 2] = ["help", "exit"];

/// One read from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// Ctrl+D or closed input.
    Eof,
}

pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;
}

/// Resolves when the operator asks to cancel the request in flight.
#[async_trait]
pub trait InterruptSource: Send {
    async fn interrupted(&mut self);
}

/// Interrupts delivered as SIGINT to the process.
pub struct CtrlC;

#[async_trait]
impl InterruptSource for CtrlC {
    async fn interrupted(&mut self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl+C: {e}");
            futures::future::pending::<()>().await;
        }
    }
}

#[derive(Helper, Validator, Highlighter)]
struct KeywordHelper;

impl Completer for KeywordHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let prefix = &line[..pos];
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            return Ok((0, Vec::new()));
        }
        let candidates = KEYWORDS
            .iter()
            .filter(|k| k.starts_with(prefix))
            .map(|k| Pair {
                display: k.to_string(),
                replacement: k.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for KeywordHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        KEYWORDS
            .iter()
            .find(|k| k.starts_with(line) && k.len() > line.len())
            .map(|k| k[line.len()..].to_string())
    }
}

/// Line editor reading from the terminal, with history and keyword hints.
pub struct EditorInput {
    editor: Editor<KeywordHelper, DefaultHistory>,
}

impl EditorInput {
    pub fn new() -> Result<Self> {
        let config = rustyline::Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(KeywordHelper));
        Ok(Self { editor })
    }
}

impl LineSource for EditorInput {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(InputEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
            Err(err) => Err(err.into()),
        }
    }
}
