use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use futures::future::BoxFuture;
use prompt_grok_core::completion::{
    BufferedResponse, CompletionClient, CompletionRequest, Prompt, RequestError,
};
use prompt_grok_core::model::{Model, ResponseMode};
use prompt_grok_core::usage::PricingTable;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::input::{InputEvent, InterruptSource, LineSource};
use crate::cli::ux::{
    ChatMessageType, GenerationSpinner, Role, StreamRenderer, format_usage_line, render_response,
    style_chat_text,
};

const SPINNER_MESSAGE: &str = "Waiting for response...";
const FAREWELL: &str = "Exiting chat.";

/// Where the session is in its read-submit-render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Submitting,
    Buffering,
    Streaming,
    Rendering,
    Exited,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: Model,
    pub mode: ResponseMode,
    pub max_tokens: u32,
    pub pricing: PricingTable,
    /// Printed for the `help` keyword.
    pub help_text: String,
    /// Draw the spinner while a buffered request is outstanding.
    pub show_progress: bool,
}

#[derive(Error, Debug)]
enum TurnError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An interactive chat session writing everything it shows to `out`.
pub struct Session<W: Write> {
    client: Arc<dyn CompletionClient>,
    settings: SessionSettings,
    out: W,
    state: SessionState,
}

impl<W: Write> Session<W> {
    pub fn new(client: Arc<dyn CompletionClient>, settings: SessionSettings, out: W) -> Self {
        Self {
            client,
            settings,
            out,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Reads prompts until the operator exits.
    ///
    /// Ctrl+C at the prompt ends the session; Ctrl+C while a request is in
    /// flight only cancels that request.
    pub async fn run<L, I>(&mut self, input: &mut L, interrupt: &mut I) -> Result<()>
    where
        L: LineSource,
        I: InterruptSource,
    {
        let mode = if self.settings.mode.is_streaming() {
            "streaming"
        } else {
            "buffered"
        };
        let welcome = format!(
            "Welcome to prompt-grok v{} ({}, {mode} mode). Type 'help' for usage, 'exit' or Ctrl+C to quit.",
            env!("CARGO_PKG_VERSION"),
            self.settings.model
        );
        writeln!(
            self.out,
            "{}",
            style_chat_text(&welcome, ChatMessageType::Notice)
        )?;

        let prompt = format!("\n{}", style_chat_text("> ", ChatMessageType::Prompt));
        loop {
            self.state = SessionState::AwaitingInput;
            let line = match input.read_line(&prompt)? {
                InputEvent::Line(line) => line,
                InputEvent::Interrupted | InputEvent::Eof => break,
            };

            self.state = SessionState::Submitting;
            if !self.handle_line(&line, interrupt).await? {
                break;
            }
            self.state = SessionState::Idle;
        }

        writeln!(
            self.out,
            "{}",
            style_chat_text(FAREWELL, ChatMessageType::Notice)
        )?;
        self.out.flush()?;
        self.state = SessionState::Exited;
        Ok(())
    }

    /// Handles one line of input. Returns `Ok(false)` when the session
    /// should end.
    async fn handle_line<I: InterruptSource>(
        &mut self,
        line: &str,
        interrupt: &mut I,
    ) -> Result<bool> {
        let Some(prompt) = Prompt::new(line) else {
            return Ok(true);
        };

        if prompt.as_str().eq_ignore_ascii_case("exit") {
            return Ok(false);
        }
        if prompt.as_str().eq_ignore_ascii_case("help") {
            writeln!(self.out, "{}", self.settings.help_text)?;
            return Ok(true);
        }

        let echo = format!(">>> You: {prompt}");
        writeln!(self.out, "{}", style_chat_text(&echo, ChatMessageType::User))?;
        self.out.flush()?;

        let request = CompletionRequest {
            model: self.settings.model,
            prompt,
            max_tokens: self.settings.max_tokens,
        };
        // One listener for the whole request, so a Ctrl+C that lands while a
        // fragment is being printed is still seen by the next poll.
        let mut interrupted = interrupt.interrupted();
        let outcome = if self.settings.mode.is_streaming() {
            self.submit_streaming(&request, &mut interrupted).await
        } else {
            self.submit_buffered(&request, &mut interrupted).await
        };
        drop(interrupted);

        match outcome {
            Ok(()) => {}
            Err(TurnError::Request(RequestError::Interrupted)) => {
                debug!("Request cancelled by operator");
                let notice = RequestError::Interrupted.to_string();
                writeln!(
                    self.out,
                    "\n{}",
                    style_chat_text(&notice, ChatMessageType::Notice)
                )?;
            }
            Err(TurnError::Request(e)) => {
                warn!("Request failed: {e}");
                let message = format!("Error: {e}");
                writeln!(
                    self.out,
                    "{}",
                    style_chat_text(&message, ChatMessageType::Error)
                )?;
            }
            Err(TurnError::Io(e)) => return Err(e.into()),
        }
        self.out.flush()?;
        Ok(true)
    }

    #[instrument(skip_all)]
    async fn submit_buffered(
        &mut self,
        request: &CompletionRequest,
        interrupted: &mut BoxFuture<'_, ()>,
    ) -> Result<(), TurnError> {
        self.state = SessionState::Buffering;
        let client = Arc::clone(&self.client);
        let spinner = GenerationSpinner::start(SPINNER_MESSAGE, self.settings.show_progress);

        let result = tokio::select! {
            _ = interrupted.as_mut() => Err(RequestError::Interrupted),
            result = client.send_buffered(request) => result,
        };
        spinner.stop().await;

        let response = result?;
        self.render_buffered(&response)
    }

    #[instrument(skip_all)]
    async fn submit_streaming(
        &mut self,
        request: &CompletionRequest,
        interrupted: &mut BoxFuture<'_, ()>,
    ) -> Result<(), TurnError> {
        self.state = SessionState::Streaming;
        let client = Arc::clone(&self.client);

        let mut stream = tokio::select! {
            _ = interrupted.as_mut() => return Err(RequestError::Interrupted.into()),
            result = client.send_streaming(request) => result?,
        };

        writeln!(
            self.out,
            "\n{}",
            style_chat_text(">>> Grok 3 (streaming):", ChatMessageType::Response)
        )?;

        let mut renderer = StreamRenderer::new(Role::Response);
        let mut fragments = 0usize;
        let outcome = loop {
            tokio::select! {
                _ = interrupted.as_mut() => break Err(RequestError::Interrupted),
                next = stream.next() => match next {
                    Some(Ok(fragment)) => {
                        fragments += 1;
                        write!(self.out, "{}", renderer.push(&fragment))?;
                        self.out.flush()?;
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                },
            }
        };
        // Drop the body before printing anything else.
        drop(stream);
        debug!(fragments, "Stream ended");

        self.state = SessionState::Rendering;
        write!(self.out, "{}", renderer.finish())?;
        if !renderer.at_line_start() {
            writeln!(self.out)?;
        }
        outcome.map_err(TurnError::from)
    }

    fn render_buffered(&mut self, response: &BufferedResponse) -> Result<(), TurnError> {
        self.state = SessionState::Rendering;

        if let Some(reasoning) = response
            .reasoning
            .as_deref()
            .filter(|r| !r.trim().is_empty())
        {
            writeln!(
                self.out,
                "\n{}",
                style_chat_text(">>> Reasoning:", ChatMessageType::Reasoning)
            )?;
            write!(self.out, "{}", render_response(reasoning, Role::Reasoning))?;
        }

        writeln!(
            self.out,
            "\n{}",
            style_chat_text(">>> Grok 3:", ChatMessageType::Response)
        )?;
        write!(self.out, "{}", render_response(&response.text, Role::Response))?;

        if let Some(usage) = &response.usage {
            match self
                .settings
                .pricing
                .estimate(usage, self.settings.model.as_str())
            {
                Ok(cost) => {
                    let footer = format_usage_line(usage, &cost);
                    writeln!(
                        self.out,
                        "\n{}",
                        style_chat_text(&footer, ChatMessageType::Footer)
                    )?;
                }
                Err(e) => warn!("Skipping cost line: {e}"),
            }
        }
        Ok(())
    }
}
