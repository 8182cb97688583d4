use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// A spinner shown while a buffered response is outstanding.
///
/// Frames are emitted by a separate task on a fixed cadence; `stop` cancels
/// that task through a token, waits for it and clears the line.
#[derive(Debug)]
pub struct GenerationSpinner {
    spinner: ProgressBar,
    stop: CancellationToken,
    ticker: Option<JoinHandle<()>>,
}

impl GenerationSpinner {
    /// Starts a spinner with a message. A hidden spinner still runs its
    /// ticker task but draws nothing. Must be called inside a tokio runtime.
    pub fn start(msg: &str, visible: bool) -> Self {
        let spinner = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.yellow} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        spinner.set_message(msg.to_string());

        let stop = CancellationToken::new();
        let ticker = tokio::spawn(tick(spinner.clone(), stop.clone()));

        Self {
            spinner,
            stop,
            ticker: Some(ticker),
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the ticker task and clears the spinner from the terminal.
    pub async fn stop(mut self) {
        self.stop.cancel();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
        self.spinner.finish_and_clear();
    }
}

impl Drop for GenerationSpinner {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn tick(spinner: ProgressBar, stop: CancellationToken) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => spinner.tick(),
        }
    }
}
