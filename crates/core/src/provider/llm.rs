use crate::completion::{CompletionClient, RequestError};
use crate::config::Config;
use crate::provider::xai::XaiClient;
use tracing::instrument;

/// Builds the completion client for a loaded configuration.
#[instrument(skip(config))]
pub fn get_completion_client(config: &Config) -> Result<Box<dyn CompletionClient>, RequestError> {
    let client = XaiClient::new(config)?;
    Ok(Box::new(client))
}
