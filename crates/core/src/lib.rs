mod assets;
mod provider;
#[cfg(test)]
mod test_utils;

pub mod completion;
pub mod config;
pub mod model;
pub mod usage;

pub use crate::assets::get_data_dir;
pub use crate::provider::llm::get_completion_client;
#[cfg(any(test, feature = "test-utils"))]
pub use crate::provider::test_provider::{ScriptedClient, ScriptedReply};
pub use crate::provider::xai::XaiClient;
