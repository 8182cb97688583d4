use serde::{Deserialize, Serialize};
use std::fmt;

/// Grok models the client can talk to (serialized as the API model id).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Model {
    #[default]
    #[serde(rename = "grok-3-beta")]
    Grok3Beta,
    #[serde(rename = "grok-3-mini-beta")]
    Grok3MiniBeta,
}

impl Model {
    pub const ALL: [Model; 2] = [Model::Grok3Beta, Model::Grok3MiniBeta];

    pub fn as_str(&self) -> &'static str {
        match &self {
            Model::Grok3Beta => "grok-3-beta",
            Model::Grok3MiniBeta => "grok-3-mini-beta",
        }
    }
}

impl From<Model> for String {
    fn from(val: Model) -> Self {
        val.as_str().into()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How responses are delivered for a session. Picked once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Wait for the full JSON body, then render it with usage and cost.
    #[default]
    Buffered,
    /// Render text fragments as the server pushes them.
    Streaming,
}

impl ResponseMode {
    pub fn from_stream_flag(stream: bool) -> Self {
        if stream {
            ResponseMode::Streaming
        } else {
            ResponseMode::Buffered
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ResponseMode::Streaming)
    }
}
