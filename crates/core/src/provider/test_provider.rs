//! A scripted completion client for unit testing purposes.
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::completion::{
    BufferedResponse, CompletionClient, CompletionRequest, FragmentStream, RequestError,
};

/// One canned outcome for a call to [`ScriptedClient`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// A successful buffered response.
    Buffered(BufferedResponse),
    /// A stream that yields these fragments and ends.
    Fragments(Vec<String>),
    /// A stream that yields these fragments and then never ends.
    FragmentsThenHang(Vec<String>),
    /// The request never resolves.
    Hang,
    Network(String),
    Auth(String),
    Api(u16, String),
}

impl ScriptedReply {
    fn into_error(self) -> Option<RequestError> {
        match self {
            ScriptedReply::Network(m) => Some(RequestError::Network(m)),
            ScriptedReply::Auth(message) => Some(RequestError::Auth {
                status: 401,
                message,
            }),
            ScriptedReply::Api(status, message) => Some(RequestError::Api { status, message }),
            _ => None,
        }
    }
}

/// A `CompletionClient` that replays queued replies in order and records
/// every request it receives.
///
/// Buffered replies are also accepted by `send_streaming` (the text becomes a
/// single fragment) and fragment replies by `send_buffered` (the fragments
/// are joined, without usage), so one script works in both modes.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Number of requests sent so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request: &CompletionRequest) -> ScriptedReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| ScriptedReply::Api(500, "no scripted reply".to_string()))
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn send_buffered(
        &self,
        request: &CompletionRequest,
    ) -> Result<BufferedResponse, RequestError> {
        match self.next_reply(request) {
            ScriptedReply::Buffered(response) => Ok(response),
            ScriptedReply::Fragments(fragments) => Ok(BufferedResponse {
                text: fragments.concat(),
                ..Default::default()
            }),
            ScriptedReply::Hang | ScriptedReply::FragmentsThenHang(_) => {
                futures::future::pending().await
            }
            other => Err(other
                .into_error()
                .unwrap_or_else(|| RequestError::MalformedResponse("unexpected reply".into()))),
        }
    }

    async fn send_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, RequestError> {
        match self.next_reply(request) {
            ScriptedReply::Buffered(response) => {
                Ok(stream::iter(vec![Ok(response.text)]).boxed())
            }
            ScriptedReply::Fragments(fragments) => {
                Ok(stream::iter(fragments.into_iter().map(Ok)).boxed())
            }
            ScriptedReply::FragmentsThenHang(fragments) => Ok(stream::iter(
                fragments.into_iter().map(Ok),
            )
            .chain(stream::pending())
            .boxed()),
            ScriptedReply::Hang => futures::future::pending().await,
            other => Err(other
                .into_error()
                .unwrap_or_else(|| RequestError::MalformedResponse("unexpected reply".into()))),
        }
    }
}
