//! Line decoder for the `data: ...` event stream of chat completions.
use futures::stream::{Stream, StreamExt};

use crate::completion::RequestError;

#[derive(Debug, PartialEq, Eq)]
pub(super) enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into SSE data events. Ends after `data: [DONE]` or
/// when the body ends, whichever comes first.
pub(super) fn decode_sse<S, B>(
    bytes: S,
) -> impl Stream<Item = Result<SseEvent, RequestError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => buffer.extend_from_slice(chunk.as_ref()),
                Err(err) => {
                    yield Err(RequestError::from(err));
                    return;
                }
            }

            // Only split on complete lines so multi-byte characters survive
            // chunk boundaries.
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_line(&line) {
                    Ok(Some(SseEvent::Done)) => {
                        yield Ok(SseEvent::Done);
                        return;
                    }
                    Ok(Some(event)) => {
                        yield Ok(event);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            match parse_line(&buffer) {
                Ok(Some(event)) => {
                    yield Ok(event);
                }
                Ok(None) => {}
                Err(err) => {
                    yield Err(err);
                }
            }
        }
    }
}

fn parse_line(line: &[u8]) -> Result<Option<SseEvent>, RequestError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| RequestError::MalformedResponse(format!("invalid UTF-8 in stream: {e}")))?;
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(data) = line.strip_prefix("data:") else {
        // Blank separators, comments, `event:` and `id:` lines carry no text.
        return Ok(None);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }
    Ok(Some(SseEvent::Data(data.to_string())))
}
