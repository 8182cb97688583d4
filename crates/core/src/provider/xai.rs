use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::sse::{SseEvent, decode_sse};
use super::xai_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStreamResponse, RequestMessage,
};
use crate::completion::{
    BufferedResponse, CompletionClient, CompletionRequest, FragmentStream, RequestError,
};
use crate::config::{ApiKey, Config};
use crate::usage::UsageRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// Client for the xAI chat completions endpoint.
#[derive(Debug, Clone)]
pub struct XaiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: ApiKey,
}

impl XaiClient {
    pub fn new(config: &Config) -> Result<Self, RequestError> {
        Self::with_base_url(&config.base_url, config.api_key.clone())
    }

    pub fn with_base_url(base_url: &Url, api_key: ApiKey) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .build()?;
        let endpoint = format!(
            "{}/chat/completions",
            base_url.as_str().trim_end_matches('/')
        );
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    async fn post(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<Response, RequestError> {
        let payload = ChatCompletionRequest {
            model: request.model.as_str(),
            messages: vec![RequestMessage {
                role: "user",
                content: request.prompt.as_str(),
            }],
            max_tokens: request.max_tokens,
            stream,
        };
        debug!(
            "Payload={}",
            serde_json::to_string(&payload).unwrap_or_default()
        );

        let mut builder = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&payload);
        // Streams are bounded by the connect timeout only.
        if !stream {
            builder = builder.timeout(REQUEST_TIMEOUT);
        }

        let response = builder.send().await?;
        debug!("Response status={}", response.status());
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

async fn error_from_response(response: Response) -> RequestError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    debug!("HTTP error: status={status}, text={body}");

    let mut message = extract_error_message(&body);
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("error").to_string();
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RequestError::Auth {
            status: status.as_u16(),
            message,
        },
        _ => RequestError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pulls a human readable message out of an error body. Falls back to the raw
/// body for non-JSON replies. The result is always a single, bounded line.
fn extract_error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .or_else(|| value.get("message").and_then(Value::as_str))
            .map(str::to_string)
    });
    single_line(message.as_deref().unwrap_or(body))
}

fn single_line(text: &str) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= MAX_ERROR_MESSAGE_CHARS {
        return line;
    }
    let mut truncated: String = line.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[async_trait]
impl CompletionClient for XaiClient {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn send_buffered(
        &self,
        request: &CompletionRequest,
    ) -> Result<BufferedResponse, RequestError> {
        let response = self.post(request, false).await?;
        let body = response.text().await?;
        debug!("Response data={body}");

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| RequestError::MalformedResponse(e.to_string()))?;
        debug!(
            "Model used by API: {}",
            parsed.model.as_deref().unwrap_or("Not specified in response")
        );

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            RequestError::MalformedResponse("response contains no choices".to_string())
        })?;

        Ok(BufferedResponse {
            text: choice.message.content.unwrap_or_default(),
            reasoning: choice
                .message
                .reasoning_content
                .filter(|r| !r.trim().is_empty()),
            usage: parsed.usage.map(UsageRecord::from),
            model: parsed.model,
        })
    }

    #[instrument(skip_all, fields(model = %request.model))]
    async fn send_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, RequestError> {
        let response = self.post(request, true).await?;
        let events = decode_sse(response.bytes_stream());

        let fragments = async_stream::stream! {
            let mut events = Box::pin(events);
            while let Some(event) = events.next().await {
                match event {
                    Ok(SseEvent::Data(data)) => {
                        match serde_json::from_str::<ChatCompletionStreamResponse>(&data) {
                            Ok(chunk) => {
                                debug!("Stream chunk={data}");
                                let Some(choice) = chunk.choices.into_iter().next() else {
                                    continue;
                                };
                                if let Some(reason) = choice.finish_reason {
                                    debug!("Stream finished: {reason}");
                                }
                                match choice.delta.content {
                                    Some(text) if !text.is_empty() => {
                                        yield Ok(text);
                                    }
                                    _ => {}
                                }
                            }
                            Err(err) => {
                                yield Err(RequestError::MalformedResponse(format!(
                                    "stream chunk error={err} data={data}"
                                )));
                                return;
                            }
                        }
                    }
                    Ok(SseEvent::Done) => return,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            warn!("Stream body ended without [DONE]");
            yield Err(RequestError::MalformedResponse(
                "stream ended without [DONE]".to_string(),
            ));
        };

        Ok(Box::pin(fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Prompt;
    use crate::model::Model;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    const TEST_KEY: &str = "MOCK_XAI_API_KEY";

    fn client_for(server_url: &str) -> XaiClient {
        let base_url = Url::parse(server_url).unwrap();
        XaiClient::with_base_url(&base_url, ApiKey::new(TEST_KEY)).unwrap()
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: Model::Grok3Beta,
            prompt: Prompt::new(prompt).unwrap(),
            max_tokens: 1500,
        }
    }

    // Create a mock event stream body
    fn mock_event_stream_body(fragments: &[&str]) -> String {
        let mut events: Vec<Value> = fragments
            .iter()
            .map(|text| {
                json!({
                    "id": "chatcmpl-1",
                    "object": "chat.completion.chunk",
                    "model": "grok-3-beta",
                    "choices": [{
                        "delta": {"content": text},
                        "index": 0,
                        "finish_reason": Value::Null
                    }]
                })
            })
            .collect();
        events.push(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "model": "grok-3-beta",
            "choices": [{"delta": {}, "index": 0, "finish_reason": "stop"}]
        }));

        let mut mock_body = events
            .into_iter()
            .map(|event| format!("data: {}\n\n", serde_json::to_string(&event).unwrap()))
            .collect::<String>();
        mock_body.push_str("data: [DONE]\n\n");
        mock_body
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = client_for("https://api.x.ai/v1");
        assert_eq!(client.endpoint, "https://api.x.ai/v1/chat/completions");
        let client = client_for("http://localhost:8080/");
        assert_eq!(client.endpoint, "http://localhost:8080/chat/completions");
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad model"}}"#),
            "bad model"
        );
        assert_eq!(extract_error_message(r#"{"error":"Incorrect API key"}"#), "Incorrect API key");
        assert_eq!(extract_error_message("upstream failure\n"), "upstream failure");
        assert_eq!(
            extract_error_message("<html>\n  <body>Bad   Gateway</body>\n</html>\n"),
            "<html> <body>Bad Gateway</body> </html>"
        );

        let long = "x".repeat(500);
        let message = extract_error_message(&long);
        assert_eq!(message.chars().count(), MAX_ERROR_MESSAGE_CHARS + 3);
        assert!(message.ends_with("..."));
    }

    #[tokio::test]
    async fn test_html_error_page_is_reported_on_one_line() {
        let server = MockServer::start().await;
        let page = "<html>\n<head><title>502 Bad Gateway</title></head>\n<body>\n<center><h1>502 Bad Gateway</h1></center>\n</body>\n</html>\n";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string(page))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .send_buffered(&request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Api { status: 502, .. }));
        let line = format!("Error: {err}");
        assert_eq!(line.lines().count(), 1, "{line}");
        assert!(line.contains("502 Bad Gateway"));
    }

    #[tokio::test]
    async fn test_send_buffered_success() {
        let server = MockServer::start().await;
        let body = json!({
            "id": "resp-1",
            "model": "grok-3-beta",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello there",
                    "reasoning_content": "User greeted me."
                },
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 11, "completion_tokens": 1000, "total_tokens": 1011}
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", format!("Bearer {TEST_KEY}").as_str()))
            .and(body_partial_json(json!({
                "model": "grok-3-beta",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 1500,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let response = client.send_buffered(&request("hi")).await.unwrap();

        assert_eq!(response.text, "Hello there");
        assert_eq!(response.reasoning.as_deref(), Some("User greeted me."));
        assert_eq!(response.usage, Some(UsageRecord::new(11, 1000)));
        assert_eq!(response.model.as_deref(), Some("grok-3-beta"));
    }

    #[tokio::test]
    async fn test_send_buffered_without_usage() {
        let server = MockServer::start().await;
        let body = json!({"choices": [{"message": {"content": "ok", "reasoning_content": ""}}]});
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let response = client_for(&server.uri())
            .send_buffered(&request("hi"))
            .await
            .unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(response.reasoning, None);
        assert_eq!(response.usage, None);
    }

    #[tokio::test]
    async fn test_send_buffered_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "Incorrect API key provided"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .send_buffered(&request("hi"))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, RequestError::Auth { status: 401, message } if message == "Incorrect API key provided"),
            "{err}"
        );
        assert!(!err.to_string().contains(TEST_KEY));
    }

    #[tokio::test]
    async fn test_send_buffered_server_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"error": {"message": "model overloaded"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .send_buffered(&request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(&err, RequestError::Api { status: 500, message } if message == "model overloaded"));
    }

    #[tokio::test]
    async fn test_send_buffered_empty_error_body_uses_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .send_buffered(&request("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503 - Service Unavailable");
    }

    #[tokio::test]
    async fn test_send_buffered_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .send_buffered(&request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::MalformedResponse(_)));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        let err = client_for(&server.uri())
            .send_buffered(&request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::MalformedResponse(m) if m.contains("no choices")));
    }

    #[tokio::test]
    async fn test_send_buffered_transport_failure_is_network_error() {
        // Reserve a free port, then close it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = client_for(&format!("http://127.0.0.1:{port}/v1"))
            .send_buffered(&request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Network(_)), "{err}");
    }

    #[tokio::test]
    async fn test_send_streaming_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let mock_response = ResponseTemplate::new(200)
            .set_body_raw(
                mock_event_stream_body(&["Hello", " world", "!"]),
                "text/event-stream",
            )
            .insert_header("Connection", "close");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(mock_response)
            .expect(1)
            .mount(&server)
            .await;

        let stream = client_for(&server.uri())
            .send_streaming(&request("hi"))
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, vec!["Hello", " world", "!"]);
    }

    #[tokio::test]
    async fn test_send_streaming_can_stop_early() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                mock_event_stream_body(&["one", "two", "three"]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let mut stream = client.send_streaming(&request("hi")).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "one");
        drop(stream);

        // The same client can issue and finish another request afterwards.
        let fragments: Vec<String> = client
            .send_streaming(&request("again"))
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["one", "two", "three"]);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_send_streaming_without_done_marker_is_malformed() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"cut\"}}]}\n\n";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let results: Vec<_> = client_for(&server.uri())
            .send_streaming(&request("hi"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "cut");
        assert!(
            matches!(&results[1], Err(RequestError::MalformedResponse(m)) if m.contains("[DONE]"))
        );
    }

    #[tokio::test]
    async fn test_send_streaming_unauthorized_fails_before_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let result = client_for(&server.uri())
            .send_streaming(&request("hi"))
            .await;
        assert!(matches!(result, Err(RequestError::Auth { status: 403, .. })));
    }

    #[tokio::test]
    async fn test_send_streaming_malformed_chunk_ends_stream() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: {oops\n\n";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let results: Vec<_> = client_for(&server.uri())
            .send_streaming(&request("hi"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "ok");
        assert!(matches!(results[1], Err(RequestError::MalformedResponse(_))));
    }
}
