//! SSE parsing for the Anthropic Messages API stream.
//!
//! Maps the wire events to [`ModelEvent`]s: text deltas stream through,
//! usage is reported from both `message_start` (input + cache counters)
//! and `message_delta` (output), and provider `error` events surface as
//! stream faults with retryability.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages-streaming>

use agora_types::{ModelEvent, ModelStream, StreamFault, TokenUsage};
use futures::{Stream, StreamExt};
use reqwest::Response;

/// Wrap an HTTP response body into a [`ModelStream`].
pub(crate) fn stream_generation(response: Response) -> ModelStream {
    ModelStream::new(parse_sse_stream(response.bytes_stream()))
}

/// Parse a raw byte stream into [`ModelEvent`]s.
///
/// Generic over the transport error so tests can drive it with scripted
/// chunks. Lines are split at the byte level before UTF-8 decoding —
/// chunk boundaries fall wherever the network put them, including inside
/// a multi-byte character.
pub(crate) fn parse_sse_stream<E>(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
) -> impl Stream<Item = ModelEvent> + Send + 'static
where
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut state = SseParserState::new();
        let mut bytes_stream = std::pin::pin!(byte_stream);
        let mut line_buf: Vec<u8> = Vec::new();

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield ModelEvent::Error(StreamFault::retryable(format!(
                        "stream read error: {e}"
                    )));
                    return;
                }
            };
            line_buf.extend_from_slice(&chunk);

            // Drain complete lines; whatever trails the last newline
            // stays buffered for the next chunk.
            while let Some(newline_pos) = line_buf.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = line_buf.drain(..=newline_pos).collect();
                let line = match std::str::from_utf8(&line_bytes[..newline_pos]) {
                    Ok(s) => s.trim_end_matches('\r'),
                    Err(e) => {
                        yield ModelEvent::Error(StreamFault::terminal(format!(
                            "UTF-8 decode error: {e}"
                        )));
                        return;
                    }
                };
                for event in state.process_line(line) {
                    // No events follow a fault, retryable or not.
                    let is_fault = matches!(event, ModelEvent::Error(_));
                    yield event;
                    if is_fault {
                        return;
                    }
                }
            }
        }

        // A stream that ends without a trailing blank line still has one
        // undispatched event buffered.
        if let Ok(tail) = String::from_utf8(std::mem::take(&mut line_buf)) {
            if !tail.trim().is_empty() {
                for event in state.process_line(tail.trim()) {
                    yield event;
                }
            }
        }
        for event in state.process_line("") {
            yield event;
        }
    }
}

/// Accumulates one SSE event (`event:` + `data:` lines) at a time.
struct SseParserState {
    /// The current SSE event type (from `event:` lines).
    current_event_type: Option<String>,
    /// The current SSE data (from `data:` lines; may be multi-line).
    current_data: String,
}

impl SseParserState {
    fn new() -> Self {
        Self {
            current_event_type: None,
            current_data: String::new(),
        }
    }

    /// Process one SSE line and return any events it produces.
    fn process_line(&mut self, line: &str) -> Vec<ModelEvent> {
        if line.is_empty() {
            // Blank line: dispatch the accumulated event
            return self.dispatch_event();
        }

        if let Some(event_type) = line.strip_prefix("event:") {
            self.current_event_type = Some(event_type.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            if !self.current_data.is_empty() {
                self.current_data.push('\n');
            }
            self.current_data.push_str(data.trim());
        }
        // Ignore comment lines (starting with ':') and other prefixes

        vec![]
    }

    /// Dispatch the accumulated event type + data.
    fn dispatch_event(&mut self) -> Vec<ModelEvent> {
        let event_type = match self.current_event_type.take() {
            Some(t) => t,
            None => {
                self.current_data.clear();
                return vec![];
            }
        };
        let data = std::mem::take(&mut self.current_data);

        if data == "[DONE]" || data.is_empty() {
            return vec![];
        }

        let json: serde_json::Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(e) => {
                return vec![ModelEvent::Error(StreamFault::terminal(format!(
                    "JSON parse error in SSE: {e}"
                )))];
            }
        };

        match event_type.as_str() {
            "content_block_delta" => {
                let delta = &json["delta"];
                match delta["type"].as_str() {
                    // Thinking and signature deltas exist on the wire but
                    // the engine only consumes text.
                    Some("text_delta") => {
                        let text = delta["text"].as_str().unwrap_or("").to_string();
                        vec![ModelEvent::TextDelta(text)]
                    }
                    _ => vec![],
                }
            }
            "message_start" => usage_events(&json["message"]["usage"]),
            "message_delta" => usage_events(&json["usage"]),
            "message_stop" | "content_block_start" | "content_block_stop" | "ping" => vec![],
            "error" => {
                let kind = json["error"]["type"].as_str().unwrap_or("");
                let message = json["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown streaming error")
                    .to_string();
                let fault = if kind == "overloaded_error" {
                    StreamFault::retryable(message)
                } else {
                    StreamFault::terminal(message)
                };
                vec![ModelEvent::Error(fault)]
            }
            _ => vec![], // Unknown event types are ignored
        }
    }
}

/// Build a usage event from a wire `usage` object, if it is one.
fn usage_events(value: &serde_json::Value) -> Vec<ModelEvent> {
    if !value.is_object() {
        return vec![];
    }
    vec![ModelEvent::Usage(TokenUsage {
        input_tokens: value["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: value["output_tokens"].as_u64().unwrap_or(0),
        cache_creation_input_tokens: value["cache_creation_input_tokens"].as_u64().unwrap_or(0),
        cache_read_input_tokens: value["cache_read_input_tokens"].as_u64().unwrap_or(0),
    })]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
