use serde_json::Value;

use crate::events::{ChatDelta, ChatStreamEvent, ChatUsage};

/// Incremental parser for SSE chat completion streams.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);

            if let Some(payload) = extract_data_payload(&frame) {
                if payload.is_empty() {
                    continue;
                }
                if payload == "[DONE]" {
                    events.push(ChatStreamEvent::Done);
                    continue;
                }

                if let Ok(value) = serde_json::from_str::<Value>(&payload) {
                    if let Some(event) = map_event(&value) {
                        events.push(event);
                    }
                }
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ChatStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: &Value) -> Option<ChatStreamEvent> {
    if let Some(error) = value.get("error") {
        let code = error
            .get("code")
            .and_then(|value| value.as_str())
            .map(ToString::to_string);
        let message = error
            .get("message")
            .and_then(|value| value.as_str())
            .map(ToString::to_string);
        return Some(ChatStreamEvent::Error { code, message });
    }

    let choice = value.get("choices").and_then(|choices| choices.get(0));
    let delta = decode_delta(choice.and_then(|choice| choice.get("delta")));
    let finish_reason = choice
        .and_then(|choice| choice.get("finish_reason"))
        .and_then(|value| value.as_str())
        .filter(|reason| !reason.is_empty())
        .map(ToString::to_string);
    let usage = decode_usage(value.get("usage"));

    // Usage-only chunks carry an empty choices array; they still matter.
    if choice.is_none() && usage.is_none() {
        return None;
    }

    Some(ChatStreamEvent::Chunk {
        delta,
        finish_reason,
        usage,
    })
}

fn decode_delta(delta: Option<&Value>) -> ChatDelta {
    let Some(delta) = delta else {
        return ChatDelta::Empty;
    };

    match delta.get("content") {
        None | Some(Value::Null) => ChatDelta::Empty,
        Some(Value::String(content)) => {
            if content.is_empty() {
                ChatDelta::Empty
            } else {
                ChatDelta::Text(content.clone())
            }
        }
        Some(_) => ChatDelta::Malformed(delta.clone()),
    }
}

fn decode_usage(usage: Option<&Value>) -> Option<ChatUsage> {
    let usage = usage?;
    let prompt_tokens = usage.get("prompt_tokens")?.as_u64()?;
    let completion_tokens = usage.get("completion_tokens")?.as_u64()?;

    Some(ChatUsage {
        prompt_tokens,
        completion_tokens,
    })
}
