use serde::{Deserialize, Serialize};

/// Canonical request payload shape for OpenAI-compatible chat completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
            max_tokens: None,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
        }
    }
}

/// Provider-facing message history item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Streaming options; `include_usage` requests a final usage-bearing chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[cfg(test)]
mod tests {
    use super::{ChatCompletionRequest, WireMessage};

    #[test]
    fn new_request_defaults_to_streaming_with_usage() {
        let request = ChatCompletionRequest::new(
            "gpt-x",
            vec![WireMessage::new("user", "Hi")],
        );

        assert!(request.stream);
        assert!(request
            .stream_options
            .is_some_and(|options| options.include_usage));
    }

    #[test]
    fn unset_sampling_parameters_are_omitted_from_the_wire() {
        let request = ChatCompletionRequest::new("gpt-x", Vec::new());
        let encoded = serde_json::to_value(&request).expect("request should serialize");

        let object = encoded.as_object().expect("request encodes as an object");
        assert!(!object.contains_key("max_tokens"));
        assert!(!object.contains_key("temperature"));
        assert!(!object.contains_key("top_p"));
        assert!(!object.contains_key("frequency_penalty"));
    }

    #[test]
    fn set_sampling_parameters_round_trip() {
        let mut request = ChatCompletionRequest::new("gpt-x", Vec::new());
        request.max_tokens = Some(100);
        request.temperature = Some(0.2);

        let encoded = serde_json::to_string(&request).expect("request should serialize");
        let decoded: ChatCompletionRequest =
            serde_json::from_str(&encoded).expect("request should deserialize");

        assert_eq!(decoded.max_tokens, Some(100));
        assert_eq!(decoded.temperature, Some(0.2));
    }
}
