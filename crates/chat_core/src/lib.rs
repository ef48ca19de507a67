//! Provider-agnostic contract for streaming one chat completion.
//!
//! This crate intentionally defines only the shared completion lifecycle
//! types: conversation messages, generation settings, streamed result
//! fragments, and the capability trait inference backends implement. It
//! excludes provider transport details, wire payloads, and orchestration
//! concerns.

use std::sync::{atomic::AtomicBool, Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Logical position of a fragment within one completion stream.
pub type SequenceId = u64;

/// Fixed origin for fragment sequence ids: clients number fragments from 0.
pub const STREAM_ORIGIN: SequenceId = 0;

/// Shared cooperative-cancellation flag for one completion request.
pub type CancelSignal = Arc<AtomicBool>;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One immutable chat-history item. Ordering within a conversation is
/// significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Creates a user-authored message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant-authored message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Generation parameters forwarded to the inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl GenerationSettings {
    #[must_use]
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    #[must_use]
    pub fn with_frequency_penalty(mut self, frequency_penalty: f64) -> Self {
        self.frequency_penalty = Some(frequency_penalty);
        self
    }
}

/// Token accounting reported by the backend for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Why the backend stopped emitting content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
}

impl FinishReason {
    /// Parses a wire finish reason. `"none"` and unrecognized values map to
    /// `None`; stream termination is carried by the final sentinel instead.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stop" => Some(Self::Stop),
            "length" => Some(Self::Length),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
        }
    }
}

/// Content delta decoded once at the client boundary.
///
/// `Malformed` preserves a payload that could not be resolved to text so the
/// accumulation step fails the whole build instead of silently dropping
/// content.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaPayload {
    Text(String),
    Empty,
    Malformed(Value),
}

impl DeltaPayload {
    /// True when this payload contributes no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Empty => true,
            Self::Malformed(_) => false,
        }
    }
}

/// Failure reported by an inference backend.
///
/// Cancellation is a distinct kind, never a value compared by identity, so
/// unrelated errors cannot be misclassified as cancellations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("request was cancelled")]
    Cancelled,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider rejected the request: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("malformed fragment payload: {0}")]
    MalformedFragment(String),
}

impl InferenceError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    #[must_use]
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// True when this error reports deliberate cancellation rather than a
    /// backend failure.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// One streamed unit of a completion response.
///
/// Sequence ids are assigned by the producing client in emission order, but
/// fragments may be observed out of that order by consumers; logical order is
/// restored downstream. Fragments are write-once values.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFragment {
    pub sequence_id: SequenceId,
    pub delta: DeltaPayload,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<TokenUsage>,
    pub error: Option<InferenceError>,
    pub is_final: bool,
}

impl ResultFragment {
    /// Creates a text-delta fragment.
    #[must_use]
    pub fn text(sequence_id: SequenceId, delta: impl Into<String>) -> Self {
        Self {
            sequence_id,
            delta: DeltaPayload::Text(delta.into()),
            finish_reason: None,
            usage: None,
            error: None,
            is_final: false,
        }
    }

    /// Creates a fragment with no content.
    #[must_use]
    pub fn empty(sequence_id: SequenceId) -> Self {
        Self {
            sequence_id,
            delta: DeltaPayload::Empty,
            finish_reason: None,
            usage: None,
            error: None,
            is_final: false,
        }
    }

    /// Creates a fragment carrying an unresolvable delta payload.
    #[must_use]
    pub fn malformed(sequence_id: SequenceId, payload: Value) -> Self {
        Self {
            sequence_id,
            delta: DeltaPayload::Malformed(payload),
            finish_reason: None,
            usage: None,
            error: None,
            is_final: false,
        }
    }

    /// Creates a fragment marking the backend's stop point.
    #[must_use]
    pub fn finished(sequence_id: SequenceId, reason: FinishReason) -> Self {
        Self {
            sequence_id,
            delta: DeltaPayload::Empty,
            finish_reason: Some(reason),
            usage: None,
            error: None,
            is_final: false,
        }
    }

    /// Creates the final stream sentinel.
    #[must_use]
    pub fn sentinel(sequence_id: SequenceId) -> Self {
        Self {
            sequence_id,
            delta: DeltaPayload::Empty,
            finish_reason: None,
            usage: None,
            error: None,
            is_final: true,
        }
    }

    /// Creates an error-bearing fragment.
    #[must_use]
    pub fn failed(sequence_id: SequenceId, error: InferenceError) -> Self {
        Self {
            sequence_id,
            delta: DeltaPayload::Empty,
            finish_reason: None,
            usage: None,
            error: Some(error),
            is_final: false,
        }
    }

    /// Attaches token usage to this fragment.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// True when this fragment ends the stream lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_final || self.finish_reason.is_some() || self.error.is_some()
    }

    /// True when accumulation must stop at this fragment: the final sentinel
    /// or an explicit stop/length finish.
    #[must_use]
    pub fn is_stop_marker(&self) -> bool {
        self.is_final
            || matches!(
                self.finish_reason,
                Some(FinishReason::Stop | FinishReason::Length)
            )
    }
}

/// Capability interface for streaming chat completions.
///
/// Implementations must emit fragments with monotonically assigned sequence
/// ids starting at [`STREAM_ORIGIN`] and exactly one terminal indication per
/// request: a
/// final-sentinel fragment, an error-bearing fragment, or channel closure.
/// Cancellation is cooperative: implementations observe `cancel` promptly and
/// surface [`InferenceError::Cancelled`] as their final emission.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Streams a completion for `messages`, delivering fragments on
    /// `fragments`.
    ///
    /// Returns once the stream has terminated. Failures are reported on the
    /// channel rather than through a return value so the consumer observes a
    /// single ordered event source.
    async fn request_completion(
        &self,
        cancel: CancelSignal,
        messages: Vec<Message>,
        settings: GenerationSettings,
        fragments: mpsc::Sender<ResultFragment>,
    );

    /// Lists model identifiers this backend can serve.
    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        CancelSignal, DeltaPayload, FinishReason, GenerationSettings, InferenceClient,
        InferenceError, Message, ResultFragment, Role, TokenUsage,
    };
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct MinimalClient;

    #[async_trait]
    impl InferenceClient for MinimalClient {
        async fn request_completion(
            &self,
            _cancel: CancelSignal,
            _messages: Vec<Message>,
            _settings: GenerationSettings,
            fragments: mpsc::Sender<ResultFragment>,
        ) {
            let _ = fragments.send(ResultFragment::sentinel(0)).await;
        }

        async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
            Ok(vec!["minimal-model".to_string()])
        }
    }

    #[test]
    fn message_constructors_fix_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hello").role, Role::Assistant);
        assert_eq!(Message::system("rules").role, Role::System);
    }

    #[test]
    fn settings_builders_set_optional_parameters() {
        let settings = GenerationSettings::new("gpt-x", 100)
            .with_temperature(0.7)
            .with_top_p(0.9)
            .with_frequency_penalty(0.1);

        assert_eq!(settings.model, "gpt-x");
        assert_eq!(settings.max_tokens, 100);
        assert_eq!(settings.temperature, Some(0.7));
        assert_eq!(settings.top_p, Some(0.9));
        assert_eq!(settings.frequency_penalty, Some(0.1));
    }

    #[test]
    fn finish_reason_parse_maps_none_and_unknown_to_absent() {
        assert_eq!(FinishReason::parse("stop"), Some(FinishReason::Stop));
        assert_eq!(FinishReason::parse("length"), Some(FinishReason::Length));
        assert_eq!(FinishReason::parse("none"), None);
        assert_eq!(FinishReason::parse("content_filter"), None);
    }

    #[test]
    fn terminal_detection_matches_stream_lifecycle() {
        assert!(!ResultFragment::text(0, "hello").is_terminal());
        assert!(!ResultFragment::empty(1).is_terminal());
        assert!(ResultFragment::finished(2, FinishReason::Stop).is_terminal());
        assert!(ResultFragment::sentinel(3).is_terminal());
        assert!(ResultFragment::failed(4, InferenceError::Cancelled).is_terminal());
    }

    #[test]
    fn stop_marker_covers_sentinel_and_explicit_finish() {
        assert!(ResultFragment::sentinel(0).is_stop_marker());
        assert!(ResultFragment::finished(0, FinishReason::Stop).is_stop_marker());
        assert!(ResultFragment::finished(0, FinishReason::Length).is_stop_marker());
        assert!(!ResultFragment::text(0, "hello").is_stop_marker());
        assert!(!ResultFragment::failed(0, InferenceError::Cancelled).is_stop_marker());
    }

    #[test]
    fn usage_attaches_without_changing_terminal_status() {
        let usage = TokenUsage {
            prompt_tokens: 5,
            completion_tokens: 3,
        };
        let fragment = ResultFragment::finished(2, FinishReason::Stop).with_usage(usage);

        assert_eq!(fragment.usage, Some(usage));
        assert!(fragment.is_terminal());
    }

    #[test]
    fn cancellation_is_a_distinct_error_kind() {
        assert!(InferenceError::Cancelled.is_cancellation());
        assert!(!InferenceError::transport("connection reset").is_cancellation());
        assert!(!InferenceError::provider(Some(500), "boom").is_cancellation());
        assert!(!InferenceError::MalformedFragment("not text".to_string()).is_cancellation());
    }

    #[test]
    fn malformed_delta_is_never_considered_empty() {
        assert!(DeltaPayload::Empty.is_empty());
        assert!(DeltaPayload::Text(String::new()).is_empty());
        assert!(!DeltaPayload::Text("x".to_string()).is_empty());
        assert!(!DeltaPayload::Malformed(json!({"content": 42})).is_empty());
    }

    #[tokio::test]
    async fn minimal_client_emits_exactly_one_terminal_fragment() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = MinimalClient;

        client
            .request_completion(
                CancelSignal::default(),
                vec![Message::user("hi")],
                GenerationSettings::new("minimal-model", 16),
                tx,
            )
            .await;

        let first = rx.recv().await.expect("sentinel fragment should arrive");
        assert!(first.is_final);
        assert!(rx.recv().await.is_none());
    }
}
