//! Chat API-backed implementation of the shared `chat_core` contract.
//!
//! This adapter translates `chat_api` stream semantics into the ordered
//! `ResultFragment` emissions expected by the orchestration engine: it assigns
//! sequence ids in emission order, decodes deltas exactly once at this
//! boundary, and guarantees one terminal indication per request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_api::{
    ChatApiClient, ChatApiConfig, ChatApiError, ChatCompletionRequest, ChatDelta, ChatStreamEvent,
    StreamSummary, WireMessage,
};
use chat_core::{
    CancelSignal, FinishReason, GenerationSettings, InferenceClient, InferenceError, Message,
    ResultFragment, Role, SequenceId, TokenUsage,
};
use tokio::sync::mpsc;

/// Stable provider identifier used for explicit startup selection.
pub const CHAT_API_PROVIDER_ID: &str = "chat-api";

/// Runtime configuration for the chat API provider.
#[derive(Debug, Clone, Default)]
pub struct ChatApiProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub organization: Option<String>,
    pub timeout: Option<Duration>,
}

impl ChatApiProviderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_chat_api_config(self) -> ChatApiConfig {
        let mut config = ChatApiConfig::new();

        if let Some(api_key) = self.api_key {
            config = config.with_api_key(api_key);
        }

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(organization) = self.organization {
            config = config.with_organization(organization);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

#[async_trait]
trait StreamTransport: Send + Sync {
    async fn stream(
        &self,
        request: &ChatCompletionRequest,
        cancel: &CancelSignal,
        events: mpsc::UnboundedSender<ChatStreamEvent>,
    ) -> Result<StreamSummary, ChatApiError>;

    async fn list_models(&self) -> Result<Vec<String>, ChatApiError>;
}

#[derive(Debug)]
struct DefaultStreamTransport {
    client: ChatApiClient,
}

#[async_trait]
impl StreamTransport for DefaultStreamTransport {
    async fn stream(
        &self,
        request: &ChatCompletionRequest,
        cancel: &CancelSignal,
        events: mpsc::UnboundedSender<ChatStreamEvent>,
    ) -> Result<StreamSummary, ChatApiError> {
        self.client
            .stream_with_handler(request, Some(cancel), |event| {
                let _ = events.send(event);
            })
            .await
    }

    async fn list_models(&self) -> Result<Vec<String>, ChatApiError> {
        self.client.list_models(None).await
    }
}

/// `InferenceClient` adapter backed by `chat_api` transport primitives.
pub struct ChatApiInferenceClient {
    transport: Arc<dyn StreamTransport>,
}

impl ChatApiInferenceClient {
    /// Creates a client using real chat API transport.
    pub fn new(config: ChatApiProviderConfig) -> Result<Self, InferenceError> {
        let client = ChatApiClient::new(config.into_chat_api_config())
            .map_err(|error| InferenceError::transport(error.to_string()))?;

        Ok(Self {
            transport: Arc::new(DefaultStreamTransport { client }),
        })
    }

    #[cfg(test)]
    fn with_transport_for_tests(transport: Arc<dyn StreamTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl InferenceClient for ChatApiInferenceClient {
    async fn request_completion(
        &self,
        cancel: CancelSignal,
        messages: Vec<Message>,
        settings: GenerationSettings,
        fragments: mpsc::Sender<ResultFragment>,
    ) {
        tracing::debug!(model = %settings.model, messages = messages.len(), "dispatching completion request");

        let request = build_wire_request(&messages, &settings);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let transport = Arc::clone(&self.transport);
        let stream_cancel = Arc::clone(&cancel);
        let stream_task = tokio::spawn(async move {
            transport.stream(&request, &stream_cancel, events_tx).await
        });

        // Providers split the tail of a stream across chunks: finish_reason
        // arrives on one, usage on a later one, then `[DONE]`. The engine
        // finalizes at the first terminal fragment it can assemble, so the
        // finish reason and usage are held back here and emitted together on
        // the single terminal sentinel.
        let mut next_sequence: SequenceId = 0;
        let mut pending_finish: Option<FinishReason> = None;
        let mut pending_usage: Option<TokenUsage> = None;

        while let Some(event) = events_rx.recv().await {
            match event {
                ChatStreamEvent::Chunk {
                    delta,
                    finish_reason,
                    usage,
                } => {
                    if let Some(reason) = finish_reason.as_deref().and_then(FinishReason::parse) {
                        pending_finish = Some(reason);
                    }
                    if let Some(usage) = usage {
                        pending_usage = Some(TokenUsage {
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                        });
                    }

                    // Content-free chunks (role preamble, finish, usage)
                    // consume no sequence id, keeping the id run contiguous.
                    let fragment = match delta {
                        ChatDelta::Text(text) => ResultFragment::text(next_sequence, text),
                        ChatDelta::Empty => continue,
                        ChatDelta::Malformed(payload) => {
                            ResultFragment::malformed(next_sequence, payload)
                        }
                    };

                    next_sequence += 1;
                    if fragments.send(fragment).await.is_err() {
                        return;
                    }
                }
                ChatStreamEvent::Done => {
                    let mut sentinel = ResultFragment::sentinel(next_sequence);
                    sentinel.finish_reason = pending_finish.take();
                    if let Some(usage) = pending_usage.take() {
                        sentinel = sentinel.with_usage(usage);
                    }
                    next_sequence += 1;
                    if fragments.send(sentinel).await.is_err() {
                        return;
                    }
                }
                ChatStreamEvent::Error { code, message } => {
                    let _ = fragments
                        .send(ResultFragment::failed(
                            next_sequence,
                            InferenceError::provider(
                                None,
                                message.or(code).unwrap_or_else(|| {
                                    "provider reported an error".to_string()
                                }),
                            ),
                        ))
                        .await;
                    return;
                }
            }
        }

        match stream_task.await {
            Ok(Ok(_summary)) => {
                // Stream ended without `[DONE]` but with an explicit finish:
                // still one terminal fragment, carrying what was held back.
                if let Some(reason) = pending_finish.take() {
                    let mut terminal = ResultFragment::finished(next_sequence, reason);
                    if let Some(usage) = pending_usage.take() {
                        terminal = terminal.with_usage(usage);
                    }
                    let _ = fragments.send(terminal).await;
                }
            }
            Ok(Err(error)) => {
                let _ = fragments
                    .send(ResultFragment::failed(next_sequence, map_transport_error(error)))
                    .await;
            }
            Err(join_error) => {
                let _ = fragments
                    .send(ResultFragment::failed(
                        next_sequence,
                        InferenceError::transport(format!("stream task failed: {join_error}")),
                    ))
                    .await;
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        self.transport
            .list_models()
            .await
            .map_err(map_transport_error)
    }
}

fn build_wire_request(
    messages: &[Message],
    settings: &GenerationSettings,
) -> ChatCompletionRequest {
    let wire_messages = messages
        .iter()
        .map(|message| WireMessage::new(role_name(message.role), message.content.clone()))
        .collect();

    let mut request = ChatCompletionRequest::new(settings.model.clone(), wire_messages);
    request.max_tokens = Some(settings.max_tokens);
    request.temperature = settings.temperature;
    request.top_p = settings.top_p;
    request.frequency_penalty = settings.frequency_penalty;
    request
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn map_transport_error(error: ChatApiError) -> InferenceError {
    match error {
        ChatApiError::Cancelled => InferenceError::Cancelled,
        ChatApiError::Status(status, message) => {
            InferenceError::provider(Some(status.as_u16()), message)
        }
        ChatApiError::StreamFailed { code, message } => InferenceError::provider(
            None,
            match code {
                Some(code) if !code.trim().is_empty() => format!("{message} ({code})"),
                _ => message,
            },
        ),
        other => InferenceError::transport(other.to_string()),
    }
}
