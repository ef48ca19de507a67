//! Deterministic mock implementation of the shared `chat_core` contract.
//!
//! This crate contains no transport logic and is intended for local offline
//! runs and contract-level integration testing. Scripted fragments are
//! delivered in the exact arrival order given, which lets tests exercise
//! out-of-order delivery, gaps, and cancellation paths deterministically.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chat_core::{
    CancelSignal, FinishReason, GenerationSettings, InferenceClient, InferenceError, Message,
    ResultFragment, TokenUsage,
};
use tokio::sync::mpsc;

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Scripted inference client delivering pre-built fragments per request.
pub struct ScriptedInferenceClient {
    turns: Mutex<VecDeque<Vec<ResultFragment>>>,
    model_ids: Vec<String>,
    chunk_delay: Option<Duration>,
}

impl ScriptedInferenceClient {
    /// Creates a client that serves one scripted fragment list per request,
    /// in order.
    #[must_use]
    pub fn new(turns: Vec<Vec<ResultFragment>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            model_ids: vec![MOCK_PROVIDER_ID.to_string()],
            chunk_delay: None,
        }
    }

    /// Creates a client that serves a single scripted request.
    #[must_use]
    pub fn single_turn(fragments: Vec<ResultFragment>) -> Self {
        Self::new(vec![fragments])
    }

    #[must_use]
    pub fn with_model_ids(mut self, model_ids: Vec<String>) -> Self {
        self.model_ids = sanitize_model_ids(model_ids);
        self
    }

    /// Paces fragment delivery, for interactive offline runs.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Canned streamed answer used by offline interactive runs.
    #[must_use]
    pub fn canned() -> Self {
        let chunks = [
            "This ",
            "is ",
            "a ",
            "scripted ",
            "offline ",
            "completion. ",
            "Configure ",
            "a ",
            "chat-api ",
            "provider ",
            "to ",
            "talk ",
            "to ",
            "a ",
            "real ",
            "backend.",
        ];
        let script = streamed_text_script(
            &chunks,
            TokenUsage {
                prompt_tokens: 12,
                completion_tokens: chunks.len() as u64,
            },
        );

        Self::new(std::iter::repeat(script).take(64).collect())
            .with_chunk_delay(Duration::from_millis(30))
    }

    fn next_turn(&self) -> Option<Vec<ResultFragment>> {
        lock_unpoisoned(&self.turns).pop_front()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInferenceClient {
    async fn request_completion(
        &self,
        cancel: CancelSignal,
        _messages: Vec<Message>,
        _settings: GenerationSettings,
        fragments: mpsc::Sender<ResultFragment>,
    ) {
        let Some(turn) = self.next_turn() else {
            let _ = fragments
                .send(ResultFragment::failed(
                    0,
                    InferenceError::transport("mock script exhausted"),
                ))
                .await;
            return;
        };

        for fragment in turn {
            if cancel.load(Ordering::SeqCst) {
                let _ = fragments
                    .send(ResultFragment::failed(
                        fragment.sequence_id,
                        InferenceError::Cancelled,
                    ))
                    .await;
                return;
            }

            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }

            if fragments.send(fragment).await.is_err() {
                return;
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        Ok(self.model_ids.clone())
    }
}

/// Builds an in-order fragment script for `chunks`, terminated by a stop
/// marker carrying `usage` and the final sentinel.
#[must_use]
pub fn streamed_text_script(chunks: &[&str], usage: TokenUsage) -> Vec<ResultFragment> {
    let mut fragments: Vec<ResultFragment> = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| ResultFragment::text(index as u64, *chunk))
        .collect();

    let next = fragments.len() as u64;
    fragments.push(ResultFragment::finished(next, FinishReason::Stop).with_usage(usage));
    fragments.push(ResultFragment::sentinel(next + 1));
    fragments
}

fn sanitize_model_ids(model_ids: Vec<String>) -> Vec<String> {
    let mut sanitized: Vec<String> = model_ids
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();

    if sanitized.is_empty() {
        sanitized.push(MOCK_PROVIDER_ID.to_string());
    }

    sanitized
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use chat_core::DeltaPayload;

    use super::*;

    async fn collect_fragments(
        client: &ScriptedInferenceClient,
        cancel: CancelSignal,
    ) -> Vec<ResultFragment> {
        let (tx, mut rx) = mpsc::channel(16);
        client
            .request_completion(
                cancel,
                vec![Message::user("hi")],
                GenerationSettings::new("mock", 32),
                tx,
            )
            .await;

        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment);
        }
        fragments
    }

    #[tokio::test]
    async fn scripted_fragments_are_delivered_in_arrival_order() {
        // Arrival order deliberately differs from sequence order.
        let script = vec![
            ResultFragment::text(1, "Hel"),
            ResultFragment::text(0, "lo "),
            ResultFragment::finished(
                2,
                FinishReason::Stop,
            ),
        ];
        let client = ScriptedInferenceClient::single_turn(script.clone());

        let fragments = collect_fragments(&client, CancelSignal::default()).await;

        assert_eq!(fragments, script);
    }

    #[tokio::test]
    async fn preset_cancel_flag_yields_a_cancellation_error_fragment() {
        let client = ScriptedInferenceClient::single_turn(streamed_text_script(
            &["never ", "delivered"],
            TokenUsage {
                prompt_tokens: 1,
                completion_tokens: 2,
            },
        ));
        let cancel: CancelSignal = Arc::new(AtomicBool::new(true));

        let fragments = collect_fragments(&client, cancel).await;

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].error, Some(InferenceError::Cancelled));
    }

    #[tokio::test]
    async fn exhausted_script_reports_a_transport_failure() {
        let client = ScriptedInferenceClient::new(Vec::new());

        let fragments = collect_fragments(&client, CancelSignal::default()).await;

        assert_eq!(fragments.len(), 1);
        assert!(matches!(
            fragments[0].error,
            Some(InferenceError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn streamed_text_script_ends_with_stop_and_sentinel() {
        let script = streamed_text_script(
            &["a", "b"],
            TokenUsage {
                prompt_tokens: 3,
                completion_tokens: 2,
            },
        );

        assert_eq!(script.len(), 4);
        assert_eq!(script[0].delta, DeltaPayload::Text("a".to_string()));
        assert_eq!(script[2].finish_reason, Some(FinishReason::Stop));
        assert_eq!(
            script[2].usage,
            Some(TokenUsage {
                prompt_tokens: 3,
                completion_tokens: 2,
            })
        );
        assert!(script[3].is_final);
    }

    #[tokio::test]
    async fn blank_model_ids_fall_back_to_mock_default() {
        let client = ScriptedInferenceClient::new(Vec::new())
            .with_model_ids(vec!["  ".to_string(), String::new()]);

        let models = client
            .list_models()
            .await
            .expect("mock model listing should succeed");
        assert_eq!(models, vec![MOCK_PROVIDER_ID.to_string()]);
    }
}
