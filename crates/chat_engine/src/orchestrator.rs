use std::ops::ControlFlow;
use std::sync::Arc;

use chat_core::{
    CancelSignal, GenerationSettings, InferenceClient, Message, ResultFragment, TokenUsage,
};
use session_store::{Conversation, SessionStore, SessionStoreError};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::accumulator::build_final_message;
use crate::notification::{EngineNotification, NotificationSender};
use crate::reassembler::FragmentReassembler;

/// Capacity of the fragment channel between the client task and the
/// orchestrator. Lightly buffered: enough to decouple producer bursts without
/// hiding backpressure.
pub const FRAGMENT_CHANNEL_CAPACITY: usize = 16;

/// Authoritative processing state of the orchestrator, mutated only by its
/// own transition logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingMode {
    Idle,
    Processing,
    Error(String),
}

/// Terminal outcome of one submitted prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Failure surfaced by session-management operations on the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// State machine coordinating request issuance, streaming, persistence, and
/// notifications for one active conversation.
///
/// One logical request is in flight at a time. The inference client runs on
/// its own task and communicates exclusively through the fragment channel;
/// the orchestrator is the sole consumer and the [`FragmentReassembler`] is
/// the sole arbiter of logical order.
pub struct Orchestrator {
    client: Arc<dyn InferenceClient>,
    store: Arc<dyn SessionStore>,
    notifications: NotificationSender,
    settings: GenerationSettings,
    conversation: Conversation,
    mode: ProcessingMode,
    reassembler: FragmentReassembler,
    cancel: CancelSignal,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        store: Arc<dyn SessionStore>,
        notifications: NotificationSender,
        settings: GenerationSettings,
        conversation: Conversation,
    ) -> Self {
        Self {
            client,
            store,
            notifications,
            settings,
            conversation,
            mode: ProcessingMode::Idle,
            reassembler: FragmentReassembler::new(),
            cancel: CancelSignal::default(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> &ProcessingMode {
        &self.mode
    }

    /// The in-memory working copy of the active session. After a persistence
    /// failure it can run ahead of the durable copy; re-fetch on the next
    /// load rather than trusting it as durable.
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: GenerationSettings) {
        self.settings = settings;
        self.notify(EngineNotification::SettingsUpdated);
    }

    /// Cancellation handle for the current (or upcoming) turn. Setting it
    /// asks the inference client to stop streaming; the partial answer
    /// accumulated so far is saved best-effort. The handle is rotated after
    /// every turn so a stale cancel cannot affect later turns.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelSignal {
        Arc::clone(&self.cancel)
    }

    /// Replaces the working conversation with the stored session `id`.
    pub fn activate_session(&mut self, id: &str) -> Result<(), EngineError> {
        self.conversation = self.store.get_session(id)?;
        self.reassembler.clear();
        self.mode = ProcessingMode::Idle;
        Ok(())
    }

    /// Runs one full completion turn: appends the user prompt, streams the
    /// answer, persists the result, and returns the terminal outcome.
    ///
    /// Every failure is recovered here and reported through notifications;
    /// a previous `Error` state is left behind by the submission itself.
    pub async fn submit_prompt(&mut self, prompt: impl Into<String>) -> TurnOutcome {
        let prompt = prompt.into();
        tracing::debug!(session = %self.conversation.id, "submitting prompt");

        self.conversation.messages.push(Message::user(prompt));
        self.reassembler.clear();
        self.mode = ProcessingMode::Processing;
        self.notify(EngineNotification::ProcessingStateChanged { processing: true });

        let (fragments_tx, mut fragments_rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let client = Arc::clone(&self.client);
        let cancel = Arc::clone(&self.cancel);
        let messages = self.conversation.messages.clone();
        let settings = self.settings.clone();
        tokio::spawn(async move {
            client
                .request_completion(cancel, messages, settings, fragments_tx)
                .await;
        });

        let outcome = loop {
            // Sole suspension point: wait for the next fragment or closure.
            let Some(fragment) = fragments_rx.recv().await else {
                break self.fail_turn("completion stream closed before finishing");
            };

            match self.on_fragment(fragment) {
                ControlFlow::Continue(()) => {}
                ControlFlow::Break(outcome) => break outcome,
            }
        };

        self.cancel = CancelSignal::default();
        outcome
    }

    fn on_fragment(&mut self, fragment: ResultFragment) -> ControlFlow<TurnOutcome> {
        // Token accounting first: it persists even when a later fragment
        // fails the turn before the message completes.
        if let Some(usage) = fragment.usage {
            self.record_usage(usage);
        }

        if let Some(error) = &fragment.error {
            if error.is_cancellation() {
                return ControlFlow::Break(self.finish_cancelled());
            }
            let message = error.to_string();
            return ControlFlow::Break(self.fail_turn(&message));
        }

        self.reassembler.accept(fragment);
        if self.reassembler.has_terminal_marker()
            && self.reassembler.starts_at_origin()
            && self.reassembler.is_complete()
        {
            return ControlFlow::Break(self.finish_completed());
        }

        ControlFlow::Continue(())
    }

    fn record_usage(&mut self, usage: TokenUsage) {
        self.conversation.prompt_token_count += usage.prompt_tokens;
        self.conversation.completion_token_count += usage.completion_tokens;

        if let Err(error) = self.store.update_token_counts(
            &self.conversation.id,
            self.conversation.prompt_token_count,
            self.conversation.completion_token_count,
        ) {
            tracing::warn!(session = %self.conversation.id, %error, "failed to persist token counts");
            self.notify(EngineNotification::Error {
                message: format!("failed to persist token counts: {error}"),
            });
        }
    }

    fn finish_completed(&mut self) -> TurnOutcome {
        match build_final_message(self.reassembler.ordered()) {
            Ok(message) => {
                self.conversation.messages.push(message);
                self.reassembler.clear();
                self.mode = ProcessingMode::Idle;

                let persisted = self.persist_messages();
                self.notify(EngineNotification::ProcessingStateChanged { processing: false });
                if let Err(error) = persisted {
                    // The in-memory conversation keeps the new message; the
                    // durable copy lags until the next load.
                    tracing::warn!(session = %self.conversation.id, %error, "failed to persist messages");
                    self.notify(EngineNotification::Error {
                        message: format!("failed to persist messages: {error}"),
                    });
                }

                TurnOutcome::Completed
            }
            Err(error) => {
                let message = error.to_string();
                self.fail_turn(&message)
            }
        }
    }

    fn finish_cancelled(&mut self) -> TurnOutcome {
        // Best-effort save of the partial answer: only the gap-free prefix is
        // eligible, so a gapped tail is never silently assembled.
        match build_final_message(self.reassembler.contiguous_prefix()) {
            Ok(message) if !message.content.is_empty() => {
                self.conversation.messages.push(message);
                if let Err(error) = self.persist_messages() {
                    tracing::warn!(session = %self.conversation.id, %error, "failed to persist partial answer");
                    self.notify(EngineNotification::Error {
                        message: format!("failed to persist messages: {error}"),
                    });
                }
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(session = %self.conversation.id, %error, "discarding malformed partial answer");
            }
        }

        self.reassembler.clear();
        self.mode = ProcessingMode::Idle;
        self.notify(EngineNotification::Cancelled);
        self.notify(EngineNotification::ProcessingStateChanged { processing: false });
        TurnOutcome::Cancelled
    }

    fn fail_turn(&mut self, message: &str) -> TurnOutcome {
        tracing::warn!(session = %self.conversation.id, error = message, "completion turn failed");

        // The conversation is left as it was before the failed turn; the
        // user's prompt stays appended and a retry is a fresh submission.
        self.reassembler.clear();
        self.mode = ProcessingMode::Error(message.to_string());
        self.notify(EngineNotification::Error {
            message: message.to_string(),
        });
        self.notify(EngineNotification::ProcessingStateChanged { processing: false });
        TurnOutcome::Failed(message.to_string())
    }

    fn persist_messages(&self) -> Result<(), SessionStoreError> {
        self.store
            .update_messages(&self.conversation.id, &self.conversation.messages)
    }

    fn notify(&self, notification: EngineNotification) {
        let _ = self.notifications.send(notification);
    }
}
