use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chat_core::Message;

use crate::conversation::Conversation;
use crate::error::SessionStoreError;
use crate::store::SessionStore;

/// In-memory store for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Conversation>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, Conversation>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get_session(&self, id: &str) -> Result<Conversation, SessionStoreError> {
        self.lock_sessions()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionStoreError::session_not_found(id))
    }

    fn insert_session(
        &self,
        name: &str,
        messages: &[Message],
    ) -> Result<Conversation, SessionStoreError> {
        let conversation = Conversation::create(name, messages.to_vec())?;
        self.lock_sessions()
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    fn update_messages(&self, id: &str, messages: &[Message]) -> Result<(), SessionStoreError> {
        let mut sessions = self.lock_sessions();
        let conversation = sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::session_not_found(id))?;
        conversation.messages = messages.to_vec();
        Ok(())
    }

    fn update_token_counts(
        &self,
        id: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.lock_sessions();
        let conversation = sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::session_not_found(id))?;
        conversation.prompt_token_count = prompt_tokens;
        conversation.completion_token_count = completion_tokens;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<(), SessionStoreError> {
        self.lock_sessions()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SessionStoreError::session_not_found(id))
    }

    fn list_sessions(&self) -> Result<Vec<Conversation>, SessionStoreError> {
        let mut sessions: Vec<Conversation> = self.lock_sessions().values().cloned().collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(sessions)
    }
}
