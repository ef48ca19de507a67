use chat_core::Message;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::SessionStoreError;

pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// One persistent chat session: ordered message history plus cumulative token
/// counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub messages: Vec<Message>,
    pub prompt_token_count: u64,
    pub completion_token_count: u64,
}

impl Conversation {
    /// Creates a fresh conversation with a v4 id and the current UTC time.
    pub fn create(
        name: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<Self, SessionStoreError> {
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(SessionStoreError::ClockFormat)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at,
            messages,
            prompt_token_count: 0,
            completion_token_count: 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRecordType {
    Session,
}

/// On-disk envelope wrapping one conversation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "type")]
    pub record_type: SessionRecordType,
    pub version: u32,
    pub session: Conversation,
}

impl SessionRecord {
    #[must_use]
    pub fn v1(session: Conversation) -> Self {
        Self {
            record_type: SessionRecordType::Session,
            version: SESSION_SCHEMA_VERSION,
            session,
        }
    }
}
