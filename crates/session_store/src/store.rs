use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chat_core::Message;

use crate::conversation::{Conversation, SessionRecord, SESSION_SCHEMA_VERSION};
use crate::error::SessionStoreError;
use crate::paths::session_file_name;

/// Storage capability consumed by the orchestration engine.
///
/// Operations are synchronous from the caller's perspective. Retries,
/// transactions, and pooling are the store's own concern; the engine performs
/// plain write-through calls.
pub trait SessionStore: Send + Sync {
    fn get_session(&self, id: &str) -> Result<Conversation, SessionStoreError>;

    fn insert_session(
        &self,
        name: &str,
        messages: &[Message],
    ) -> Result<Conversation, SessionStoreError>;

    fn update_messages(&self, id: &str, messages: &[Message]) -> Result<(), SessionStoreError>;

    fn update_token_counts(
        &self,
        id: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Result<(), SessionStoreError>;

    fn delete_session(&self, id: &str) -> Result<(), SessionStoreError>;

    fn list_sessions(&self) -> Result<Vec<Conversation>, SessionStoreError>;
}

/// File-backed store keeping one versioned JSON document per session.
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Opens a store rooted at `root`, creating the directory when missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|source| SessionStoreError::io("creating session root", &root, source))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.root.join(session_file_name(id))
    }

    fn read_record(&self, id: &str) -> Result<Conversation, SessionStoreError> {
        let path = self.session_path(id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                return Err(SessionStoreError::session_not_found(id));
            }
            Err(source) => {
                return Err(SessionStoreError::io("reading session file", &path, source));
            }
        };

        let record: SessionRecord = serde_json::from_str(&raw)
            .map_err(|source| SessionStoreError::json_parse(&path, source))?;
        if record.version != SESSION_SCHEMA_VERSION {
            return Err(SessionStoreError::UnsupportedVersion {
                path,
                found: record.version,
            });
        }

        Ok(record.session)
    }

    fn write_record(&self, conversation: &Conversation) -> Result<(), SessionStoreError> {
        let path = self.session_path(&conversation.id);
        let record = SessionRecord::v1(conversation.clone());
        let encoded = serde_json::to_string_pretty(&record)
            .map_err(|source| SessionStoreError::json_serialize(&path, source))?;

        // Write-then-rename so readers never observe a partial document.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, encoded)
            .map_err(|source| SessionStoreError::io("writing session file", &staging, source))?;
        fs::rename(&staging, &path)
            .map_err(|source| SessionStoreError::io("replacing session file", &path, source))?;

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get_session(&self, id: &str) -> Result<Conversation, SessionStoreError> {
        self.read_record(id)
    }

    fn insert_session(
        &self,
        name: &str,
        messages: &[Message],
    ) -> Result<Conversation, SessionStoreError> {
        let conversation = Conversation::create(name, messages.to_vec())?;
        self.write_record(&conversation)?;
        Ok(conversation)
    }

    fn update_messages(&self, id: &str, messages: &[Message]) -> Result<(), SessionStoreError> {
        let mut conversation = self.read_record(id)?;
        conversation.messages = messages.to_vec();
        self.write_record(&conversation)
    }

    fn update_token_counts(
        &self,
        id: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Result<(), SessionStoreError> {
        let mut conversation = self.read_record(id)?;
        conversation.prompt_token_count = prompt_tokens;
        conversation.completion_token_count = completion_tokens;
        self.write_record(&conversation)
    }

    fn delete_session(&self, id: &str) -> Result<(), SessionStoreError> {
        let path = self.session_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => {
                Err(SessionStoreError::session_not_found(id))
            }
            Err(source) => Err(SessionStoreError::io("deleting session file", &path, source)),
        }
    }

    fn list_sessions(&self) -> Result<Vec<Conversation>, SessionStoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|source| SessionStoreError::io("listing session root", &self.root, source))?;

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|source| SessionStoreError::io("listing session root", &self.root, source))?;
            let path = entry.path();
            if path.extension().and_then(|extension| extension.to_str()) != Some("json") {
                continue;
            }

            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            sessions.push(self.read_record(id)?);
        }

        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(sessions)
    }
}
