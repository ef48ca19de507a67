//! Durable conversation storage for the streaming chat engine.
//!
//! Defines the [`SessionStore`] capability the orchestration engine writes
//! through, plus two implementations: a file-backed store keeping one
//! versioned JSON document per session, and an in-memory store for tests and
//! offline runs.

mod conversation;
mod error;
mod memory;
mod paths;
mod store;

pub use conversation::{Conversation, SessionRecord, SessionRecordType, SESSION_SCHEMA_VERSION};
pub use error::SessionStoreError;
pub use memory::MemorySessionStore;
pub use paths::{session_file_name, session_root};
pub use store::{FileSessionStore, SessionStore};
