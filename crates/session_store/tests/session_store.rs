use std::fs;

use chat_core::Message;
use session_store::{
    session_file_name, Conversation, FileSessionStore, MemorySessionStore, SessionStore,
    SessionStoreError,
};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> FileSessionStore {
    FileSessionStore::open(dir.path().join("sessions")).expect("store should open")
}

#[test]
fn insert_then_get_round_trips_messages_and_counters() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);

    let inserted = store
        .insert_session("first chat", &[Message::user("Hi")])
        .expect("insert should succeed");

    let loaded = store
        .get_session(&inserted.id)
        .expect("inserted session should load");

    assert_eq!(loaded, inserted);
    assert_eq!(loaded.name, "first chat");
    assert_eq!(loaded.messages, vec![Message::user("Hi")]);
    assert_eq!(loaded.prompt_token_count, 0);
    assert_eq!(loaded.completion_token_count, 0);
}

#[test]
fn update_messages_replaces_the_full_history() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);
    let session = store
        .insert_session("chat", &[Message::user("Hi")])
        .expect("insert should succeed");

    let updated = vec![Message::user("Hi"), Message::assistant("Hello.")];
    store
        .update_messages(&session.id, &updated)
        .expect("message update should succeed");

    let loaded = store
        .get_session(&session.id)
        .expect("updated session should load");
    assert_eq!(loaded.messages, updated);
}

#[test]
fn update_token_counts_is_independent_of_messages() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);
    let session = store
        .insert_session("chat", &[Message::user("Hi")])
        .expect("insert should succeed");

    store
        .update_token_counts(&session.id, 5, 3)
        .expect("token update should succeed");

    let loaded = store
        .get_session(&session.id)
        .expect("updated session should load");
    assert_eq!(loaded.prompt_token_count, 5);
    assert_eq!(loaded.completion_token_count, 3);
    assert_eq!(loaded.messages, vec![Message::user("Hi")]);
}

#[test]
fn delete_removes_the_session_file() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);
    let session = store
        .insert_session("chat", &[])
        .expect("insert should succeed");
    let path = store.root().join(session_file_name(&session.id));
    assert!(path.exists());

    store
        .delete_session(&session.id)
        .expect("delete should succeed");

    assert!(!path.exists());
    assert!(matches!(
        store.get_session(&session.id),
        Err(SessionStoreError::SessionNotFound { .. })
    ));
}

#[test]
fn missing_session_reports_not_found_for_every_operation() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);

    assert!(matches!(
        store.get_session("missing"),
        Err(SessionStoreError::SessionNotFound { .. })
    ));
    assert!(matches!(
        store.update_messages("missing", &[]),
        Err(SessionStoreError::SessionNotFound { .. })
    ));
    assert!(matches!(
        store.update_token_counts("missing", 1, 1),
        Err(SessionStoreError::SessionNotFound { .. })
    ));
    assert!(matches!(
        store.delete_session("missing"),
        Err(SessionStoreError::SessionNotFound { .. })
    ));
}

#[test]
fn corrupt_session_document_is_a_parse_error() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);
    let session = store
        .insert_session("chat", &[])
        .expect("insert should succeed");

    let path = store.root().join(session_file_name(&session.id));
    fs::write(&path, "{ not json").expect("corrupting file should succeed");

    assert!(matches!(
        store.get_session(&session.id),
        Err(SessionStoreError::JsonParse { .. })
    ));
}

#[test]
fn future_schema_version_is_rejected() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);
    let session = store
        .insert_session("chat", &[])
        .expect("insert should succeed");

    let path = store.root().join(session_file_name(&session.id));
    let raw = fs::read_to_string(&path).expect("session file should read");
    let bumped = raw.replacen("\"version\": 1", "\"version\": 2", 1);
    assert_ne!(raw, bumped, "version field should be present to rewrite");
    fs::write(&path, bumped).expect("rewriting file should succeed");

    assert!(matches!(
        store.get_session(&session.id),
        Err(SessionStoreError::UnsupportedVersion { found: 2, .. })
    ));
}

#[test]
fn list_sessions_returns_creation_order() {
    let dir = TempDir::new().expect("temp dir should create");
    let store = open_store(&dir);
    let first = store
        .insert_session("first", &[])
        .expect("insert should succeed");
    let second = store
        .insert_session("second", &[])
        .expect("insert should succeed");

    let listed = store.list_sessions().expect("listing should succeed");

    let ids: Vec<_> = listed.iter().map(|session| session.id.as_str()).collect();
    assert_eq!(listed.len(), 2);
    assert!(ids.contains(&first.id.as_str()));
    assert!(ids.contains(&second.id.as_str()));
    assert!(listed
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));
}

#[test]
fn memory_store_matches_file_store_contract() {
    let store = MemorySessionStore::new();
    let session = store
        .insert_session("chat", &[Message::user("Hi")])
        .expect("insert should succeed");

    store
        .update_messages(
            &session.id,
            &[Message::user("Hi"), Message::assistant("Hello.")],
        )
        .expect("message update should succeed");
    store
        .update_token_counts(&session.id, 7, 2)
        .expect("token update should succeed");

    let loaded = store
        .get_session(&session.id)
        .expect("session should load");
    assert_eq!(loaded.messages.len(), 2);
    assert_eq!(loaded.prompt_token_count, 7);

    store
        .delete_session(&session.id)
        .expect("delete should succeed");
    assert!(matches!(
        store.get_session(&session.id),
        Err(SessionStoreError::SessionNotFound { .. })
    ));
}

#[test]
fn reopened_store_sees_previously_written_sessions() {
    let dir = TempDir::new().expect("temp dir should create");
    let root = dir.path().join("sessions");
    let id = {
        let store = FileSessionStore::open(&root).expect("store should open");
        store
            .insert_session("durable", &[Message::user("Hi")])
            .expect("insert should succeed")
            .id
    };

    let reopened = FileSessionStore::open(&root).expect("store should reopen");
    let loaded: Conversation = reopened
        .get_session(&id)
        .expect("session should survive reopen");
    assert_eq!(loaded.name, "durable");
}
