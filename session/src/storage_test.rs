use super::*;
use tokio::time::{Duration, timeout};

async fn next_event(events: &mut StorageEvents) -> StorageEvent {
    timeout(Duration::from_millis(500), events.recv())
        .await
        .expect("storage event receive timed out")
        .expect("storage bus closed unexpectedly")
}

async fn assert_no_event(events: &mut StorageEvents) {
    assert!(
        timeout(Duration::from_millis(80), events.recv()).await.is_err(),
        "expected no storage event"
    );
}

// =============================================================================
// MemoryBackend
// =============================================================================

#[test]
fn memory_backend_set_returns_previous() {
    let backend = MemoryBackend::new();
    assert_eq!(backend.set("token", "a").unwrap(), None);
    assert_eq!(backend.set("token", "b").unwrap().as_deref(), Some("a"));
    assert_eq!(backend.get("token").unwrap().as_deref(), Some("b"));
}

#[test]
fn memory_backend_remove_missing_is_none() {
    let backend = MemoryBackend::new();
    assert_eq!(backend.remove("token").unwrap(), None);
}

// =============================================================================
// FileBackend
// =============================================================================

#[test]
fn file_backend_missing_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::new(dir.path().join("storage.json"));
    assert_eq!(backend.get(TOKEN_KEY).unwrap(), None);
}

#[test]
fn file_backend_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("storage.json");
    FileBackend::new(&path).set(TOKEN_KEY, "abc").unwrap();

    let reopened = FileBackend::new(&path);
    assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
}

#[test]
fn file_backend_corrupt_file_errors_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "{ not json").unwrap();

    let backend = FileBackend::new(&path);
    assert!(matches!(backend.get(TOKEN_KEY), Err(StorageError::Corrupt(_))));
}

#[test]
fn file_backend_write_recovers_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "{ not json").unwrap();

    let backend = FileBackend::new(&path);
    backend.set(TOKEN_KEY, "fresh").unwrap();
    assert_eq!(backend.get(TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
}

#[test]
fn file_backend_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let backend = FileBackend::new(&path);
    backend.set(TOKEN_KEY, "abc").unwrap();
    backend.remove(TOKEN_KEY).unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["storage.json".to_owned()]);
}

// =============================================================================
// StorageEvent
// =============================================================================

#[test]
fn touches_session_for_token_user_and_unknown() {
    let event = |key: Option<&str>| StorageEvent { key: key.map(str::to_owned), new_value: None, source: None };
    assert!(event(Some(TOKEN_KEY)).touches_session());
    assert!(event(Some(USER_KEY)).touches_session());
    assert!(event(None).touches_session());
    assert!(!event(Some(LANGUAGE_KEY)).touches_session());
}

// =============================================================================
// Tabs and cross-tab notification
// =============================================================================

#[tokio::test]
async fn write_in_one_tab_is_visible_in_another() {
    let shared = SharedStorage::in_memory();
    let a = shared.open_tab();
    let b = shared.open_tab();
    assert_ne!(a.tab(), b.tab());

    a.set(TOKEN_KEY, "abc").unwrap();
    assert_eq!(b.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
}

#[tokio::test]
async fn other_tab_is_notified_of_set() {
    let shared = SharedStorage::in_memory();
    let a = shared.open_tab();
    let b = shared.open_tab();
    let mut b_events = b.subscribe();

    a.set(TOKEN_KEY, "abc").unwrap();

    let event = next_event(&mut b_events).await;
    assert_eq!(event.key.as_deref(), Some(TOKEN_KEY));
    assert_eq!(event.new_value.as_deref(), Some("abc"));
    assert_eq!(event.source, Some(a.tab()));
}

#[tokio::test]
async fn writer_does_not_hear_its_own_write() {
    let shared = SharedStorage::in_memory();
    let a = shared.open_tab();
    let mut a_events = a.subscribe();

    a.set(TOKEN_KEY, "abc").unwrap();
    assert_no_event(&mut a_events).await;
}

#[tokio::test]
async fn unchanged_value_publishes_nothing() {
    let shared = SharedStorage::in_memory();
    let a = shared.open_tab();
    let b = shared.open_tab();
    a.set(TOKEN_KEY, "abc").unwrap();
    let mut b_events = b.subscribe();

    a.set(TOKEN_KEY, "abc").unwrap();
    a.remove(USER_KEY).unwrap();
    assert_no_event(&mut b_events).await;
}

#[tokio::test]
async fn remove_is_notified_with_no_value() {
    let shared = SharedStorage::in_memory();
    let a = shared.open_tab();
    let b = shared.open_tab();
    a.set(USER_KEY, "{}").unwrap();
    let mut b_events = b.subscribe();

    a.remove(USER_KEY).unwrap();

    let event = next_event(&mut b_events).await;
    assert_eq!(event.key.as_deref(), Some(USER_KEY));
    assert_eq!(event.new_value, None);
}

#[tokio::test]
async fn lagging_listener_gets_keyless_event() {
    let shared = SharedStorage::in_memory();
    let a = shared.open_tab();
    let b = shared.open_tab();
    let mut b_events = b.subscribe();

    for i in 0..(EVENT_BUS_CAPACITY + 10) {
        a.set(LANGUAGE_KEY, &i.to_string()).unwrap();
    }

    let event = next_event(&mut b_events).await;
    assert_eq!(event.key, None);
    assert!(event.touches_session());
}
