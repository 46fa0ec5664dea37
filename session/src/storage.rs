//! Token store: durable key/value storage shared by every tab of one profile.
//!
//! DESIGN
//! ======
//! A `SharedStorage` is one "browser profile": a durable backend plus a change
//! bus. Each tab gets its own `TabStorage` handle. Writes through a handle are
//! published on the bus and delivered to every OTHER tab's listener, matching
//! the browser `storage` event contract (the writer never hears its own write).
//!
//! TRADE-OFFS
//! ==========
//! The bus is a bounded `tokio::sync::broadcast`. A listener that falls behind
//! loses individual events and receives a single keyless event instead, which
//! callers treat as "something changed, re-check everything". Concurrent writes
//! from different tabs are last-write-wins at key granularity.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key holding the JSON-serialized cached user.
pub const USER_KEY: &str = "user";
/// UI language preference. Owned by the localization layer; the session core
/// never reads or writes it.
pub const LANGUAGE_KEY: &str = "krishi-sakhi-language";

const EVENT_BUS_CAPACITY: usize = 64;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is corrupt: {0}")]
    Corrupt(String),
    #[error("storage encode failed: {0}")]
    Encode(String),
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Durable key/value area. `set` and `remove` return the previous value so the
/// caller can tell whether anything actually changed.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<Option<String>, StorageError>;
    fn remove(&self, key: &str) -> Result<Option<String>, StorageError>;
}

/// Process-local backend. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<Option<String>, StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.insert(key.to_owned(), value.to_owned()))
    }

    fn remove(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key))
    }
}

/// Backend persisted as a single JSON object file.
///
/// Each write replaces the file through a temporary sibling + rename, so a
/// reader never observes a half-written file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load for a read-modify-write. A corrupt file is discarded so the next
    /// write can recover the store.
    fn load_for_write(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.load() {
            Err(StorageError::Corrupt(reason)) => {
                warn!(path = %self.path.display(), %reason, "discarding corrupt storage file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Encode(e.to_string()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load_for_write()?;
        let previous = entries.insert(key.to_owned(), value.to_owned());
        if previous.as_deref() != Some(value) {
            self.store(&entries)?;
        }
        Ok(previous)
    }

    fn remove(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load_for_write()?;
        let previous = entries.remove(key);
        if previous.is_some() {
            self.store(&entries)?;
        }
        Ok(previous)
    }
}

// =============================================================================
// CHANGE EVENTS
// =============================================================================

/// Identifies one tab (one client root) attached to a shared storage area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TabId(u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// A key change made by some tab.
///
/// `key == None` means the listener missed events and must assume any key
/// may have changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub new_value: Option<String>,
    pub source: Option<TabId>,
}

impl StorageEvent {
    fn unknown() -> Self {
        Self { key: None, new_value: None, source: None }
    }

    /// True when the change can affect the session (token, cached user, or unknown).
    #[must_use]
    pub fn touches_session(&self) -> bool {
        matches!(self.key.as_deref(), None | Some(TOKEN_KEY | USER_KEY))
    }
}

/// Listener registered by one tab. Yields only changes made by other tabs.
#[derive(Debug)]
pub struct StorageEvents {
    tab: TabId,
    rx: broadcast::Receiver<StorageEvent>,
}

impl StorageEvents {
    /// Wait for the next foreign change. Returns `None` once the storage area
    /// has been dropped by every holder.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.source == Some(self.tab) => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(tab = %self.tab, missed, "storage listener lagged; forcing full re-check");
                    return Some(StorageEvent::unknown());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// =============================================================================
// SHARED STORAGE / TABS
// =============================================================================

/// One profile's storage area: a backend plus the cross-tab change bus.
#[derive(Clone, Debug)]
pub struct SharedStorage {
    backend: Arc<dyn StorageBackend>,
    events: broadcast::Sender<StorageEvent>,
    next_tab: Arc<AtomicU64>,
}

impl SharedStorage {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { backend: Arc::new(backend), events, next_tab: Arc::new(AtomicU64::new(1)) }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(path))
    }

    /// Attach a new tab to this storage area.
    #[must_use]
    pub fn open_tab(&self) -> TabStorage {
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));
        debug!(%tab, "tab attached to storage");
        TabStorage { tab, shared: self.clone() }
    }

    fn publish(&self, tab: TabId, key: &str, new_value: Option<&str>) {
        let event = StorageEvent { key: Some(key.to_owned()), new_value: new_value.map(str::to_owned), source: Some(tab) };
        // No receivers is fine: nobody else is listening.
        let _ = self.events.send(event);
    }
}

/// Read/write access to the token store.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One tab's handle onto a [`SharedStorage`].
#[derive(Clone, Debug)]
pub struct TabStorage {
    tab: TabId,
    shared: SharedStorage,
}

impl TabStorage {
    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Register a listener for changes made by other tabs.
    #[must_use]
    pub fn subscribe(&self) -> StorageEvents {
        StorageEvents { tab: self.tab, rx: self.shared.events.subscribe() }
    }
}

impl TokenStore for TabStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.shared.backend.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self.shared.backend.set(key, value)?;
        if previous.as_deref() != Some(value) {
            self.shared.publish(self.tab, key, Some(value));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.shared.backend.remove(key)?.is_some() {
            self.shared.publish(self.tab, key, None);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
