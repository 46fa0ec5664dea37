//! Cross-tab synchronizer.
//!
//! Listens for storage changes made by other tabs and re-runs the session
//! check when the token or cached user moves. Consistency across tabs is
//! eventual: each tab converges after it processes the change.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::session::SessionStore;
use crate::storage::StorageEvents;

/// Owns the listener task. Dropping the handle stops the listener.
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl SyncHandle {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the listener for `session`, fed by the tab's storage `events`.
pub fn spawn_cross_tab_sync(session: Arc<SessionStore>, mut events: StorageEvents) -> SyncHandle {
    let task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !event.touches_session() {
                continue;
            }
            debug!(key = ?event.key, source = ?event.source, "session key changed in another tab; re-checking");
            session.check().await;
        }
        debug!("storage bus closed; cross-tab sync stopped");
    });
    SyncHandle { task }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
