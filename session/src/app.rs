//! Client root container.
//!
//! DESIGN
//! ======
//! `ClientRoot` is the one place that wires storage, backend and session
//! together, the way a page-wide provider would in a browser. A "hard reload"
//! is modeled as dropping the whole root and booting a fresh one on the same
//! shared storage, so no in-memory state survives it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::AuthApi;
use crate::session::SessionStore;
use crate::storage::{SharedStorage, TabId, TabStorage};
use crate::sync::{SyncHandle, spawn_cross_tab_sync};

// =============================================================================
// NAVIGATION
// =============================================================================

/// Receives full-reload requests from the session (e.g. after logout).
pub trait Navigator: Send + Sync {
    fn hard_reload(&self, path: &str);
}

/// A reload request recorded by [`ChannelNavigator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
}

/// Forwards reload requests to whoever owns the receiving end.
#[derive(Clone, Debug)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Navigation>,
}

impl ChannelNavigator {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Navigation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn hard_reload(&self, path: &str) {
        if self.tx.send(Navigation { path: path.to_owned() }).is_err() {
            debug!(path, "reload requested after root was torn down");
        }
    }
}

// =============================================================================
// ROOT
// =============================================================================

pub struct ClientRoot {
    shared: SharedStorage,
    api: Arc<dyn AuthApi>,
    storage: TabStorage,
    session: Arc<SessionStore>,
    navigations: mpsc::UnboundedReceiver<Navigation>,
    sync: SyncHandle,
}

impl std::fmt::Debug for ClientRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRoot")
            .field("tab", &self.storage.tab())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ClientRoot {
    /// Open a new tab on `shared`, start cross-tab sync, and run the initial
    /// session check.
    pub async fn boot(shared: SharedStorage, api: Arc<dyn AuthApi>) -> Self {
        let storage = shared.open_tab();
        // Subscribe before the first check so no foreign write is missed.
        let events = storage.subscribe();
        let (navigator, navigations) = ChannelNavigator::new();
        let session = Arc::new(SessionStore::new(
            Arc::new(storage.clone()),
            Arc::clone(&api),
            Arc::new(navigator),
        ));
        let sync = spawn_cross_tab_sync(Arc::clone(&session), events);

        let state = session.check().await;
        info!(tab = %storage.tab(), authenticated = state.is_authenticated(), "client root booted");

        Self { shared, api, storage, session, navigations, sync }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    #[must_use]
    pub fn storage(&self) -> &TabStorage {
        &self.storage
    }

    #[must_use]
    pub fn tab(&self) -> TabId {
        self.storage.tab()
    }

    #[must_use]
    pub fn api(&self) -> &Arc<dyn AuthApi> {
        &self.api
    }

    /// A pending reload request, if the session asked for one.
    pub fn take_navigation(&mut self) -> Option<Navigation> {
        self.navigations.try_recv().ok()
    }

    /// Tear down every piece of in-memory state and boot a fresh root on the
    /// same shared storage.
    pub async fn reload(self) -> Self {
        let Self { shared, api, storage, session, navigations, sync } = self;
        info!(tab = %storage.tab(), "hard reload");
        drop(sync);
        drop(navigations);
        drop(session);
        drop(storage);
        Self::boot(shared, api).await
    }
}


#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
