//! # session
//!
//! Client-side authentication session for the Krishi Sakhi farmer app.
//!
//! The crate holds the bearer token and cached user record, resolves the
//! authoritative user from the backend profile endpoint, and exposes the
//! resulting session state to the rest of the client. Several "tabs" may share
//! one storage area; writes made by one tab are observed by the others and
//! trigger a fresh session check.
//!
//! Layering, leaf first: `storage` (token store) → `api` (profile fetcher and
//! backend calls) → `session` (state machine) → `sync` (cross-tab listener) →
//! `app` (client root container).

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod sync;
pub mod types;

pub use api::{AuthApi, HttpAuthApi};
pub use app::{ChannelNavigator, ClientRoot, Navigation, Navigator};
pub use config::{ApiConfig, ApiTimeouts};
pub use error::SessionError;
pub use session::{AuthState, AuthStatus, SessionStore};
pub use storage::{
    FileBackend, MemoryBackend, SharedStorage, StorageBackend, StorageError, StorageEvent, StorageEvents, TabId,
    TabStorage, TokenStore,
};
pub use sync::{SyncHandle, spawn_cross_tab_sync};
pub use types::{Activity, FarmerProfile, LoginData, LoginResponse, NewActivity, ProfileUpdate, RegisterData, RegisterResponse, User};
