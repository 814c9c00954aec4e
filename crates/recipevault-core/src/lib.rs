//! RecipeVault client core.
//!
//! Owns the authenticated-user session for the RecipeVault recipe-sharing
//! client: decoding bearer credentials, persisting the session across
//! restarts, stamping API requests with the credential, and gating
//! navigation to views that need a login.
//!
//! ```text
//! start -> SessionStore::restore -> NavigationGuard::evaluate -> allow | redirect /login
//!       -> SessionStore::login (AuthService) -> adopt -> RequestAuthenticator on every call
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod router;
pub mod storage;

pub use api::{ApiClient, ApiError, AuthService, RequestAuthenticator};
pub use auth::{Session, SessionError, SessionState, SessionStore};
pub use config::Config;
pub use router::{Navigation, NavigationGuard, RedirectReason, Route, RouteTable};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
