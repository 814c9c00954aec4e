//! Authentication module for the client session.
//!
//! This module provides:
//! - `credential`: Local decoding of bearer credentials and their `exp` claim
//! - `SessionStore`: The single current session, persisted across restarts
//!
//! Local expiry checks only decide when to ask for a new login; the backend
//! remains responsible for rejecting expired or forged credentials.

pub mod credential;
pub mod session;

pub use credential::CredentialError;
pub use session::{Session, SessionError, SessionState, SessionStore, CREDENTIAL_KEY, SESSION_KEY};
