//! REST API module for the RecipeVault backend.
//!
//! This module provides the `ApiClient` for talking to the backend, the
//! `AuthService` contract the session store logs in through, and the
//! `RequestAuthenticator` that stamps outgoing requests with the current
//! session's bearer credential.

pub mod authenticator;
pub mod client;
pub mod error;

pub use authenticator::RequestAuthenticator;
pub use client::{ApiClient, AuthService};
pub use error::ApiError;
