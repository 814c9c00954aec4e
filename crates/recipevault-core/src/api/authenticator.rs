//! Attaches the current session's credential to outgoing requests.
//!
//! Expiry is deliberately not checked here: an expired credential that is
//! still held is sent as-is and the server rejects it. Callers react to the
//! resulting `ApiError::Unauthorized` by clearing the session.

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::auth::Session;

use super::ApiError;

/// Builds the authorization headers for one request from a borrowed session.
#[derive(Debug, Clone, Copy)]
pub struct RequestAuthenticator<'a> {
    session: Option<&'a Session>,
}

impl<'a> RequestAuthenticator<'a> {
    pub fn new(session: Option<&'a Session>) -> Self {
        Self { session }
    }

    /// Merge `Authorization: Bearer <credential>` into `headers` when a session is present.
    /// Without a session the headers are left untouched.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), ApiError> {
        if let Some(session) = self.session {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", session.credential))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(())
    }

    /// Header map to merge into a request before dispatch
    pub fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        self.apply(&mut headers)?;
        Ok(headers)
    }
}
