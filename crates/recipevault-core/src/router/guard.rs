//! The gate evaluated before every transition between views.
//!
//! Evaluation order, short-circuiting:
//! 1. restore the session store from storage (picks up logins/logouts made elsewhere)
//! 2. public route: allow
//! 3. protected route, no session: redirect to login
//! 4. protected route, expired session: clear the store, then redirect to login
//! 5. otherwise allow
//!
//! Step 4 is the only mutation the guard performs. Every evaluation yields
//! exactly one `Navigation`; the guard never fails.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::SessionStore;
use crate::storage::Storage;

use super::routes::{RouteTable, LOGIN_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub enum RedirectReason {
    NoSession,
    Expired,
}

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Navigation {
    Allow,
    Redirect {
        /// Login view to go to instead
        to: String,
        /// Originally requested path, for returning after login
        from: String,
        reason: RedirectReason,
    },
}

impl Navigation {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Navigation::Allow)
    }
}

#[derive(Debug, Clone)]
pub struct NavigationGuard {
    routes: RouteTable,
    login_path: String,
}

impl NavigationGuard {
    pub fn new(routes: RouteTable, login_path: &str) -> Self {
        Self {
            routes,
            login_path: login_path.to_string(),
        }
    }

    /// Guard over the RecipeVault route table, redirecting to `/login`
    pub fn recipe_vault() -> Self {
        Self::new(RouteTable::recipe_vault(), LOGIN_PATH)
    }

    /// Decide whether navigating to `path` proceeds.
    pub fn evaluate<S: Storage>(&self, store: &mut SessionStore<S>, path: &str) -> Navigation {
        store.restore();

        if !self.routes.requires_auth(path) {
            debug!(path, "Public route, allowing");
            return Navigation::Allow;
        }

        let Some(session) = store.current() else {
            info!(path, "No session, redirecting to login");
            return self.redirect(path, RedirectReason::NoSession);
        };

        if session.is_expired() {
            info!(path, username = %session.username, "Session expired, redirecting to login");
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to remove expired session from storage");
            }
            return self.redirect(path, RedirectReason::Expired);
        }

        debug!(path, username = %session.username, "Authenticated, allowing");
        Navigation::Allow
    }

    fn redirect(&self, from: &str, reason: RedirectReason) -> Navigation {
        Navigation::Redirect {
            to: self.login_path.clone(),
            from: from.to_string(),
            reason,
        }
    }
}
