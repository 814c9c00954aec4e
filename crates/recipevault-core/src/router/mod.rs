//! In-app navigation gating.
//!
//! This module provides:
//! - `RouteTable`: The app's routes with their `requires_auth` flag
//! - `NavigationGuard`: Decides allow/redirect for every navigation attempt

pub mod guard;
pub mod routes;

pub use guard::{Navigation, NavigationGuard, RedirectReason};
pub use routes::{Route, RouteTable};
