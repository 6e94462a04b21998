//! Session credential lifecycle.
//!
//! This module owns everything with real invariants to protect: issuing the
//! access/refresh token pair, tracking the single valid refresh token per
//! principal, rotating it atomically on reissue, revoking it on logout, and
//! verifying access tokens on incoming requests.
//!
//! The identity provider exchange, the principal directory, and the session
//! store are collaborators behind trait seams; the [`session::SessionManager`]
//! orchestrates them.

pub mod config;
pub mod directory;
pub mod identity;
pub mod request;
pub mod session;
pub mod store;
pub mod token;

pub use config::AuthConfig;
pub use session::{AuthError, IssuedSession, SessionManager};

/// Numeric principal identifier, assigned by the principal directory.
pub type PrincipalId = i64;

/// Current unix time in seconds, the clock all token checks use.
pub(crate) fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}
