//! Frontend configuration

use crate::auth::LogoutReason;
use portal_core::config::{
    DEFAULT_ACTIVE_SESSION_KEY, DEFAULT_CHECK_INTERVAL_MS, DEFAULT_SNAPSHOT_KEY,
};

/// Authentication configuration
pub struct AuthConfig;

impl AuthConfig {
    /// Expiry check interval in milliseconds
    pub const SESSION_CHECK_INTERVAL_MS: u64 = DEFAULT_CHECK_INTERVAL_MS; // 1 minute

    /// Local storage key of the browser's active session id
    pub const ACTIVE_SESSION_KEY: &'static str = DEFAULT_ACTIVE_SESSION_KEY;

    /// Local storage key for auth state
    pub const AUTH_STATE_KEY: &'static str = DEFAULT_SNAPSHOT_KEY;

    /// Where the app sends a tab once it has no session
    pub const LOGIN_ROUTE: &'static str = "/login";

    /// Query parameter carrying the logout reason to the login page
    pub const REASON_PARAM: &'static str = "reason";

    /// Login URL for a tab that was just signed out
    ///
    /// User-initiated logouts carry no reason; the login page only explains
    /// logouts the user did not ask for.
    pub fn login_redirect(reason: LogoutReason) -> String {
        if reason.is_forced() {
            format!(
                "{}?{}={}",
                Self::LOGIN_ROUTE,
                Self::REASON_PARAM,
                reason.as_str()
            )
        } else {
            Self::LOGIN_ROUTE.to_string()
        }
    }
}
