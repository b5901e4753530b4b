//! Per-tab authentication state

use chrono::{DateTime, Utc};
use portal_core::{SessionId, User};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Where the tab is in the login flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    #[default]
    Anonymous,
    /// Password accepted, waiting on a second-factor code
    AwaitingTwoFactor,
    Authenticated,
    /// Only observable while a forced logout is running
    Expired,
}

impl Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Anonymous => "anonymous",
            Self::AwaitingTwoFactor => "awaiting two-factor verification",
            Self::Authenticated => "authenticated",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Authentication state, one per tab
///
/// Mutated only through `AuthStateMachine`. `is_logging_out` and
/// `temp_token` are transient and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub status: AuthStatus,
    pub user: Option<User>,
    pub session_id: Option<SessionId>,
    pub session_expiry: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub temp_token: Option<String>,
    pub is_logging_out: bool,
}

impl AuthState {
    /// Fresh anonymous state as of `now`
    pub const fn anonymous(now: DateTime<Utc>) -> Self {
        Self {
            status: AuthStatus::Anonymous,
            user: None,
            session_id: None,
            session_expiry: None,
            last_activity: now,
            temp_token: None,
            is_logging_out: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    /// Nothing to tear down: no session, no pending second factor
    pub fn holds_nothing(&self) -> bool {
        self.status == AuthStatus::Anonymous
            && self.session_id.is_none()
            && self.temp_token.is_none()
    }

    /// Whether the session has run out as of `now`
    ///
    /// A missing expiry counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.session_expiry.is_none_or(|expiry| now >= expiry)
    }
}
