//! Auth error taxonomy

use super::state::AuthStatus;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

/// Failures surfaced to the caller of an auth operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Bad credentials or a bad verification code; state is unchanged
    #[error("{0}")]
    Validation(String),

    /// The auth endpoint could not be reached or answered unexpectedly
    #[error("Auth service error: {0}")]
    Backend(String),

    /// Best-effort server-side revocation failed; never fatal to logout
    #[error("Session revocation failed: {0}")]
    RevocationFailed(String),

    /// The requested operation has no edge out of the current status
    #[error("Cannot {operation} while {status}")]
    InvalidTransition {
        status: AuthStatus,
        operation: &'static str,
    },
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub const fn invalid_transition(status: AuthStatus, operation: &'static str) -> Self {
        Self::InvalidTransition { status, operation }
    }

    /// Whether the user can fix this by re-entering what they typed
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Why a session ended
///
/// Forced logouts carry `Expired`, `Superseded` or `SignedOutElsewhere` so
/// the login surface can tell the user what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The user asked to sign out
    UserInitiated,
    /// The inactivity window elapsed
    Expired,
    /// Another tab took over the browser's single active session
    Superseded,
    /// Another tab signed out and emptied the active session slot
    SignedOutElsewhere,
}

impl LogoutReason {
    /// Reason marker appended to the login redirect
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserInitiated => "logout",
            Self::Expired => "expired",
            Self::Superseded => "superseded",
            Self::SignedOutElsewhere => "signed_out",
        }
    }

    pub const fn is_forced(self) -> bool {
        !matches!(self, Self::UserInitiated)
    }
}

impl Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
