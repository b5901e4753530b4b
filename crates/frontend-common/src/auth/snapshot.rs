//! Persisted auth snapshot
//!
//! An explicit allow-list of the fields that survive a reload. Transient
//! fields (`is_logging_out`, `temp_token`) have no place in the type, so they
//! cannot leak into storage, and are ignored if an older snapshot carries them.

use super::state::{AuthState, AuthStatus};
use chrono::{DateTime, Utc};
use portal_core::{CoreResult, SessionId, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub session_id: Option<SessionId>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub session_expiry: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: DateTime<Utc>,
}

/// Project the persistable subset out of a live state
pub fn to_snapshot(state: &AuthState) -> AuthSnapshot {
    AuthSnapshot {
        user: state.user.clone(),
        is_authenticated: state.is_authenticated(),
        session_id: state.session_id.clone(),
        session_expiry: state.session_expiry,
        last_activity: state.last_activity,
    }
}

/// Decode a stored snapshot
///
/// # Errors
///
/// Returns `CoreError::Serialization` if `json` is not a snapshot
pub fn from_snapshot(json: &str) -> CoreResult<AuthSnapshot> {
    Ok(serde_json::from_str(json)?)
}

impl AuthSnapshot {
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the snapshot cannot be encoded
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuild an authenticated state, if the snapshot still describes a live session
    ///
    /// Requires the authenticated flag, a user, a session id, and an expiry
    /// later than `now`. The user's role is re-normalized.
    pub fn restore(&self, now: DateTime<Utc>) -> Option<AuthState> {
        if !self.is_authenticated {
            return None;
        }
        let user = self.user.clone()?;
        let session_id = self.session_id.clone()?;
        let expiry = self.session_expiry.filter(|expiry| now < *expiry)?;

        Some(AuthState {
            status: AuthStatus::Authenticated,
            user: Some(user.normalized()),
            session_id: Some(session_id),
            session_expiry: Some(expiry),
            last_activity: self.last_activity,
            temp_token: None,
            is_logging_out: false,
        })
    }
}
