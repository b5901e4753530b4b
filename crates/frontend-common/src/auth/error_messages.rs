//! User-friendly error message mappings

use super::error::{AuthError, LogoutReason};

/// Message for the login surface after a session ended
pub fn logout_message(reason: LogoutReason) -> &'static str {
    match reason {
        LogoutReason::UserInitiated => "You have been signed out.",
        LogoutReason::Expired => "Your session timed out. Please sign in again.",
        LogoutReason::Superseded => {
            "You were signed in from another tab. Please sign in again to continue here."
        }
        LogoutReason::SignedOutElsewhere => "You signed out in another tab.",
    }
}

/// Convert auth errors to user-friendly messages
///
/// Validation messages come from the server and are shown as-is.
pub fn get_user_friendly_error(error: &AuthError) -> String {
    match error {
        AuthError::Validation(message) => message.clone(),
        AuthError::Backend(_) => {
            "We couldn't reach the sign-in service. Please try again.".to_string()
        }
        AuthError::InvalidTransition { .. } => {
            "This sign-in attempt is no longer valid. Please start again.".to_string()
        }
        AuthError::RevocationFailed(_) => error.to_string(),
    }
}
