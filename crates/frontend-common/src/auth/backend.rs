//! Auth endpoints consumed by the state machine
//!
//! Implemented by the HTTP layer; the state machine trusts what it returns.

use super::error::AuthError;
use async_trait::async_trait;
use portal_core::User;
use serde::{Deserialize, Serialize};

/// Server answer to a credential submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CredentialWire", into = "CredentialWire")]
pub enum CredentialResponse {
    /// A second factor is required; `temp_token` identifies the pending challenge
    TwoFactorRequired { temp_token: String },
    Authenticated { user: User },
}

impl CredentialResponse {
    pub fn two_factor(temp_token: impl Into<String>) -> Self {
        Self::TwoFactorRequired {
            temp_token: temp_token.into(),
        }
    }
}

/// JSON body of the credential endpoint
///
/// `requires2FA` decides the branch; a body carrying both a user and a
/// temp token is read by the flag, not by which fields happen to be present.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialWire {
    #[serde(rename = "requires2FA", default)]
    requires_two_factor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temp_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

impl TryFrom<CredentialWire> for CredentialResponse {
    type Error = String;

    fn try_from(wire: CredentialWire) -> Result<Self, Self::Error> {
        if wire.requires_two_factor {
            return wire
                .temp_token
                .map(|temp_token| Self::TwoFactorRequired { temp_token })
                .ok_or_else(|| "requires2FA without tempToken".to_string());
        }
        wire.user
            .map(|user| Self::Authenticated { user })
            .ok_or_else(|| "credential response carries no user".to_string())
    }
}

impl From<CredentialResponse> for CredentialWire {
    fn from(response: CredentialResponse) -> Self {
        match response {
            CredentialResponse::TwoFactorRequired { temp_token } => Self {
                requires_two_factor: true,
                temp_token: Some(temp_token),
                user: None,
            },
            CredentialResponse::Authenticated { user } => Self {
                user: Some(user),
                ..Self::default()
            },
        }
    }
}

#[async_trait(?Send)]
pub trait AuthBackend {
    /// Check an email/password pair
    async fn submit_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CredentialResponse, AuthError>;

    /// Check a second-factor code against the pending challenge
    async fn verify_code(&self, code: &str, temp_token: &str) -> Result<User, AuthError>;

    /// Ask the server to revoke the current session; best effort
    async fn revoke_session(&self) -> Result<(), AuthError>;

    /// Drop any access/refresh tokens the HTTP layer holds for this tab
    fn discard_tokens(&self);
}
