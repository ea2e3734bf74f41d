//! External identity provider seam.
//!
//! The OTP endpoints want an identity-provider ID token in the
//! `Authorization` header, and Google sign-in produces one that the backend
//! exchanges for its own session. Both are fetched through
//! [`IdentityTokenSource`] so the wizard never depends on a concrete SDK.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::IdentityError;

#[async_trait]
pub trait IdentityTokenSource: Send + Sync {
    /// ID token for the current (possibly anonymous) identity, if any.
    async fn id_token(&self, force_refresh: bool) -> Result<Option<SecretString>, IdentityError>;

    /// Run the Google sign-in flow and return its ID token.
    async fn google_sign_in(&self) -> Result<SecretString, IdentityError>;
}

/// No identity provider configured. OTP requests go out without a token and
/// Google sign-in is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdentity;

#[async_trait]
impl IdentityTokenSource for NoIdentity {
    async fn id_token(&self, _force_refresh: bool) -> Result<Option<SecretString>, IdentityError> {
        Ok(None)
    }

    async fn google_sign_in(&self) -> Result<SecretString, IdentityError> {
        Err(IdentityError::Unavailable(
            "no identity provider configured".into(),
        ))
    }
}

/// Pre-issued tokens, e.g. from the environment or a test.
pub struct StaticIdentity {
    id_token: Option<String>,
    google_token: Option<String>,
}

impl StaticIdentity {
    pub fn new(id_token: Option<String>, google_token: Option<String>) -> Self {
        Self {
            id_token,
            google_token,
        }
    }
}

#[async_trait]
impl IdentityTokenSource for StaticIdentity {
    async fn id_token(&self, _force_refresh: bool) -> Result<Option<SecretString>, IdentityError> {
        Ok(self.id_token.clone().map(SecretString::from))
    }

    async fn google_sign_in(&self) -> Result<SecretString, IdentityError> {
        self.google_token
            .clone()
            .map(SecretString::from)
            .ok_or_else(|| IdentityError::OperationNotAllowed("google sign-in disabled".into()))
    }
}

/// Fetch an ID token for an optional side-call. Failures are logged and
/// turn into `None`; a provider that simply refuses the operation is not
/// worth a warning.
pub async fn optional_id_token(source: &dyn IdentityTokenSource) -> Option<SecretString> {
    match source.id_token(false).await {
        Ok(token) => token,
        Err(IdentityError::OperationNotAllowed(reason)) => {
            tracing::debug!(%reason, "Identity provider declined anonymous token");
            None
        }
        Err(e) => {
            tracing::warn!("Failed to fetch identity token: {}", e);
            None
        }
    }
}
