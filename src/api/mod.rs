//! Onboarding backend — the `Backend` trait and its HTTP implementation.

pub mod client;
pub mod identity;
pub mod tokens;
pub mod types;

pub use client::HttpBackend;
pub use identity::{IdentityTokenSource, NoIdentity, StaticIdentity, optional_id_token};
pub use tokens::TokenStore;
pub use types::{
    ActiveSubscription, AuthMe, AuthResponse, AuthUser, CheckoutSession, PlanInterval,
    PlanProduct, SubscriptionPlan,
};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::ApiError;
use crate::submission::FinishOnboardingPayload;

/// Remote REST backend the wizard talks to.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask the backend to e-mail a one-time code.
    async fn request_otp(&self, email: &str) -> Result<(), ApiError>;

    /// Exchange the code for a backend session. Tokens are stored on
    /// success.
    async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthResponse, ApiError>;

    async fn auth_me(&self) -> Result<AuthMe, ApiError>;

    /// `Ok(None)` when the user has no subscription.
    async fn active_subscription(&self) -> Result<Option<ActiveSubscription>, ApiError>;

    async fn subscription_plans(&self, limit: u32) -> Result<Vec<SubscriptionPlan>, ApiError>;

    async fn create_checkout(&self, price_id: &str) -> Result<CheckoutSession, ApiError>;

    async fn finish_onboarding(&self, payload: &FinishOnboardingPayload) -> Result<(), ApiError>;

    /// Trade an identity-provider ID token (Google sign-in) for a backend
    /// session.
    async fn exchange_identity_token(
        &self,
        id_token: &SecretString,
    ) -> Result<AuthResponse, ApiError>;

    /// Forget the backend session.
    async fn clear_session(&self);
}
