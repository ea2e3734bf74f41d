//! `KeyValueStore` trait — the durable client-side storage the wizard
//! survives reloads with.

use async_trait::async_trait;

use crate::error::StorageError;

/// Keys used for durable wizard state.
pub mod storage_keys {
    /// Serialized `OnboardingProfile` snapshot.
    pub const ONBOARDING_PROFILE: &str = "onboarding-storage";
    /// Current step index (only written when step persistence is enabled).
    pub const CURRENT_STEP: &str = "onboarding-step";
    /// Backend access token.
    pub const ACCESS_TOKEN: &str = "backendAccessToken";
    /// Backend refresh token.
    pub const REFRESH_TOKEN: &str = "backendRefreshToken";
}

/// Backend-agnostic durable key-value storage holding JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key was never written.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Insert or overwrite a value.
    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError>;

    /// Delete a value. Returns whether the key existed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}
