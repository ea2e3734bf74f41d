//! OnboardingStore — owns the `OnboardingProfile` and mirrors it to durable
//! storage after every mutation.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::calc::plan_preview::build_plan_preview;
use crate::profile::{
    AuthPatch, DemographicsPatch, MetricsPatch, OnboardingProfile, PlanPreview, ProfilePatch,
    RatingPatch, SubscriptionPatch,
};
use crate::store::traits::{KeyValueStore, storage_keys};

/// Single source of truth for the collected answers.
///
/// Persistence is best-effort: failures are logged and the in-memory profile
/// stays authoritative for the rest of the session.
pub struct OnboardingStore {
    kv: Arc<dyn KeyValueStore>,
    profile: OnboardingProfile,
}

impl OnboardingStore {
    /// Start with an empty profile without reading storage.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            profile: OnboardingProfile::default(),
        }
    }

    /// Rehydrate from storage. Missing or unreadable data yields an empty
    /// profile.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let profile = match kv.get(storage_keys::ONBOARDING_PROFILE).await {
            Ok(Some(value)) => {
                let profile = OnboardingProfile::from_snapshot(&value);
                tracing::info!(
                    verified = profile.auth.is_verified,
                    has_main_goal = profile.demographics.main_goal.is_some(),
                    has_height = profile.metrics.height.value.is_some(),
                    has_weight = profile.metrics.current_weight.value.is_some(),
                    "Rehydrated onboarding profile"
                );
                profile
            }
            Ok(None) => OnboardingProfile::default(),
            Err(e) => {
                tracing::warn!("Failed to read stored onboarding profile: {}", e);
                OnboardingProfile::default()
            }
        };
        Self { kv, profile }
    }

    pub fn profile(&self) -> &OnboardingProfile {
        &self.profile
    }

    pub async fn set_auth(&mut self, patch: AuthPatch) {
        patch.apply(&mut self.profile.auth);
        self.persist().await;
    }

    pub async fn set_demographics(&mut self, patch: DemographicsPatch) {
        patch.apply(&mut self.profile.demographics);
        self.persist().await;
    }

    /// Merge metric changes. BMI is recomputed whenever height or current
    /// weight are part of the patch.
    pub async fn set_metrics(&mut self, patch: MetricsPatch) {
        let refresh_bmi = patch.touches_bmi_inputs();
        patch.apply(&mut self.profile.metrics);
        if refresh_bmi {
            self.profile.metrics.refresh_bmi();
        }
        self.persist().await;
    }

    pub async fn set_rating(&mut self, patch: RatingPatch) {
        patch.apply(&mut self.profile.rating);
        self.persist().await;
    }

    pub async fn set_plan_preview(&mut self, preview: PlanPreview) {
        self.profile.plan_preview = preview;
        self.persist().await;
    }

    /// Regenerate the plan preview from the current demographics and metrics.
    pub async fn refresh_plan_preview(&mut self, today: NaiveDate) -> &PlanPreview {
        let preview =
            build_plan_preview(&self.profile.demographics, &self.profile.metrics, today);
        self.set_plan_preview(preview).await;
        &self.profile.plan_preview
    }

    pub async fn set_subscription(&mut self, patch: SubscriptionPatch) {
        patch.apply(&mut self.profile.subscription);
        self.persist().await;
    }

    pub async fn set_profile(&mut self, patch: ProfilePatch) {
        patch.apply(&mut self.profile.profile);
        self.persist().await;
    }

    /// Plain snapshot for backend submission; the birthday is an ISO date
    /// string or `null`.
    pub fn get_all(&self) -> serde_json::Value {
        self.profile.snapshot()
    }

    /// Restore every field to its initial value.
    pub async fn reset(&mut self) {
        self.profile = OnboardingProfile::default();
        self.persist().await;
        tracing::info!("Onboarding profile reset");
    }

    /// Last persisted step index, if any.
    pub async fn load_step(&self) -> Option<usize> {
        match self.kv.get(storage_keys::CURRENT_STEP).await {
            Ok(Some(value)) => value.as_u64().and_then(|v| usize::try_from(v).ok()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read stored step: {}", e);
                None
            }
        }
    }

    pub async fn save_step(&self, index: usize) {
        if let Err(e) = self
            .kv
            .set(storage_keys::CURRENT_STEP, &serde_json::json!(index))
            .await
        {
            tracing::warn!("Failed to persist current step: {}", e);
        }
    }

    pub async fn clear_step(&self) {
        if let Err(e) = self.kv.remove(storage_keys::CURRENT_STEP).await {
            tracing::warn!("Failed to clear stored step: {}", e);
        }
    }

    /// Write the profile snapshot. Failures are logged; the in-memory
    /// profile stays authoritative.
    async fn persist(&self) {
        let value = self.profile.snapshot();
        if let Err(e) = self.kv.set(storage_keys::ONBOARDING_PROFILE, &value).await {
            tracing::warn!("Failed to persist onboarding profile: {}", e);
        }
    }
}
