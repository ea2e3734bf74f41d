//! Partial updates for each profile section.
//!
//! A patch only carries the fields a step wants to change; `None` means
//! "leave as is". Nested measurement patches merge field by field, so a
//! patch that only sets a unit never clears the stored value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{
    Activity, AuthState, Demographics, Height, IdentityProvider, MainGoal, Metrics, ProfileFields,
    Rating, Sex, Subscription, Weight,
};
use crate::calc::units::{HeightUnit, WeightUnit};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthPatch {
    pub email: Option<String>,
    pub provider: Option<IdentityProvider>,
    pub is_verified: Option<bool>,
}

impl AuthPatch {
    pub fn apply(self, auth: &mut AuthState) {
        if let Some(email) = self.email {
            auth.email = email;
        }
        if let Some(provider) = self.provider {
            auth.provider = provider;
        }
        if let Some(verified) = self.is_verified {
            auth.is_verified = verified;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DemographicsPatch {
    pub sex: Option<Sex>,
    pub birthday: Option<NaiveDate>,
    pub main_goal: Option<MainGoal>,
    pub activities: Option<Vec<Activity>>,
}

impl DemographicsPatch {
    pub fn apply(self, demographics: &mut Demographics) {
        if let Some(sex) = self.sex {
            demographics.sex = sex;
        }
        if let Some(birthday) = self.birthday {
            demographics.birthday = Some(birthday);
        }
        if let Some(goal) = self.main_goal {
            demographics.main_goal = Some(goal);
        }
        if let Some(activities) = self.activities {
            let dropped = demographics.set_activities(activities);
            if dropped > 0 {
                tracing::warn!(dropped, "Ignored duplicate or surplus activities");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightPatch {
    pub value: Option<f64>,
    pub unit: Option<HeightUnit>,
}

impl HeightPatch {
    pub fn unit(unit: HeightUnit) -> Self {
        Self {
            value: None,
            unit: Some(unit),
        }
    }

    pub fn apply(self, height: &mut Height) {
        if let Some(value) = self.value {
            height.value = Some(value);
        }
        if let Some(unit) = self.unit {
            height.unit = unit;
        }
    }
}

impl From<Height> for HeightPatch {
    fn from(height: Height) -> Self {
        Self {
            value: height.value,
            unit: Some(height.unit),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightPatch {
    pub value: Option<f64>,
    pub unit: Option<WeightUnit>,
}

impl WeightPatch {
    pub fn unit(unit: WeightUnit) -> Self {
        Self {
            value: None,
            unit: Some(unit),
        }
    }

    pub fn apply(self, weight: &mut Weight) {
        if let Some(value) = self.value {
            weight.value = Some(value);
        }
        if let Some(unit) = self.unit {
            weight.unit = unit;
        }
    }
}

impl From<Weight> for WeightPatch {
    fn from(weight: Weight) -> Self {
        Self {
            value: weight.value,
            unit: Some(weight.unit),
        }
    }
}

/// Metric updates. BMI is not patchable: the store recomputes it whenever
/// height or current weight change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsPatch {
    pub height: Option<HeightPatch>,
    pub current_weight: Option<WeightPatch>,
    pub goal_weight: Option<WeightPatch>,
}

impl MetricsPatch {
    pub fn height(patch: impl Into<HeightPatch>) -> Self {
        Self {
            height: Some(patch.into()),
            ..Self::default()
        }
    }

    pub fn current_weight(patch: impl Into<WeightPatch>) -> Self {
        Self {
            current_weight: Some(patch.into()),
            ..Self::default()
        }
    }

    pub fn goal_weight(patch: impl Into<WeightPatch>) -> Self {
        Self {
            goal_weight: Some(patch.into()),
            ..Self::default()
        }
    }

    /// Whether this patch changes an input of the BMI calculation.
    pub fn touches_bmi_inputs(&self) -> bool {
        self.height.is_some() || self.current_weight.is_some()
    }

    pub fn apply(self, metrics: &mut Metrics) {
        if let Some(height) = self.height {
            height.apply(&mut metrics.height);
        }
        if let Some(weight) = self.current_weight {
            weight.apply(&mut metrics.current_weight);
        }
        if let Some(goal) = self.goal_weight {
            goal.apply(&mut metrics.goal_weight);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingPatch {
    pub stars: Option<u8>,
    pub dismissed: Option<bool>,
}

impl RatingPatch {
    pub fn apply(self, rating: &mut Rating) {
        if let Some(stars) = self.stars {
            rating.stars = Some(stars);
        }
        if let Some(dismissed) = self.dismissed {
            rating.dismissed = dismissed;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionPatch {
    pub selected_plan_id: Option<String>,
    pub selected_plan_label: Option<String>,
    pub has_active_subscription: Option<bool>,
    pub is_subscribed: Option<bool>,
}

impl SubscriptionPatch {
    pub fn apply(self, subscription: &mut Subscription) {
        if let Some(id) = self.selected_plan_id {
            subscription.selected_plan_id = Some(id);
        }
        if let Some(label) = self.selected_plan_label {
            subscription.selected_plan_label = Some(label);
        }
        if let Some(active) = self.has_active_subscription {
            subscription.has_active_subscription = active;
        }
        if let Some(subscribed) = self.is_subscribed {
            subscription.is_subscribed = subscribed;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub name: Option<String>,
}

impl ProfilePatch {
    pub fn apply(self, profile: &mut ProfileFields) {
        if let Some(username) = self.username {
            profile.username = username;
        }
        if let Some(bio) = self.bio {
            profile.bio = bio;
        }
        if let Some(name) = self.name {
            profile.name = name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_only_patch_keeps_value() {
        let mut metrics = Metrics::default();
        metrics.height = Height::new(170.0, HeightUnit::Cm);

        for _ in 0..2 {
            MetricsPatch::height(HeightPatch::unit(HeightUnit::In)).apply(&mut metrics);
            assert_eq!(metrics.height.value, Some(170.0));
            assert_eq!(metrics.height.unit, HeightUnit::In);
        }
    }

    #[test]
    fn sibling_sections_untouched() {
        let mut metrics = Metrics::default();
        metrics.goal_weight = Weight::new(60.0, WeightUnit::Kg);
        MetricsPatch::current_weight(Weight::new(150.0, WeightUnit::Lb)).apply(&mut metrics);
        assert_eq!(metrics.current_weight, Weight::new(150.0, WeightUnit::Lb));
        assert_eq!(metrics.goal_weight, Weight::new(60.0, WeightUnit::Kg));
    }

    #[test]
    fn touches_bmi_inputs() {
        assert!(MetricsPatch::height(HeightPatch::unit(HeightUnit::Cm)).touches_bmi_inputs());
        assert!(MetricsPatch::current_weight(WeightPatch::unit(WeightUnit::Kg)).touches_bmi_inputs());
        assert!(!MetricsPatch::goal_weight(WeightPatch::unit(WeightUnit::Kg)).touches_bmi_inputs());
    }

    #[test]
    fn auth_patch_merges_shallowly() {
        let mut auth = AuthState {
            email: "a@b.com".into(),
            provider: IdentityProvider::Email,
            is_verified: false,
        };
        AuthPatch {
            is_verified: Some(true),
            ..Default::default()
        }
        .apply(&mut auth);
        assert_eq!(auth.email, "a@b.com");
        assert_eq!(auth.provider, IdentityProvider::Email);
        assert!(auth.is_verified);
    }

    #[test]
    fn patch_deserializes_from_partial_json() {
        let patch: MetricsPatch =
            serde_json::from_str(r#"{"height": {"unit": "in"}}"#).unwrap();
        assert_eq!(patch.height, Some(HeightPatch::unit(HeightUnit::In)));
        assert!(patch.current_weight.is_none());
    }
}
