//! Final onboarding submission — the collected profile in backend vocabulary.
//!
//! Absent fields are left out of the JSON body entirely, except `username`
//! and `bio`, which the backend expects to see even when `null`.

use chrono::NaiveDate;
use serde::Serialize;

use crate::profile::OnboardingProfile;

/// Body of `POST /users/finish-onboarding`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishOnboardingPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_goal: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_weight_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_weight_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmi_category: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_plan_id: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn height_unit_token(unit: crate::calc::HeightUnit) -> &'static str {
    match unit {
        crate::calc::HeightUnit::Cm => "CM",
        crate::calc::HeightUnit::In => "IN",
    }
}

fn weight_unit_token(unit: crate::calc::WeightUnit) -> &'static str {
    match unit {
        crate::calc::WeightUnit::Kg => "KG",
        crate::calc::WeightUnit::Lb => "LB",
    }
}

impl From<&OnboardingProfile> for FinishOnboardingPayload {
    fn from(p: &OnboardingProfile) -> Self {
        let metrics = &p.metrics;
        Self {
            email: non_empty(&p.auth.email),
            gender: p.demographics.sex.backend_token(),
            birthday: p.demographics.birthday,
            main_goal: p.demographics.main_goal.map(|g| g.backend_token()),
            activities: p
                .demographics
                .activities
                .iter()
                .map(|a| a.backend_token())
                .collect(),
            height: metrics.height.value,
            height_unit: metrics
                .height
                .value
                .map(|_| height_unit_token(metrics.height.unit)),
            current_weight: metrics.current_weight.value,
            current_weight_unit: metrics
                .current_weight
                .value
                .map(|_| weight_unit_token(metrics.current_weight.unit)),
            goal_weight: metrics.goal_weight.value,
            goal_weight_unit: metrics
                .goal_weight
                .value
                .map(|_| weight_unit_token(metrics.goal_weight.unit)),
            bmi: metrics.bmi.value.map(|v| crate::calc::units::round_to(v, 1)),
            bmi_category: metrics.bmi.category.map(|c| c.backend_token()),
            rating: p.rating.stars,
            selected_plan_id: p.subscription.selected_plan_id.clone(),
            username: non_empty(&p.profile.username),
            bio: non_empty(&p.profile.bio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::calc::{HeightUnit, WeightUnit};
    use crate::profile::{Activity, Height, MainGoal, Sex, Weight};

    #[test]
    fn empty_profile_keeps_only_username_and_bio() {
        let payload = FinishOnboardingPayload::from(&OnboardingProfile::default());
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"username": null, "bio": null})
        );
    }

    #[test]
    fn maps_to_backend_vocabulary() {
        let mut profile = OnboardingProfile::default();
        profile.auth.email = "jane@example.com".into();
        profile.demographics.sex = Sex::Female;
        profile.demographics.birthday = NaiveDate::from_ymd_opt(1990, 5, 17);
        profile.demographics.main_goal = Some(MainGoal::FindSelfLove);
        profile
            .demographics
            .set_activities(vec![Activity::GeneralFitness, Activity::Yoga]);
        profile.metrics.height = Height::new(66.0, HeightUnit::In);
        profile.metrics.current_weight = Weight::new(220.0, WeightUnit::Lb);
        profile.metrics.goal_weight = Weight::new(90.0, WeightUnit::Kg);
        profile.metrics.refresh_bmi();
        profile.rating.stars = Some(5);
        profile.profile.username = "jane".into();

        let value = serde_json::to_value(FinishOnboardingPayload::from(&profile)).unwrap();
        assert_eq!(value["gender"], "FEMALE");
        assert_eq!(value["birthday"], "1990-05-17");
        assert_eq!(value["mainGoal"], "FIND_SELF_LOVE");
        assert_eq!(value["activities"], json!(["GENERAL_FITNESS", "YOGA"]));
        assert_eq!(value["heightUnit"], "IN");
        assert_eq!(value["currentWeightUnit"], "LB");
        assert_eq!(value["goalWeightUnit"], "KG");
        assert_eq!(value["bmi"], 35.5);
        assert_eq!(value["bmiCategory"], "OBESE");
        assert_eq!(value["rating"], 5);
        assert_eq!(value["username"], "jane");
        assert!(value["bio"].is_null());
        assert!(value.get("selectedPlanId").is_none());
    }

    #[test]
    fn unset_sex_is_stripped() {
        let mut profile = OnboardingProfile::default();
        profile.demographics.sex = Sex::Unset;
        let value = serde_json::to_value(FinishOnboardingPayload::from(&profile)).unwrap();
        assert!(value.get("gender").is_none());
        assert!(value.get("heightUnit").is_none());
    }
}
