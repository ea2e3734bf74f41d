//! The onboarding aggregate and its sections.
//!
//! Field names serialize in camelCase so persisted snapshots keep the same
//! shape the web client stored under `onboarding-storage`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::calc::bmi::{BmiCategory, compute_bmi};
use crate::calc::plan_preview::ChartPoint;
use crate::calc::units::{HeightUnit, WeightUnit, height_to_meters, weight_to_kg};

/// Maximum number of activities a user can pick.
pub const MAX_ACTIVITIES: usize = 3;

/// How the user proved who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityProvider {
    None,
    Email,
    Google,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Unset,
    Male,
    Female,
    Other,
}

impl Default for Sex {
    fn default() -> Self {
        Self::Unset
    }
}

impl Sex {
    /// Backend gender token; `None` while unset.
    pub fn backend_token(&self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Male => Some("MALE"),
            Self::Female => Some("FEMALE"),
            Self::Other => Some("OTHER"),
        }
    }
}

/// Main goal picked on the goal step. Serialized with the web client's ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MainGoal {
    LoseWeight,
    FindSelfLove,
    BuildMuscle,
    KeepFit,
}

impl MainGoal {
    pub const ALL: [MainGoal; 4] = [
        Self::LoseWeight,
        Self::FindSelfLove,
        Self::BuildMuscle,
        Self::KeepFit,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::LoseWeight => "Lose Weight",
            Self::FindSelfLove => "Find Self-Love",
            Self::BuildMuscle => "Build Muscle",
            Self::KeepFit => "Keep fit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LoseWeight | Self::FindSelfLove => "Drop extra pounds without stress",
            Self::BuildMuscle => "Strengthen and define your muscles",
            Self::KeepFit => "Stay in shape, balanced & confident",
        }
    }

    pub fn backend_token(&self) -> &'static str {
        match self {
            Self::LoseWeight => "LOSE_WEIGHT",
            Self::FindSelfLove => "FIND_SELF_LOVE",
            Self::BuildMuscle => "BUILD_MUSCLE",
            Self::KeepFit => "KEEP_FIT",
        }
    }
}

/// Activities offered on the interests step. Serialized by display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    Pilates,
    #[serde(rename = "General Fitness")]
    GeneralFitness,
    Yoga,
    Walking,
    Stretching,
}

impl Activity {
    pub const ALL: [Activity; 5] = [
        Self::Pilates,
        Self::GeneralFitness,
        Self::Yoga,
        Self::Walking,
        Self::Stretching,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pilates => "Pilates",
            Self::GeneralFitness => "General Fitness",
            Self::Yoga => "Yoga",
            Self::Walking => "Walking",
            Self::Stretching => "Stretching",
        }
    }

    pub fn backend_token(&self) -> &'static str {
        match self {
            Self::Pilates => "PILATES",
            Self::GeneralFitness => "GENERAL_FITNESS",
            Self::Yoga => "YOGA",
            Self::Walking => "WALKING",
            Self::Stretching => "STRETCHING",
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthState {
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub provider: IdentityProvider,
    pub is_verified: bool,
}

impl AuthState {
    /// Whether the user may enter protected steps. Google sign-in carries its
    /// own proof of identity and bypasses the OTP step.
    pub fn has_access(&self) -> bool {
        self.is_verified || self.provider == IdentityProvider::Google
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Demographics {
    #[serde(deserialize_with = "null_as_default")]
    pub sex: Sex,
    #[serde(deserialize_with = "lenient_date")]
    pub birthday: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_option")]
    pub main_goal: Option<MainGoal>,
    pub activities: Vec<Activity>,
}

impl Demographics {
    /// Replace the activity list, dropping duplicates and anything past
    /// [`MAX_ACTIVITIES`]. Returns how many entries were dropped.
    pub fn set_activities(&mut self, activities: Vec<Activity>) -> usize {
        let requested = activities.len();
        let mut kept: Vec<Activity> = Vec::with_capacity(MAX_ACTIVITIES);
        for activity in activities {
            if kept.len() < MAX_ACTIVITIES && !kept.contains(&activity) {
                kept.push(activity);
            }
        }
        self.activities = kept;
        requested - self.activities.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Height {
    pub value: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub unit: HeightUnit,
}

impl Height {
    pub fn new(value: f64, unit: HeightUnit) -> Self {
        Self {
            value: Some(value),
            unit,
        }
    }

    pub fn meters(&self) -> Option<f64> {
        self.value.map(|v| height_to_meters(v, self.unit))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weight {
    pub value: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub unit: WeightUnit,
}

impl Weight {
    pub fn new(value: f64, unit: WeightUnit) -> Self {
        Self {
            value: Some(value),
            unit,
        }
    }

    pub fn kilograms(&self) -> Option<f64> {
        self.value.map(|v| weight_to_kg(v, self.unit))
    }
}

/// Cached BMI. Derived from height and current weight; never set directly by
/// a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bmi {
    pub value: Option<f64>,
    #[serde(deserialize_with = "lenient_option")]
    pub category: Option<BmiCategory>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Metrics {
    pub height: Height,
    pub current_weight: Weight,
    pub goal_weight: Weight,
    pub bmi: Bmi,
}

impl Metrics {
    /// Recompute the cached BMI from height and current weight. Clears the
    /// cache when either input is missing.
    pub fn refresh_bmi(&mut self) {
        self.bmi = match compute_bmi(
            self.height.value,
            self.height.unit,
            self.current_weight.value,
            self.current_weight.unit,
        ) {
            Some(reading) => Bmi {
                value: Some(reading.value),
                category: Some(reading.category),
            },
            None => Bmi::default(),
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rating {
    pub stars: Option<u8>,
    pub dismissed: bool,
}

/// Display data for the plan preview. Regenerated from demographics and
/// metrics; not authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanPreview {
    pub duration_weeks: Option<u32>,
    pub goal_label: Option<String>,
    pub interests_label: Option<String>,
    pub chart: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Subscription {
    pub selected_plan_id: Option<String>,
    pub selected_plan_label: Option<String>,
    pub has_active_subscription: bool,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub username: String,
    pub bio: String,
    pub name: String,
}

/// Everything the wizard collects for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnboardingProfile {
    pub auth: AuthState,
    #[serde(alias = "aboutYou")]
    pub demographics: Demographics,
    pub metrics: Metrics,
    pub rating: Rating,
    pub plan_preview: PlanPreview,
    pub subscription: Subscription,
    pub profile: ProfileFields,
}

impl OnboardingProfile {
    /// Plain JSON snapshot. The birthday is rendered as an ISO-8601 date
    /// string, or `null`.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize onboarding profile: {}", e);
            serde_json::Value::Null
        })
    }

    /// Rebuild a profile from a stored snapshot.
    ///
    /// Never fails: a section that does not parse falls back to its default
    /// and the rest of the snapshot is kept.
    pub fn from_snapshot(value: &serde_json::Value) -> Self {
        if let Ok(profile) = serde_json::from_value::<Self>(value.clone()) {
            return profile;
        }

        let Some(obj) = value.as_object() else {
            tracing::warn!("Stored onboarding profile is not an object; starting fresh");
            return Self::default();
        };

        let demographics_key = if obj.contains_key("demographics") {
            "demographics"
        } else {
            "aboutYou"
        };

        Self {
            auth: section(obj, "auth"),
            demographics: section(obj, demographics_key),
            metrics: section(obj, "metrics"),
            rating: section(obj, "rating"),
            plan_preview: section(obj, "planPreview"),
            subscription: section(obj, "subscription"),
            profile: section(obj, "profile"),
        }
    }
}

fn section<T: DeserializeOwned + Default>(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> T {
    match obj.get(key) {
        None => T::default(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            tracing::warn!(section = key, "Discarding malformed stored section: {}", e);
            T::default()
        }),
    }
}

/// Parse an ISO date (`1990-05-17`) or a full RFC 3339 timestamp.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

fn lenient_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse_iso_date))
}

fn lenient_option<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
