//! The onboarding profile: the single aggregate every step reads and writes.

pub mod model;
pub mod patch;

pub use model::{
    Activity, AuthState, Bmi, Demographics, Height, IdentityProvider, MAX_ACTIVITIES, MainGoal,
    Metrics, OnboardingProfile, PlanPreview, ProfileFields, Rating, Sex, Subscription, Weight,
};
pub use patch::{
    AuthPatch, DemographicsPatch, HeightPatch, MetricsPatch, ProfilePatch, RatingPatch,
    SubscriptionPatch, WeightPatch,
};
