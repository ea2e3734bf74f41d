//! Declarative step tables.
//!
//! A flow variant is nothing more than an ordered list of [`StepDef`]s. The
//! sequencer logic is the same for every variant.

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;
use crate::profile::{IdentityProvider, OnboardingProfile};

/// Every step the wizard knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Welcome,
    Email,
    Otp,
    Sex,
    Birthday,
    MainGoal,
    Motivation,
    Activities,
    Height,
    Weight,
    Bmi,
    GoalWeight,
    Rating,
    Crafting,
    PlanPreview,
    Paywall,
    Username,
    Finish,
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Welcome => "welcome",
            Self::Email => "email",
            Self::Otp => "otp",
            Self::Sex => "sex",
            Self::Birthday => "birthday",
            Self::MainGoal => "main_goal",
            Self::Motivation => "motivation",
            Self::Activities => "activities",
            Self::Height => "height",
            Self::Weight => "weight",
            Self::Bmi => "bmi",
            Self::GoalWeight => "goal_weight",
            Self::Rating => "rating",
            Self::Crafting => "crafting",
            Self::PlanPreview => "plan_preview",
            Self::Paywall => "paywall",
            Self::Username => "username",
            Self::Finish => "finish",
        };
        write!(f, "{s}")
    }
}

/// The slice of session state the gating rules look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub is_verified: bool,
    pub provider: IdentityProvider,
    pub has_active_subscription: bool,
}

impl AccessContext {
    pub fn has_identity(&self) -> bool {
        self.is_verified || self.provider == IdentityProvider::Google
    }
}

impl From<&OnboardingProfile> for AccessContext {
    fn from(profile: &OnboardingProfile) -> Self {
        Self {
            is_verified: profile.auth.is_verified,
            provider: profile.auth.provider,
            has_active_subscription: profile.subscription.has_active_subscription,
        }
    }
}

/// Predicate evaluated before entering a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Public,
    /// Verified e-mail, or signed in with Google.
    RequiresIdentity,
}

impl Gate {
    pub fn allows(&self, ctx: &AccessContext) -> bool {
        match self {
            Self::Public => true,
            Self::RequiresIdentity => ctx.has_identity(),
        }
    }
}

/// Condition under which navigation passes over a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Never,
    /// Google sign-in already proved the identity; no code to enter.
    WhenGoogle,
    /// Nothing to sell to someone who already pays.
    WhenSubscribed,
}

impl Skip {
    pub fn applies(&self, ctx: &AccessContext) -> bool {
        match self {
            Self::Never => false,
            Self::WhenGoogle => ctx.provider == IdentityProvider::Google,
            Self::WhenSubscribed => ctx.has_active_subscription,
        }
    }
}

/// Internal events that dismiss a step without a "Next" click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEvent {
    IdentityVerified,
    CraftingComplete,
}

/// One row of a flow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDef {
    pub id: StepId,
    pub gate: Gate,
    pub skip: Skip,
    pub advance_on: Option<StepEvent>,
}

impl StepDef {
    pub const fn public(id: StepId) -> Self {
        Self {
            id,
            gate: Gate::Public,
            skip: Skip::Never,
            advance_on: None,
        }
    }

    pub const fn protected(id: StepId) -> Self {
        Self {
            id,
            gate: Gate::RequiresIdentity,
            skip: Skip::Never,
            advance_on: None,
        }
    }

    pub const fn skip_when(self, skip: Skip) -> Self {
        Self { skip, ..self }
    }

    pub const fn advance_on(self, event: StepEvent) -> Self {
        Self {
            advance_on: Some(event),
            ..self
        }
    }
}

const CLASSIC: &[StepDef] = &[
    StepDef::public(StepId::Welcome),
    StepDef::public(StepId::Email),
    StepDef::public(StepId::Otp)
        .skip_when(Skip::WhenGoogle)
        .advance_on(StepEvent::IdentityVerified),
    StepDef::protected(StepId::Sex),
    StepDef::protected(StepId::Birthday),
    StepDef::protected(StepId::MainGoal),
    StepDef::protected(StepId::Motivation),
    StepDef::protected(StepId::Activities),
    StepDef::protected(StepId::Height),
    StepDef::protected(StepId::Weight),
    StepDef::protected(StepId::Bmi),
    StepDef::protected(StepId::GoalWeight),
    StepDef::protected(StepId::Rating),
    StepDef::protected(StepId::Crafting).advance_on(StepEvent::CraftingComplete),
    StepDef::protected(StepId::PlanPreview),
];

const EXTENDED: &[StepDef] = &[
    StepDef::public(StepId::Welcome),
    StepDef::public(StepId::Email),
    StepDef::public(StepId::Otp)
        .skip_when(Skip::WhenGoogle)
        .advance_on(StepEvent::IdentityVerified),
    StepDef::protected(StepId::Sex),
    StepDef::protected(StepId::Birthday),
    StepDef::protected(StepId::MainGoal),
    StepDef::protected(StepId::Motivation),
    StepDef::protected(StepId::Activities),
    StepDef::protected(StepId::Height),
    StepDef::protected(StepId::Weight),
    StepDef::protected(StepId::Bmi),
    StepDef::protected(StepId::GoalWeight),
    StepDef::protected(StepId::Rating),
    StepDef::protected(StepId::Crafting).advance_on(StepEvent::CraftingComplete),
    StepDef::protected(StepId::PlanPreview),
    StepDef::protected(StepId::Paywall).skip_when(Skip::WhenSubscribed),
    StepDef::protected(StepId::Username),
    StepDef::protected(StepId::Finish),
];

/// Named step-list configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowVariant {
    /// Ends on the plan preview, where checkout happens.
    Classic,
    /// Adds a separate paywall, a username step and a finish screen.
    Extended,
}

impl Default for FlowVariant {
    fn default() -> Self {
        Self::Classic
    }
}

impl std::fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classic => write!(f, "classic"),
            Self::Extended => write!(f, "extended"),
        }
    }
}

impl std::str::FromStr for FlowVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "extended" => Ok(Self::Extended),
            other => Err(format!("unknown flow variant '{other}'")),
        }
    }
}

/// An ordered, validated list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    name: String,
    steps: Vec<StepDef>,
    fallback: usize,
}

impl Flow {
    /// Build a flow from a custom table. The table must contain an e-mail
    /// step, which is where failed gates redirect to.
    pub fn new(name: impl Into<String>, steps: Vec<StepDef>) -> Result<Self, SequencerError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(SequencerError::EmptyFlow { flow: name });
        }
        let fallback = steps
            .iter()
            .position(|s| s.id == StepId::Email)
            .ok_or_else(|| SequencerError::MissingFallback { flow: name.clone() })?;
        Ok(Self {
            name,
            steps,
            fallback,
        })
    }

    pub fn for_variant(variant: FlowVariant) -> Self {
        let table = match variant {
            FlowVariant::Classic => CLASSIC,
            FlowVariant::Extended => EXTENDED,
        };
        Self {
            name: variant.to_string(),
            steps: table.to_vec(),
            fallback: 1,
        }
    }

    pub fn classic() -> Self {
        Self::for_variant(FlowVariant::Classic)
    }

    pub fn extended() -> Self {
        Self::for_variant(FlowVariant::Extended)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&StepDef> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[StepDef] {
        &self.steps
    }

    pub fn index_of(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Index of the e-mail step that denied gates redirect to.
    pub fn fallback_index(&self) -> usize {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_put_email_at_fallback() {
        for flow in [Flow::classic(), Flow::extended()] {
            assert_eq!(flow.step(flow.fallback_index()).unwrap().id, StepId::Email);
            assert_eq!(flow.index_of(StepId::Otp), Some(2));
            assert_eq!(flow.index_of(StepId::Sex), Some(3));
        }
        assert_eq!(Flow::classic().len(), 15);
        assert_eq!(Flow::extended().len(), 18);
    }

    #[test]
    fn everything_after_otp_is_protected() {
        for flow in [Flow::classic(), Flow::extended()] {
            for (i, step) in flow.steps().iter().enumerate() {
                let expected = if i <= 2 { Gate::Public } else { Gate::RequiresIdentity };
                assert_eq!(step.gate, expected, "step {} in {}", step.id, flow.name());
            }
        }
    }

    #[test]
    fn custom_flow_validation() {
        assert_eq!(
            Flow::new("empty", vec![]),
            Err(SequencerError::EmptyFlow {
                flow: "empty".into()
            })
        );
        assert!(matches!(
            Flow::new("no-email", vec![StepDef::public(StepId::Welcome)]),
            Err(SequencerError::MissingFallback { .. })
        ));
        let flow = Flow::new(
            "short",
            vec![
                StepDef::public(StepId::Email),
                StepDef::protected(StepId::Finish),
            ],
        )
        .unwrap();
        assert_eq!(flow.fallback_index(), 0);
    }

    #[test]
    fn gates_and_skips() {
        let mut ctx = AccessContext::default();
        assert!(Gate::Public.allows(&ctx));
        assert!(!Gate::RequiresIdentity.allows(&ctx));
        assert!(!Skip::WhenGoogle.applies(&ctx));

        ctx.provider = IdentityProvider::Google;
        assert!(Gate::RequiresIdentity.allows(&ctx));
        assert!(Skip::WhenGoogle.applies(&ctx));

        ctx.has_active_subscription = true;
        assert!(Skip::WhenSubscribed.applies(&ctx));
        assert!(!Skip::Never.applies(&ctx));
    }

    #[test]
    fn variant_parsing() {
        assert_eq!("Extended".parse::<FlowVariant>(), Ok(FlowVariant::Extended));
        assert_eq!(" classic ".parse::<FlowVariant>(), Ok(FlowVariant::Classic));
        assert!("v3".parse::<FlowVariant>().is_err());
    }

    #[test]
    fn display_matches_serde() {
        for step in Flow::extended().steps() {
            let json = serde_json::to_string(&step.id).unwrap();
            assert_eq!(format!("\"{}\"", step.id), json);
        }
    }
}
