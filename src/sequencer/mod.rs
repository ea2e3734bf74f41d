//! Flow tables and step navigation.

#[allow(clippy::module_inception)]
pub mod sequencer;
pub mod steps;

pub use sequencer::{StepSequencer, Transition, TransitionKind, parse_step_param};
pub use steps::{AccessContext, Flow, FlowVariant, Gate, Skip, StepDef, StepEvent, StepId};
