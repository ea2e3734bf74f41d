//! Step sequencer — current position in a flow plus the navigation rules.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SequencerError;
use crate::sequencer::steps::{AccessContext, Flow, StepDef, StepEvent};

/// What a navigation call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Advanced,
    Retreated,
    /// A gate denied the target and the fallback step was entered instead.
    Redirected,
    Jumped,
    Stayed,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Advanced => write!(f, "advanced"),
            Self::Retreated => write!(f, "retreated"),
            Self::Redirected => write!(f, "redirected"),
            Self::Jumped => write!(f, "jumped"),
            Self::Stayed => write!(f, "stayed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub kind: TransitionKind,
}

impl Transition {
    fn stayed(at: usize) -> Self {
        Self {
            from: at,
            to: at,
            kind: TransitionKind::Stayed,
        }
    }

    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

/// Parse a deep-link `step` parameter. Anything that is not an in-range
/// index yields 0.
pub fn parse_step_param(raw: Option<&str>, total: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&i| i < total)
        .unwrap_or(0)
}

/// Ordered navigation over a [`Flow`].
#[derive(Debug, Clone)]
pub struct StepSequencer {
    flow: Flow,
    current: usize,
}

impl StepSequencer {
    pub fn new(flow: Flow) -> Self {
        Self { flow, current: 0 }
    }

    /// Start at a deep-linked step. The requested index is still subject to
    /// gating and skips, so an unverified user linking into a protected
    /// step lands on the fallback.
    pub fn with_deep_link(flow: Flow, raw: Option<&str>, ctx: &AccessContext) -> Self {
        let start = parse_step_param(raw, flow.len());
        let mut sequencer = Self::new(flow);
        if start > 0 {
            sequencer.current = sequencer.resolve_forward(start, ctx);
        }
        sequencer
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &StepDef {
        // `current` only ever holds an index produced from the flow itself.
        &self.flow.steps()[self.current]
    }

    pub fn total(&self) -> usize {
        self.flow.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.current + 1 == self.flow.len()
    }

    /// Advance to the next step that is not skipped. A denied gate
    /// redirects to the fallback step.
    pub fn go_next(&mut self, ctx: &AccessContext) -> Transition {
        if self.is_terminal() {
            return Transition::stayed(self.current);
        }
        let Some(target) = self.next_unskipped(self.current + 1, ctx) else {
            return Transition::stayed(self.current);
        };
        let kind = if self.gate_allows(target, ctx) {
            TransitionKind::Advanced
        } else {
            TransitionKind::Redirected
        };
        let to = match kind {
            TransitionKind::Redirected => self.flow.fallback_index(),
            _ => target,
        };
        self.move_to(to, kind)
    }

    /// Step back to the previous step that is not skipped. Never gated.
    pub fn go_back(&mut self, ctx: &AccessContext) -> Transition {
        let mut target = self.current;
        while target > 0 {
            target -= 1;
            if !self.flow.steps()[target].skip.applies(ctx) {
                return self.move_to(target, TransitionKind::Retreated);
            }
        }
        Transition::stayed(self.current)
    }

    /// Jump to an arbitrary index.
    pub fn go_to(
        &mut self,
        index: usize,
        ctx: &AccessContext,
    ) -> Result<Transition, SequencerError> {
        if index >= self.flow.len() {
            return Err(SequencerError::OutOfRange {
                index,
                total: self.flow.len(),
            });
        }
        let to = self.resolve_forward(index, ctx);
        let kind = if to == self.flow.fallback_index() && to != index {
            TransitionKind::Redirected
        } else {
            TransitionKind::Jumped
        };
        Ok(self.move_to(to, kind))
    }

    /// Advance if the current step declares `event` as its auto-advance
    /// trigger; otherwise stay put.
    pub fn on_event(&mut self, event: StepEvent, ctx: &AccessContext) -> Transition {
        if self.current_step().advance_on == Some(event) {
            debug!(step = %self.current_step().id, ?event, "Auto-advancing");
            self.go_next(ctx)
        } else {
            Transition::stayed(self.current)
        }
    }

    /// Re-check the current step against fresh session state, e.g. after
    /// logout or a Google sign-in.
    pub fn reevaluate(&mut self, ctx: &AccessContext) -> Transition {
        let to = self.resolve_forward(self.current, ctx);
        if to == self.current {
            return Transition::stayed(self.current);
        }
        let kind = if to == self.flow.fallback_index() {
            TransitionKind::Redirected
        } else {
            TransitionKind::Advanced
        };
        self.move_to(to, kind)
    }

    /// Where a request for `index` actually lands: first forward over
    /// skipped steps, then to the fallback if the gate denies.
    fn resolve_forward(&self, index: usize, ctx: &AccessContext) -> usize {
        let target = self.next_unskipped(index, ctx).unwrap_or(index);
        if self.gate_allows(target, ctx) {
            target
        } else {
            self.flow.fallback_index()
        }
    }

    fn next_unskipped(&self, from: usize, ctx: &AccessContext) -> Option<usize> {
        (from..self.flow.len()).find(|&i| !self.flow.steps()[i].skip.applies(ctx))
    }

    fn gate_allows(&self, index: usize, ctx: &AccessContext) -> bool {
        self.flow
            .step(index)
            .is_some_and(|step| step.gate.allows(ctx))
    }

    fn move_to(&mut self, to: usize, kind: TransitionKind) -> Transition {
        let from = self.current;
        self.current = to;
        let kind = if from == to {
            TransitionKind::Stayed
        } else {
            kind
        };
        debug!(
            flow = self.flow.name(),
            from,
            to,
            step = %self.current_step().id,
            %kind,
            "Step transition"
        );
        Transition { from, to, kind }
    }
}
