//! Read-only view of where the wizard is, for front ends and the status API.

use serde::Serialize;

use crate::calc::progress_percentage;
use crate::sequencer::{FlowVariant, StepId};

/// The "n of 11" bar shown in the header of the questionnaire steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeaderProgress {
    pub position: usize,
    pub of: usize,
    pub percent: f64,
}

impl HeaderProgress {
    const FIRST_INDEX: usize = 3;
    const LAST_INDEX: usize = 13;
    const START_PERCENT: f64 = 20.0;

    /// Header progress for a step index; `None` outside the questionnaire.
    pub fn for_index(index: usize) -> Option<Self> {
        if !(Self::FIRST_INDEX..=Self::LAST_INDEX).contains(&index) {
            return None;
        }
        let of = Self::LAST_INDEX - Self::FIRST_INDEX + 1;
        let position = index - Self::FIRST_INDEX + 1;
        Some(Self {
            position,
            of,
            percent: progress_percentage(position, of, Self::START_PERCENT),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub flow: FlowVariant,
    pub index: usize,
    pub total: usize,
    pub step: StepId,
    pub header: Option<HeaderProgress>,
    pub can_go_back: bool,
    pub busy: bool,
    pub last_error: Option<String>,
    pub crafting_percent: Option<u8>,
    /// Set once the final submission succeeded and the session was reset.
    pub completed: bool,
}
