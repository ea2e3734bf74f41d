//! Progress indicators: the header bar and the "crafting your plan" ticker.

/// Percentage for a progress bar that starts at `start_percentage` on the
/// first position and reaches 100 on the last.
pub fn progress_percentage(current: usize, total: usize, start_percentage: f64) -> f64 {
    if total <= 1 {
        return start_percentage;
    }
    let done = current.saturating_sub(1) as f64 / (total - 1) as f64;
    (start_percentage + done * (100.0 - start_percentage)).clamp(0.0, 100.0)
}

/// Labels shown next to the crafting ring, lit one by one.
pub const CRAFTING_STAGES: [&str; 4] = [
    "Reviewing your personal details",
    "Estimating your metabolic balance",
    "Tailoring plan to your schedule",
    "Choosing the best workouts for you",
];

/// Synthetic progress shown while the plan is "crafted".
///
/// Starts at 11 %, climbs 2 points per tick below 50 and 1 point per tick
/// below 95, then snaps to 100 and reports completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftingProgress {
    percent: u8,
    stage: usize,
}

impl CraftingProgress {
    pub const START: u8 = 11;

    pub fn new() -> Self {
        Self {
            percent: Self::START,
            stage: 0,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Index into [`CRAFTING_STAGES`] of the stage currently in progress.
    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }

    /// Advance one tick. Returns the new percentage.
    pub fn tick(&mut self) -> u8 {
        self.percent = match self.percent {
            p if p >= 95 => 100,
            p if p < Self::START => Self::START,
            p if p < 50 => p + 2,
            p => p + 1,
        };
        while self.stage < CRAFTING_STAGES.len() - 1
            && usize::from(self.percent) >= (self.stage + 1) * 25
        {
            self.stage += 1;
        }
        self.percent
    }
}

impl Default for CraftingProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_starts_at_offset_and_ends_full() {
        assert_eq!(progress_percentage(1, 11, 20.0), 20.0);
        assert_eq!(progress_percentage(11, 11, 20.0), 100.0);
        assert!((progress_percentage(6, 11, 20.0) - 60.0).abs() < 1e-9);
        assert_eq!(progress_percentage(1, 1, 20.0), 20.0);
    }

    #[test]
    fn crafting_runs_to_completion() {
        let mut progress = CraftingProgress::new();
        assert_eq!(progress.percent(), 11);
        let mut ticks = 0;
        while !progress.is_complete() {
            progress.tick();
            ticks += 1;
            assert!(ticks < 200, "ticker never completed");
        }
        assert_eq!(progress.percent(), 100);
        assert_eq!(progress.stage(), CRAFTING_STAGES.len() - 1);
        // 11→51 in 20 ticks, 51→95 in 44 ticks, then one snap to 100.
        assert_eq!(ticks, 65);
    }

    #[test]
    fn stages_follow_quarters() {
        let mut progress = CraftingProgress::new();
        assert_eq!(progress.stage(), 0);
        while progress.percent() < 25 {
            progress.tick();
        }
        assert_eq!(progress.stage(), 1);
        while progress.percent() < 50 {
            progress.tick();
        }
        assert_eq!(progress.stage(), 2);
    }
}
