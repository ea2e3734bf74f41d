//! Derived values computed from the collected answers.

pub mod bmi;
pub mod plan_preview;
pub mod progress;
pub mod units;
pub mod validation;
pub mod weight_goal;

pub use bmi::{BmiCategory, BmiReading, compute_bmi};
pub use plan_preview::{ChartPoint, Milestones, build_plan_preview};
pub use progress::{CraftingProgress, progress_percentage};
pub use units::{HeightUnit, WeightUnit};
pub use weight_goal::{GoalClassification, WeightChange, assess_goal};
