//! Goal-weight assessment: how ambitious the chosen goal is.

use serde::{Deserialize, Serialize};

use super::units::{WeightUnit, kg_to_unit, round_to, weight_to_kg};

/// Tolerance for the percentage thresholds so unit conversions that land a
/// hair above 10 % or 20 % still fall in the lower band.
const PERCENT_EPSILON: f64 = 1e-9;

/// Framing selected for the goal-weight encouragement copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalClassification {
    EasyWin,
    SteadyProgress,
    StrongTransformation,
    HealthyStrength,
}

impl GoalClassification {
    pub fn headline(&self) -> &'static str {
        match self {
            Self::EasyWin => "Easy win",
            Self::SteadyProgress => "Steady progress",
            Self::StrongTransformation => "Strong transformation",
            Self::HealthyStrength => "Healthy strength",
        }
    }

    pub fn encouragement(&self) -> &'static str {
        match self {
            Self::EasyWin => "A realistic target. You'll feel the difference within weeks.",
            Self::SteadyProgress => "A meaningful change. Consistency will carry you there.",
            Self::StrongTransformation => {
                "A big goal. We'll break it into milestones so every week counts."
            }
            Self::HealthyStrength => "Gaining healthy weight builds strength and energy.",
        }
    }
}

impl std::fmt::Display for GoalClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.headline())
    }
}

/// Result of comparing the current weight with the goal weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightChange {
    /// `|current − goal| / current × 100`, computed in kilograms.
    pub percent_difference: f64,
    pub classification: GoalClassification,
}

/// Classify the distance between `current` and `goal`.
///
/// Returns `None` if either weight is missing or the current weight is not
/// positive.
pub fn assess_goal(
    current: Option<f64>,
    current_unit: WeightUnit,
    goal: Option<f64>,
    goal_unit: WeightUnit,
) -> Option<WeightChange> {
    let current_kg = weight_to_kg(current.filter(|c| *c > 0.0)?, current_unit);
    let goal_kg = weight_to_kg(goal?, goal_unit);

    let percent_difference = (current_kg - goal_kg).abs() * 100.0 / current_kg;
    let classification = if goal_kg > current_kg && percent_difference > PERCENT_EPSILON {
        GoalClassification::HealthyStrength
    } else if percent_difference <= 10.0 + PERCENT_EPSILON {
        GoalClassification::EasyWin
    } else if percent_difference <= 20.0 + PERCENT_EPSILON {
        GoalClassification::SteadyProgress
    } else {
        GoalClassification::StrongTransformation
    };

    Some(WeightChange {
        percent_difference,
        classification,
    })
}

/// Ten percent of the current weight, expressed in `display_unit` and rounded
/// to one decimal. Shown as the suggested first milestone.
pub fn ten_percent_loss(current: Option<f64>, current_unit: WeightUnit, display_unit: WeightUnit) -> Option<f64> {
    let kg = weight_to_kg(current.filter(|c| *c > 0.0)?, current_unit);
    Some(round_to(kg_to_unit(kg, display_unit) * 0.1, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kg(current: f64, goal: f64) -> WeightChange {
        assess_goal(Some(current), WeightUnit::Kg, Some(goal), WeightUnit::Kg).unwrap()
    }

    #[test]
    fn exactly_ten_percent_is_easy_win() {
        let change = kg(90.0, 81.0);
        assert!((change.percent_difference - 10.0).abs() < 1e-9);
        assert_eq!(change.classification, GoalClassification::EasyWin);
    }

    #[test]
    fn loss_bands() {
        assert_eq!(kg(100.0, 95.0).classification, GoalClassification::EasyWin);
        assert_eq!(kg(100.0, 85.0).classification, GoalClassification::SteadyProgress);
        assert_eq!(kg(100.0, 80.0).classification, GoalClassification::SteadyProgress);
        assert_eq!(kg(100.0, 79.0).classification, GoalClassification::StrongTransformation);
    }

    #[test]
    fn gain_and_equal() {
        assert_eq!(kg(60.0, 65.0).classification, GoalClassification::HealthyStrength);
        let equal = kg(70.0, 70.0);
        assert_eq!(equal.percent_difference, 0.0);
        assert_eq!(equal.classification, GoalClassification::EasyWin);
    }

    #[test]
    fn mixed_units_compare_in_kg() {
        // 200 lb ≈ 90.72 kg; goal 80 kg is ≈11.8 % below.
        let change =
            assess_goal(Some(200.0), WeightUnit::Lb, Some(80.0), WeightUnit::Kg).unwrap();
        assert_eq!(change.classification, GoalClassification::SteadyProgress);
    }

    #[test]
    fn missing_weights() {
        assert!(assess_goal(None, WeightUnit::Kg, Some(60.0), WeightUnit::Kg).is_none());
        assert!(assess_goal(Some(60.0), WeightUnit::Kg, None, WeightUnit::Kg).is_none());
    }

    #[test]
    fn ten_percent_suggestion() {
        assert_eq!(ten_percent_loss(Some(80.0), WeightUnit::Kg, WeightUnit::Kg), Some(8.0));
        // 80 kg in lb = 176.37, 10 % = 17.6
        assert_eq!(ten_percent_loss(Some(80.0), WeightUnit::Kg, WeightUnit::Lb), Some(17.6));
        assert_eq!(ten_percent_loss(None, WeightUnit::Kg, WeightUnit::Kg), None);
    }
}
