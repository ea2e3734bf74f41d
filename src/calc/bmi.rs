//! Body Mass Index.

use serde::{Deserialize, Serialize};

use super::units::{HeightUnit, WeightUnit, height_to_meters, weight_to_kg};

/// BMI band. Bounds are half-open: `[18.5, 25)` is normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub const UNDERWEIGHT_BELOW: f64 = 18.5;
    pub const OVERWEIGHT_FROM: f64 = 25.0;
    pub const OBESE_FROM: f64 = 30.0;

    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < Self::UNDERWEIGHT_BELOW {
            Self::Underweight
        } else if bmi < Self::OVERWEIGHT_FROM {
            Self::Normal
        } else if bmi < Self::OBESE_FROM {
            Self::Overweight
        } else {
            Self::Obese
        }
    }

    /// Upper-case token used by the backend.
    pub fn backend_token(&self) -> &'static str {
        match self {
            Self::Underweight => "UNDERWEIGHT",
            Self::Normal => "NORMAL",
            Self::Overweight => "OVERWEIGHT",
            Self::Obese => "OBESE",
        }
    }

    /// One-line summary shown under the BMI gauge.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Underweight => "You're below the healthy range. We'll focus on building strength safely.",
            Self::Normal => "You're in the healthy range. Let's keep you there and get you toned.",
            Self::Overweight => "You're slightly above the healthy range. Small daily steps add up fast.",
            Self::Obese => "Your BMI is high. A gentle, steady plan will get you moving in the right direction.",
        }
    }
}

impl std::fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Underweight => "underweight",
            Self::Normal => "normal",
            Self::Overweight => "overweight",
            Self::Obese => "obese",
        };
        write!(f, "{s}")
    }
}

/// A computed BMI value with its band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BmiReading {
    pub value: f64,
    pub category: BmiCategory,
}

/// Compute BMI from a height and weight in any supported units.
///
/// Returns `None` when either measurement is missing or not positive.
pub fn compute_bmi(
    height: Option<f64>,
    height_unit: HeightUnit,
    weight: Option<f64>,
    weight_unit: WeightUnit,
) -> Option<BmiReading> {
    let height = height.filter(|h| *h > 0.0)?;
    let weight = weight.filter(|w| *w > 0.0)?;
    let meters = height_to_meters(height, height_unit);
    let kg = weight_to_kg(weight, weight_unit);
    let value = kg / (meters * meters);
    Some(BmiReading {
        value,
        category: BmiCategory::from_bmi(value),
    })
}

/// Position of `bmi` on the gauge (15..40) as a percentage, clamped to 0..=100.
pub fn gauge_position(bmi: f64) -> f64 {
    const SCALE_MIN: f64 = 15.0;
    const SCALE_MAX: f64 = 40.0;
    (((bmi - SCALE_MIN) / (SCALE_MAX - SCALE_MIN)) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bmi(h: f64, hu: HeightUnit, w: f64, wu: WeightUnit) -> BmiReading {
        compute_bmi(Some(h), hu, Some(w), wu).unwrap()
    }

    #[test]
    fn invariant_under_unit_choice() {
        let metric = bmi(170.0, HeightUnit::Cm, 70.0, WeightUnit::Kg);
        let imperial = bmi(66.93, HeightUnit::In, 154.32, WeightUnit::Lb);
        assert!((metric.value - 24.22).abs() < 0.01, "{}", metric.value);
        assert!((metric.value - imperial.value).abs() < 0.01);
        assert_eq!(metric.category, imperial.category);
    }

    #[test]
    fn category_boundaries_are_half_open() {
        assert_eq!(BmiCategory::from_bmi(18.4999), BmiCategory::Underweight);
        assert_eq!(BmiCategory::from_bmi(18.5), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(24.999), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(25.0), BmiCategory::Overweight);
        assert_eq!(BmiCategory::from_bmi(29.999), BmiCategory::Overweight);
        assert_eq!(BmiCategory::from_bmi(30.0), BmiCategory::Obese);
    }

    #[test]
    fn imperial_obese_example() {
        let reading = bmi(66.0, HeightUnit::In, 220.0, WeightUnit::Lb);
        assert!((reading.value - 35.5).abs() < 0.05, "{}", reading.value);
        assert_eq!(reading.category, BmiCategory::Obese);
    }

    #[test]
    fn missing_or_zero_inputs_yield_none() {
        assert!(compute_bmi(None, HeightUnit::Cm, Some(70.0), WeightUnit::Kg).is_none());
        assert!(compute_bmi(Some(170.0), HeightUnit::Cm, None, WeightUnit::Kg).is_none());
        assert!(compute_bmi(Some(0.0), HeightUnit::Cm, Some(70.0), WeightUnit::Kg).is_none());
    }

    #[test]
    fn gauge_is_clamped() {
        assert_eq!(gauge_position(10.0), 0.0);
        assert_eq!(gauge_position(45.0), 100.0);
        assert!((gauge_position(27.5) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn display_matches_serde() {
        for cat in [
            BmiCategory::Underweight,
            BmiCategory::Normal,
            BmiCategory::Overweight,
            BmiCategory::Obese,
        ] {
            let json = serde_json::to_string(&cat).unwrap();
            assert_eq!(format!("\"{cat}\""), json);
        }
    }
}
