//! Unit conversions for body measurements.

use serde::{Deserialize, Serialize};

/// Metres per inch.
pub const METERS_PER_INCH: f64 = 0.0254;
/// Centimetres per inch, used when switching the height input unit.
pub const CM_PER_INCH: f64 = 2.54;
/// Kilograms per pound.
pub const KG_PER_LB: f64 = 0.453592;
/// Pounds per kilogram, used when switching the weight input unit.
pub const LB_PER_KG: f64 = 2.20462;

/// Unit of a height measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeightUnit {
    Cm,
    In,
}

impl Default for HeightUnit {
    fn default() -> Self {
        Self::Cm
    }
}

impl std::fmt::Display for HeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cm => write!(f, "cm"),
            Self::In => write!(f, "in"),
        }
    }
}

/// Unit of a weight measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    Lb,
}

impl Default for WeightUnit {
    fn default() -> Self {
        Self::Kg
    }
}

impl std::fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kg => write!(f, "kg"),
            Self::Lb => write!(f, "lb"),
        }
    }
}

/// Convert a height to metres.
pub fn height_to_meters(value: f64, unit: HeightUnit) -> f64 {
    match unit {
        HeightUnit::Cm => value / 100.0,
        HeightUnit::In => value * METERS_PER_INCH,
    }
}

/// Convert a weight to kilograms.
pub fn weight_to_kg(value: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Kg => value,
        WeightUnit::Lb => value * KG_PER_LB,
    }
}

/// Convert a kilogram weight into `unit`.
pub fn kg_to_unit(kg: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Kg => kg,
        WeightUnit::Lb => kg * LB_PER_KG,
    }
}

/// Re-express a height input when the user flips the unit toggle.
///
/// cm → in keeps one decimal, in → cm rounds to whole centimetres.
pub fn switch_height_unit(value: f64, from: HeightUnit, to: HeightUnit) -> f64 {
    match (from, to) {
        (HeightUnit::Cm, HeightUnit::In) => round_to(value / CM_PER_INCH, 1),
        (HeightUnit::In, HeightUnit::Cm) => (value * CM_PER_INCH).round(),
        _ => value,
    }
}

/// Re-express a weight input when the user flips the unit toggle.
/// Both directions round to whole units.
pub fn switch_weight_unit(value: f64, from: WeightUnit, to: WeightUnit) -> f64 {
    match (from, to) {
        (WeightUnit::Kg, WeightUnit::Lb) => (value * LB_PER_KG).round(),
        (WeightUnit::Lb, WeightUnit::Kg) => (value * KG_PER_LB).round(),
        _ => value,
    }
}

/// Round to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_conversions() {
        assert!((height_to_meters(170.0, HeightUnit::Cm) - 1.7).abs() < 1e-12);
        assert!((height_to_meters(100.0, HeightUnit::In) - 2.54).abs() < 1e-12);
        assert!((weight_to_kg(100.0, WeightUnit::Lb) - 45.3592).abs() < 1e-9);
        assert_eq!(weight_to_kg(70.0, WeightUnit::Kg), 70.0);
    }

    #[test]
    fn unit_toggle_rounding() {
        assert_eq!(switch_height_unit(173.0, HeightUnit::Cm, HeightUnit::In), 68.1);
        assert_eq!(switch_height_unit(68.0, HeightUnit::In, HeightUnit::Cm), 173.0);
        assert_eq!(switch_height_unit(68.0, HeightUnit::In, HeightUnit::In), 68.0);
        assert_eq!(switch_weight_unit(65.0, WeightUnit::Kg, WeightUnit::Lb), 143.0);
        assert_eq!(switch_weight_unit(143.0, WeightUnit::Lb, WeightUnit::Kg), 65.0);
    }

    #[test]
    fn units_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&HeightUnit::In).unwrap(), "\"in\"");
        assert_eq!(serde_json::to_string(&WeightUnit::Lb).unwrap(), "\"lb\"");
        let unit: WeightUnit = serde_json::from_str("\"kg\"").unwrap();
        assert_eq!(unit, WeightUnit::Kg);
    }
}
