//! Synthetic plan-preview data: a linear weight trajectory and labels.
//!
//! This is display-only trend data. It interpolates between the start and
//! goal weights and makes no predictive claim.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::units::weight_to_kg;
use crate::profile::{Activity, Demographics, MainGoal, Metrics, PlanPreview};

/// Length of every generated plan.
pub const PLAN_DURATION_WEEKS: u32 = 12;

/// Placeholder start weight when none has been entered.
pub const DEFAULT_START_KG: f64 = 66.0;
/// Placeholder goal weight when none has been entered.
pub const DEFAULT_GOAL_KG: f64 = 59.0;

/// One weekly point on the preview chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub week: u32,
    pub weight_kg: f64,
    pub date: NaiveDate,
}

impl ChartPoint {
    /// Chart axis label, e.g. `Mar 5, 2026`.
    pub fn date_label(&self) -> String {
        self.date.format("%b %-d, %Y").to_string()
    }
}

/// Linearly interpolated series `start − (start − goal) · i / weeks` for
/// `i ∈ 0..=weeks`, dated one week apart from `start_date`.
pub fn weight_trajectory(
    start_kg: f64,
    goal_kg: f64,
    weeks: u32,
    start_date: NaiveDate,
) -> Vec<ChartPoint> {
    if weeks == 0 {
        return vec![ChartPoint {
            week: 0,
            weight_kg: start_kg,
            date: start_date,
        }];
    }
    (0..=weeks)
        .map(|i| ChartPoint {
            week: i,
            weight_kg: start_kg - (start_kg - goal_kg) * f64::from(i) / f64::from(weeks),
            date: start_date
                .checked_add_days(Days::new(u64::from(i) * 7))
                .unwrap_or(start_date),
        })
        .collect()
}

/// Headline goal label; defaults to "Lose Weight".
pub fn goal_label(goal: Option<MainGoal>) -> String {
    goal.unwrap_or(MainGoal::LoseWeight).title().to_string()
}

/// First two chosen activities joined with " & "; defaults to "General Fitness".
pub fn interests_label(activities: &[Activity]) -> String {
    if activities.is_empty() {
        return Activity::GeneralFitness.label().to_string();
    }
    activities
        .iter()
        .take(2)
        .map(|a| a.label())
        .collect::<Vec<_>>()
        .join(" & ")
}

/// Build the full preview from the collected answers.
pub fn build_plan_preview(
    demographics: &Demographics,
    metrics: &Metrics,
    today: NaiveDate,
) -> PlanPreview {
    let start_kg = metrics
        .current_weight
        .value
        .filter(|v| *v > 0.0)
        .map(|v| weight_to_kg(v, metrics.current_weight.unit))
        .unwrap_or(DEFAULT_START_KG);
    let goal_kg = metrics
        .goal_weight
        .value
        .filter(|v| *v > 0.0)
        .map(|v| weight_to_kg(v, metrics.goal_weight.unit))
        .unwrap_or(DEFAULT_GOAL_KG);

    PlanPreview {
        duration_weeks: Some(PLAN_DURATION_WEEKS),
        goal_label: Some(goal_label(demographics.main_goal)),
        interests_label: Some(interests_label(&demographics.activities)),
        chart: weight_trajectory(start_kg, goal_kg, PLAN_DURATION_WEEKS, today),
    }
}

/// Dates shown on the journey timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestones {
    pub today: NaiveDate,
    pub six_weeks: NaiveDate,
    pub goal_date: NaiveDate,
}

impl Milestones {
    pub fn from_today(today: NaiveDate) -> Self {
        Self {
            today,
            six_weeks: today.checked_add_days(Days::new(42)).unwrap_or(today),
            goal_date: today
                .checked_add_days(Days::new(u64::from(PLAN_DURATION_WEEKS) * 7))
                .unwrap_or(today),
        }
    }

    /// `dd/mm` label used on the timeline ticks.
    pub fn short(date: NaiveDate) -> String {
        date.format("%d/%m").to_string()
    }

    /// `5 Mar 2026` label used for the goal date.
    pub fn goal_label(&self) -> String {
        self.goal_date.format("%-d %b %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::units::WeightUnit;
    use crate::profile::Weight;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn trajectory_is_linear_and_weekly() {
        let series = weight_trajectory(90.0, 78.0, 12, day(2026, 1, 1));
        assert_eq!(series.len(), 13);
        assert_eq!(series[0].weight_kg, 90.0);
        assert!((series[6].weight_kg - 84.0).abs() < 1e-9);
        assert!((series[12].weight_kg - 78.0).abs() < 1e-9);
        assert_eq!(series[1].date, day(2026, 1, 8));
        assert_eq!(series[12].date, day(2026, 3, 26));
    }

    #[test]
    fn labels() {
        assert_eq!(goal_label(None), "Lose Weight");
        assert_eq!(goal_label(Some(MainGoal::BuildMuscle)), "Build Muscle");
        assert_eq!(interests_label(&[]), "General Fitness");
        assert_eq!(
            interests_label(&[Activity::Yoga, Activity::Pilates, Activity::Walking]),
            "Yoga & Pilates"
        );
    }

    #[test]
    fn preview_uses_defaults_and_converts_units() {
        let demographics = Demographics::default();
        let mut metrics = Metrics::default();
        let preview = build_plan_preview(&demographics, &metrics, day(2026, 1, 1));
        assert_eq!(preview.duration_weeks, Some(12));
        assert_eq!(preview.chart[0].weight_kg, DEFAULT_START_KG);
        assert_eq!(preview.chart[12].weight_kg, DEFAULT_GOAL_KG);

        metrics.current_weight = Weight::new(200.0, WeightUnit::Lb);
        metrics.goal_weight = Weight::new(80.0, WeightUnit::Kg);
        let preview = build_plan_preview(&demographics, &metrics, day(2026, 1, 1));
        assert!((preview.chart[0].weight_kg - 90.7184).abs() < 1e-6);
        assert!((preview.chart[12].weight_kg - 80.0).abs() < 1e-9);
    }

    #[test]
    fn milestone_dates() {
        let m = Milestones::from_today(day(2026, 1, 1));
        assert_eq!(Milestones::short(m.six_weeks), "12/02");
        assert_eq!(m.goal_label(), "26 Mar 2026");
        assert_eq!(ChartPoint { week: 0, weight_kg: 1.0, date: m.today }.date_label(), "Jan 1, 2026");
    }
}
