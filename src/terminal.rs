//! Terminal front end — a line-based REPL driving the wizard, for local use.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::calc::bmi::gauge_position;
use crate::calc::progress::CRAFTING_STAGES;
use crate::calc::{BmiCategory, HeightUnit, Milestones, WeightUnit};
use crate::error::Result;
use crate::profile::{Activity, MainGoal, PlanPreview, Sex};
use crate::sequencer::StepId;
use crate::wizard::Wizard;

/// One parsed line of input, interpreted for the current step.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Next,
    Back,
    Quit,
    Logout,
    Google,
    Resend,
    /// Free text for the step's own input (e-mail, code, number, date).
    Answer(String),
    Sex(Sex),
    Goal(MainGoal),
    Toggle(Activity),
    HeightUnit(HeightUnit),
    WeightUnit(WeightUnit),
    Rate(u8),
    SkipRating,
    Plans,
    Plan(usize),
    Checkout,
    Refresh,
    Username { username: String, bio: String },
    Unknown(String),
}

/// Interpret `line` in the context of `step`. Global commands win over
/// step input.
pub fn parse_command(step: StepId, line: &str) -> Command {
    let line = line.trim();
    let lower = line.to_ascii_lowercase();
    match lower.as_str() {
        "" | "next" => return Command::Next,
        "back" => return Command::Back,
        "quit" | "exit" | "/quit" => return Command::Quit,
        "logout" => return Command::Logout,
        _ => {}
    }

    match step {
        StepId::Welcome | StepId::Email if lower == "google" => Command::Google,
        StepId::Email | StepId::Birthday => Command::Answer(line.to_string()),
        StepId::Otp if lower == "resend" => Command::Resend,
        StepId::Otp => Command::Answer(line.to_string()),
        StepId::Sex => match lower.as_str() {
            "m" | "male" => Command::Sex(Sex::Male),
            "f" | "female" => Command::Sex(Sex::Female),
            "o" | "other" => Command::Sex(Sex::Other),
            _ => Command::Unknown(line.to_string()),
        },
        StepId::MainGoal => pick(&lower, &MainGoal::ALL)
            .map(Command::Goal)
            .unwrap_or_else(|| Command::Unknown(line.to_string())),
        StepId::Activities => pick(&lower, &Activity::ALL)
            .map(Command::Toggle)
            .unwrap_or_else(|| Command::Unknown(line.to_string())),
        StepId::Height => match lower.as_str() {
            "cm" => Command::HeightUnit(HeightUnit::Cm),
            "in" => Command::HeightUnit(HeightUnit::In),
            _ => Command::Answer(line.to_string()),
        },
        StepId::Weight | StepId::GoalWeight => match lower.as_str() {
            "kg" => Command::WeightUnit(WeightUnit::Kg),
            "lb" | "lbs" => Command::WeightUnit(WeightUnit::Lb),
            _ => Command::Answer(line.to_string()),
        },
        StepId::Rating if lower == "skip" => Command::SkipRating,
        StepId::Rating => lower
            .parse()
            .map(Command::Rate)
            .unwrap_or_else(|_| Command::Unknown(line.to_string())),
        StepId::PlanPreview | StepId::Paywall => match lower.as_str() {
            "plans" => Command::Plans,
            "checkout" => Command::Checkout,
            "refresh" => Command::Refresh,
            n => n
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Command::Plan)
                .unwrap_or_else(|| Command::Unknown(line.to_string())),
        },
        StepId::Username => {
            let (username, bio) = line.split_once('|').unwrap_or((line, ""));
            Command::Username {
                username: username.trim().to_string(),
                bio: bio.trim().to_string(),
            }
        }
        _ => Command::Unknown(line.to_string()),
    }
}

/// Text gauge over the 15..40 BMI scale, e.g. `[----|------] 24.2 (normal)`.
fn bmi_gauge(value: f64, category: BmiCategory) -> String {
    const WIDTH: usize = 20;
    let marker = (gauge_position(value) / 100.0 * WIDTH as f64).round() as usize;
    let bar: String = (0..=WIDTH)
        .map(|i| if i == marker { '|' } else { '-' })
        .collect();
    format!("[{bar}] {value:.1} ({category})")
}

/// Start and end of the weight curve plus the journey milestones.
fn plan_timeline(preview: &PlanPreview, today: NaiveDate) -> Vec<String> {
    let mut lines = Vec::new();
    if let (Some(first), Some(last)) = (preview.chart.first(), preview.chart.last()) {
        lines.push(format!(
            "{:.1} kg on {} -> {:.1} kg by {}",
            first.weight_kg,
            first.date_label(),
            last.weight_kg,
            last.date_label()
        ));
    }
    let milestones = Milestones::from_today(today);
    lines.push(format!(
        "Today {} | 6 weeks {} | goal {}",
        Milestones::short(milestones.today),
        Milestones::short(milestones.six_weeks),
        milestones.goal_label()
    ));
    lines
}

/// 1-based menu pick.
fn pick<T: Copy>(raw: &str, options: &[T]) -> Option<T> {
    let n: usize = raw.parse().ok()?;
    options.get(n.checked_sub(1)?).copied()
}

async fn prompt(wizard: &Wizard) {
    let view = wizard.view().await;
    if let Some(header) = view.header {
        eprintln!("[{}/{}] {:.0}%", header.position, header.of, header.percent);
    }
    let profile = wizard.profile().await;
    match view.step {
        StepId::Welcome => eprintln!("Welcome! Press Enter to start, or type 'google'."),
        StepId::Email => eprintln!("Your e-mail address (or 'google'):"),
        StepId::Otp => eprintln!(
            "Enter the 6-digit code sent to {} ('resend' for a new one):",
            profile.auth.email
        ),
        StepId::Sex => eprintln!("Sex: m / f / o"),
        StepId::Birthday => eprintln!("Birthday (DD.MM.YYYY, digits are enough):"),
        StepId::MainGoal => {
            for (i, goal) in MainGoal::ALL.iter().enumerate() {
                eprintln!("  {}. {} — {}", i + 1, goal.title(), goal.description());
            }
        }
        StepId::Motivation => eprintln!("You're in the right place. Press Enter."),
        StepId::Activities => {
            for (i, activity) in Activity::ALL.iter().enumerate() {
                let mark = if profile.demographics.activities.contains(activity) {
                    "x"
                } else {
                    " "
                };
                eprintln!("  [{mark}] {}. {}", i + 1, activity);
            }
            eprintln!("Toggle by number, Enter when done.");
        }
        StepId::Height => eprintln!(
            "Height in {} ('cm' / 'in' to switch):",
            profile.metrics.height.unit
        ),
        StepId::Weight => eprintln!(
            "Current weight in {} ('kg' / 'lb' to switch):",
            profile.metrics.current_weight.unit
        ),
        StepId::Bmi => match (profile.metrics.bmi.value, profile.metrics.bmi.category) {
            (Some(value), Some(category)) => {
                eprintln!("{}", bmi_gauge(value, category));
                eprintln!("{}", category.message());
            }
            _ => eprintln!("BMI unavailable. Press Enter."),
        },
        StepId::GoalWeight => eprintln!(
            "Goal weight in {} ('kg' / 'lb' to switch):",
            profile.metrics.goal_weight.unit
        ),
        StepId::Rating => eprintln!("Rate us 1-5, or 'skip':"),
        StepId::Crafting => eprintln!("Your plan could not be saved. Press Enter to retry."),
        StepId::PlanPreview | StepId::Paywall => {
            let preview = &profile.plan_preview;
            if let (Some(goal), Some(weeks)) = (&preview.goal_label, preview.duration_weeks) {
                eprintln!("Your {weeks}-week plan: {goal}");
            }
            for line in plan_timeline(preview, Local::now().date_naive()) {
                eprintln!("  {line}");
            }
            eprintln!("'plans' to list plans, a number to pick, 'checkout', 'refresh'.");
        }
        StepId::Username => eprintln!("Username | bio:"),
        StepId::Finish => eprintln!("All set. Press Enter to finish."),
    }
    if let Some(error) = view.last_error {
        eprintln!("! {error}");
    }
    eprint!("> ");
}

/// Run one command. Returns `false` when the session should end.
async fn dispatch(wizard: &Wizard, step: StepId, command: Command) -> Result<bool> {
    match command {
        Command::Quit => return Ok(false),
        Command::Back if !wizard.view().await.can_go_back => {
            eprintln!("Can't go back from here.");
        }
        Command::Back => {
            wizard.back().await;
        }
        Command::Logout => {
            wizard.logout().await;
        }
        Command::Next if step == StepId::Finish => {
            wizard.finish().await?;
            eprintln!("Onboarding complete.");
            return Ok(false);
        }
        Command::Next => {
            let transition = wizard.next().await?;
            let view = wizard.view().await;
            if !transition.moved() && view.index + 1 == view.total {
                eprintln!("That's everything for now.");
                return Ok(false);
            }
        }
        Command::Google => {
            wizard.sign_in_with_google().await?;
        }
        Command::Resend => {
            wizard.resend_otp().await?;
            eprintln!("Code re-sent.");
        }
        Command::Answer(raw) => match step {
            StepId::Email => {
                wizard.submit_email(&raw).await?;
            }
            StepId::Otp => {
                wizard.verify_otp(&raw).await?;
            }
            StepId::Birthday => {
                wizard.set_birthday(&raw).await?;
                wizard.next().await?;
            }
            StepId::Height => {
                wizard.set_height(&raw).await?;
                wizard.next().await?;
            }
            StepId::Weight => {
                wizard.set_current_weight(&raw).await?;
                wizard.next().await?;
            }
            StepId::GoalWeight => {
                if let Some(change) = wizard.set_goal_weight(&raw).await? {
                    eprintln!(
                        "{} ({:.0}% change). {}",
                        change.classification.headline(),
                        change.percent_difference,
                        change.classification.encouragement()
                    );
                }
                wizard.next().await?;
            }
            _ => eprintln!("Not expected here."),
        },
        Command::Sex(sex) => {
            wizard.select_sex(sex).await?;
            wizard.next().await?;
        }
        Command::Goal(goal) => {
            wizard.select_main_goal(goal).await?;
            wizard.next().await?;
        }
        Command::Toggle(activity) => {
            wizard.toggle_activity(activity).await?;
        }
        Command::HeightUnit(unit) => {
            wizard.switch_height_unit(unit).await?;
        }
        Command::WeightUnit(unit) if step == StepId::Weight => {
            wizard.switch_current_weight_unit(unit).await?;
        }
        Command::WeightUnit(unit) => {
            wizard.switch_goal_weight_unit(unit).await?;
        }
        Command::Rate(stars) => {
            wizard.rate(stars).await?;
            wizard.next().await?;
        }
        Command::SkipRating => {
            wizard.dismiss_rating().await?;
            wizard.next().await?;
        }
        Command::Plans => {
            for (i, plan) in wizard.load_plans().await?.iter().enumerate() {
                let weekly = plan.display_weekly_price().unwrap_or_default();
                eprintln!(
                    "  {}. {} — {} {} {}",
                    i + 1,
                    plan.label(),
                    plan.display_price(),
                    plan.period_label(),
                    weekly
                );
            }
        }
        Command::Plan(n) => match wizard.plans().await.get(n - 1) {
            Some(plan) => wizard.select_plan(&plan.id).await?,
            None => eprintln!("No plan {n}; type 'plans' first."),
        },
        Command::Checkout => {
            let url = wizard.checkout().await?;
            eprintln!("Open {url} to complete the purchase, then type 'refresh'.");
        }
        Command::Refresh => {
            if wizard.refresh_subscription().await? {
                eprintln!("Subscription active.");
            }
        }
        Command::Username { username, bio } => {
            wizard.set_username(&username, &bio).await?;
        }
        Command::Unknown(raw) => eprintln!("Didn't understand '{raw}'."),
    }
    Ok(true)
}

async fn run_crafting(wizard: &Wizard) -> Result<()> {
    let mut stage = usize::MAX;
    wizard
        .run_crafting(|progress| {
            if progress.stage() != stage {
                stage = progress.stage();
                eprintln!("  {}", CRAFTING_STAGES[stage]);
            }
            if progress.is_complete() {
                eprintln!("  100%");
            }
        })
        .await?;
    Ok(())
}

/// Drive the wizard from stdin until the user quits or finishes.
pub async fn run(wizard: Arc<Wizard>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let view = wizard.view().await;
        if view.step == StepId::Crafting && view.crafting_percent != Some(100) {
            match run_crafting(&wizard).await {
                Ok(()) => continue,
                Err(e) => tracing::warn!("Crafting interrupted: {}", e),
            }
        }

        prompt(&wizard).await;
        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let step = wizard.view().await.step;
        match dispatch(&wizard, step, parse_command(step, &line)).await {
            Ok(true) => {}
            Ok(false) => break,
            // Already recorded as the step's last error.
            Err(e) => tracing::debug!("Action failed: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_commands_win() {
        assert_eq!(parse_command(StepId::Email, "back"), Command::Back);
        assert_eq!(parse_command(StepId::Otp, "  "), Command::Next);
        assert_eq!(parse_command(StepId::Height, "QUIT"), Command::Quit);
    }

    #[test]
    fn step_specific_input() {
        assert_eq!(
            parse_command(StepId::Email, "a@b.co"),
            Command::Answer("a@b.co".into())
        );
        assert_eq!(parse_command(StepId::Email, "Google"), Command::Google);
        assert_eq!(parse_command(StepId::Otp, "resend"), Command::Resend);
        assert_eq!(parse_command(StepId::Sex, "f"), Command::Sex(Sex::Female));
        assert_eq!(
            parse_command(StepId::MainGoal, "3"),
            Command::Goal(MainGoal::BuildMuscle)
        );
        assert_eq!(
            parse_command(StepId::Activities, "2"),
            Command::Toggle(Activity::GeneralFitness)
        );
        assert_eq!(
            parse_command(StepId::GoalWeight, "lbs"),
            Command::WeightUnit(WeightUnit::Lb)
        );
        assert_eq!(parse_command(StepId::Rating, "4"), Command::Rate(4));
        assert_eq!(parse_command(StepId::Paywall, "2"), Command::Plan(2));
        assert_eq!(
            parse_command(StepId::Username, "jane | runs daily"),
            Command::Username {
                username: "jane".into(),
                bio: "runs daily".into()
            }
        );
    }

    #[test]
    fn bmi_gauge_marks_position() {
        assert_eq!(
            bmi_gauge(27.5, BmiCategory::Overweight),
            "[----------|----------] 27.5 (overweight)"
        );
        assert!(bmi_gauge(12.0, BmiCategory::Underweight).starts_with("[|---"));
        assert!(bmi_gauge(45.0, BmiCategory::Obese).starts_with("[--------------------|]"));
    }

    #[test]
    fn plan_timeline_shows_curve_and_milestones() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let preview = crate::calc::build_plan_preview(
            &Default::default(),
            &Default::default(),
            today,
        );
        assert_eq!(
            plan_timeline(&preview, today),
            vec![
                "66.0 kg on Jan 1, 2026 -> 59.0 kg by Mar 26, 2026".to_string(),
                "Today 01/01 | 6 weeks 12/02 | goal 26 Mar 2026".to_string(),
            ]
        );
        assert_eq!(plan_timeline(&PlanPreview::default(), today).len(), 1);
    }

    #[test]
    fn out_of_menu_picks_are_unknown() {
        assert!(matches!(
            parse_command(StepId::MainGoal, "0"),
            Command::Unknown(_)
        ));
        assert!(matches!(
            parse_command(StepId::Activities, "6"),
            Command::Unknown(_)
        ));
        assert!(matches!(parse_command(StepId::Paywall, "0"), Command::Unknown(_)));
    }
}
