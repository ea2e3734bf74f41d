//! Per-step actions. Each one validates input locally, performs its
//! backend call (if any) through the request fence, writes the store and
//! lets the sequencer pick the next step.

use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use tokio::time::Instant;
use tracing::{info, warn};

use super::Wizard;
use crate::api::SubscriptionPlan;
use crate::calc::units::{switch_height_unit, switch_weight_unit};
use crate::calc::validation::{
    format_birthday_input, parse_birthday, parse_measurement, validate_email, validate_otp,
};
use crate::calc::weight_goal::ten_percent_loss;
use crate::calc::{CraftingProgress, HeightUnit, WeightChange, WeightUnit, assess_goal};
use crate::error::{Error, Result, ValidationError};
use crate::profile::{
    Activity, AuthPatch, DemographicsPatch, Height, HeightPatch, IdentityProvider, MAX_ACTIVITIES,
    MainGoal, MetricsPatch, ProfilePatch, RatingPatch, Sex, SubscriptionPatch, Weight, WeightPatch,
};
use crate::sequencer::{StepEvent, StepId, StepSequencer, Transition};
use crate::submission::FinishOnboardingPayload;

const PLAN_STEPS: &[StepId] = &[StepId::PlanPreview, StepId::Paywall];

impl Wizard {
    // ── Identity ───────────────────────────────────────────────────────

    /// Send a one-time code and move on to the code step.
    pub async fn submit_email(&self, raw: &str) -> Result<Transition> {
        let email = validate_email(raw)?;
        let epoch = self.begin(&[StepId::Email]).await?;
        if let Err(e) = self.fenced(epoch, self.backend.request_otp(&email)).await {
            return Err(self.fail(epoch, e).await);
        }

        let mut state = self.resume(epoch).await?;
        state
            .store
            .set_auth(AuthPatch {
                email: Some(email),
                provider: Some(IdentityProvider::Email),
                is_verified: Some(false),
            })
            .await;
        state.otp_sent_at = Some(Instant::now());
        state.busy = false;
        info!("Verification code requested");

        let ctx = state.ctx();
        let transition = state.sequencer.go_next(&ctx);
        self.after_transition(&mut state, transition).await;
        Ok(transition)
    }

    /// Time left before another code may be requested.
    pub async fn resend_available_in(&self) -> Option<Duration> {
        let sent = self.state.lock().await.otp_sent_at?;
        self.config
            .otp_resend_cooldown
            .checked_sub(sent.elapsed())
            .filter(|d| !d.is_zero())
    }

    pub async fn resend_otp(&self) -> Result<()> {
        if let Some(remaining) = self.resend_available_in().await {
            return Err(ValidationError::ResendCooldown {
                remaining_secs: remaining.as_secs().max(1),
            }
            .into());
        }
        let epoch = self.begin(&[StepId::Otp]).await?;
        let email = self.state.lock().await.store.profile().auth.email.clone();
        if let Err(e) = self.fenced(epoch, self.backend.request_otp(&email)).await {
            return Err(self.fail(epoch, e).await);
        }
        let mut state = self.resume(epoch).await?;
        state.otp_sent_at = Some(Instant::now());
        state.busy = false;
        info!("Verification code re-sent");
        Ok(())
    }

    /// Verify the code. On success the profile and subscription are looked
    /// up (best effort) and the step auto-advances.
    pub async fn verify_otp(&self, raw: &str) -> Result<Transition> {
        let code = validate_otp(raw)?;
        let epoch = self.begin(&[StepId::Otp]).await?;
        let email = self.state.lock().await.store.profile().auth.email.clone();
        if email.is_empty() {
            return Err(self.fail(epoch, ValidationError::InvalidEmail.into()).await);
        }

        let response = match self.fenced(epoch, self.backend.verify_otp(&email, &code)).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(epoch, e).await),
        };
        {
            let mut state = self.resume(epoch).await?;
            state
                .store
                .set_auth(AuthPatch {
                    email: response
                        .user
                        .map(|u| u.email)
                        .filter(|e| !e.is_empty()),
                    provider: Some(IdentityProvider::Email),
                    is_verified: Some(true),
                })
                .await;
        }
        info!("Email verified");

        let me = self
            .optional(epoch, self.backend.auth_me(), "profile fetch")
            .await?;
        let active = self
            .optional(
                epoch,
                self.backend.active_subscription(),
                "active subscription lookup",
            )
            .await?;

        let mut state = self.resume(epoch).await?;
        let mut subscribed = active.map(|a| a.is_some());
        if let Some(me) = me {
            if me.reports_subscription() {
                subscribed = Some(true);
            }
            state
                .store
                .set_profile(ProfilePatch {
                    username: me.username,
                    bio: me.bio,
                    name: me.name,
                })
                .await;
        }
        if let Some(subscribed) = subscribed {
            state
                .store
                .set_subscription(SubscriptionPatch {
                    has_active_subscription: Some(subscribed),
                    is_subscribed: Some(subscribed),
                    ..Default::default()
                })
                .await;
        }
        state.busy = false;

        let ctx = state.ctx();
        let transition = state.sequencer.on_event(StepEvent::IdentityVerified, &ctx);
        self.after_transition(&mut state, transition).await;
        Ok(transition)
    }

    /// Google sign-in from the welcome or e-mail step. Lands on the first
    /// questionnaire step; the code step is skipped.
    pub async fn sign_in_with_google(&self) -> Result<Transition> {
        let epoch = self.begin(&[StepId::Welcome, StepId::Email]).await?;
        let id_token = match self.fenced(epoch, self.identity.google_sign_in()).await {
            Ok(token) => token,
            Err(e) => return Err(self.fail(epoch, e).await),
        };
        let response = match self
            .fenced(epoch, self.backend.exchange_identity_token(&id_token))
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.fail(epoch, e).await),
        };
        let active = self
            .optional(
                epoch,
                self.backend.active_subscription(),
                "active subscription lookup",
            )
            .await?;

        let mut state = self.resume(epoch).await?;
        state
            .store
            .set_auth(AuthPatch {
                email: response
                    .user
                    .map(|u| u.email)
                    .filter(|e| !e.is_empty()),
                provider: Some(IdentityProvider::Google),
                is_verified: Some(true),
            })
            .await;
        if let Some(active) = active {
            state
                .store
                .set_subscription(SubscriptionPatch {
                    has_active_subscription: Some(active.is_some()),
                    is_subscribed: Some(active.is_some()),
                    ..Default::default()
                })
                .await;
        }
        state.busy = false;
        info!("Signed in with Google");

        let ctx = state.ctx();
        let target = state.sequencer.flow().fallback_index() + 1;
        let transition = state.sequencer.go_to(target, &ctx)?;
        self.after_transition(&mut state, transition).await;
        Ok(transition)
    }

    /// Drop the session: tokens, answers and remembered step. Any request
    /// still in flight is superseded.
    pub async fn logout(&self) -> Transition {
        let mut state = self.state.lock().await;
        self.backend.clear_session().await;
        state.store.reset().await;
        state.store.clear_step().await;
        state.plans.clear();
        state.otp_sent_at = None;
        state.checkout_url = None;
        state.crafting = None;
        state.completed = false;
        state.busy = false;
        self.epoch.send_modify(|e| *e += 1);
        info!("Logged out");

        let ctx = state.ctx();
        let transition = state.sequencer.reevaluate(&ctx);
        self.after_transition(&mut state, transition).await;
        transition
    }

    // ── Questionnaire ──────────────────────────────────────────────────

    pub async fn select_sex(&self, sex: Sex) -> Result<()> {
        let mut state = self.edit(&[StepId::Sex]).await?;
        state
            .store
            .set_demographics(DemographicsPatch {
                sex: Some(sex),
                ..Default::default()
            })
            .await;
        Ok(())
    }

    /// Accepts free typing: the digits are re-formatted into `DD.MM.YYYY`
    /// before parsing, so `17/05/1990` and `17051990` both work.
    pub async fn set_birthday(&self, raw: &str) -> Result<NaiveDate> {
        let date = parse_birthday(&format_birthday_input(raw), Local::now().year())?;
        let mut state = self.edit(&[StepId::Birthday]).await?;
        state
            .store
            .set_demographics(DemographicsPatch {
                birthday: Some(date),
                ..Default::default()
            })
            .await;
        Ok(date)
    }

    pub async fn select_main_goal(&self, goal: MainGoal) -> Result<()> {
        let mut state = self.edit(&[StepId::MainGoal]).await?;
        state
            .store
            .set_demographics(DemographicsPatch {
                main_goal: Some(goal),
                ..Default::default()
            })
            .await;
        Ok(())
    }

    /// Add or remove an activity. Adding a fourth one is rejected.
    pub async fn toggle_activity(&self, activity: Activity) -> Result<Vec<Activity>> {
        let mut state = self.edit(&[StepId::Activities]).await?;
        let mut activities = state.store.profile().demographics.activities.clone();
        if let Some(pos) = activities.iter().position(|a| *a == activity) {
            activities.remove(pos);
        } else if activities.len() >= MAX_ACTIVITIES {
            return Err(ValidationError::TooManyActivities {
                max: MAX_ACTIVITIES,
            }
            .into());
        } else {
            activities.push(activity);
        }
        state
            .store
            .set_demographics(DemographicsPatch {
                activities: Some(activities.clone()),
                ..Default::default()
            })
            .await;
        Ok(activities)
    }

    pub async fn set_height(&self, raw: &str) -> Result<f64> {
        let value = parse_measurement(raw, "Height")?;
        let mut state = self.edit(&[StepId::Height]).await?;
        state
            .store
            .set_metrics(MetricsPatch::height(HeightPatch {
                value: Some(value),
                unit: None,
            }))
            .await;
        Ok(value)
    }

    /// Switch the height unit, converting an entered value.
    pub async fn switch_height_unit(&self, unit: HeightUnit) -> Result<Height> {
        let mut state = self.edit(&[StepId::Height]).await?;
        let current = state.store.profile().metrics.height;
        let converted = current.value.map(|v| switch_height_unit(v, current.unit, unit));
        state
            .store
            .set_metrics(MetricsPatch::height(HeightPatch {
                value: converted,
                unit: Some(unit),
            }))
            .await;
        Ok(state.store.profile().metrics.height)
    }

    pub async fn set_current_weight(&self, raw: &str) -> Result<f64> {
        let value = parse_measurement(raw, "Weight")?;
        let mut state = self.edit(&[StepId::Weight]).await?;
        state
            .store
            .set_metrics(MetricsPatch::current_weight(WeightPatch {
                value: Some(value),
                unit: None,
            }))
            .await;
        Ok(value)
    }

    pub async fn switch_current_weight_unit(&self, unit: WeightUnit) -> Result<Weight> {
        let mut state = self.edit(&[StepId::Weight]).await?;
        let current = state.store.profile().metrics.current_weight;
        state
            .store
            .set_metrics(MetricsPatch::current_weight(converted_weight(current, unit)))
            .await;
        Ok(state.store.profile().metrics.current_weight)
    }

    pub async fn set_goal_weight(&self, raw: &str) -> Result<Option<WeightChange>> {
        let value = parse_measurement(raw, "Goal weight")?;
        let mut state = self.edit(&[StepId::GoalWeight]).await?;
        state
            .store
            .set_metrics(MetricsPatch::goal_weight(WeightPatch {
                value: Some(value),
                unit: None,
            }))
            .await;
        let metrics = &state.store.profile().metrics;
        Ok(assess_goal(
            metrics.current_weight.value,
            metrics.current_weight.unit,
            metrics.goal_weight.value,
            metrics.goal_weight.unit,
        ))
    }

    pub async fn switch_goal_weight_unit(&self, unit: WeightUnit) -> Result<Weight> {
        let mut state = self.edit(&[StepId::GoalWeight]).await?;
        let goal = state.store.profile().metrics.goal_weight;
        state
            .store
            .set_metrics(MetricsPatch::goal_weight(converted_weight(goal, unit)))
            .await;
        Ok(state.store.profile().metrics.goal_weight)
    }

    /// Classification of the entered goal against the current weight.
    pub async fn goal_assessment(&self) -> Option<WeightChange> {
        let state = self.state.lock().await;
        let metrics = &state.store.profile().metrics;
        assess_goal(
            metrics.current_weight.value,
            metrics.current_weight.unit,
            metrics.goal_weight.value,
            metrics.goal_weight.unit,
        )
    }

    /// "Losing just 10 % …" hint, in the goal weight's unit.
    pub async fn suggested_loss(&self) -> Option<f64> {
        let state = self.state.lock().await;
        let metrics = &state.store.profile().metrics;
        ten_percent_loss(
            metrics.current_weight.value,
            metrics.current_weight.unit,
            metrics.goal_weight.unit,
        )
    }

    pub async fn rate(&self, stars: u8) -> Result<()> {
        if !(1..=5).contains(&stars) {
            return Err(ValidationError::RatingOutOfRange(stars).into());
        }
        let mut state = self.edit(&[StepId::Rating]).await?;
        state
            .store
            .set_rating(RatingPatch {
                stars: Some(stars),
                dismissed: Some(false),
            })
            .await;
        Ok(())
    }

    pub async fn dismiss_rating(&self) -> Result<()> {
        let mut state = self.edit(&[StepId::Rating]).await?;
        state
            .store
            .set_rating(RatingPatch {
                stars: None,
                dismissed: Some(true),
            })
            .await;
        Ok(())
    }

    // ── Crafting ───────────────────────────────────────────────────────

    /// Drive the crafting ticker to completion, submit the answers and
    /// auto-advance. `on_tick` sees every intermediate state.
    ///
    /// A failed submission is recorded as the last error; whether the flow
    /// still advances is governed by `proceed_on_submit_failure`.
    pub async fn run_crafting<F>(&self, mut on_tick: F) -> Result<Transition>
    where
        F: FnMut(&CraftingProgress) + Send,
    {
        let epoch = self.begin(&[StepId::Crafting]).await?;
        let mut progress = CraftingProgress::new();
        on_tick(&progress);

        let period = self.config.crafting_tick.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        while !progress.is_complete() {
            self.fenced(epoch, async {
                ticker.tick().await;
                Ok::<_, Error>(())
            })
            .await?;
            progress.tick();
            self.resume(epoch).await?.crafting = Some(progress.clone());
            on_tick(&progress);
        }

        let payload = {
            let mut state = self.resume(epoch).await?;
            state
                .store
                .refresh_plan_preview(Local::now().date_naive())
                .await;
            FinishOnboardingPayload::from(state.store.profile())
        };
        let submitted = self
            .fenced(epoch, self.backend.finish_onboarding(&payload))
            .await;

        let mut state = self.resume(epoch).await?;
        let mut carried_error = None;
        match submitted {
            Ok(()) => info!("Onboarding answers submitted"),
            Err(e) if self.config.proceed_on_submit_failure => {
                warn!("Onboarding submission failed, continuing: {}", e);
                carried_error = Some(super::user_message(&e));
            }
            Err(e) => {
                // Start over so Next cannot slip past an unsent submission.
                state.crafting = Some(CraftingProgress::new());
                drop(state);
                return Err(self.fail(epoch, e).await);
            }
        }
        state.busy = false;

        let ctx = state.ctx();
        let transition = state.sequencer.on_event(StepEvent::CraftingComplete, &ctx);
        self.after_transition(&mut state, transition).await;
        state.last_error = carried_error;
        Ok(transition)
    }

    // ── Plans & checkout ───────────────────────────────────────────────

    pub async fn load_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        let epoch = self.begin(PLAN_STEPS).await?;
        let plans = match self
            .fenced(epoch, self.backend.subscription_plans(self.config.plans_limit))
            .await
        {
            Ok(plans) => plans,
            Err(e) => return Err(self.fail(epoch, e).await),
        };
        let mut state = self.resume(epoch).await?;
        state.plans = plans.clone();
        state.busy = false;
        info!(count = plans.len(), "Subscription plans loaded");
        Ok(plans)
    }

    /// Select a plan by price id. Once plans are loaded the id must be one
    /// of them.
    pub async fn select_plan(&self, plan_id: &str) -> Result<()> {
        let mut state = self.edit(PLAN_STEPS).await?;
        let label = match state.plans.iter().find(|p| p.id == plan_id) {
            Some(plan) => plan.label().to_string(),
            None if state.plans.is_empty() => plan_id.to_string(),
            None => return Err(ValidationError::NoPlanSelected.into()),
        };
        state
            .store
            .set_subscription(SubscriptionPatch {
                selected_plan_id: Some(plan_id.to_string()),
                selected_plan_label: Some(label),
                ..Default::default()
            })
            .await;
        Ok(())
    }

    /// Create a checkout session for the selected plan. Returns the URL the
    /// user has to open.
    pub async fn checkout(&self) -> Result<String> {
        let plan_id = {
            let state = self.state.lock().await;
            state.store.profile().subscription.selected_plan_id.clone()
        }
        .ok_or(ValidationError::NoPlanSelected)?;

        let epoch = self.begin(PLAN_STEPS).await?;
        let session = match self
            .fenced(epoch, self.backend.create_checkout(&plan_id))
            .await
        {
            Ok(session) => session,
            Err(e) => return Err(self.fail(epoch, e).await),
        };
        let mut state = self.resume(epoch).await?;
        state.checkout_url = Some(session.url.clone());
        state.busy = false;
        info!(plan = %plan_id, "Checkout session created");
        Ok(session.url)
    }

    /// Re-check the subscription, e.g. after returning from checkout. A
    /// newly active subscription moves the user off the paywall.
    pub async fn refresh_subscription(&self) -> Result<bool> {
        let epoch = self.begin(&[]).await?;
        let active = self
            .optional(
                epoch,
                self.backend.active_subscription(),
                "active subscription lookup",
            )
            .await?;
        let mut state = self.resume(epoch).await?;
        if let Some(active) = active {
            state
                .store
                .set_subscription(SubscriptionPatch {
                    has_active_subscription: Some(active.is_some()),
                    is_subscribed: Some(active.is_some()),
                    ..Default::default()
                })
                .await;
        }
        state.busy = false;
        let has_active = state.store.profile().subscription.has_active_subscription;

        let ctx = state.ctx();
        let transition = state.sequencer.reevaluate(&ctx);
        self.after_transition(&mut state, transition).await;
        Ok(has_active)
    }

    // ── Profile & finish ───────────────────────────────────────────────

    pub async fn set_username(&self, username: &str, bio: &str) -> Result<Transition> {
        let mut state = self.edit(&[StepId::Username]).await?;
        state
            .store
            .set_profile(ProfilePatch {
                username: Some(username.trim().to_string()),
                bio: Some(bio.trim().to_string()),
                name: None,
            })
            .await;
        let ctx = state.ctx();
        let transition = state.sequencer.go_next(&ctx);
        self.after_transition(&mut state, transition).await;
        Ok(transition)
    }

    /// Final submission from the finish step. On success the session is
    /// over: answers and remembered step are cleared.
    pub async fn finish(&self) -> Result<()> {
        let epoch = self.begin(&[StepId::Finish]).await?;
        let payload = FinishOnboardingPayload::from(self.state.lock().await.store.profile());
        if let Err(e) = self
            .fenced(epoch, self.backend.finish_onboarding(&payload))
            .await
        {
            return Err(self.fail(epoch, e).await);
        }

        let mut state = self.resume(epoch).await?;
        state.store.reset().await;
        state.store.clear_step().await;
        state.plans.clear();
        state.crafting = None;
        state.checkout_url = None;
        state.completed = true;
        state.busy = false;
        let flow = state.sequencer.flow().clone();
        state.sequencer = StepSequencer::new(flow);
        self.epoch.send_modify(|e| *e += 1);
        info!("Onboarding finished");
        Ok(())
    }
}

fn converted_weight(weight: Weight, unit: WeightUnit) -> WeightPatch {
    WeightPatch {
        value: weight.value.map(|v| switch_weight_unit(v, weight.unit, unit)),
        unit: Some(unit),
    }
}
