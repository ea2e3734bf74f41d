//! Wizard — the single writer over the onboarding store and the step
//! sequencer.
//!
//! Store and sequencer live behind one async mutex. Backend calls run with
//! the lock released and are fenced by a navigation epoch: every move bumps
//! the epoch, which cancels whatever request was started under the old one.

mod actions;
pub mod routes;
pub mod view;

pub use routes::{WizardRouteState, wizard_routes};
pub use view::{HeaderProgress, StepView};

use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{Backend, IdentityTokenSource, SubscriptionPlan};
use crate::calc::CraftingProgress;
use crate::config::WizardConfig;
use crate::error::{Error, Result, WizardError};
use crate::profile::OnboardingProfile;
use crate::sequencer::{AccessContext, Flow, StepId, StepSequencer, Transition};
use crate::store::{KeyValueStore, OnboardingStore};

/// Everything the wizard needs from the outside world.
pub struct WizardDeps {
    pub kv: Arc<dyn KeyValueStore>,
    pub backend: Arc<dyn Backend>,
    pub identity: Arc<dyn IdentityTokenSource>,
    pub config: WizardConfig,
}

struct WizardState {
    store: OnboardingStore,
    sequencer: StepSequencer,
    busy: bool,
    last_error: Option<String>,
    otp_sent_at: Option<Instant>,
    plans: Vec<SubscriptionPlan>,
    crafting: Option<CraftingProgress>,
    checkout_url: Option<String>,
    completed: bool,
}

impl WizardState {
    fn ctx(&self) -> AccessContext {
        AccessContext::from(self.store.profile())
    }

    fn step(&self) -> StepId {
        self.sequencer.current_step().id
    }

    /// Whether the current step has what it needs for a plain "Next".
    fn step_answered(&self) -> bool {
        let p = self.store.profile();
        match self.step() {
            StepId::Email => !p.auth.email.is_empty(),
            StepId::Sex => p.demographics.sex != crate::profile::Sex::Unset,
            StepId::Birthday => p.demographics.birthday.is_some(),
            StepId::MainGoal => p.demographics.main_goal.is_some(),
            StepId::Activities => !p.demographics.activities.is_empty(),
            StepId::Height => p.metrics.height.value.is_some(),
            StepId::Weight => p.metrics.current_weight.value.is_some(),
            StepId::GoalWeight => p.metrics.goal_weight.value.is_some(),
            StepId::Crafting => self.crafting.as_ref().is_some_and(|c| c.is_complete()),
            StepId::Paywall => {
                p.subscription.selected_plan_id.is_some() || p.subscription.has_active_subscription
            }
            _ => true,
        }
    }
}

pub struct Wizard {
    state: Mutex<WizardState>,
    epoch: watch::Sender<u64>,
    backend: Arc<dyn Backend>,
    identity: Arc<dyn IdentityTokenSource>,
    config: WizardConfig,
}

impl Wizard {
    /// Rehydrate the store and position the sequencer. An explicit deep link
    /// wins over a remembered step; both still go through gating.
    pub async fn start(deps: WizardDeps, deep_link: Option<&str>) -> Self {
        let store = OnboardingStore::load(Arc::clone(&deps.kv)).await;
        let start = match deep_link {
            Some(raw) => Some(raw.to_string()),
            None if deps.config.persist_step => store.load_step().await.map(|i| i.to_string()),
            None => None,
        };
        let ctx = AccessContext::from(store.profile());
        let sequencer =
            StepSequencer::with_deep_link(Flow::for_variant(deps.config.flow), start.as_deref(), &ctx);
        info!(
            flow = %deps.config.flow,
            step = %sequencer.current_step().id,
            index = sequencer.current(),
            "Onboarding wizard started"
        );

        let (epoch, _) = watch::channel(0);
        Self {
            state: Mutex::new(WizardState {
                store,
                sequencer,
                busy: false,
                last_error: None,
                otp_sent_at: None,
                plans: Vec::new(),
                crafting: None,
                checkout_url: None,
                completed: false,
            }),
            epoch,
            backend: deps.backend,
            identity: deps.identity,
            config: deps.config,
        }
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub async fn view(&self) -> StepView {
        let state = self.state.lock().await;
        let index = state.sequencer.current();
        let step = state.step();
        StepView {
            flow: self.config.flow,
            index,
            total: state.sequencer.total(),
            step,
            header: HeaderProgress::for_index(index),
            // The plan preview is a one-way door.
            can_go_back: index > 0 && step != StepId::PlanPreview,
            busy: state.busy,
            last_error: state.last_error.clone(),
            crafting_percent: state.crafting.as_ref().map(|c| c.percent()),
            completed: state.completed,
        }
    }

    pub async fn profile(&self) -> OnboardingProfile {
        self.state.lock().await.store.profile().clone()
    }

    /// Plain JSON snapshot of the collected answers.
    pub async fn snapshot(&self) -> serde_json::Value {
        self.state.lock().await.store.get_all()
    }

    pub async fn plans(&self) -> Vec<SubscriptionPlan> {
        self.state.lock().await.plans.clone()
    }

    pub async fn checkout_url(&self) -> Option<String> {
        self.state.lock().await.checkout_url.clone()
    }

    // ── Navigation ─────────────────────────────────────────────────────

    /// Plain "Next". Rejected while a request is in flight or the step
    /// still lacks its answer.
    pub async fn next(&self) -> Result<Transition> {
        let mut state = self.state.lock().await;
        if state.busy {
            return Err(WizardError::Busy.into());
        }
        if !state.step_answered() {
            return Err(WizardError::Incomplete {
                step: state.step().to_string(),
            }
            .into());
        }
        let ctx = state.ctx();
        let transition = state.sequencer.go_next(&ctx);
        self.after_transition(&mut state, transition).await;
        Ok(transition)
    }

    /// "Back" is always allowed and supersedes any in-flight request.
    pub async fn back(&self) -> Transition {
        let mut state = self.state.lock().await;
        let ctx = state.ctx();
        let transition = state.sequencer.go_back(&ctx);
        self.after_transition(&mut state, transition).await;
        transition
    }

    pub async fn go_to(&self, index: usize) -> Result<Transition> {
        let mut state = self.state.lock().await;
        let ctx = state.ctx();
        let transition = state.sequencer.go_to(index, &ctx)?;
        self.after_transition(&mut state, transition).await;
        Ok(transition)
    }

    /// Bookkeeping after the sequencer moved: fence off in-flight requests,
    /// prepare the entered step, remember the index.
    async fn after_transition(&self, state: &mut WizardState, transition: Transition) {
        if !transition.moved() {
            return;
        }
        self.epoch.send_modify(|e| *e += 1);
        state.busy = false;
        state.last_error = None;
        state.completed = false;

        match state.step() {
            StepId::Crafting => state.crafting = Some(CraftingProgress::new()),
            StepId::PlanPreview => {
                state
                    .store
                    .refresh_plan_preview(Local::now().date_naive())
                    .await;
            }
            StepId::GoalWeight => {
                let metrics = &state.store.profile().metrics;
                if metrics.goal_weight.value.is_none()
                    && metrics.goal_weight.unit != metrics.current_weight.unit
                {
                    let unit = metrics.current_weight.unit;
                    state
                        .store
                        .set_metrics(crate::profile::MetricsPatch::goal_weight(
                            crate::profile::WeightPatch::unit(unit),
                        ))
                        .await;
                }
            }
            _ => {}
        }

        if self.config.persist_step {
            state.store.save_step(state.sequencer.current()).await;
        }
        info!(
            from = transition.from,
            to = transition.to,
            kind = %transition.kind,
            step = %state.step(),
            "Step changed"
        );
    }

    // ── Request fencing ────────────────────────────────────────────────

    /// Claim the wizard for an action belonging to one of `allowed` (any
    /// step when empty). Returns the epoch the action runs under.
    async fn begin(&self, allowed: &[StepId]) -> Result<u64> {
        let mut state = self.state.lock().await;
        Self::check_step(&state, allowed)?;
        if state.busy {
            return Err(WizardError::Busy.into());
        }
        state.busy = true;
        state.last_error = None;
        Ok(*self.epoch.borrow())
    }

    /// Lock for a local edit on one of `allowed`.
    async fn edit(&self, allowed: &[StepId]) -> Result<MutexGuard<'_, WizardState>> {
        let state = self.state.lock().await;
        Self::check_step(&state, allowed)?;
        if state.busy {
            return Err(WizardError::Busy.into());
        }
        Ok(state)
    }

    fn check_step(state: &WizardState, allowed: &[StepId]) -> Result<()> {
        let actual = state.step();
        if allowed.is_empty() || allowed.contains(&actual) {
            return Ok(());
        }
        let expected = allowed
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("|");
        Err(WizardError::WrongStep {
            expected,
            actual: actual.to_string(),
        }
        .into())
    }

    /// Run `call` unless navigation moves past `epoch` first.
    async fn fenced<T, E, F>(&self, epoch: u64, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        let mut rx = self.epoch.subscribe();
        tokio::select! {
            result = call => result.map_err(Into::into),
            _ = superseded(&mut rx, epoch) => {
                debug!(epoch, "In-flight request superseded by navigation");
                Err(WizardError::Superseded.into())
            }
        }
    }

    /// Like [`Self::fenced`] for side-calls whose failure does not matter.
    /// Only supersession is reported.
    async fn optional<T, E, F>(&self, epoch: u64, call: F, what: &str) -> Result<Option<T>>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        match self.fenced(epoch, call).await {
            Ok(value) => Ok(Some(value)),
            Err(Error::Wizard(WizardError::Superseded)) => Err(WizardError::Superseded.into()),
            Err(e) => {
                warn!("Optional {} failed: {}", what, e);
                Ok(None)
            }
        }
    }

    /// Re-take the lock after a request. Fails if the user navigated away
    /// in the meantime, in which case the result must not be applied.
    async fn resume(&self, epoch: u64) -> Result<MutexGuard<'_, WizardState>> {
        let state = self.state.lock().await;
        if *self.epoch.borrow() != epoch {
            return Err(WizardError::Superseded.into());
        }
        Ok(state)
    }

    /// Release the busy flag after a failed request and record the message
    /// for display. A superseded action leaves the state alone.
    async fn fail(&self, epoch: u64, err: Error) -> Error {
        let mut state = self.state.lock().await;
        if *self.epoch.borrow() == epoch {
            state.busy = false;
            if !matches!(err, Error::Wizard(WizardError::Superseded)) {
                state.last_error = Some(user_message(&err));
            }
        }
        warn!(step = %state.step(), "Wizard action failed: {}", err);
        err
    }
}

/// Resolves once the epoch differs from `epoch`.
async fn superseded(rx: &mut watch::Receiver<u64>, epoch: u64) {
    loop {
        if *rx.borrow_and_update() != epoch {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Message suitable for inline display next to the step.
fn user_message(err: &Error) -> String {
    match err {
        Error::Api(e) => e.to_string(),
        Error::Validation(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use crate::api::{
        ActiveSubscription, AuthMe, AuthResponse, AuthUser, Backend, CheckoutSession,
        SubscriptionPlan,
    };
    use crate::error::ApiError;
    use crate::submission::FinishOnboardingPayload;

    /// In-process backend. Every call succeeds unless told otherwise.
    #[derive(Default)]
    pub(crate) struct StubBackend {
        pub subscribed: bool,
        pub fail_finish: bool,
        pub plans: Vec<SubscriptionPlan>,
        pub otp_requests: StdMutex<Vec<String>>,
        pub submissions: StdMutex<Vec<FinishOnboardingPayload>>,
    }

    fn auth(email: &str) -> AuthResponse {
        AuthResponse {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            user: Some(AuthUser {
                email: email.into(),
                ..Default::default()
            }),
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        async fn request_otp(&self, email: &str) -> Result<(), ApiError> {
            self.otp_requests.lock().unwrap().push(email.to_string());
            Ok(())
        }

        async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthResponse, ApiError> {
            if code != "123456" {
                return Err(ApiError::Status {
                    status: 400,
                    message: "Invalid code".into(),
                });
            }
            Ok(auth(email))
        }

        async fn auth_me(&self) -> Result<AuthMe, ApiError> {
            Ok(AuthMe {
                username: Some("runner".into()),
                ..Default::default()
            })
        }

        async fn active_subscription(&self) -> Result<Option<ActiveSubscription>, ApiError> {
            Ok(self.subscribed.then(ActiveSubscription::default))
        }

        async fn subscription_plans(&self, _limit: u32) -> Result<Vec<SubscriptionPlan>, ApiError> {
            Ok(self.plans.clone())
        }

        async fn create_checkout(&self, price_id: &str) -> Result<CheckoutSession, ApiError> {
            Ok(CheckoutSession {
                url: format!("https://checkout.example.com/{price_id}"),
            })
        }

        async fn finish_onboarding(&self, payload: &FinishOnboardingPayload) -> Result<(), ApiError> {
            if self.fail_finish {
                return Err(ApiError::Status {
                    status: 500,
                    message: "Internal Server Error".into(),
                });
            }
            self.submissions.lock().unwrap().push(payload.clone());
            Ok(())
        }

        async fn exchange_identity_token(
            &self,
            _id_token: &SecretString,
        ) -> Result<AuthResponse, ApiError> {
            Ok(auth("google@example.com"))
        }

        async fn clear_session(&self) {}
    }
}
