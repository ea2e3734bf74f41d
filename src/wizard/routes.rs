//! REST endpoints exposing the wizard to a local front end.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use super::Wizard;
use crate::error::{Error, WizardError};
use crate::sequencer::Transition;

/// Shared state for wizard routes.
#[derive(Clone)]
pub struct WizardRouteState {
    pub wizard: Arc<Wizard>,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "reformly-onboarding"
    }))
}

/// GET /api/onboarding/status
///
/// Current step, header progress, busy flag and last error.
async fn get_status(State(state): State<WizardRouteState>) -> impl IntoResponse {
    Json(state.wizard.view().await)
}

/// GET /api/onboarding/profile
async fn get_profile(State(state): State<WizardRouteState>) -> impl IntoResponse {
    Json(state.wizard.snapshot().await)
}

/// POST /api/onboarding/next
async fn post_next(State(state): State<WizardRouteState>) -> Response {
    match state.wizard.next().await {
        Ok(transition) => moved(&state, transition).await,
        Err(e) => error_response(&e),
    }
}

/// POST /api/onboarding/back
async fn post_back(State(state): State<WizardRouteState>) -> Response {
    let transition = state.wizard.back().await;
    moved(&state, transition).await
}

async fn moved(state: &WizardRouteState, transition: Transition) -> Response {
    Json(serde_json::json!({
        "transition": {
            "from": transition.from,
            "to": transition.to,
            "kind": transition.kind.to_string(),
        },
        "view": state.wizard.view().await,
    }))
    .into_response()
}

fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::Wizard(WizardError::Busy) => StatusCode::CONFLICT,
        Error::Wizard(WizardError::Incomplete { .. }) | Error::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

/// Build the wizard REST routes.
pub fn wizard_routes(state: WizardRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/profile", get(get_profile))
        .route("/api/onboarding/next", post(post_next))
        .route("/api/onboarding/back", post(post_back))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoIdentity;
    use crate::config::WizardConfig;
    use crate::store::MemoryStore;
    use crate::wizard::WizardDeps;
    use crate::wizard::test_support::StubBackend;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app(deep_link: Option<&str>) -> Router {
        let deps = WizardDeps {
            kv: Arc::new(MemoryStore::new()),
            backend: Arc::new(StubBackend::default()),
            identity: Arc::new(NoIdentity),
            config: WizardConfig::default(),
        };
        let wizard = Arc::new(Wizard::start(deps, deep_link).await);
        wizard_routes(WizardRouteState { wizard })
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_reports_first_step() {
        let response = app(None)
            .await
            .oneshot(Request::get("/api/onboarding/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["step"], "welcome");
        assert_eq!(body["index"], 0);
        assert_eq!(body["total"], 15);
    }

    #[tokio::test]
    async fn next_from_welcome_moves_to_email() {
        let response = app(None)
            .await
            .oneshot(Request::post("/api/onboarding/next").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["transition"]["kind"], "advanced");
        assert_eq!(body["view"]["step"], "email");
    }

    #[tokio::test]
    async fn next_without_answer_is_unprocessable() {
        let response = app(Some("1"))
            .await
            .oneshot(Request::post("/api/onboarding/next").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(body["error"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn profile_is_a_plain_snapshot() {
        let response = app(None)
            .await
            .oneshot(Request::get("/api/onboarding/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["auth"]["email"], "");
        assert!(body["demographics"]["birthday"].is_null());
    }
}
