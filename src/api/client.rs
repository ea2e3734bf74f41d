//! reqwest-backed implementation of [`Backend`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::api::identity::{IdentityTokenSource, optional_id_token};
use crate::api::tokens::TokenStore;
use crate::api::types::{
    ActiveSubscription, AuthMe, AuthResponse, CheckoutSession, SubscriptionPlan,
};
use crate::api::Backend;
use crate::error::ApiError;
use crate::submission::FinishOnboardingPayload;

/// Which credential goes into the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// Backend access token from a previous verification.
    Session,
    /// Identity-provider ID token (OTP endpoints).
    IdentityToken,
    None,
}

/// HTTP client for the onboarding backend.
pub struct HttpBackend {
    base_url: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
    tokens: Arc<TokenStore>,
    identity: Arc<dyn IdentityTokenSource>,
}

impl HttpBackend {
    /// `base_url` of `None` yields a client whose every call fails with
    /// [`ApiError::NotConfigured`].
    pub fn new(
        base_url: Option<String>,
        timeout: Duration,
        tokens: Arc<TokenStore>,
        identity: Arc<dyn IdentityTokenSource>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            client,
            timeout,
            tokens,
            identity,
        })
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    async fn authorization(&self, auth: Auth) -> Option<String> {
        match auth {
            Auth::Session => self.tokens.bearer().await,
            Auth::IdentityToken => optional_id_token(self.identity.as_ref())
                .await
                .map(|t| format!("Bearer {}", t.expose_secret())),
            Auth::None => None,
        }
    }

    /// Send a request and return the decoded JSON body. Empty or non-JSON
    /// success bodies come back as `None`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        auth: Auth,
    ) -> Result<Option<Value>, ApiError> {
        let base = self.base_url.as_deref().ok_or(ApiError::NotConfigured)?;
        let url = format!("{base}{path}");

        let mut request = self.client.request(method.clone(), &url);
        let authorization = self.authorization(auth).await;
        debug!(
            %method,
            path,
            has_token = authorization.is_some(),
            has_body = body.is_some(),
            "Backend request"
        );
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    endpoint: path.to_string(),
                    timeout: self.timeout,
                }
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        debug!(path, status = status.as_u16(), "Backend response");

        if status.as_u16() == 401 && auth != Auth::IdentityToken {
            let message = if self.tokens.has_refresh_token().await {
                "Session expired. Please sign in again."
            } else {
                "Unauthorized"
            };
            self.tokens.clear().await;
            return Err(ApiError::Unauthorized {
                message: message.to_string(),
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<Value>(&text) {
                Ok(body) => extract_error_message(&body, status.as_u16()),
                Err(_) => status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| default_error_message(status.as_u16())),
            };
            warn!(path, status = status.as_u16(), %message, "Backend request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        if !is_json || text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn store_tokens(&self, response: &AuthResponse) {
        if response.has_tokens() {
            self.tokens
                .set(&response.access_token, &response.refresh_token)
                .await;
        } else {
            warn!("Auth response is missing accessToken or refreshToken");
        }
    }
}

fn default_error_message(status: u16) -> String {
    format!("Request failed with status {status}")
}

/// Human-readable message from an error body: `message` (string, or array
/// joined with ", "), then `error`, then a generic status line.
pub fn extract_error_message(body: &Value, status: u16) -> String {
    match body.get("message") {
        Some(Value::String(s)) if !s.is_empty() => return s.clone(),
        Some(Value::Array(items)) if !items.is_empty() => {
            return items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
        }
        _ => {}
    }
    match body.get("error") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => default_error_message(status),
    }
}

fn is_empty_body(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn request_otp(&self, email: &str) -> Result<(), ApiError> {
        self.send(
            Method::POST,
            "/auth/request-otp",
            Some(json!({ "email": email })),
            Auth::IdentityToken,
        )
        .await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthResponse, ApiError> {
        let body = self
            .send(
                Method::POST,
                "/auth/verify-otp",
                Some(json!({ "email": email, "code": code })),
                Auth::IdentityToken,
            )
            .await?;
        if is_empty_body(&body) {
            return Err(ApiError::InvalidResponse(
                "Invalid response from server".into(),
            ));
        }
        let response: AuthResponse = serde_json::from_value(body.unwrap_or_default())?;
        self.store_tokens(&response).await;
        Ok(response)
    }

    async fn auth_me(&self) -> Result<AuthMe, ApiError> {
        let body = self.send(Method::GET, "/auth/me", None, Auth::Session).await?;
        if is_empty_body(&body) {
            return Err(ApiError::InvalidResponse("Empty /auth/me response".into()));
        }
        Ok(serde_json::from_value(body.unwrap_or_default())?)
    }

    async fn active_subscription(&self) -> Result<Option<ActiveSubscription>, ApiError> {
        let body = self
            .send(
                Method::GET,
                "/subscriptions/active-subscriptions",
                None,
                Auth::Session,
            )
            .await?;
        if is_empty_body(&body) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(body.unwrap_or_default())?))
    }

    async fn subscription_plans(&self, limit: u32) -> Result<Vec<SubscriptionPlan>, ApiError> {
        let path = format!("/subscriptions/plans?limit={limit}");
        match self.send(Method::GET, &path, None, Auth::Session).await? {
            Some(body) => Ok(serde_json::from_value(body)?),
            None => Ok(Vec::new()),
        }
    }

    async fn create_checkout(&self, price_id: &str) -> Result<CheckoutSession, ApiError> {
        let body = self
            .send(
                Method::POST,
                "/subscriptions/checkout",
                Some(json!({ "priceId": price_id })),
                Auth::Session,
            )
            .await?;
        let session: CheckoutSession = match body {
            Some(value) => serde_json::from_value(value)?,
            None => CheckoutSession::default(),
        };
        if session.url.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Checkout session has no URL".into(),
            ));
        }
        Ok(session)
    }

    async fn finish_onboarding(&self, payload: &FinishOnboardingPayload) -> Result<(), ApiError> {
        let body = serde_json::to_value(payload)?;
        self.send(
            Method::POST,
            "/users/finish-onboarding",
            Some(body),
            Auth::Session,
        )
        .await?;
        Ok(())
    }

    async fn exchange_identity_token(&self, id_token: &SecretString) -> Result<AuthResponse, ApiError> {
        let body = self
            .send(
                Method::POST,
                "/auth/firebase",
                Some(json!({ "idToken": id_token.expose_secret() })),
                Auth::None,
            )
            .await?;
        if is_empty_body(&body) {
            return Err(ApiError::InvalidResponse(
                "Invalid response from server".into(),
            ));
        }
        let response: AuthResponse = serde_json::from_value(body.unwrap_or_default())?;
        self.store_tokens(&response).await;
        Ok(response)
    }

    async fn clear_session(&self) {
        self.tokens.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::identity::NoIdentity;
    use crate::store::MemoryStore;

    #[test]
    fn error_message_extraction_order() {
        assert_eq!(
            extract_error_message(&json!({"message": "Invalid code"}), 400),
            "Invalid code"
        );
        assert_eq!(
            extract_error_message(
                &json!({"message": ["email must be an email", "code too short"]}),
                422
            ),
            "email must be an email, code too short"
        );
        assert_eq!(
            extract_error_message(&json!({"error": "Bad Request"}), 400),
            "Bad Request"
        );
        assert_eq!(
            extract_error_message(&json!({"statusCode": 500}), 500),
            "Request failed with status 500"
        );
    }

    #[tokio::test]
    async fn unconfigured_base_url() {
        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryStore::new())));
        let backend =
            HttpBackend::new(None, Duration::from_secs(1), tokens, Arc::new(NoIdentity)).unwrap();
        assert!(matches!(
            backend.request_otp("a@b.com").await,
            Err(ApiError::NotConfigured)
        ));
    }

    #[test]
    fn empty_bodies() {
        assert!(is_empty_body(&None));
        assert!(is_empty_body(&Some(json!({}))));
        assert!(is_empty_body(&Some(Value::Null)));
        assert!(!is_empty_body(&Some(json!({"id": "sub_1"}))));
    }
}
