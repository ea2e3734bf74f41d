//! Wire types for the onboarding backend.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// User summary returned alongside fresh tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

/// Body of `/auth/verify-otp` and `/auth/firebase`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Option<AuthUser>,
}

impl AuthResponse {
    pub fn has_tokens(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

// Tokens never end up in logs.
impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("has_tokens", &self.has_tokens())
            .field("user", &self.user)
            .finish()
    }
}

/// Subscription hints some backend versions attach to `/auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthMeSubscription {
    pub is_subscribed: Option<bool>,
    pub active: Option<bool>,
    pub status: Option<String>,
}

/// Body of `GET /auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthMe {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub name: Option<String>,
    pub role: String,
    pub onboarding_finished: Option<bool>,
    pub is_subscribed: Option<bool>,
    pub subscription: Option<AuthMeSubscription>,
}

impl AuthMe {
    /// Whether the profile itself claims an active subscription.
    pub fn reports_subscription(&self) -> bool {
        if self.is_subscribed == Some(true) {
            return true;
        }
        self.subscription.as_ref().is_some_and(|s| {
            s.is_subscribed == Some(true)
                || s.active == Some(true)
                || s.status.as_deref() == Some("active")
        })
    }
}

/// Body of `GET /subscriptions/active-subscriptions` when one exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActiveSubscription {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub product_id: Option<String>,
    pub plan: String,
    pub status: String,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub auto_renew: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    Day,
    Week,
    Month,
    Year,
}

impl Default for PlanInterval {
    fn default() -> Self {
        Self::Month
    }
}

impl PlanInterval {
    /// Billing weeks in one interval, used for the per-week price hint.
    fn weeks(&self) -> Option<u32> {
        match self {
            Self::Day => None,
            Self::Week => Some(1),
            Self::Month => Some(4),
            Self::Year => Some(52),
        }
    }
}

impl std::fmt::Display for PlanInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// One purchasable price from `GET /subscriptions/plans`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: String,
    /// Minor currency units (cents).
    pub amount: i64,
    pub currency: String,
    pub interval: PlanInterval,
    pub interval_count: u32,
    pub product: PlanProduct,
    pub nickname: Option<String>,
}

impl SubscriptionPlan {
    pub fn price(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }

    /// Nickname if set, otherwise the product name.
    pub fn label(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.product.name)
    }

    /// e.g. `"$19.99"`, `"€7.99"` or `"500.00 JPY"`.
    pub fn display_price(&self) -> String {
        format_money(self.price(), &self.currency)
    }

    /// Per-week price hint for multi-week plans, truncated to cents. No
    /// hint when the interval count from the backend is out of range.
    pub fn display_weekly_price(&self) -> Option<String> {
        let weeks = self
            .interval
            .weeks()?
            .checked_mul(self.interval_count.max(1))?;
        if weeks <= 1 {
            return None;
        }
        let weekly = (self.price() / Decimal::from(weeks))
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        Some(format!("{}/week", format_money(weekly, &self.currency)))
    }

    /// e.g. `"1 month"`, `"6 months"`.
    pub fn period_label(&self) -> String {
        let count = self.interval_count.max(1);
        if count == 1 {
            format!("1 {}", self.interval)
        } else {
            format!("{count} {}s", self.interval)
        }
    }
}

fn format_money(amount: Decimal, currency: &str) -> String {
    let amount = amount.round_dp(2);
    match currency.to_ascii_lowercase().as_str() {
        "usd" => format!("${amount:.2}"),
        "eur" => format!("€{amount:.2}"),
        "gbp" => format!("£{amount:.2}"),
        other => format!("{amount:.2} {}", other.to_ascii_uppercase()),
    }
}

/// Body of `POST /subscriptions/checkout`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckoutSession {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn plan(amount: i64, interval: PlanInterval, count: u32) -> SubscriptionPlan {
        SubscriptionPlan {
            id: "price_1".into(),
            amount,
            currency: "usd".into(),
            interval,
            interval_count: count,
            product: PlanProduct {
                id: "prod_1".into(),
                name: "Reformly Premium".into(),
                description: None,
            },
            nickname: None,
        }
    }

    #[test]
    fn plan_prices() {
        let yearly = plan(11999, PlanInterval::Year, 1);
        assert_eq!(yearly.price(), dec!(119.99));
        assert_eq!(yearly.display_price(), "$119.99");
        assert_eq!(yearly.display_weekly_price().as_deref(), Some("$2.30/week"));

        let four_weeks = plan(1999, PlanInterval::Month, 1);
        assert_eq!(four_weeks.display_weekly_price().as_deref(), Some("$4.99/week"));

        let weekly = plan(699, PlanInterval::Week, 1);
        assert_eq!(weekly.display_weekly_price(), None);
        assert_eq!(weekly.period_label(), "1 week");
        assert_eq!(plan(4799, PlanInterval::Month, 6).period_label(), "6 months");
    }

    #[test]
    fn absurd_interval_count_gives_no_weekly_price() {
        let p: SubscriptionPlan = serde_json::from_value(json!({
            "id": "price_forever", "amount": 999, "currency": "usd",
            "interval": "year", "intervalCount": 100000000
        }))
        .unwrap();
        assert_eq!(p.display_weekly_price(), None);
        assert_eq!(p.display_price(), "$9.99");

        let p = plan(999, PlanInterval::Year, u32::MAX);
        assert_eq!(p.display_weekly_price(), None);
    }

    #[test]
    fn plan_label_prefers_nickname() {
        let mut p = plan(999, PlanInterval::Month, 1);
        assert_eq!(p.label(), "Reformly Premium");
        p.nickname = Some("Monthly".into());
        assert_eq!(p.label(), "Monthly");
        p.currency = "jpy".into();
        assert_eq!(p.display_price(), "9.99 JPY");
    }

    #[test]
    fn plans_deserialize_from_backend_shape() {
        let raw = json!([{
            "id": "price_abc",
            "amount": 1999,
            "currency": "eur",
            "interval": "month",
            "intervalCount": 1,
            "product": {"id": "prod_1", "name": "Premium", "description": null},
            "nickname": null,
            "metadata": {}
        }]);
        let plans: Vec<SubscriptionPlan> = serde_json::from_value(raw).unwrap();
        assert_eq!(plans[0].display_price(), "€19.99");
        assert_eq!(plans[0].interval, PlanInterval::Month);
    }

    #[test]
    fn me_subscription_hints() {
        let me: AuthMe = serde_json::from_value(json!({
            "id": "u1", "email": "a@b.com", "role": "USER",
            "subscription": {"status": "active"}
        }))
        .unwrap();
        assert!(me.reports_subscription());
        assert!(!AuthMe::default().reports_subscription());
    }

    #[test]
    fn auth_response_debug_hides_tokens() {
        let resp: AuthResponse = serde_json::from_value(json!({
            "accessToken": "secret-access",
            "refreshToken": "secret-refresh",
            "user": {"id": "u1", "email": "a@b.com", "role": "USER"}
        }))
        .unwrap();
        assert!(resp.has_tokens());
        let printed = format!("{resp:?}");
        assert!(!printed.contains("secret-access"));
    }
}
