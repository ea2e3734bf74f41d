//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sequencer::FlowVariant;

/// Wizard configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Backend base URL. Every backend call fails while unset.
    pub api_base_url: Option<String>,
    /// libSQL file backing the durable store.
    pub db_path: PathBuf,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Which step table to run.
    pub flow: FlowVariant,
    /// Remember the current step index across restarts.
    pub persist_step: bool,
    /// `limit` passed to the plans endpoint.
    pub plans_limit: u32,
    /// Port for the local status API; disabled when `None`.
    pub status_port: Option<u16>,
    /// Advance past the crafting step even if the final submission fails.
    pub proceed_on_submit_failure: bool,
    /// Minimum wait between two OTP e-mails.
    pub otp_resend_cooldown: Duration,
    /// Interval of the crafting progress ticker.
    pub crafting_tick: Duration,
    /// Pre-issued identity-provider token sent with OTP requests.
    pub identity_token: Option<String>,
    /// Pre-issued Google ID token used by "Sign in with Google".
    pub google_id_token: Option<String>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            db_path: PathBuf::from("./data/onboarding.db"),
            request_timeout: Duration::from_secs(15),
            flow: FlowVariant::Classic,
            persist_step: false,
            plans_limit: 3,
            status_port: None,
            proceed_on_submit_failure: true,
            otp_resend_cooldown: Duration::from_secs(90),
            crafting_tick: Duration::from_millis(200),
            identity_token: None,
            google_id_token: None,
        }
    }
}

impl WizardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables
    /// keep their defaults; malformed ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        config.api_base_url = match get("ONBOARDING_API_BASE_URL") {
            Some(url) => Some(url),
            None => get("API_BASE_URL").inspect(|_| {
                tracing::warn!(
                    "Using deprecated API_BASE_URL; set ONBOARDING_API_BASE_URL instead"
                );
            }),
        };

        if let Some(path) = get("ONBOARDING_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(secs) = parse::<u64>(&get, "ONBOARDING_REQUEST_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(invalid("ONBOARDING_REQUEST_TIMEOUT_SECS", "must be positive"));
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get("ONBOARDING_FLOW") {
            config.flow = raw
                .parse()
                .map_err(|e: String| invalid("ONBOARDING_FLOW", &e))?;
        }
        if let Some(flag) = parse_bool(&get, "ONBOARDING_PERSIST_STEP")? {
            config.persist_step = flag;
        }
        if let Some(limit) = parse::<u32>(&get, "ONBOARDING_PLANS_LIMIT")? {
            config.plans_limit = limit;
        }
        config.status_port = parse::<u16>(&get, "ONBOARDING_STATUS_PORT")?;
        if let Some(flag) = parse_bool(&get, "ONBOARDING_PROCEED_ON_SUBMIT_FAILURE")? {
            config.proceed_on_submit_failure = flag;
        }
        config.identity_token = get("ONBOARDING_IDENTITY_TOKEN");
        config.google_id_token = get("ONBOARDING_GOOGLE_ID_TOKEN");

        Ok(config)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| raw.parse::<T>().map_err(|e| invalid(key, &e.to_string())))
        .transpose()
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &format!("expected a boolean, got '{raw}'"))),
        })
        .transpose()
}
