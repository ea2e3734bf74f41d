use std::sync::Arc;

use anyhow::Context;

use reformly_onboarding::api::{HttpBackend, IdentityTokenSource, NoIdentity, StaticIdentity, TokenStore};
use reformly_onboarding::config::WizardConfig;
use reformly_onboarding::store::{KeyValueStore, LibSqlStore};
use reformly_onboarding::terminal;
use reformly_onboarding::wizard::{Wizard, WizardDeps, WizardRouteState, wizard_routes};

/// `--step N` or `--step=N`, the terminal equivalent of the `?step=` deep link.
fn step_arg() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--step" {
            return args.next();
        }
        if let Some(value) = arg.strip_prefix("--step=") {
            return Some(value.to_string());
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = WizardConfig::from_env().context("Invalid onboarding configuration")?;

    eprintln!("Reformly onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Flow: {}", config.flow);
    match &config.api_base_url {
        Some(url) => eprintln!("   Backend: {}", url),
        None => eprintln!("   Backend: not configured (set ONBOARDING_API_BASE_URL)"),
    }
    eprintln!("   Database: {}", config.db_path.display());

    // ── Storage ─────────────────────────────────────────────────────────
    let kv: Arc<dyn KeyValueStore> = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    // ── Backend ─────────────────────────────────────────────────────────
    let identity: Arc<dyn IdentityTokenSource> =
        if config.identity_token.is_some() || config.google_id_token.is_some() {
            Arc::new(StaticIdentity::new(
                config.identity_token.clone(),
                config.google_id_token.clone(),
            ))
        } else {
            Arc::new(NoIdentity)
        };
    let tokens = Arc::new(TokenStore::load(Arc::clone(&kv)).await);
    let backend = Arc::new(HttpBackend::new(
        config.api_base_url.clone(),
        config.request_timeout,
        tokens,
        Arc::clone(&identity),
    )?);

    let status_port = config.status_port;
    let deps = WizardDeps {
        kv,
        backend,
        identity,
        config,
    };
    let wizard = Arc::new(Wizard::start(deps, step_arg().as_deref()).await);

    // ── Status API ──────────────────────────────────────────────────────
    if let Some(port) = status_port {
        let app = wizard_routes(WizardRouteState {
            wizard: Arc::clone(&wizard),
        });
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("Failed to bind status port {port}"))?;
        eprintln!("   Status API: http://127.0.0.1:{}/api/onboarding/status", port);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Status API stopped: {}", e);
            }
        });
    }
    eprintln!("   Type 'back', 'logout' or 'quit' at any time.\n");

    terminal::run(wizard).await
}
