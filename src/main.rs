//! Headless entrypoint: restore the persisted session and evaluate one route.
//!
//! Usage: `session-guard <path> [ROLE,ROLE...]`
//!
//! Prints the guard decision as JSON on stdout. Logs go to stderr, JSON when
//! `LOG_FORMAT=json`, human-readable otherwise.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use session_guard::GuardContext;
use session_guard::config::Config;
use session_guard::guard::navigation::HistoryNavigator;
use session_guard::role::parse_roles;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let mut args = env::args().skip(1);
    let Some(location) = args.next() else {
        eprintln!("usage: session-guard <path> [ROLE,ROLE...]");
        return ExitCode::from(2);
    };
    let role_list = args.next().unwrap_or_default();
    let required = match parse_roles(role_list.split(',').filter(|name| !name.trim().is_empty())) {
        Ok(roles) => roles,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let navigator = Arc::new(HistoryNavigator::at(location.clone()));
    let ctx = GuardContext::build(config, navigator);
    ctx.start().await;
    ctx.session.wait_for_reconciliation().await;
    tracing::info!(
        authenticated = ctx.session.session().is_authenticated(),
        "Session ready"
    );

    let decision = ctx.guard.evaluate(&required, &location);
    match serde_json::to_string(&decision) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to encode decision: {}", e);
            ExitCode::FAILURE
        }
    }
}
