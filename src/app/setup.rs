//! This module handles the initial setup of the application.
use super::args::AppArgs;
use crate::handlers::Handlers;
use crate::logging::LogStore;
use crate::metrics::Metrics;
use crate::server_log::{ServerLogger, StdoutSink};
use crate::simulator::{button_names, ActionButton};
use anyhow::{bail, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted when `--environment` is not given.
const ENVIRONMENT_VAR: &str = "APP_ENV";
const DEFAULT_ENVIRONMENT: &str = "development";

/// Contains all the components the application needs to run.
pub struct PreparedApp {
    /// The command-line arguments.
    pub args: AppArgs,
    /// Address for the web server.
    pub addr: SocketAddr,
    /// The client-side log store shared by every route.
    pub store: LogStore,
    /// The simulated API handlers.
    pub handlers: Handlers,
}

/// Prepares the application for running.
///
/// This function performs the following steps:
/// 1. Configures diagnostic logging.
/// 2. Validates the arguments.
/// 3. Resolves the environment name.
/// 4. Builds the log store, metric source, server logger and handlers.
/// 5. Prints a start banner.
///
/// # Errors
///
/// This function will return an error if the arguments are invalid.
pub fn prepare(args: AppArgs) -> Result<PreparedApp> {
    configure_logging();
    validate(&args)?;

    let environment = resolve_environment(&args);
    let addr = SocketAddr::new(args.host, args.port);

    let store = LogStore::with_capacity(Some(args.max_entries));
    let logger = ServerLogger::new(
        args.service_name.clone(),
        environment.clone(),
        Metrics::from_seed(args.seed),
        Arc::new(StdoutSink),
    );
    let handlers = Handlers::new(logger, args.failure_rate);

    print_start_banner(&args, &environment, addr);

    Ok(PreparedApp {
        args,
        addr,
        store,
        handlers,
    })
}

/// Configures diagnostic logging.
///
/// Diagnostics go to stderr so stdout carries only the JSON records.
/// `RUST_LOG` overrides the default filter.
fn configure_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,log_monitoring_app=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn validate(args: &AppArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.failure_rate) {
        bail!(
            "--failure-rate must be between 0.0 and 1.0, got {}",
            args.failure_rate
        );
    }
    if args.service_name.trim().is_empty() {
        bail!("--service-name must not be empty");
    }
    if let Some(name) = &args.simulate_button {
        if ActionButton::find(name).is_none() {
            bail!("Unknown action button '{}' (expected one of: {})", name, button_names());
        }
    }
    Ok(())
}

/// Resolves the environment name from the argument, then `APP_ENV`.
fn resolve_environment(args: &AppArgs) -> String {
    args.environment
        .clone()
        .or_else(|| std::env::var(ENVIRONMENT_VAR).ok())
        .filter(|environment| !environment.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Prints a banner with startup information to stderr.
fn print_start_banner(args: &AppArgs, environment: &str, addr: SocketAddr) {
    eprintln!("🚀 Starting log-monitoring-app");
    eprintln!("Service: {} ({})", args.service_name, environment);
    match args.simulate {
        Some(rounds) => match &args.simulate_button {
            Some(name) => eprintln!("Mode: simulation, {} rounds of '{}'", rounds, name),
            None => eprintln!("Mode: simulation, {} rounds", rounds),
        },
        None => eprintln!("Web API: http://{}", addr),
    }
    match args.max_entries {
        0 => eprintln!("Client log capacity: unbounded"),
        max => eprintln!("Client log capacity: {} entries", max),
    }
    if let Some(seed) = args.seed {
        eprintln!("Metric seed: {}", seed);
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> AppArgs {
        let mut argv = vec!["log-monitoring-app"];
        argv.extend_from_slice(extra);
        AppArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_failure_rate_out_of_range() {
        assert!(validate(&args(&["--failure-rate", "1.5"])).is_err());
        assert!(validate(&args(&["--failure-rate", "0.25"])).is_ok());
    }

    #[test]
    fn test_unknown_simulate_button() {
        let err = validate(&args(&["--simulate", "1", "--simulate-button", "Launch Rocket"]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Launch Rocket"));
        assert!(err.contains("Fetch Data"));
        assert!(validate(&args(&["--simulate", "1", "--simulate-button", "Track Event"])).is_ok());
    }

    #[test]
    fn test_explicit_environment_wins() {
        assert_eq!(resolve_environment(&args(&["--environment", "production"])), "production");
    }

    #[test]
    fn test_prepare_builds_bounded_store() {
        let prepared = prepare(args(&["--max-entries", "5", "--port", "0"])).unwrap();
        assert_eq!(prepared.store.capacity(), Some(5));
        assert_eq!(prepared.addr.port(), 0);
    }
}
