//! The main entry point for the log-monitoring-app service.
mod app;
mod handlers;
mod logging;
mod metrics;
mod server_log;
mod simulator;
mod types;
mod web;

use anyhow::Result;

/// The main function of the application.
///
/// Parses the command line and either serves the web API or runs a
/// simulation, depending on the arguments.
///
/// # Errors
///
/// Returns an error if setup fails or the server stops with an error.
#[tokio::main]
async fn main() -> Result<()> {
    app::launch().await
}
