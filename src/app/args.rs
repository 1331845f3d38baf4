use crate::handlers::DEFAULT_FAILURE_RATE;
use crate::server_log::DEFAULT_SERVICE;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "log-monitoring-app")]
#[command(about = "A demo service that emits structured JSON logs for a log-aggregation pipeline")]
pub struct AppArgs {
    #[arg(long, default_value = "127.0.0.1", help = "Address to bind the web server to")]
    pub host: IpAddr,

    #[arg(long, default_value_t = 3000, help = "Port for the web server")]
    pub port: u16,

    #[arg(
        long,
        help = "Environment recorded on every server log (or set APP_ENV, default: development)"
    )]
    pub environment: Option<String>,

    #[arg(long, default_value = DEFAULT_SERVICE, help = "Service name recorded on every server log")]
    pub service_name: String,

    #[arg(
        long,
        default_value_t = 10_000,
        help = "Maximum client log entries kept in memory, oldest evicted first (0 = unbounded)"
    )]
    pub max_entries: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_FAILURE_RATE,
        help = "Probability of the injected database timeout (0.0 to 1.0)"
    )]
    pub failure_rate: f64,

    #[arg(long, help = "Seed for reproducible fabricated metrics")]
    pub seed: Option<u64>,

    #[arg(
        long,
        value_name = "ROUNDS",
        help = "Click every action button ROUNDS times, then exit instead of serving"
    )]
    pub simulate: Option<u64>,

    #[arg(
        long,
        value_name = "NAME",
        requires = "simulate",
        help = "Only click the named action button during --simulate"
    )]
    pub simulate_button: Option<String>,

    #[arg(long, help = "Directory to write the client log export to on exit")]
    pub export_dir: Option<PathBuf>,
}

impl AppArgs {
    pub fn from_cli() -> Self {
        <Self as Parser>::parse()
    }
}
