use clap::{Parser, Subcommand};
use predictcheck_harness::{DEFAULT_DATA_DIR, DEFAULT_SERVER};

#[derive(Parser, Debug)]
#[command(
    name = "predictcheck",
    version,
    about = "Checks converted graph models against recorded reference outputs"
)]
pub struct Cli {
    /// Log level (RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every model on every backend and compare with the fixtures
    Run {
        /// Fixture server base URL
        #[arg(long, env = "PREDICTCHECK_SERVER", default_value = DEFAULT_SERVER)]
        server: String,

        /// Directory under the server root holding fixtures and models
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: String,

        /// Model name (repeatable)
        #[arg(long = "model", required = true)]
        models: Vec<String>,

        /// Backend to check: cpu or cuda:N (repeatable)
        #[arg(long = "backend", default_values_t = vec!["cpu".to_string()])]
        backends: Vec<String>,

        /// Override the backend's comparison tolerance
        #[arg(long)]
        epsilon: Option<f64>,

        /// Per-request HTTP timeout
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
    /// List the backends this binary can check
    Backends,
}
