mod cli;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use predictcheck_backend_ort::OrtBackend;
use predictcheck_core::{Device, Engine};
use predictcheck_harness::{Suite, SuiteConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    std::env::set_var("RUST_LOG", &cli.log);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run {
            server,
            data_dir,
            models,
            backends,
            epsilon,
            timeout_secs,
        } => {
            let config = SuiteConfig {
                server,
                data_dir,
                models,
                backends,
                epsilon,
                timeout: Duration::from_secs(timeout_secs),
            };
            run(config).await
        }
        Command::Backends => {
            println!("cpu");
            if OrtBackend::cuda_available() {
                println!("cuda:N");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(config: SuiteConfig) -> Result<ExitCode> {
    let engine = Engine::global();
    for name in &config.backends {
        let device = parse_device(name)?;
        engine.register(name, OrtBackend::new(), device);
    }

    let suite = Suite::new(config, engine).context("invalid suite configuration")?;
    let report = suite.run().await;
    println!("{report}");

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn parse_device(raw: &str) -> Result<Device> {
    if raw.eq_ignore_ascii_case("cpu") {
        return Ok(Device::Cpu);
    }

    if let Some(rest) = raw.strip_prefix("cuda:") {
        let device_id: u32 = rest.parse().context("invalid cuda device id")?;
        return Ok(Device::Cuda { device_id });
    }

    anyhow::bail!("unsupported backend: {raw} (expected cpu or cuda:N)");
}
