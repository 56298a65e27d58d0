use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use predictcheck_core::Engine;
use tracing::{error, info};

use crate::{fetch_fixtures, CheckResult, Checker, FixtureClient, GraphModelLoader, SuiteConfig};

pub const SUITE_NAME: &str = "#REGRESSION convert_predict";

#[derive(Debug)]
pub struct CaseResult {
    pub model: String,
    pub backend: String,
    /// `None` on pass, the rendered failure otherwise.
    pub failure: Option<String>,
    pub elapsed: Duration,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    pub cases: Vec<CaseResult>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn case(&self, model: &str, backend: &str) -> Option<&CaseResult> {
        self.cases
            .iter()
            .find(|c| c.model == model && c.backend == backend)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SUITE_NAME}")?;
        for case in &self.cases {
            let status = if case.passed() { "ok" } else { "FAILED" };
            writeln!(
                f,
                "  {} with {}. ... {status} ({:.2?})",
                case.model, case.backend, case.elapsed
            )?;
            if let Some(failure) = &case.failure {
                for line in failure.lines() {
                    writeln!(f, "      {line}")?;
                }
            }
        }
        write!(f, "{} passed; {} failed", self.passed(), self.failed())
    }
}

/// Every configured model on every configured backend, one at a time.
pub struct Suite {
    config: SuiteConfig,
    client: FixtureClient,
    checker: Checker,
}

impl Suite {
    pub fn new(config: SuiteConfig, engine: Arc<Engine>) -> CheckResult<Self> {
        let client = FixtureClient::new(&config.server, &config.data_dir, config.timeout)?;
        let loader = GraphModelLoader::new(client.clone());
        let checker = Checker::new(engine, loader, config.epsilon);
        Ok(Self {
            config,
            client,
            checker,
        })
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    pub async fn run(&self) -> SuiteReport {
        let mut report = SuiteReport::default();
        info!(
            base = %self.client.base(),
            models = self.config.models.len(),
            backends = ?self.config.backends,
            "{SUITE_NAME}"
        );

        for model in &self.config.models {
            let started = Instant::now();
            let fixtures = match fetch_fixtures(&self.client, model).await {
                Ok(fixtures) => fixtures,
                Err(err) => {
                    error!(model = %model, error = %err, "fixture setup failed");
                    let elapsed = started.elapsed();
                    for backend in &self.config.backends {
                        report.cases.push(CaseResult {
                            model: model.clone(),
                            backend: backend.clone(),
                            failure: Some(format!("setup: {err}")),
                            elapsed,
                        });
                    }
                    continue;
                }
            };

            for backend in &self.config.backends {
                let started = Instant::now();
                let outcome = self.checker.check(model, backend, &fixtures).await;
                let elapsed = started.elapsed();
                match &outcome {
                    Ok(()) => info!(model = %model, backend = %backend, ?elapsed, "passed"),
                    Err(err) => error!(model = %model, backend = %backend, error = %err, "failed"),
                }
                report.cases.push(CaseResult {
                    model: model.clone(),
                    backend: backend.clone(),
                    failure: outcome.err().map(|e| e.to_string()),
                    elapsed,
                });
            }
        }

        report
    }
}
