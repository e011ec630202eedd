//! Run declared suites against a WebDriver session

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use pagecheck_common::Config;
use pagecheck_e2e::{
    CommandRegistry, Driver, E2eError, E2eResult, LoginCommand, RunResult, RunnerConfig,
    SuiteResult, SuiteSpec, TestRunner, TestSuite, WebDriver,
};

use crate::output::{
    print_error, print_json, print_warning, render_table, status, OutputFormat, TableDisplay,
};

#[derive(Args)]
pub struct RunArgs {
    /// Run only the suite with this name
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Only run suites carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Directory with suite files (defaults to `specs_dir` from the config)
    #[arg(long)]
    pub specs: Option<PathBuf>,

    /// Override the base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the WebDriver endpoint
    #[arg(long)]
    pub webdriver: Option<String>,

    /// Directory for test-results.json
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One line of the summary table
#[derive(Debug, Serialize)]
struct SuiteRow {
    name: String,
    success: bool,
    passed: usize,
    failed: usize,
    skipped: usize,
    duration_ms: u64,
}

impl From<&SuiteResult> for SuiteRow {
    fn from(result: &SuiteResult) -> Self {
        Self {
            name: result.name.clone(),
            success: result.success(),
            passed: result.passed,
            failed: result.failed,
            skipped: result.skipped,
            duration_ms: result.duration_ms,
        }
    }
}

impl TableDisplay for SuiteRow {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Status", "Passed", "Failed", "Skipped", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            status(self.success),
            self.passed.to_string(),
            self.failed.to_string(),
            self.skipped.to_string(),
            format!("{} ms", self.duration_ms),
        ]
    }
}

/// Returns whether every selected suite passed
pub async fn execute(args: RunArgs, mut config: Config, format: OutputFormat) -> Result<bool> {
    if let Some(url) = args.base_url {
        config.base_url = url;
    }
    if let Some(url) = args.webdriver {
        config.webdriver.url = url;
    }
    if let Some(dir) = args.output {
        config.output_dir = dir;
    }
    config.validate()?;

    let dir = args.specs.unwrap_or_else(|| config.specs_dir.clone());
    let specs = super::load_specs(&dir, args.tag.as_deref())?;
    if specs.is_empty() {
        print_warning(&format!("No suites found in {}", dir.display()));
        return Ok(true);
    }

    let runner = build_runner(&config, &specs)?;
    let suites: Vec<TestSuite> = specs.iter().map(SuiteSpec::to_suite).collect();
    if let Some(name) = &args.suite {
        if !suites.iter().any(|s| &s.name == name) {
            return Err(E2eError::SuiteNotFound(name.clone()).into());
        }
    }

    info!(
        "Starting {} session at {}",
        config.webdriver.browser, config.webdriver.url
    );
    let mut driver = WebDriver::connect(&config.webdriver)
        .await
        .context("failed to start browser session")?;

    let outcome = run(&runner, &mut driver, &suites, args.suite.as_deref()).await;
    if let Err(e) = driver.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    let results = outcome?;

    runner.write_results(&results)?;
    report(&results, format);
    Ok(results.success())
}

/// Runner with the built-in `login` command plus every scripted command the
/// suites declare
fn build_runner(config: &Config, specs: &[SuiteSpec]) -> E2eResult<TestRunner> {
    let mut commands = CommandRegistry::new();
    LoginCommand::default().register(&mut commands)?;
    for spec in specs {
        spec.register_commands(&mut commands)?;
    }
    Ok(TestRunner::new(RunnerConfig::from(config)).with_commands(commands))
}

async fn run(
    runner: &TestRunner,
    driver: &mut dyn Driver,
    suites: &[TestSuite],
    name: Option<&str>,
) -> E2eResult<RunResult> {
    match name {
        Some(name) => {
            let start = Instant::now();
            let suite = runner.run_named(driver, suites, name).await?;
            Ok(RunResult::from_suites(
                vec![suite],
                start.elapsed().as_millis() as u64,
            ))
        }
        None => runner.run_all(driver, suites).await,
    }
}

fn report(results: &RunResult, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(results);
        return;
    }

    let rows: Vec<SuiteRow> = results.suites.iter().map(SuiteRow::from).collect();
    println!("{}", render_table(&rows));

    for suite in &results.suites {
        if let Some(failure) = &suite.setup_error {
            print_error(&format!("{} (before_all): {}", suite.name, failure.message));
        }
        for test in suite.results.iter().filter(|t| t.failure.is_some()) {
            if let Some(failure) = &test.failure {
                print_error(&format!("{} > {}: {}", suite.name, test.name, failure.message));
                if !failure.trail.is_empty() {
                    eprintln!("    at {}", failure.trail.join(" > "));
                }
                for violation in &failure.violations {
                    eprintln!(
                        "    [{}] {}: {} ({})",
                        violation.impact,
                        violation.rule,
                        violation.help,
                        violation.nodes.join(", ")
                    );
                }
            }
        }
        if let Some(failure) = &suite.teardown_error {
            print_error(&format!("{} (after_all): {}", suite.name, failure.message));
        }
    }

    println!(
        "{} passed, {} failed, {} skipped ({} ms)",
        results.passed, results.failed, results.skipped, results.duration_ms
    );
}
