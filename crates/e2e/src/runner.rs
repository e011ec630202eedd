//! Suite runner: hooks, isolation, viewport and result collection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use pagecheck_common::{Config, Viewport};

use crate::a11y::{AccessibilityChecker, Violation};
use crate::assertion::ExpectConfig;
use crate::command::CommandRegistry;
use crate::context::TestContext;
use crate::driver::Driver;
use crate::error::{DriverError, E2eError, E2eResult};
use crate::suite::{Isolation, Test, TestSuite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestState {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteState {
    Idle,
    SettingUp,
    ExecutingTests,
    TornDown,
}

/// Why a test (or hook) failed, flattened for reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Steps that were executing, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trail: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl From<&E2eError> for Failure {
    fn from(err: &E2eError) -> Self {
        let root = err.root();
        let (selector, expected, actual) = match root {
            E2eError::AssertionTimeout {
                selector,
                expected,
                actual,
                ..
            } => (
                Some(selector.clone()),
                Some(expected.clone()),
                Some(actual.clone()),
            ),
            E2eError::Driver(DriverError::NotFound { selector })
            | E2eError::Driver(DriverError::NotInteractable { selector, .. }) => {
                (Some(selector.clone()), None, None)
            }
            _ => (None, None, None),
        };
        let violations = match root {
            E2eError::AccessibilityViolation { violations } => violations.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind().to_string(),
            message: root.to_string(),
            selector,
            expected,
            actual,
            trail: err.trail(),
            violations,
        }
    }
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub state: TestState,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl TestResult {
    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: TestState::Skipped,
            duration_ms: 0,
            failure: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.state == TestState::Passed
    }
}

/// Result of running one suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub state: SuiteState,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    /// A `before_all` hook failed; every test was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<Failure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<Failure>,
    pub results: Vec<TestResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.setup_error.is_none() && self.teardown_error.is_none()
    }

    pub fn test(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Result of running several suites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub suites: Vec<SuiteResult>,
}

impl RunResult {
    pub fn from_suites(suites: Vec<SuiteResult>, duration_ms: u64) -> Self {
        Self {
            total: suites.iter().map(|s| s.total).sum(),
            passed: suites.iter().map(|s| s.passed).sum(),
            failed: suites.iter().map(|s| s.failed).sum(),
            skipped: suites.iter().map(|s| s.skipped).sum(),
            duration_ms,
            suites,
        }
    }

    pub fn success(&self) -> bool {
        self.suites.iter().all(SuiteResult::success)
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    /// Isolation for suites that do not declare one
    pub isolation: Isolation,
    pub expect: ExpectConfig,
    /// Applied at the start of suites without their own viewport
    pub viewport: Option<Viewport>,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            isolation: Isolation::Reset,
            expect: ExpectConfig::default(),
            viewport: None,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl From<&Config> for RunnerConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            isolation: Isolation::from(config.test_isolation),
            expect: ExpectConfig::from(config),
            viewport: Some(config.viewport),
            output_dir: config.output_dir.clone(),
        }
    }
}

/// Runs suites sequentially against one driver session
#[derive(Debug, Default)]
pub struct TestRunner {
    config: RunnerConfig,
    commands: CommandRegistry,
    checker: AccessibilityChecker,
}

impl TestRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            commands: CommandRegistry::new(),
            checker: AccessibilityChecker::new(),
        }
    }

    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_checker(mut self, checker: AccessibilityChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    /// Run every suite in order. A fatal driver error stops the whole run.
    pub async fn run_all(
        &self,
        driver: &mut dyn Driver,
        suites: &[TestSuite],
    ) -> E2eResult<RunResult> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(suites.len());
        for suite in suites {
            results.push(self.run_suite(driver, suite).await?);
        }
        let run = RunResult::from_suites(results, start.elapsed().as_millis() as u64);

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            run.passed, run.failed, run.skipped, run.duration_ms
        );
        Ok(run)
    }

    /// Run the suite called `name`
    pub async fn run_named(
        &self,
        driver: &mut dyn Driver,
        suites: &[TestSuite],
        name: &str,
    ) -> E2eResult<SuiteResult> {
        let suite = suites
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SuiteNotFound(name.to_string()))?;
        self.run_suite(driver, suite).await
    }

    /// Run one suite. Test failures are recorded in the result; only fatal
    /// driver errors are returned as `Err`.
    pub async fn run_suite(
        &self,
        driver: &mut dyn Driver,
        suite: &TestSuite,
    ) -> E2eResult<SuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let isolation = suite.isolation.unwrap_or(self.config.isolation);
        let mut ctx = TestContext::new(
            driver,
            &self.commands,
            &self.checker,
            self.config.expect,
            &self.config.base_url,
        );

        let mut state = SuiteState::Idle;
        let mut advance = |next: SuiteState| {
            debug!("suite `{}`: {:?} -> {:?}", suite.name, state, next);
            state = next;
        };

        info!(
            "Running suite `{}` ({} test(s), isolation {})",
            suite.name,
            suite.tests.len(),
            isolation
        );
        advance(SuiteState::SettingUp);
        if let (None, Some(viewport)) = (&suite.viewport, self.config.viewport) {
            ctx.driver().set_viewport(viewport).await?;
        }
        let mut setup_error = None;
        for hook in &suite.before_all {
            if let Err(e) = hook.run(&mut ctx).await {
                let e = E2eError::step("before_all", e);
                if e.is_fatal() {
                    return Err(e);
                }
                error!("✗ {} before_all - {}", suite.name, e);
                setup_error = Some(Failure::from(&e));
                break;
            }
        }

        advance(SuiteState::ExecutingTests);
        let mut results = Vec::with_capacity(suite.tests.len());
        for test in &suite.tests {
            if setup_error.is_some() || test.skip {
                info!("- {} (skipped)", test.name);
                results.push(TestResult::skipped(&test.name));
                continue;
            }
            results.push(self.run_test(&mut ctx, suite, test, isolation).await?);
        }

        let mut teardown_error = None;
        for hook in &suite.after_all {
            if let Err(e) = hook.run(&mut ctx).await {
                let e = E2eError::step("after_all", e);
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("{} after_all - {}", suite.name, e);
                if teardown_error.is_none() {
                    teardown_error = Some(Failure::from(&e));
                }
            }
        }
        advance(SuiteState::TornDown);

        let count = |s: TestState| results.iter().filter(|r| r.state == s).count();
        Ok(SuiteResult {
            name: suite.name.clone(),
            state,
            started_at,
            total: results.len(),
            passed: count(TestState::Passed),
            failed: count(TestState::Failed),
            skipped: count(TestState::Skipped),
            duration_ms: start.elapsed().as_millis() as u64,
            setup_error,
            teardown_error,
            results,
        })
    }

    async fn run_test(
        &self,
        ctx: &mut TestContext<'_>,
        suite: &TestSuite,
        test: &Test,
        isolation: Isolation,
    ) -> E2eResult<TestResult> {
        let start = Instant::now();
        debug!("Running test: {} ({:?})", test.name, TestState::Running);

        let mut outcome = self.prepare(ctx, suite, isolation).await;
        if outcome.is_ok() {
            outcome = test.body.run(ctx).await;
        }
        if let Err(e) = outcome {
            if e.is_fatal() {
                error!("✗ {} - {}", test.name, e);
                return Err(e);
            }
            outcome = Err(e);
        }

        for hook in &suite.after_each {
            if let Err(e) = hook.run(ctx).await {
                let e = E2eError::step("after_each", e);
                if e.is_fatal() {
                    return Err(e);
                }
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        Ok(match outcome {
            Ok(()) => {
                info!("✓ {} ({} ms)", test.name, duration_ms);
                TestResult {
                    name: test.name.clone(),
                    state: TestState::Passed,
                    duration_ms,
                    failure: None,
                }
            }
            Err(e) => {
                error!("✗ {} - {}", test.name, e);
                TestResult {
                    name: test.name.clone(),
                    state: TestState::Failed,
                    duration_ms,
                    failure: Some(Failure::from(&e)),
                }
            }
        })
    }

    /// Per-test preparation: viewport, storage reset, navigation, hooks
    async fn prepare(
        &self,
        ctx: &mut TestContext<'_>,
        suite: &TestSuite,
        isolation: Isolation,
    ) -> E2eResult<()> {
        if let Some(profile) = &suite.viewport {
            ctx.set_viewport(profile)
                .await
                .map_err(|e| E2eError::step(format!("set_viewport {}", profile), e))?;
        }
        // Storage is per origin: clear it on the entry page, then reload
        if isolation == Isolation::Reset {
            ctx.visit(&suite.entry)
                .await
                .map_err(|e| E2eError::step(format!("navigate {}", suite.entry), e))?;
            ctx.clear_storage()
                .await
                .map_err(|e| E2eError::step("clear_storage", e))?;
        }
        ctx.visit(&suite.entry)
            .await
            .map_err(|e| E2eError::step(format!("navigate {}", suite.entry), e))?;
        for hook in &suite.before_each {
            hook.run(ctx)
                .await
                .map_err(|e| E2eError::step("before_each", e))?;
        }
        Ok(())
    }

    /// Write run results to `test-results.json` in the output directory
    pub fn write_results(&self, results: &RunResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
