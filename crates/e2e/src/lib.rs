//! pagecheck E2E runner
//!
//! Declarative UI assertions against a browser reached through a driver
//! adapter:
//! - Navigates, types and clicks through the [`Driver`] boundary
//! - Polls expectations against fresh snapshots until they hold or time out
//! - Audits pages with a built-in accessibility ruleset
//! - Runs reusable, parameterized commands such as `login`
//! - Executes suites with hooks, storage isolation and viewport profiles
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  TestRunner                                                 │
//! │    ├── run_all(driver, suites) -> RunResult                 │
//! │    ├── run_suite(driver, suite) -> SuiteResult              │
//! │    └── write_results(run) -> test-results.json              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestContext (per suite)                                    │
//! │    ├── visit / click / type_text / clear                    │
//! │    ├── expect(Expectation)     -> assertion engine          │
//! │    ├── invoke(name, args)      -> CommandRegistry           │
//! │    └── check_a11y(scope, rules)-> AccessibilityChecker      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Driver: WebDriver (W3C over HTTP) | MockDriver (in memory) │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod a11y;
pub mod assertion;
pub mod command;
pub mod context;
pub mod driver;
pub mod error;
pub mod runner;
pub mod spec;
pub mod suite;

pub use a11y::{AccessibilityChecker, Impact, RuleOverride, RuleOverrides, RuleSet, Violation};
pub use assertion::{element_at, AssertionKind, ExpectConfig, Expectation};
pub use command::{BoundArgs, Command, CommandRegistry, LoginCommand, ScriptedCommand};
pub use context::TestContext;
pub use driver::{Driver, MockDriver, StorageSnapshot, WebDriver};
pub use error::{DriverError, DriverResult, E2eError, E2eResult};
pub use runner::{Failure, RunResult, RunnerConfig, SuiteResult, TestResult, TestRunner, TestState};
pub use spec::{StepList, SuiteSpec, TestStep};
pub use suite::{Isolation, Test, TestFn, TestSuite};
