//! Test suite declarations
//!
//! A [`TestSuite`] is assembled once, through the builder methods or from a
//! YAML file (see [`crate::spec`]), and is only read while it runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use pagecheck_common::ViewportProfile;

use crate::context::TestContext;
use crate::error::E2eResult;

/// Whether client storage is reset between tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// Clear local and session storage before every test
    #[default]
    Reset,
    /// Keep storage across tests; tests still re-navigate
    Shared,
}

impl From<bool> for Isolation {
    fn from(isolated: bool) -> Self {
        if isolated {
            Isolation::Reset
        } else {
            Isolation::Shared
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Isolation::Reset => "reset",
            Isolation::Shared => "shared",
        })
    }
}

/// Body of a test or hook
#[async_trait]
pub trait TestFn: Send + Sync {
    async fn run(&self, ctx: &mut TestContext<'_>) -> E2eResult<()>;
}

#[derive(Clone)]
pub struct Test {
    pub name: String,
    pub body: Arc<dyn TestFn>,
    pub skip: bool,
}

impl Test {
    pub fn new(name: impl Into<String>, body: impl TestFn + 'static) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
            skip: false,
        }
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("skip", &self.skip)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct TestSuite {
    pub name: String,
    /// Entry point, relative to the base URL or absolute
    pub entry: String,
    /// `None` means the runner's configured default
    pub isolation: Option<Isolation>,
    pub viewport: Option<ViewportProfile>,
    pub before_all: Vec<Arc<dyn TestFn>>,
    pub before_each: Vec<Arc<dyn TestFn>>,
    pub after_each: Vec<Arc<dyn TestFn>>,
    pub after_all: Vec<Arc<dyn TestFn>>,
    pub tests: Vec<Test>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: "/".to_string(),
            isolation: None,
            viewport: None,
            before_all: Vec::new(),
            before_each: Vec::new(),
            after_each: Vec::new(),
            after_all: Vec::new(),
            tests: Vec::new(),
        }
    }

    pub fn entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = Some(isolation);
        self
    }

    pub fn viewport(mut self, profile: ViewportProfile) -> Self {
        self.viewport = Some(profile);
        self
    }

    pub fn before_all(mut self, hook: impl TestFn + 'static) -> Self {
        self.before_all.push(Arc::new(hook));
        self
    }

    pub fn before_each(mut self, hook: impl TestFn + 'static) -> Self {
        self.before_each.push(Arc::new(hook));
        self
    }

    pub fn after_each(mut self, hook: impl TestFn + 'static) -> Self {
        self.after_each.push(Arc::new(hook));
        self
    }

    pub fn after_all(mut self, hook: impl TestFn + 'static) -> Self {
        self.after_all.push(Arc::new(hook));
        self
    }

    pub fn test(mut self, test: Test) -> Self {
        self.tests.push(test);
        self
    }

    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|t| t.name.as_str())
    }
}

impl fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSuite")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("isolation", &self.isolation)
            .field("viewport", &self.viewport)
            .field("hooks", &[
                self.before_all.len(),
                self.before_each.len(),
                self.after_each.len(),
                self.after_all.len(),
            ])
            .field("tests", &self.tests)
            .finish()
    }
}
