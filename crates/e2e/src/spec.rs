//! Declarative YAML suite files

use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use pagecheck_common::{Locator, ViewportProfile};

use crate::a11y::RuleOverrides;
use crate::assertion::{AssertionKind, Expectation};
use crate::command::{BoundArgs, CommandRegistry, ScriptedCommand};
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::suite::{Isolation, Test, TestFn, TestSuite};

/// One suite parsed from a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Page every test starts from
    #[serde(default = "default_entry")]
    pub entry: String,

    #[serde(default)]
    pub isolation: Option<Isolation>,

    #[serde(default)]
    pub viewport: Option<ViewportProfile>,

    /// Scripted commands registered before the suite runs
    #[serde(default)]
    pub commands: Vec<CommandSpec>,

    #[serde(default)]
    pub before_all: Vec<TestStep>,

    #[serde(default)]
    pub before_each: Vec<TestStep>,

    #[serde(default)]
    pub after_each: Vec<TestStep>,

    #[serde(default)]
    pub after_all: Vec<TestStep>,

    pub tests: Vec<TestSpec>,
}

fn default_entry() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub steps: Vec<TestStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    pub name: String,
    #[serde(default)]
    pub skip: bool,
    pub steps: Vec<TestStep>,
}

/// A single step in a test, hook or scripted command. String fields may
/// contain `${param}` placeholders, filled in when run inside a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate { url: String },

    Click { target: Locator },

    /// Empty an input field
    Clear { target: Locator },

    /// Type text into an input field
    Type {
        target: Locator,
        text: String,
        /// Do nothing when `text` is empty after substitution
        #[serde(default)]
        skip_empty: bool,
    },

    /// Run a registered command
    Invoke {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },

    /// Poll until an assertion holds
    Expect {
        target: Locator,
        #[serde(deserialize_with = "assertion_shorthand")]
        assert: AssertionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Accessibility audit of the page or a scope
    CheckA11y {
        #[serde(default)]
        scope: Option<Locator>,
        #[serde(default)]
        rules: RuleOverrides,
    },

    SetViewport { profile: ViewportProfile },

    ClearStorage,

    /// Log a message (for debugging)
    Log { message: String },
}

/// `assert: visible` as well as `assert: { kind: contains_text, text: Login }`
fn assertion_shorthand<'de, D>(deserializer: D) -> Result<AssertionKind, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Form {
        Name(String),
        Full(AssertionKind),
    }

    match Form::deserialize(deserializer)? {
        Form::Full(kind) => Ok(kind),
        Form::Name(name) => match name.as_str() {
            "visible" => Ok(AssertionKind::Visible),
            "not_visible" => Ok(AssertionKind::NotVisible),
            "exists" => Ok(AssertionKind::Exists),
            "not_exists" => Ok(AssertionKind::NotExists),
            "enabled" => Ok(AssertionKind::Enabled),
            "disabled" => Ok(AssertionKind::Disabled),
            other => Err(de::Error::custom(format!(
                "assertion `{}` is unknown or needs arguments",
                other
            ))),
        },
    }
}

fn bind_locator(locator: &Locator, args: &BoundArgs) -> Locator {
    if args.is_empty() {
        return locator.clone();
    }
    Locator {
        css: args.substitute(&locator.css),
        text: locator.text.as_deref().map(|t| args.substitute(t)),
        within: locator
            .within
            .as_deref()
            .map(|scope| Box::new(bind_locator(scope, args))),
        index: locator.index,
    }
}

impl TestStep {
    /// Short label used in failure trails
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url } => format!("navigate {}", url),
            TestStep::Click { target } => format!("click {}", target),
            TestStep::Clear { target } => format!("clear {}", target),
            TestStep::Type { target, .. } => format!("type {}", target),
            TestStep::Invoke { command, .. } => format!("invoke {}", command),
            TestStep::Expect { target, assert, .. } => format!("expect {} to {}", target, assert),
            TestStep::CheckA11y { scope: Some(scope), .. } => format!("check_a11y {}", scope),
            TestStep::CheckA11y { scope: None, .. } => "check_a11y".to_string(),
            TestStep::SetViewport { profile } => format!("set_viewport {}", profile),
            TestStep::ClearStorage => "clear_storage".to_string(),
            TestStep::Log { .. } => "log".to_string(),
        }
    }

    /// Run the step, wrapping any failure with the step's name
    pub async fn execute(&self, ctx: &mut TestContext<'_>, args: &BoundArgs) -> E2eResult<()> {
        self.perform(ctx, args)
            .await
            .map_err(|e| E2eError::step(self.name(), e))
    }

    async fn perform(&self, ctx: &mut TestContext<'_>, args: &BoundArgs) -> E2eResult<()> {
        match self {
            TestStep::Navigate { url } => ctx.visit(&args.substitute(url)).await,
            TestStep::Click { target } => ctx.click(&bind_locator(target, args)).await,
            TestStep::Clear { target } => ctx.clear(&bind_locator(target, args)).await,
            TestStep::Type {
                target,
                text,
                skip_empty,
            } => {
                let text = args.substitute(text);
                if *skip_empty && text.is_empty() {
                    return Ok(());
                }
                ctx.type_text(&bind_locator(target, args), &text).await
            }
            TestStep::Invoke { command, args: values } => {
                let values: Vec<String> = values.iter().map(|v| args.substitute(v)).collect();
                ctx.invoke(command, &values).await
            }
            TestStep::Expect {
                target,
                assert,
                timeout_ms,
            } => {
                let expectation = Expectation {
                    target: bind_locator(target, args),
                    kind: assert.clone(),
                    timeout_ms: *timeout_ms,
                };
                ctx.expect(&expectation).await
            }
            TestStep::CheckA11y { scope, rules } => {
                let scope = scope.as_ref().map(|s| bind_locator(s, args));
                ctx.check_a11y(scope.as_ref(), rules).await
            }
            TestStep::SetViewport { profile } => ctx.set_viewport(profile).await,
            TestStep::ClearStorage => ctx.clear_storage().await,
            TestStep::Log { message } => {
                info!("{}", args.substitute(message));
                Ok(())
            }
        }
    }
}

/// Steps run in order as a test body or hook
#[derive(Debug, Clone, PartialEq)]
pub struct StepList(pub Vec<TestStep>);

#[async_trait]
impl TestFn for StepList {
    async fn run(&self, ctx: &mut TestContext<'_>) -> E2eResult<()> {
        let args = BoundArgs::default();
        for step in &self.0 {
            step.execute(ctx, &args).await?;
        }
        Ok(())
    }
}

impl SuiteSpec {
    /// Parse a suite spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a suite spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suite specs from a directory, ordered by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Register this file's scripted commands
    pub fn register_commands(&self, registry: &mut CommandRegistry) -> E2eResult<()> {
        for command in &self.commands {
            registry.register_arc(
                &command.name,
                command.params.clone(),
                Arc::new(ScriptedCommand::new(command.steps.clone())),
            )?;
        }
        Ok(())
    }

    /// Runnable suite with step lists as bodies and hooks
    pub fn to_suite(&self) -> TestSuite {
        let hooks = |steps: &[TestStep]| -> Vec<Arc<dyn TestFn>> {
            if steps.is_empty() {
                Vec::new()
            } else {
                vec![Arc::new(StepList(steps.to_vec()))]
            }
        };

        TestSuite {
            name: self.name.clone(),
            entry: self.entry.clone(),
            isolation: self.isolation,
            viewport: self.viewport.clone(),
            before_all: hooks(&self.before_all),
            before_each: hooks(&self.before_each),
            after_each: hooks(&self.after_each),
            after_all: hooks(&self.after_all),
            tests: self
                .tests
                .iter()
                .map(|t| Test {
                    name: t.name.clone(),
                    body: Arc::new(StepList(t.steps.clone())),
                    skip: t.skip,
                })
                .collect(),
        }
    }
}
