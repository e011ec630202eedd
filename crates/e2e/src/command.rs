//! Reusable, named action sequences
//!
//! A [`CommandRegistry`] is a plain value owned by whoever builds the runner;
//! commands are registered once and invoked by name with positional
//! arguments, which are bound to the command's parameter names.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use pagecheck_common::Locator;

use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::spec::TestStep;

/// Deepest allowed chain of commands invoking commands
pub const MAX_DEPTH: usize = 16;

/// Arguments of one invocation, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    values: BTreeMap<String, String>,
}

impl BoundArgs {
    pub fn bind(params: &[String], args: &[String]) -> Self {
        Self {
            values: params.iter().cloned().zip(args.iter().cloned()).collect(),
        }
    }

    /// Value bound to `name`, empty when unbound
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace `${name}` placeholders with bound values. Unknown placeholders
    /// are left untouched.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            match self.values.get(&after[..end]) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + end + 3]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// Body of a registered command
#[async_trait]
pub trait Command: Send + Sync {
    async fn run(&self, ctx: &mut TestContext<'_>, args: &BoundArgs) -> E2eResult<()>;
}

struct Registered {
    params: Vec<String>,
    body: Arc<dyn Command>,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Registered>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.commands.keys()).finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(&mut self, name: &str, params: &[&str], body: C) -> E2eResult<()>
    where
        C: Command + 'static,
    {
        self.register_arc(name, params.iter().map(|p| p.to_string()).collect(), Arc::new(body))
    }

    pub fn register_arc(
        &mut self,
        name: &str,
        params: Vec<String>,
        body: Arc<dyn Command>,
    ) -> E2eResult<()> {
        if self.commands.contains_key(name) {
            return Err(E2eError::DuplicateCommand(name.to_string()));
        }
        debug!("Registered command `{}` ({})", name, params.join(", "));
        self.commands
            .insert(name.to_string(), Registered { params, body });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn params(&self, name: &str) -> Option<&[String]> {
        self.commands.get(name).map(|c| c.params.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run command `name` with `args` bound positionally to its parameters
    pub async fn invoke(
        &self,
        ctx: &mut TestContext<'_>,
        name: &str,
        args: &[String],
    ) -> E2eResult<()> {
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| E2eError::UnknownCommand(name.to_string()))?;
        if args.len() != command.params.len() {
            return Err(E2eError::ArityMismatch {
                command: name.to_string(),
                expected: command.params.len(),
                actual: args.len(),
            });
        }
        if ctx.depth >= MAX_DEPTH {
            return Err(E2eError::CommandRecursion(MAX_DEPTH));
        }

        debug!("invoke {}({})", name, args.len());
        let bound = BoundArgs::bind(&command.params, args);
        ctx.depth += 1;
        let result = command.body.run(ctx, &bound).await;
        ctx.depth -= 1;
        result
    }
}

/// Fill in the login form and submit it.
///
/// Each field is cleared first and only typed into when its argument is
/// non-empty. The submit button is clicked in every case, so the page can
/// show its own validation message for missing input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCommand {
    pub email: Locator,
    pub password: Locator,
    pub submit: Locator,
}

impl Default for LoginCommand {
    fn default() -> Self {
        Self {
            email: Locator::css(r#"input[name="email"]"#),
            password: Locator::css(r#"input[name="password"]"#),
            submit: Locator::contains("button", "Login"),
        }
    }
}

impl LoginCommand {
    pub const NAME: &'static str = "login";
    pub const PARAMS: [&'static str; 2] = ["email", "password"];

    pub fn register(self, registry: &mut CommandRegistry) -> E2eResult<()> {
        registry.register(Self::NAME, &Self::PARAMS, self)
    }

    async fn fill(ctx: &mut TestContext<'_>, field: &Locator, value: &str) -> E2eResult<()> {
        ctx.clear(field)
            .await
            .map_err(|e| E2eError::step(format!("clear {}", field), e))?;
        if !value.is_empty() {
            ctx.type_text(field, value)
                .await
                .map_err(|e| E2eError::step(format!("type {}", field), e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Command for LoginCommand {
    async fn run(&self, ctx: &mut TestContext<'_>, args: &BoundArgs) -> E2eResult<()> {
        Self::fill(ctx, &self.email, args.get("email")).await?;
        Self::fill(ctx, &self.password, args.get("password")).await?;
        ctx.click(&self.submit)
            .await
            .map_err(|e| E2eError::step(format!("click {}", self.submit), e))
    }
}

/// Command whose body is a list of declarative steps with `${param}`
/// placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCommand {
    pub steps: Vec<TestStep>,
}

impl ScriptedCommand {
    pub fn new(steps: Vec<TestStep>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    async fn run(&self, ctx: &mut TestContext<'_>, args: &BoundArgs) -> E2eResult<()> {
        for step in &self.steps {
            step.execute(ctx, args).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::AccessibilityChecker;
    use crate::assertion::ExpectConfig;
    use crate::driver::{DriverCall, MockDriver};
    use pagecheck_common::DomNode;
    use test_case::test_case;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn form() -> DomNode {
        DomNode::element("html").child(
            DomNode::element("body").child(
                DomNode::element("form")
                    .child(DomNode::element("input").attr("name", "email"))
                    .child(DomNode::element("input").attr("name", "password").attr("type", "password"))
                    .child(DomNode::element("button").with_text("Login")),
            ),
        )
    }

    struct Recurse;

    #[async_trait]
    impl Command for Recurse {
        async fn run(&self, ctx: &mut TestContext<'_>, _args: &BoundArgs) -> E2eResult<()> {
            ctx.invoke("recurse", &[]).await
        }
    }

    #[test_case("${email}/${password}", "a@b.c/pw" ; "two placeholders")]
    #[test_case("${missing}", "${missing}" ; "unknown kept")]
    #[test_case("plain", "plain" ; "no placeholder")]
    #[test_case("${email", "${email" ; "unterminated")]
    fn test_substitute(template: &str, expected: &str) {
        let bound = BoundArgs::bind(&args(&["email", "password"]), &args(&["a@b.c", "pw"]));
        assert_eq!(bound.substitute(template), expected);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = CommandRegistry::new();
        LoginCommand::default().register(&mut registry).unwrap();
        let err = LoginCommand::default().register(&mut registry).unwrap_err();
        assert!(matches!(err, E2eError::DuplicateCommand(name) if name == "login"));
        assert_eq!(registry.params("login").unwrap(), ["email", "password"]);
    }

    #[tokio::test]
    async fn test_invoke_errors() {
        let mut driver = MockDriver::new().with_page("http://app.test/", form());
        let checker = AccessibilityChecker::new();

        let empty = CommandRegistry::new();
        let mut ctx = TestContext::new(&mut driver, &empty, &checker, ExpectConfig::default(), "http://app.test");
        let err = ctx.invoke("login", &args(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, E2eError::UnknownCommand(_)));

        let mut registry = CommandRegistry::new();
        LoginCommand::default().register(&mut registry).unwrap();
        registry.register("recurse", &[], Recurse).unwrap();
        let mut ctx = TestContext::new(&mut driver, &registry, &checker, ExpectConfig::default(), "http://app.test");
        let err = ctx.invoke("login", &args(&["only-one"])).await.unwrap_err();
        assert!(matches!(
            err,
            E2eError::ArityMismatch { expected: 2, actual: 1, .. }
        ));
        let err = ctx.invoke("recurse", &[]).await.unwrap_err();
        assert!(matches!(err, E2eError::CommandRecursion(MAX_DEPTH)));
        assert_eq!(ctx.depth, 0);
    }

    #[tokio::test]
    async fn test_login_skips_empty_fields_but_submits() {
        let mut driver = MockDriver::new().with_page("http://app.test/", form());
        let handle = driver.clone();
        let checker = AccessibilityChecker::new();
        let mut registry = CommandRegistry::new();
        LoginCommand::default().register(&mut registry).unwrap();

        let mut ctx = TestContext::new(&mut driver, &registry, &checker, ExpectConfig::default(), "http://app.test");
        ctx.visit("/").await.unwrap();
        handle.clear_calls();
        ctx.invoke("login", &args(&["", "wow_great_job"])).await.unwrap();

        let actions = handle.actions();
        assert_eq!(
            actions,
            [
                DriverCall::Clear(r#"input[name="email"]"#.into()),
                DriverCall::Clear(r#"input[name="password"]"#.into()),
                DriverCall::Type {
                    selector: r#"input[name="password"]"#.into(),
                    text: "wow_great_job".into(),
                },
                DriverCall::Click("button containing \"Login\"".into()),
            ]
        );
    }
}
