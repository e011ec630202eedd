//! What a test body and a command see while running

use tracing::debug;

use pagecheck_common::config::resolve_url;
use pagecheck_common::{Locator, ViewportProfile};

use crate::a11y::{AccessibilityChecker, RuleOverrides, Violation};
use crate::assertion::{self, AssertionKind, ExpectConfig, Expectation};
use crate::command::CommandRegistry;
use crate::driver::{Driver, StorageSnapshot};
use crate::error::E2eResult;

/// Driver access plus the registry, checker and polling settings of the run.
///
/// Actions wait for their target to exist before acting, bounded by the same
/// timeout as expectations. Visibility and enabled state are left to the
/// driver, which refuses to act on hidden or disabled elements.
pub struct TestContext<'a> {
    driver: &'a mut dyn Driver,
    commands: &'a CommandRegistry,
    checker: &'a AccessibilityChecker,
    expect: ExpectConfig,
    base_url: &'a str,
    pub(crate) depth: usize,
}

impl<'a> TestContext<'a> {
    pub fn new(
        driver: &'a mut dyn Driver,
        commands: &'a CommandRegistry,
        checker: &'a AccessibilityChecker,
        expect: ExpectConfig,
        base_url: &'a str,
    ) -> Self {
        Self {
            driver,
            commands,
            checker,
            expect,
            base_url,
            depth: 0,
        }
    }

    /// Raw driver access
    pub fn driver(&mut self) -> &mut dyn Driver {
        &mut *self.driver
    }

    pub fn base_url(&self) -> &str {
        self.base_url
    }

    pub fn expect_config(&self) -> &ExpectConfig {
        &self.expect
    }

    /// Navigate to `url`, relative to the base URL unless absolute
    pub async fn visit(&mut self, url: &str) -> E2eResult<()> {
        let url = resolve_url(self.base_url, url);
        debug!("visit {}", url);
        self.driver.navigate(&url).await?;
        Ok(())
    }

    async fn wait_for(&mut self, target: &Locator) -> E2eResult<()> {
        let exists = Expectation::new(target.clone(), AssertionKind::Exists);
        assertion::expect(&mut *self.driver, &exists, &self.expect).await
    }

    pub async fn click(&mut self, target: &Locator) -> E2eResult<()> {
        self.wait_for(target).await?;
        debug!("click {}", target);
        self.driver.click(target).await?;
        Ok(())
    }

    pub async fn type_text(&mut self, target: &Locator, text: &str) -> E2eResult<()> {
        self.wait_for(target).await?;
        debug!("type {} <- {:?}", target, text);
        self.driver.type_text(target, text).await?;
        Ok(())
    }

    pub async fn clear(&mut self, target: &Locator) -> E2eResult<()> {
        self.wait_for(target).await?;
        debug!("clear {}", target);
        self.driver.clear(target).await?;
        Ok(())
    }

    pub async fn set_viewport(&mut self, profile: &ViewportProfile) -> E2eResult<()> {
        let viewport = profile.viewport();
        debug!("viewport {} ({})", profile, viewport);
        self.driver.set_viewport(viewport).await?;
        Ok(())
    }

    pub async fn clear_storage(&mut self) -> E2eResult<()> {
        self.driver.clear_storage().await?;
        Ok(())
    }

    pub async fn storage(&mut self) -> E2eResult<StorageSnapshot> {
        Ok(self.driver.storage().await?)
    }

    /// Poll until `expectation` holds
    pub async fn expect(&mut self, expectation: &Expectation) -> E2eResult<()> {
        assertion::expect(&mut *self.driver, expectation, &self.expect).await
    }

    /// Shorthand for `expect(Expectation::new(target, kind))`
    pub async fn should(&mut self, target: impl Into<Locator>, kind: AssertionKind) -> E2eResult<()> {
        let expectation = Expectation::new(target, kind);
        self.expect(&expectation).await
    }

    /// Invoke a registered command by name
    pub async fn invoke(&mut self, name: &str, args: &[String]) -> E2eResult<()> {
        let commands = self.commands;
        commands.invoke(self, name, args).await
    }

    /// Fail with the violation list if the audit finds anything
    pub async fn check_a11y(
        &mut self,
        scope: Option<&Locator>,
        overrides: &RuleOverrides,
    ) -> E2eResult<()> {
        let checker = self.checker;
        checker
            .assert_clean(&mut *self.driver, scope, overrides)
            .await
    }

    /// Audit without failing
    pub async fn audit_a11y(
        &mut self,
        scope: Option<&Locator>,
        overrides: &RuleOverrides,
    ) -> E2eResult<Vec<Violation>> {
        let checker = self.checker;
        checker.check(&mut *self.driver, scope, overrides).await
    }
}
