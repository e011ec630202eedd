//! End-to-end scenarios against the in-memory login page

mod common;

use async_trait::async_trait;
use test_case::test_case;

use pagecheck_common::{Locator, Viewport, ViewportProfile};
use pagecheck_e2e::{
    element_at, AccessibilityChecker, AssertionKind, CommandRegistry, E2eError, E2eResult,
    ExpectConfig, RuleOverride, RuleOverrides, SuiteSpec, Test, TestContext, TestFn, TestState,
    TestSuite,
};

use common::*;

const LOGIN_SPEC: &str = include_str!("../../../specs/login_page.yaml");
const MOBILE_SPEC: &str = include_str!("../../../specs/mobile.yaml");

struct LoginAttempt {
    email: &'static str,
    password: &'static str,
    expected: &'static str,
}

#[async_trait]
impl TestFn for LoginAttempt {
    async fn run(&self, ctx: &mut TestContext<'_>) -> E2eResult<()> {
        ctx.invoke("login", &args(&[self.email, self.password])).await?;
        ctx.should(Locator::text(self.expected), AssertionKind::Visible)
            .await
    }
}

fn known_issues() -> RuleOverrides {
    [
        ("button-name", "show-password icon button has no accessible name"),
        ("landmark-one-main", "page has no <main> element"),
        ("meta-viewport", "viewport meta tag disables zooming"),
        ("region", "login card sits outside any landmark"),
    ]
    .into_iter()
    .map(|(id, reason)| (id.to_string(), RuleOverride::disabled(reason)))
    .collect()
}

#[tokio::test]
async fn test_login_suite_from_yaml() {
    let spec = SuiteSpec::from_yaml(LOGIN_SPEC).unwrap();
    let mut driver = login_driver();
    let result = runner().run_suite(&mut driver, &spec.to_suite()).await.unwrap();

    for test in &result.results {
        assert_eq!(test.state, TestState::Passed, "{}: {:?}", test.name, test.failure);
    }
    assert_eq!(result.passed, 6);
    assert!(result.success());
}

#[tokio::test]
async fn test_mobile_suite_from_yaml() {
    let spec = SuiteSpec::from_yaml(MOBILE_SPEC).unwrap();
    let mut driver = login_driver();
    let handle = driver.clone();

    let result = runner().run_suite(&mut driver, &spec.to_suite()).await.unwrap();

    assert!(result.success(), "{:?}", result.results);
    assert_eq!(handle.current_viewport(), Viewport::new(375, 812));
    assert_eq!(handle.current_url(), LOGIN_URL);
    // shared isolation leaves storage alone
    assert!(!handle
        .calls()
        .contains(&pagecheck_e2e::driver::DriverCall::ClearStorage));
}

#[test_case("test@example.com", "test123", INCORRECT ; "wrong credentials")]
#[test_case("test@example.com", "", MISSING_PASSWORD ; "empty password")]
#[test_case("", "wow_great_job", MISSING_USERNAME ; "empty email")]
#[test_case("", "", MISSING_USERNAME ; "both empty still submits")]
#[tokio::test]
async fn test_login_validation_messages(email: &'static str, password: &'static str, expected: &'static str) {
    let suite = TestSuite::new("login validation").entry("/#/").test(Test::new(
        "attempt",
        LoginAttempt {
            email,
            password,
            expected,
        },
    ));
    let mut driver = login_driver();
    let handle = driver.clone();

    let result = runner().run_suite(&mut driver, &suite).await.unwrap();
    assert!(result.success(), "{:?}", result.results);

    let clicks = handle
        .actions()
        .into_iter()
        .filter(|c| matches!(c, pagecheck_e2e::driver::DriverCall::Click(_)))
        .count();
    assert_eq!(clicks, 1);
}

#[tokio::test]
async fn test_tab_order_within_form() {
    let mut driver = login_driver();
    let registry = CommandRegistry::new();
    let checker = AccessibilityChecker::new();
    let mut ctx = TestContext::new(&mut driver, &registry, &checker, ExpectConfig::default(), BASE_URL);
    ctx.visit("/#/").await.unwrap();

    let tab_stops = Locator::focusable().within(Locator::css("form"));
    let expectations = [
        AssertionKind::has_attribute("name", "email"),
        AssertionKind::has_attribute("name", "password"),
        AssertionKind::has_descendant("svg"),
        AssertionKind::contains_text("Login"),
    ];
    for (index, kind) in expectations.into_iter().enumerate() {
        ctx.should(element_at(tab_stops.clone(), index), kind).await.unwrap();
    }
    ctx.should(tab_stops, AssertionKind::Count { count: 4 }).await.unwrap();
}

#[tokio::test]
async fn test_accessibility_known_issues() {
    let mut driver = login_driver();
    let registry = CommandRegistry::new();
    let checker = AccessibilityChecker::new();
    let mut ctx = TestContext::new(&mut driver, &registry, &checker, ExpectConfig::default(), BASE_URL);
    ctx.visit("/#/").await.unwrap();

    let all = ctx.audit_a11y(None, &RuleOverrides::new()).await.unwrap();
    assert!(all.len() >= 4, "{:?}", all);
    let mut rules: Vec<&str> = all.iter().map(|v| v.rule.as_str()).collect();
    rules.sort_unstable();
    assert_eq!(rules, ["button-name", "landmark-one-main", "meta-viewport", "region"]);

    let remaining = ctx.audit_a11y(None, &known_issues()).await.unwrap();
    assert!(remaining.is_empty(), "{:?}", remaining);
    ctx.check_a11y(None, &known_issues()).await.unwrap();

    let err = ctx.check_a11y(None, &RuleOverrides::new()).await.unwrap_err();
    assert_eq!(err.kind(), "AccessibilityViolationError");
}

#[tokio::test]
async fn test_scoped_audit_of_form() {
    let mut driver = login_driver();
    let registry = CommandRegistry::new();
    let checker = AccessibilityChecker::new();
    let mut ctx = TestContext::new(&mut driver, &registry, &checker, ExpectConfig::default(), BASE_URL);
    ctx.visit("/#/").await.unwrap();

    let form = Locator::css("form");
    let violations = ctx.audit_a11y(Some(&form), &RuleOverrides::new()).await.unwrap();
    let rules: Vec<&str> = violations.iter().map(|v| v.rule.as_str()).collect();
    assert_eq!(rules, ["button-name", "region"]);
    assert_eq!(violations[0].nodes, ["button.show-password"]);
}

#[tokio::test]
async fn test_login_without_registered_command() {
    let suite = TestSuite::new("no commands").entry("/#/").test(Test::new(
        "attempt",
        LoginAttempt {
            email: "test@example.com",
            password: "test123",
            expected: INCORRECT,
        },
    ));
    let mut driver = login_driver();
    let runner = pagecheck_e2e::TestRunner::new(config());

    let result = runner.run_suite(&mut driver, &suite).await.unwrap();
    assert_eq!(result.failed, 1);
    let failure = result.results[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, "UnknownCommandError");
}

#[tokio::test]
async fn test_unknown_rule_override_fails_check() {
    let mut driver = login_driver();
    let registry = CommandRegistry::new();
    let checker = AccessibilityChecker::new();
    let mut ctx = TestContext::new(&mut driver, &registry, &checker, ExpectConfig::default(), BASE_URL);
    ctx.visit("/#/").await.unwrap();

    let mut overrides = RuleOverrides::new();
    overrides.insert("color-contrast".into(), RuleOverride::disabled("not implemented"));
    let err = ctx.check_a11y(None, &overrides).await.unwrap_err();
    assert!(matches!(err, E2eError::UnknownRule(_)));
}

#[tokio::test]
async fn test_viewport_profile_landscape() {
    let suite = TestSuite::new("landscape")
        .entry(LOGIN_URL)
        .viewport(ViewportProfile::preset("iphone-x").unwrap().landscape())
        .test(Test::new(
            "renders",
            pagecheck_e2e::StepList(vec![pagecheck_e2e::TestStep::Expect {
                target: Locator::contains("button", "Login"),
                assert: AssertionKind::Visible,
                timeout_ms: None,
            }]),
        ));
    let mut driver = login_driver();
    let handle = driver.clone();

    let result = runner().run_suite(&mut driver, &suite).await.unwrap();
    assert!(result.success());
    assert_eq!(handle.current_viewport(), Viewport::new(812, 375));
}
