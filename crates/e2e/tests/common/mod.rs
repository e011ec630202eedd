//! Shared fixtures: an in-memory rendition of the patient login page

#![allow(dead_code)]

use pagecheck_common::{DomNode, Locator};
use pagecheck_e2e::driver::PageContext;
use pagecheck_e2e::{CommandRegistry, LoginCommand, MockDriver, RunnerConfig, TestRunner};

pub const BASE_URL: &str = "https://ca-qa.seamless.md";
pub const LOGIN_URL: &str = "https://ca-qa.seamless.md/#/";

pub const INCORRECT: &str = "Your username or password is incorrect";
pub const MISSING_USERNAME: &str = "Please enter your username";
pub const MISSING_PASSWORD: &str = "Please enter your password";

const MESSAGES: [&str; 3] = [INCORRECT, MISSING_USERNAME, MISSING_PASSWORD];

fn message(text: &str) -> DomNode {
    DomNode::element("div")
        .attr("class", "error-message")
        .hidden()
        .with_text(text)
}

fn link(href: &str, text: &str) -> DomNode {
    DomNode::element("a").attr("href", href).with_text(text)
}

/// Login page as the application renders it: no main landmark, an icon-only
/// show-password button and a viewport meta tag that disables zooming
pub fn login_page() -> DomNode {
    let head = DomNode::element("head")
        .child(DomNode::element("title").with_text("Patient Login"))
        .child(DomNode::element("meta").attr("name", "viewport").attr(
            "content",
            "width=device-width, initial-scale=1, maximum-scale=1, user-scalable=no",
        ));

    let form = DomNode::element("form")
        .child(
            DomNode::element("input")
                .attr("name", "email")
                .attr("type", "email")
                .attr("aria-label", "Email"),
        )
        .child(
            DomNode::element("div")
                .attr("class", "password-field")
                .child(
                    DomNode::element("input")
                        .attr("name", "password")
                        .attr("type", "password")
                        .attr("aria-label", "Password"),
                )
                .child(
                    DomNode::element("button")
                        .attr("type", "button")
                        .attr("class", "show-password")
                        .child(DomNode::element("svg").child(DomNode::element("path"))),
                ),
        )
        .child(DomNode::element("button").attr("type", "submit").with_text("Login"))
        .children(MESSAGES.iter().map(|m| message(m)));

    let card = DomNode::element("div")
        .attr("class", "login-card")
        .child(
            DomNode::element("img")
                .attr("src", "/static/hospital-logo.png")
                .attr("alt", "QA Testing Hospital"),
        )
        .child(form)
        .child(link("#/register", "Create an account"))
        .child(link("#/forgot-password", "Can't access your account?"))
        .child(link("mailto:support@seamless.md", "Need help? Contact support"));

    DomNode::element("html").attr("lang", "en").child(head).child(
        DomNode::element("body").child(DomNode::element("div").attr("id", "root").child(card)),
    )
}

/// Client-side validation of the login form
fn validate(page: &mut PageContext<'_>) {
    for text in MESSAGES {
        page.hide(&Locator::contains("div", text));
    }
    let email = page.value_of(&Locator::css(r#"input[name="email"]"#));
    let password = page.value_of(&Locator::css(r#"input[name="password"]"#));
    let shown = if email.is_empty() {
        MISSING_USERNAME
    } else if password.is_empty() {
        MISSING_PASSWORD
    } else {
        INCORRECT
    };
    page.show(&Locator::contains("div", shown));
}

pub fn login_driver() -> MockDriver {
    MockDriver::new()
        .with_page(LOGIN_URL, login_page())
        .on_click(Locator::contains("button", "Login"), validate)
}

pub fn config() -> RunnerConfig {
    RunnerConfig {
        base_url: BASE_URL.to_string(),
        ..Default::default()
    }
}

pub fn registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    LoginCommand::default()
        .register(&mut registry)
        .expect("register login");
    registry
}

pub fn runner() -> TestRunner {
    TestRunner::new(config()).with_commands(registry())
}

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
