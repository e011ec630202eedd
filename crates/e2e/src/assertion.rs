//! Assertion engine
//!
//! An [`Expectation`] is evaluated by polling: every attempt fetches a fresh
//! snapshot from the driver, so nothing is cached between attempts or between
//! expectations. The loop ends when the condition holds or the timeout runs
//! out, in which case the last observed value is reported.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use pagecheck_common::{dom::normalize_whitespace, Config, ElementState, Locator};

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};

/// Polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(4000),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl From<&Config> for ExpectConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.command_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// What must hold for the addressed element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssertionKind {
    Visible,
    NotVisible,
    Exists,
    NotExists,
    ContainsText {
        text: String,
    },
    HasAttribute {
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
    Enabled,
    Disabled,
    HasValue {
        value: String,
    },
    /// Some element below the addressed one matches this CSS selector
    HasDescendant {
        selector: String,
    },
    /// Number of elements the target matches, index ignored
    Count {
        count: usize,
    },
}

impl AssertionKind {
    pub fn contains_text(text: impl Into<String>) -> Self {
        AssertionKind::ContainsText { text: text.into() }
    }

    pub fn has_attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        AssertionKind::HasAttribute {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn has_descendant(selector: impl Into<String>) -> Self {
        AssertionKind::HasDescendant {
            selector: selector.into(),
        }
    }

    /// The query whose matches `evaluate` expects as `scoped`: elements below
    /// the target that match the descendant selector
    pub fn scoped_query(&self, target: &Locator) -> Option<Locator> {
        match self {
            AssertionKind::HasDescendant { selector } => {
                Some(Locator::css(selector.clone()).within(target.clone()))
            }
            _ => None,
        }
    }

    /// Check the condition against one snapshot. `scoped` holds the matches
    /// of [`AssertionKind::scoped_query`] and is ignored by other kinds. On
    /// failure the error is a description of what was observed instead.
    pub fn evaluate(
        &self,
        target: &Locator,
        matches: &[ElementState],
        scoped: &[ElementState],
    ) -> Result<(), String> {
        match self {
            AssertionKind::Count { count } => {
                return if matches.len() == *count {
                    Ok(())
                } else {
                    Err(format!("{} element(s)", matches.len()))
                };
            }
            AssertionKind::NotExists => {
                return match target.pick(matches) {
                    None => Ok(()),
                    Some(el) => Err(format!("{} is present", el.describe())),
                };
            }
            _ => {}
        }

        let Some(el) = target.pick(matches) else {
            return Err(match (target.index, matches.len()) {
                (_, 0) => "no element matched".to_string(),
                (Some(i), n) => format!("index {} out of range, {} element(s) matched", i, n),
                (None, _) => "no element matched".to_string(),
            });
        };

        let holds = match self {
            AssertionKind::Visible => el.visible,
            AssertionKind::NotVisible => !el.visible,
            AssertionKind::Exists => true,
            AssertionKind::ContainsText { text } => el.text.contains(&normalize_whitespace(text)),
            AssertionKind::HasAttribute { name, value } => match (el.attr(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            },
            AssertionKind::Enabled => el.enabled,
            AssertionKind::Disabled => !el.enabled,
            AssertionKind::HasValue { value } => el.value == *value,
            AssertionKind::HasDescendant { .. } => !scoped.is_empty(),
            // handled above
            AssertionKind::Count { .. } | AssertionKind::NotExists => true,
        };
        if holds {
            return Ok(());
        }

        Err(match self {
            AssertionKind::Visible | AssertionKind::NotVisible => format!(
                "{} is {}",
                el.describe(),
                if el.visible { "visible" } else { "hidden" }
            ),
            AssertionKind::ContainsText { .. } => format!("text \"{}\"", el.text),
            AssertionKind::HasAttribute { name, .. } => match el.attr(name) {
                Some(actual) => format!("{}=\"{}\"", name, actual),
                None => format!("no `{}` attribute on {}", name, el.describe()),
            },
            AssertionKind::Enabled | AssertionKind::Disabled => format!(
                "{} is {}",
                el.describe(),
                if el.enabled { "enabled" } else { "disabled" }
            ),
            AssertionKind::HasValue { .. } => format!("value \"{}\"", el.value),
            AssertionKind::HasDescendant { selector } => {
                format!("no `{}` inside {}", selector, el.describe())
            }
            _ => el.describe(),
        })
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionKind::Visible => f.write_str("be visible"),
            AssertionKind::NotVisible => f.write_str("not be visible"),
            AssertionKind::Exists => f.write_str("exist"),
            AssertionKind::NotExists => f.write_str("not exist"),
            AssertionKind::ContainsText { text } => write!(f, "contain text \"{}\"", text),
            AssertionKind::HasAttribute { name, value: None } => {
                write!(f, "have attribute `{}`", name)
            }
            AssertionKind::HasAttribute {
                name,
                value: Some(value),
            } => write!(f, "have attribute {}=\"{}\"", name, value),
            AssertionKind::Enabled => f.write_str("be enabled"),
            AssertionKind::Disabled => f.write_str("be disabled"),
            AssertionKind::HasValue { value } => write!(f, "have value \"{}\"", value),
            AssertionKind::HasDescendant { selector } => write!(f, "contain `{}`", selector),
            AssertionKind::Count { count } => write!(f, "match {} element(s)", count),
        }
    }
}

/// A target plus the condition it must reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub target: Locator,
    pub kind: AssertionKind,
    /// Overrides the configured timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Expectation {
    pub fn new(target: impl Into<Locator>, kind: AssertionKind) -> Self {
        Self {
            target: target.into(),
            kind,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

/// The `index`-th element (document order) of the sequence `sequence` matches,
/// e.g. `element_at(Locator::focusable().within(form), 2)` for the third tab stop.
pub fn element_at(sequence: Locator, index: usize) -> Locator {
    sequence.nth(index)
}

/// Poll until `expectation` holds or its timeout elapses
pub async fn expect(
    driver: &mut dyn Driver,
    expectation: &Expectation,
    config: &ExpectConfig,
) -> E2eResult<()> {
    let timeout = expectation
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(config.timeout);
    let query = expectation.target.all();
    let scoped_query = expectation.kind.scoped_query(&expectation.target);
    let start = Instant::now();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        let snapshot = driver.query(&query).await?;
        let scoped = match &scoped_query {
            Some(scoped_query) if expectation.target.pick(&snapshot).is_some() => {
                driver.query(scoped_query).await?
            }
            _ => Vec::new(),
        };
        let observed = match expectation.kind.evaluate(&expectation.target, &snapshot, &scoped) {
            Ok(()) => {
                debug!(
                    "expect `{}` to {}: ok after {} attempt(s)",
                    expectation.target, expectation.kind, attempts
                );
                return Ok(());
            }
            Err(observed) => observed,
        };

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(E2eError::AssertionTimeout {
                selector: expectation.target.to_string(),
                expected: expectation.kind.to_string(),
                actual: observed,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        tokio::time::sleep(config.poll_interval.min(timeout - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn element(tag: &str, text: &str, visible: bool) -> ElementState {
        ElementState {
            tag: tag.to_string(),
            attributes: BTreeMap::new(),
            text: text.to_string(),
            value: String::new(),
            visible,
            enabled: true,
        }
    }

    #[test]
    fn test_first_match_wins_without_index() {
        let matches = [element("p", "first", false), element("p", "second", true)];
        let target = Locator::css("p");
        assert!(AssertionKind::Visible.evaluate(&target, &matches, &[]).is_err());
        assert!(AssertionKind::Visible.evaluate(&target.clone().nth(1), &matches, &[]).is_ok());
    }

    #[test]
    fn test_observed_values() {
        let matches = [element("div", "Please enter your password", true)];
        let target = Locator::css("div");
        let err = AssertionKind::contains_text("username")
            .evaluate(&target, &matches, &[])
            .unwrap_err();
        assert_eq!(err, "text \"Please enter your password\"");

        let err = AssertionKind::Visible.evaluate(&target.clone().nth(4), &matches, &[]).unwrap_err();
        assert_eq!(err, "index 4 out of range, 1 element(s) matched");

        let err = AssertionKind::Count { count: 2 }.evaluate(&target, &matches, &[]).unwrap_err();
        assert_eq!(err, "1 element(s)");
    }

    #[test]
    fn test_not_visible_requires_element() {
        let target = Locator::css("div");
        assert!(AssertionKind::NotVisible.evaluate(&target, &[], &[]).is_err());
        assert!(AssertionKind::NotExists.evaluate(&target, &[], &[]).is_ok());
        assert!(AssertionKind::NotVisible
            .evaluate(&target, &[element("div", "", false)], &[])
            .is_ok());
    }

    #[test]
    fn test_attribute_and_descendant() {
        let mut input = element("input", "", true);
        input.attributes.insert("name".into(), "email".into());
        let target = Locator::css("input");
        assert!(AssertionKind::has_attribute("name", "email")
            .evaluate(&target, &[input.clone()], &[])
            .is_ok());
        assert_eq!(
            AssertionKind::has_attribute("name", "password")
                .evaluate(&target, &[input.clone()], &[])
                .unwrap_err(),
            "name=\"email\""
        );

        let button = element("button", "", true);
        let kind = AssertionKind::has_descendant("svg");
        let target = Locator::css("button");
        assert_eq!(
            kind.scoped_query(&target),
            Some(Locator::css("svg").within(target.clone()))
        );
        assert!(kind
            .evaluate(&target, &[button.clone()], &[element("svg", "", true)])
            .is_ok());
        assert_eq!(
            kind.evaluate(&target, &[button], &[]).unwrap_err(),
            "no `svg` inside button"
        );
    }

    #[test]
    fn test_parse_from_yaml() {
        let kind: AssertionKind = serde_yaml::from_str("kind: contains_text\ntext: Login\n").unwrap();
        assert_eq!(kind, AssertionKind::contains_text("Login"));
        let kind: AssertionKind = serde_yaml::from_str("kind: visible").unwrap();
        assert_eq!(kind, AssertionKind::Visible);
    }
}
