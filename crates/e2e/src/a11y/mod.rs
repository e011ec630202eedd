//! Accessibility checker
//!
//! Runs the built-in ruleset over a page snapshot. Rules are switched off per
//! call through [`RuleOverrides`], plain data merged over the defaults, so a
//! suppression and its reason live next to the check that needs it:
//!
//! ```yaml
//! - action: check_a11y
//!   rules:
//!     region: { enabled: false, reason: "login card has no landmarks" }
//!     meta-viewport: false
//! ```

mod rules;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use pagecheck_common::{Document, Locator, NodeId};

use crate::driver::Driver;
use crate::error::{DriverError, E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Impact::Minor => "minor",
            Impact::Moderate => "moderate",
            Impact::Serious => "serious",
            Impact::Critical => "critical",
        })
    }
}

/// One failing rule and the nodes it failed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: String,
    pub impact: Impact,
    pub help: String,
    /// Short descriptions of the offending elements
    pub nodes: Vec<String>,
}

/// Per-call switch for one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OverrideSpec")]
pub struct RuleOverride {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OverrideSpec {
    Flag(bool),
    Full {
        enabled: bool,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl From<OverrideSpec> for RuleOverride {
    fn from(spec: OverrideSpec) -> Self {
        match spec {
            OverrideSpec::Flag(enabled) => Self {
                enabled,
                reason: None,
            },
            OverrideSpec::Full { enabled, reason } => Self { enabled, reason },
        }
    }
}

impl RuleOverride {
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            enabled: false,
            reason: Some(reason.into()),
        }
    }

    pub fn enabled() -> Self {
        Self {
            enabled: true,
            reason: None,
        }
    }
}

/// Rule id to override
pub type RuleOverrides = BTreeMap<String, RuleOverride>;

/// Effective enabled flag of every known rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    enabled: BTreeMap<&'static str, bool>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            enabled: rules::RULES.iter().map(|r| (r.id, true)).collect(),
        }
    }
}

impl RuleSet {
    /// Merge `overrides` over this set. Unknown rule ids are rejected.
    pub fn merged(&self, overrides: &RuleOverrides) -> E2eResult<Self> {
        let mut merged = self.clone();
        for (id, rule) in overrides {
            let known = rules::find(id).ok_or_else(|| E2eError::UnknownRule(id.clone()))?;
            if !rule.enabled {
                warn!(
                    "a11y rule `{}` suppressed: {}",
                    known.id,
                    rule.reason.as_deref().unwrap_or("no reason given")
                );
            }
            merged.enabled.insert(known.id, rule.enabled);
        }
        Ok(merged)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.get(id).copied().unwrap_or(false)
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.enabled
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| *id)
    }

    /// Ids of all built-in rules
    pub fn known_rules() -> impl Iterator<Item = &'static str> {
        rules::RULES.iter().map(|r| r.id)
    }
}

/// Runs accessibility audits against driver snapshots
#[derive(Debug, Clone, Default)]
pub struct AccessibilityChecker {
    defaults: RuleSet,
}

impl AccessibilityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `overrides` as the project-wide baseline for every check
    pub fn with_defaults(overrides: &RuleOverrides) -> E2eResult<Self> {
        Ok(Self {
            defaults: RuleSet::default().merged(overrides)?,
        })
    }

    pub fn defaults(&self) -> &RuleSet {
        &self.defaults
    }

    /// Audit a snapshot. With a `scope` node only its subtree is examined and
    /// page-level rules are skipped.
    pub fn audit(&self, doc: &Document, scope: Option<NodeId>, ruleset: &RuleSet) -> Vec<Violation> {
        let root = scope.unwrap_or_else(|| doc.root());
        let view = rules::Scope {
            doc,
            elements: doc.subtree(root).filter(|&n| doc.is_element(n)).collect(),
        };

        rules::RULES
            .iter()
            .filter(|rule| ruleset.is_enabled(rule.id))
            .filter(|rule| scope.is_none() || !rule.page_level)
            .filter_map(|rule| {
                let nodes = (rule.check)(&view);
                debug!("a11y rule `{}`: {} node(s)", rule.id, nodes.len());
                if nodes.is_empty() {
                    return None;
                }
                Some(Violation {
                    rule: rule.id.to_string(),
                    impact: rule.impact,
                    help: rule.help.to_string(),
                    nodes: nodes.into_iter().map(|n| doc.describe(n)).collect(),
                })
            })
            .collect()
    }

    /// Fetch a fresh snapshot and return every violation found in `scope`
    /// (the whole page when `None`)
    pub async fn check(
        &self,
        driver: &mut dyn Driver,
        scope: Option<&Locator>,
        overrides: &RuleOverrides,
    ) -> E2eResult<Vec<Violation>> {
        let ruleset = self.defaults.merged(overrides)?;
        let doc = Document::from_dom(&driver.page_snapshot().await?);
        let root = match scope {
            Some(locator) => {
                let found = doc.locate_one(locator).map_err(DriverError::from)?;
                Some(found.ok_or_else(|| DriverError::NotFound {
                    selector: locator.to_string(),
                })?)
            }
            None => None,
        };
        Ok(self.audit(&doc, root, &ruleset))
    }

    /// Like [`check`](Self::check), failing when anything is reported
    pub async fn assert_clean(
        &self,
        driver: &mut dyn Driver,
        scope: Option<&Locator>,
        overrides: &RuleOverrides,
    ) -> E2eResult<()> {
        let violations = self.check(driver, scope, overrides).await?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(E2eError::AccessibilityViolation { violations })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use pagecheck_common::DomNode;

    fn page() -> DomNode {
        DomNode::element("html").attr("lang", "en").child(
            DomNode::element("body").child(
                DomNode::element("main")
                    .child(DomNode::element("img").attr("src", "logo.png"))
                    .child(
                        DomNode::element("form")
                            .child(DomNode::element("button").child(DomNode::element("svg"))),
                    ),
            ),
        )
    }

    #[test]
    fn test_overrides_merge_and_reject_unknown() {
        let mut overrides = RuleOverrides::new();
        overrides.insert("region".into(), RuleOverride::disabled("no landmarks"));
        let set = RuleSet::default().merged(&overrides).unwrap();
        assert!(!set.is_enabled("region"));
        assert!(set.is_enabled("button-name"));
        assert_eq!(set.enabled_rules().count(), RuleSet::known_rules().count() - 1);

        overrides.insert("colour-contrast".into(), RuleOverride::enabled());
        let err = RuleSet::default().merged(&overrides).unwrap_err();
        assert!(matches!(err, E2eError::UnknownRule(id) if id == "colour-contrast"));
    }

    #[test]
    fn test_override_forms() {
        let overrides: RuleOverrides = serde_yaml::from_str(
            "region: false\nbutton-name: { enabled: false, reason: icon button }\n",
        )
        .unwrap();
        assert_eq!(overrides["region"], RuleOverride { enabled: false, reason: None });
        assert_eq!(overrides["button-name"], RuleOverride::disabled("icon button"));
    }

    #[test]
    fn test_scope_skips_page_rules() {
        let doc = Document::from_dom(&page());
        let checker = AccessibilityChecker::new();
        let whole = checker.audit(&doc, None, checker.defaults());
        let ids: Vec<&str> = whole.iter().map(|v| v.rule.as_str()).collect();
        assert_eq!(ids, ["button-name", "image-alt", "document-title"]);

        let form = doc.locate_one(&Locator::css("form")).unwrap();
        let scoped = checker.audit(&doc, form, checker.defaults());
        let ids: Vec<&str> = scoped.iter().map(|v| v.rule.as_str()).collect();
        assert_eq!(ids, ["button-name"]);
    }

    #[tokio::test]
    async fn test_assert_clean_reports_violations() {
        let mut driver = MockDriver::new().with_page("http://app.test/", page());
        driver.navigate("http://app.test/").await.unwrap();
        let checker = AccessibilityChecker::new();

        let mut overrides = RuleOverrides::new();
        overrides.insert("image-alt".into(), RuleOverride::disabled("decorative"));
        overrides.insert("document-title".into(), RuleOverride::disabled("fixture"));
        let err = checker
            .assert_clean(&mut driver, None, &overrides)
            .await
            .unwrap_err();
        match err {
            E2eError::AccessibilityViolation { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].rule, "button-name");
                assert_eq!(violations[0].impact, Impact::Critical);
                assert_eq!(violations[0].nodes, ["button"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        overrides.insert("button-name".into(), RuleOverride::disabled("icon only"));
        checker.assert_clean(&mut driver, None, &overrides).await.unwrap();
    }
}
