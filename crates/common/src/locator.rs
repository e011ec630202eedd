//! Element locators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Focusable element sequence used for tab-order checks
pub const FOCUSABLE: &str = r#"input, button, a[href], [tabindex]:not([tabindex="-1"])"#;

/// Addresses one or more elements of a page.
///
/// Matches are the elements selected by `css` (restricted to descendants of
/// `within` when set), optionally narrowed to the deepest elements whose text
/// contains `text`. When several elements match, `index` picks one by
/// document order; without an index the first match is used.
///
/// In YAML a locator is either a bare CSS string or a map:
///
/// ```yaml
/// target: 'input[name="email"]'
/// target: { css: button, text: Login }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LocatorSpec")]
pub struct Locator {
    pub css: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within: Option<Box<Locator>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorSpec {
    Css(String),
    Full {
        #[serde(default = "any_element")]
        css: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        within: Option<Box<Locator>>,
        #[serde(default)]
        index: Option<usize>,
    },
}

fn any_element() -> String {
    "*".to_string()
}

impl From<LocatorSpec> for Locator {
    fn from(spec: LocatorSpec) -> Self {
        match spec {
            LocatorSpec::Css(css) => Locator::css(css),
            LocatorSpec::Full {
                css,
                text,
                within,
                index,
            } => Locator {
                css,
                text,
                within,
                index,
            },
        }
    }
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
            within: None,
            index: None,
        }
    }

    /// Deepest element of any kind containing `text`
    pub fn text(text: impl Into<String>) -> Self {
        Self::contains(any_element(), text)
    }

    /// Deepest element matching `css` whose text contains `text`
    pub fn contains(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::css(css)
        }
    }

    pub fn focusable() -> Self {
        Self::css(FOCUSABLE)
    }

    pub fn within(mut self, scope: Locator) -> Self {
        self.within = Some(Box::new(scope));
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Same matches, without an ordinal index
    pub fn all(&self) -> Self {
        Self {
            index: None,
            ..self.clone()
        }
    }

    /// Select the addressed match out of all matches in document order
    pub fn pick<'a, T>(&self, matches: &'a [T]) -> Option<&'a T> {
        matches.get(self.index.unwrap_or(0))
    }
}

impl From<&str> for Locator {
    fn from(css: &str) -> Self {
        Locator::css(css)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.within {
            write!(f, "{} >> ", scope)?;
        }
        match &self.text {
            Some(text) if self.css == "*" => write!(f, "text \"{}\"", text)?,
            Some(text) => write!(f, "{} containing \"{}\"", self.css, text)?,
            None => f.write_str(&self.css)?,
        }
        if let Some(index) = self.index {
            write!(f, " [{}]", index)?;
        }
        Ok(())
    }
}
