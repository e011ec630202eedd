//! CSS selector subset used to address elements in a page snapshot.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, `[a~=v]`),
//! `:not(<compound>)`, descendant and child combinators, and selector lists.

use std::fmt;
use std::str::FromStr;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

/// Comma separated list of complex selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    /// `compounds[i]` is joined to `compounds[i - 1]` by `combinators[i]`.
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
    negations: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeSelector {
    name: String,
    op: Option<(AttrOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Prefix,
    Suffix,
    Substring,
    Includes,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser::new(source);
        let selectors = parser.parse_list()?;
        Ok(Self {
            source: source.trim().to_string(),
            selectors,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the element `node` matches any selector in the list
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node)
            && self
                .selectors
                .iter()
                .any(|s| s.matches_at(s.compounds.len() - 1, doc, node))
    }
}

impl FromStr for SelectorList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl ComplexSelector {
    fn matches_at(&self, i: usize, doc: &Document, node: NodeId) -> bool {
        if !self.compounds[i].matches(doc, node) {
            return false;
        }
        if i == 0 {
            return true;
        }
        match self.combinators[i] {
            Combinator::Child => doc
                .parent(node)
                .map_or(false, |p| self.matches_at(i - 1, doc, p)),
            Combinator::Descendant => {
                let mut current = doc.parent(node);
                while let Some(ancestor) = current {
                    if self.matches_at(i - 1, doc, ancestor) {
                        return true;
                    }
                    current = doc.parent(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.negations.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && doc.tag(node) != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = doc.attr(node, "class").unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|c| class_attr.split_whitespace().any(|have| have == c))
            {
                return false;
            }
        }
        if !self.attributes.iter().all(|a| a.matches(doc, node)) {
            return false;
        }
        !self.negations.iter().any(|n| n.matches(doc, node))
    }
}

impl AttributeSelector {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(actual) = doc.attr(node, &self.name) else {
            return false;
        };
        match &self.op {
            None => true,
            Some((AttrOp::Equals, v)) => actual == v,
            Some((AttrOp::Prefix, v)) => !v.is_empty() && actual.starts_with(v.as_str()),
            Some((AttrOp::Suffix, v)) => !v.is_empty() && actual.ends_with(v.as_str()),
            Some((AttrOp::Substring, v)) => !v.is_empty() && actual.contains(v.as_str()),
            Some((AttrOp::Includes, v)) => actual.split_whitespace().any(|w| w == v),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::selector(self.source, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}` at offset {}", c, self.pos)))
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<Vec<ComplexSelector>> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.parse_complex()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.peek().is_none() {
                return Ok(list);
            }
            return Err(self.error(format!("unexpected `{}`", self.chars[self.pos])));
        }
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = vec![Combinator::Descendant];
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(',') | Some(')') | None => break,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected `{}`", c))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        if self.eat('*') {
            compound.tag = Some("*".to_string());
        } else if self.peek().map_or(false, is_ident_char) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    let name = self.parse_ident()?;
                    if name != "not" {
                        return Err(self.error(format!("unsupported pseudo-class `:{}`", name)));
                    }
                    self.expect('(')?;
                    self.skip_ws();
                    let inner = self.parse_compound()?;
                    self.skip_ws();
                    self.expect(')')?;
                    compound.negations.push(inner);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.error(format!("expected a selector at offset {}", self.pos)));
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> Result<AttributeSelector> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => None,
            Some('=') => Some(AttrOp::Equals),
            Some('^') => Some(AttrOp::Prefix),
            Some('$') => Some(AttrOp::Suffix),
            Some('*') => Some(AttrOp::Substring),
            Some('~') => Some(AttrOp::Includes),
            _ => return Err(self.error("malformed attribute selector")),
        };
        let op = match op {
            None => None,
            Some(op) => {
                if op != AttrOp::Equals {
                    self.pos += 1;
                }
                self.expect('=')?;
                self.skip_ws();
                let value = self.parse_value()?;
                self.skip_ws();
                Some((op, value))
            }
        };
        self.expect(']')?;
        Ok(AttributeSelector { name, op })
    }

    fn parse_value(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated string")),
                        Some(c) if c == quote => {
                            self.pos += 1;
                            return Ok(value);
                        }
                        Some('\\') => {
                            self.pos += 1;
                            if let Some(c) = self.peek() {
                                value.push(c);
                                self.pos += 1;
                            }
                        }
                        Some(c) => {
                            value.push(c);
                            self.pos += 1;
                        }
                    }
                }
            }
            _ => self.parse_ident(),
        }
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().map_or(false, is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error(format!("expected identifier at offset {}", start)));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomNode;

    fn form() -> Document {
        Document::from_dom(
            &DomNode::element("form")
                .attr("id", "login")
                .child(DomNode::element("input").attr("name", "email"))
                .child(
                    DomNode::element("div")
                        .attr("class", "field wide")
                        .child(DomNode::element("input").attr("name", "password")),
                )
                .child(DomNode::element("span").attr("tabindex", "-1"))
                .child(DomNode::element("span").attr("tabindex", "0"))
                .child(DomNode::element("a").with_text("no href")),
        )
    }

    fn matching(doc: &Document, selector: &str) -> Vec<NodeId> {
        let list = SelectorList::parse(selector).unwrap();
        doc.all_nodes().filter(|&n| list.matches(doc, n)).collect()
    }

    #[test]
    fn test_attribute_and_negation() {
        let doc = form();
        let focusable = matching(&doc, r#"input, button, a[href], [tabindex]:not([tabindex="-1"])"#);
        assert_eq!(focusable.len(), 3);
        assert_eq!(doc.attr(focusable[0], "name"), Some("email"));
        assert_eq!(doc.attr(focusable[1], "name"), Some("password"));
        assert_eq!(doc.attr(focusable[2], "tabindex"), Some("0"));
    }

    #[test]
    fn test_combinators() {
        let doc = form();
        assert_eq!(matching(&doc, "form > input").len(), 1);
        assert_eq!(matching(&doc, "form input").len(), 2);
        assert_eq!(matching(&doc, "#login div.field.wide > input[name^=pass]").len(), 1);
        assert!(matching(&doc, "div.narrow input").is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("input[name=").is_err());
        assert!(SelectorList::parse("a:hover").is_err());
        assert!(SelectorList::parse("input,").is_err());
    }
}
