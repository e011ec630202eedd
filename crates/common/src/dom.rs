//! Page snapshot model
//!
//! `DomNode` is the serializable tree a driver hands back (and the form test
//! fixtures are written in). `Document` flattens it into a pre-order arena so
//! that node ids follow document order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::locator::Locator;
use crate::selector::SelectorList;

/// Tag used for text nodes
pub const TEXT_TAG: &str = "#text";

const FORM_CONTROLS: &[&str] = &[
    "button", "input", "select", "textarea", "option", "optgroup", "fieldset",
];

const NON_RENDERED: &[&str] = &["head", "script", "style", "meta", "title", "template", "link"];

/// A node of a serialized page snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomNode {
    pub tag: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Character data, only meaningful for text nodes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    /// Current value of form controls (the property, not the attribute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Computed rendering flag reported by a live browser
    #[serde(default = "default_rendered")]
    pub rendered: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DomNode>,
}

fn default_rendered() -> bool {
    true
}

impl DomNode {
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            value: None,
            rendered: true,
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::element(TEXT_TAG)
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn hidden(self) -> Self {
        self.attr("hidden", "")
    }

    pub fn child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = DomNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.child(DomNode::text(text))
    }

    pub fn is_text(&self) -> bool {
        self.tag == TEXT_TAG
    }
}

/// Index of a node within a `Document`. Lower ids come first in document order.
pub type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    value: String,
    rendered: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// One past the last descendant id
    end: NodeId,
}

/// Flattened, queryable page snapshot
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

/// Point-in-time state of one element, as seen by assertions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Whitespace-normalized text content
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: String,
    pub visible: bool,
    pub enabled: bool,
}

impl ElementState {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Short description used in failure messages
    pub fn describe(&self) -> String {
        describe_element(&self.tag, &self.attributes)
    }
}

impl Document {
    pub fn from_dom(root: &DomNode) -> Self {
        let mut doc = Self { nodes: Vec::new() };
        doc.push(root, None);
        doc
    }

    fn push(&mut self, dom: &DomNode, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        let value = dom
            .value
            .clone()
            .or_else(|| dom.attributes.get("value").cloned())
            .unwrap_or_default();
        self.nodes.push(Node {
            tag: dom.tag.to_ascii_lowercase(),
            attributes: dom.attributes.clone(),
            text: dom.text.clone(),
            value,
            rendered: dom.rendered,
            parent,
            children: Vec::new(),
            end: id + 1,
        });
        for child in &dom.children {
            let child_id = self.push(child, Some(id));
            self.nodes[id].children.push(child_id);
        }
        self.nodes[id].end = self.nodes.len();
        id
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// Strict descendants of `id` in document order
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        id + 1..self.nodes[id].end
    }

    /// `id` plus its descendants
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        id..self.nodes[id].end
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor < node && node < self.nodes[ancestor].end
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id].tag
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.nodes[id].tag != TEXT_TAG
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id].attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.nodes[id].attributes.contains_key(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    pub fn value(&self, id: NodeId) -> &str {
        &self.nodes[id].value
    }

    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) {
        self.nodes[id].value = value.into();
    }

    pub fn append_value(&mut self, id: NodeId, text: &str) {
        self.nodes[id].value.push_str(text);
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        self.nodes[id]
            .attributes
            .insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        self.nodes[id].attributes.remove(name);
    }

    /// Concatenated character data of the subtree
    pub fn text_content(&self, id: NodeId) -> String {
        self.subtree(id)
            .filter(|&n| !self.is_element(n))
            .map(|n| self.nodes[n].text.as_str())
            .collect()
    }

    pub fn normalized_text(&self, id: NodeId) -> String {
        normalize_whitespace(&self.text_content(id))
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        if node.tag == "input" && node.attributes.get("type").map(String::as_str) == Some("hidden") {
            return false;
        }
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|&n| self.is_element(n))
            .all(|n| {
                let node = &self.nodes[n];
                node.rendered
                    && !node.attributes.contains_key("hidden")
                    && !NON_RENDERED.contains(&node.tag.as_str())
                    && !node.attributes.get("style").map_or(false, |s| style_hides(s))
            })
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        if !FORM_CONTROLS.contains(&self.tag(id)) {
            return true;
        }
        if self.has_attr(id, "disabled") {
            return false;
        }
        !self
            .ancestors(id)
            .any(|a| self.tag(a) == "fieldset" && self.has_attr(a, "disabled"))
    }

    /// All elements matched by `locator`, in document order. The locator's own
    /// index is not applied; see [`Locator::pick`].
    pub fn locate(&self, locator: &Locator) -> Result<Vec<NodeId>> {
        let selectors = SelectorList::parse(&locator.css)?;
        let candidates: Vec<NodeId> = match &locator.within {
            Some(scope) => {
                let roots = self.locate(scope)?;
                match scope.pick(&roots) {
                    Some(&root) => self
                        .descendants(root)
                        .filter(|&n| selectors.matches(self, n))
                        .collect(),
                    None => return Ok(Vec::new()),
                }
            }
            None => self
                .all_nodes()
                .filter(|&n| selectors.matches(self, n))
                .collect(),
        };

        let Some(text) = &locator.text else {
            return Ok(candidates);
        };
        let needle = normalize_whitespace(text);
        let containing: Vec<NodeId> = candidates
            .into_iter()
            .filter(|&n| self.normalized_text(n).contains(&needle))
            .collect();
        // deepest match wins when an ancestor contains the same text
        Ok(containing
            .iter()
            .copied()
            .filter(|&n| !containing.iter().any(|&other| self.is_ancestor(n, other)))
            .collect())
    }

    /// The element `locator` addresses: its index, or the first match
    pub fn locate_one(&self, locator: &Locator) -> Result<Option<NodeId>> {
        let matches = self.locate(locator)?;
        Ok(locator.pick(&matches).copied())
    }

    pub fn element_state(&self, id: NodeId) -> ElementState {
        let node = &self.nodes[id];
        ElementState {
            tag: node.tag.clone(),
            attributes: node.attributes.clone(),
            text: self.normalized_text(id),
            value: node.value.clone(),
            visible: self.is_visible(id),
            enabled: self.is_enabled(id),
        }
    }

    pub fn describe(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        if node.tag == TEXT_TAG {
            return format!("\"{}\"", normalize_whitespace(&node.text));
        }
        describe_element(&node.tag, &node.attributes)
    }

    /// Re-serialize the subtree rooted at `id`
    pub fn to_dom(&self, id: NodeId) -> DomNode {
        let node = &self.nodes[id];
        let is_control = matches!(node.tag.as_str(), "input" | "textarea" | "select");
        DomNode {
            tag: node.tag.clone(),
            attributes: node.attributes.clone(),
            text: node.text.clone(),
            value: is_control.then(|| node.value.clone()),
            rendered: node.rendered,
            children: node.children.iter().map(|&c| self.to_dom(c)).collect(),
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn style_hides(style: &str) -> bool {
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.contains("display:none") || compact.contains("visibility:hidden")
}

fn describe_element(tag: &str, attributes: &BTreeMap<String, String>) -> String {
    let mut out = tag.to_string();
    if let Some(id) = attributes.get("id") {
        out.push('#');
        out.push_str(id);
    }
    if let Some(class) = attributes.get("class") {
        for c in class.split_whitespace() {
            out.push('.');
            out.push_str(c);
        }
    }
    if let Some(name) = attributes.get("name") {
        out.push_str(&format!("[name=\"{}\"]", name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Document {
        Document::from_dom(
            &DomNode::element("html").child(
                DomNode::element("body")
                    .child(
                        DomNode::element("div")
                            .attr("class", "card")
                            .child(DomNode::element("p").with_text("Create an account")),
                    )
                    .child(
                        DomNode::element("fieldset")
                            .attr("disabled", "")
                            .child(DomNode::element("button").with_text("Login")),
                    )
                    .child(
                        DomNode::element("div")
                            .attr("style", "display: none")
                            .child(DomNode::element("span").with_text("secret")),
                    ),
            ),
        )
    }

    #[test]
    fn test_document_order_ids() {
        let doc = page();
        assert_eq!(doc.tag(doc.root()), "html");
        let tags: Vec<&str> = doc
            .all_nodes()
            .filter(|&n| doc.is_element(n))
            .map(|n| doc.tag(n))
            .collect();
        assert_eq!(tags, ["html", "body", "div", "p", "fieldset", "button", "div", "span"]);
    }

    #[test]
    fn test_contains_picks_deepest_element() {
        let doc = page();
        let found = doc.locate(&Locator::text("Create an account")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(doc.tag(found[0]), "p");
    }

    #[test]
    fn test_visibility_and_enabled() {
        let doc = page();
        let span = doc.locate_one(&Locator::css("span")).unwrap().unwrap();
        assert!(!doc.is_visible(span));
        let button = doc.locate_one(&Locator::contains("button", "Login")).unwrap().unwrap();
        assert!(doc.is_visible(button));
        assert!(!doc.is_enabled(button));
        let p = doc.locate_one(&Locator::css("p")).unwrap().unwrap();
        assert!(doc.is_enabled(p));
    }

    #[test]
    fn test_within_scopes_to_descendants() {
        let doc = page();
        let inside = Locator::css("*").within(Locator::css("fieldset"));
        let found = doc.locate(&inside).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(doc.tag(found[0]), "button");
    }

    #[test]
    fn test_round_trip_keeps_values() {
        let mut doc = Document::from_dom(
            &DomNode::element("form").child(DomNode::element("input").attr("name", "email")),
        );
        let input = doc.locate_one(&Locator::css("input")).unwrap().unwrap();
        doc.append_value(input, "a@b.c");
        let again = Document::from_dom(&doc.to_dom(doc.root()));
        assert_eq!(again.value(input), "a@b.c");
    }
}
