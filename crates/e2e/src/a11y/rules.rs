//! Built-in accessibility rules
//!
//! Rule ids and impacts follow axe-core. Each rule inspects a flattened page
//! snapshot and returns the offending nodes; an empty result means it passed.

use pagecheck_common::dom::normalize_whitespace;
use pagecheck_common::{Document, NodeId};
use std::collections::BTreeMap;

use super::Impact;

/// Elements a rule looks at
pub(crate) struct Scope<'a> {
    pub doc: &'a Document,
    /// Elements inside the audited subtree, in document order
    pub elements: Vec<NodeId>,
}

impl Scope<'_> {
    fn visible<'s>(&'s self, tags: &'s [&'static str]) -> impl Iterator<Item = NodeId> + 's {
        self.elements
            .iter()
            .copied()
            .filter(move |&n| tags.is_empty() || tags.contains(&self.doc.tag(n)))
            .filter(move |&n| self.doc.is_visible(n))
    }

    fn html(&self) -> Option<NodeId> {
        self.doc.all_nodes().find(|&n| self.doc.tag(n) == "html")
    }
}

pub(crate) struct Rule {
    pub id: &'static str,
    pub impact: Impact,
    pub help: &'static str,
    /// Only meaningful for a whole page
    pub page_level: bool,
    pub check: fn(&Scope<'_>) -> Vec<NodeId>,
}

pub(crate) const RULES: &[Rule] = &[
    Rule {
        id: "button-name",
        impact: Impact::Critical,
        help: "Buttons must have discernible text",
        page_level: false,
        check: button_name,
    },
    Rule {
        id: "image-alt",
        impact: Impact::Critical,
        help: "Images must have alternate text",
        page_level: false,
        check: image_alt,
    },
    Rule {
        id: "label",
        impact: Impact::Critical,
        help: "Form elements must have labels",
        page_level: false,
        check: label,
    },
    Rule {
        id: "link-name",
        impact: Impact::Serious,
        help: "Links must have discernible text",
        page_level: false,
        check: link_name,
    },
    Rule {
        id: "html-has-lang",
        impact: Impact::Serious,
        help: "<html> element must have a lang attribute",
        page_level: true,
        check: html_has_lang,
    },
    Rule {
        id: "document-title",
        impact: Impact::Serious,
        help: "Documents must have <title> element to aid in navigation",
        page_level: true,
        check: document_title,
    },
    Rule {
        id: "landmark-one-main",
        impact: Impact::Moderate,
        help: "Document should have one main landmark",
        page_level: true,
        check: landmark_one_main,
    },
    Rule {
        id: "meta-viewport",
        impact: Impact::Critical,
        help: "Zooming and scaling should not be disabled",
        page_level: true,
        check: meta_viewport,
    },
    Rule {
        id: "region",
        impact: Impact::Moderate,
        help: "All page content should be contained by landmarks",
        page_level: false,
        check: region,
    },
    Rule {
        id: "duplicate-id",
        impact: Impact::Minor,
        help: "id attribute value must be unique",
        page_level: false,
        check: duplicate_id,
    },
];

pub(crate) fn find(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.id == id)
}

const LANDMARK_TAGS: &[&str] = &["main", "nav", "header", "footer", "aside"];

const LANDMARK_ROLES: &[&str] = &[
    "main",
    "navigation",
    "banner",
    "contentinfo",
    "complementary",
    "region",
    "search",
    "form",
];

fn attr_text(doc: &Document, id: NodeId, name: &str) -> String {
    doc.attr(id, name).map(normalize_whitespace).unwrap_or_default()
}

fn by_id(doc: &Document, value: &str) -> Option<NodeId> {
    doc.all_nodes().find(|&n| doc.attr(n, "id") == Some(value))
}

fn is_presentational(doc: &Document, id: NodeId) -> bool {
    matches!(doc.attr(id, "role"), Some("presentation") | Some("none"))
}

/// Computed name in the order aria-labelledby, aria-label, content, title
fn accessible_name(doc: &Document, id: NodeId) -> String {
    if let Some(ids) = doc.attr(id, "aria-labelledby") {
        let name = ids
            .split_whitespace()
            .filter_map(|r| by_id(doc, r))
            .map(|n| doc.normalized_text(n))
            .collect::<Vec<_>>()
            .join(" ");
        if !name.trim().is_empty() {
            return normalize_whitespace(&name);
        }
    }
    let label = attr_text(doc, id, "aria-label");
    if !label.is_empty() {
        return label;
    }
    let content = match doc.tag(id) {
        "img" | "area" => attr_text(doc, id, "alt"),
        "input" => match doc.attr(id, "type").unwrap_or("text") {
            "submit" | "button" | "reset" => {
                let value = attr_text(doc, id, "value");
                match (value.is_empty(), doc.attr(id, "type")) {
                    (false, _) => value,
                    (true, Some("submit")) => "Submit".to_string(),
                    (true, Some("reset")) => "Reset".to_string(),
                    _ => String::new(),
                }
            }
            "image" => attr_text(doc, id, "alt"),
            _ => String::new(),
        },
        _ => {
            let mut parts = vec![doc.normalized_text(id)];
            parts.extend(
                doc.descendants(id)
                    .filter(|&n| doc.tag(n) == "img")
                    .map(|n| attr_text(doc, n, "alt")),
            );
            normalize_whitespace(&parts.join(" "))
        }
    };
    if !content.is_empty() {
        return content;
    }
    attr_text(doc, id, "title")
}

fn button_name(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    scope
        .visible(&["button", "input"])
        .filter(|&n| {
            doc.tag(n) == "button"
                || matches!(doc.attr(n, "type"), Some("submit" | "button" | "reset"))
        })
        .filter(|&n| accessible_name(doc, n).is_empty())
        .collect()
}

fn image_alt(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    scope
        .visible(&["img"])
        .filter(|&n| !is_presentational(doc, n))
        .filter(|&n| {
            !doc.has_attr(n, "alt")
                && attr_text(doc, n, "aria-label").is_empty()
                && !doc.has_attr(n, "aria-labelledby")
        })
        .collect()
}

fn label(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    scope
        .visible(&["input", "select", "textarea"])
        .filter(|&n| {
            doc.tag(n) != "input"
                || !matches!(
                    doc.attr(n, "type"),
                    Some("submit" | "button" | "reset" | "image" | "hidden")
                )
        })
        .filter(|&n| {
            let labelled = !attr_text(doc, n, "aria-label").is_empty()
                || doc.has_attr(n, "aria-labelledby")
                || !attr_text(doc, n, "title").is_empty()
                || doc.ancestors(n).any(|a| doc.tag(a) == "label");
            let for_label = doc.attr(n, "id").map_or(false, |id| {
                doc.all_nodes()
                    .any(|l| doc.tag(l) == "label" && doc.attr(l, "for") == Some(id))
            });
            !labelled && !for_label
        })
        .collect()
}

fn link_name(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    scope
        .visible(&["a"])
        .filter(|&n| doc.has_attr(n, "href"))
        .filter(|&n| accessible_name(doc, n).is_empty())
        .collect()
}

fn html_has_lang(scope: &Scope<'_>) -> Vec<NodeId> {
    match scope.html() {
        Some(html) if attr_text(scope.doc, html, "lang").is_empty() => vec![html],
        _ => Vec::new(),
    }
}

fn document_title(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    let titled = doc
        .all_nodes()
        .any(|n| doc.tag(n) == "title" && !doc.normalized_text(n).is_empty());
    match scope.html() {
        Some(html) if !titled => vec![html],
        _ => Vec::new(),
    }
}

fn is_main(doc: &Document, n: NodeId) -> bool {
    doc.tag(n) == "main" || doc.attr(n, "role") == Some("main")
}

fn landmark_one_main(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    let mains = doc
        .all_nodes()
        .filter(|&n| is_main(doc, n) && doc.is_visible(n))
        .count();
    match scope.html() {
        Some(html) if mains != 1 => vec![html],
        _ => Vec::new(),
    }
}

fn meta_viewport(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    doc.all_nodes()
        .filter(|&n| doc.tag(n) == "meta" && doc.attr(n, "name") == Some("viewport"))
        .filter(|&n| {
            let content = doc.attr(n, "content").unwrap_or_default();
            let properties: BTreeMap<String, String> = content
                .split([',', ';'])
                .filter_map(|p| p.split_once('='))
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_ascii_lowercase()))
                .collect();
            let no_zoom = matches!(
                properties.get("user-scalable").map(String::as_str),
                Some("no" | "0")
            );
            let capped = properties
                .get("maximum-scale")
                .and_then(|v| v.parse::<f64>().ok())
                .map_or(false, |scale| scale < 2.0);
            no_zoom || capped
        })
        .collect()
}

fn is_landmark(doc: &Document, n: NodeId) -> bool {
    LANDMARK_TAGS.contains(&doc.tag(n))
        || doc
            .attr(n, "role")
            .map_or(false, |role| LANDMARK_ROLES.contains(&role))
}

/// Visible elements with their own text that sit outside every landmark
fn region(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    let has_own_text = |n: NodeId| {
        doc.children(n)
            .iter()
            .any(|&c| !doc.is_element(c) && !doc.normalized_text(c).is_empty())
            || doc.tag(n) == "img"
    };
    let outside: Vec<NodeId> = scope
        .visible(&[])
        .filter(|&n| doc.tag(n) != "html" && doc.tag(n) != "body")
        .filter(|&n| has_own_text(n))
        .filter(|&n| !is_landmark(doc, n) && !doc.ancestors(n).any(|a| is_landmark(doc, a)))
        .collect();
    // report the outermost offenders only
    outside
        .iter()
        .copied()
        .filter(|&n| !outside.iter().any(|&o| doc.is_ancestor(o, n)))
        .collect()
}

fn duplicate_id(scope: &Scope<'_>) -> Vec<NodeId> {
    let doc = scope.doc;
    let mut seen: BTreeMap<&str, Vec<NodeId>> = BTreeMap::new();
    for &n in &scope.elements {
        if let Some(id) = doc.attr(n, "id").filter(|id| !id.is_empty()) {
            seen.entry(id).or_default().push(n);
        }
    }
    let mut dupes: Vec<NodeId> = seen
        .into_values()
        .filter(|nodes| nodes.len() > 1)
        .flat_map(|nodes| nodes.into_iter().skip(1))
        .collect();
    dupes.sort_unstable();
    dupes
}
