//! Robula+ robust XPath generation.
//!
//! Starting from `//*`, candidate paths are specialised one transformation at
//! a time, breadth first, until one selects exactly the target element. See
//! Leotta et al., "ROBULA+: an algorithm for generating robust XPath locators
//! for web testing" (2016).

use super::resolve::uniquely_locates;
use crate::dom::{Document, NodeId};
use clickpath_common::error::SelectorError;
use clickpath_parser::{AttributeTest, NodeTest, Predicate, XPath, XPathStep, is_quotable};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobulaOptions {
    /// Attributes tried first, in this order.
    #[serde(default = "default_attribute_priority")]
    pub attribute_priority: Vec<String>,
    /// Attributes never used as anchors.
    #[serde(default = "default_attribute_blacklist")]
    pub attribute_blacklist: Vec<String>,
    /// Upper bound on candidates generated before giving up.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Only the first N eligible attributes take part in attribute sets.
    /// Values above [`ATTRIBUTE_SET_LIMIT`] are treated as the limit.
    #[serde(default = "default_max_attribute_set")]
    pub max_attribute_set: usize,
}

impl Default for RobulaOptions {
    fn default() -> Self {
        Self {
            attribute_priority: default_attribute_priority(),
            attribute_blacklist: default_attribute_blacklist(),
            max_candidates: default_max_candidates(),
            max_attribute_set: default_max_attribute_set(),
        }
    }
}

fn default_attribute_priority() -> Vec<String> {
    ["name", "class", "title", "alt", "value"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_attribute_blacklist() -> Vec<String> {
    [
        "href",
        "src",
        "onclick",
        "onload",
        "tabindex",
        "width",
        "height",
        "style",
        "size",
        "maxlength",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_candidates() -> usize {
    20_000
}

fn default_max_attribute_set() -> usize {
    5
}

/// Attribute sets grow as `2^n`; this bounds `n` whatever the options say.
pub const ATTRIBUTE_SET_LIMIT: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct RobulaPlus {
    options: RobulaOptions,
}

impl RobulaPlus {
    pub fn new(options: RobulaOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RobulaOptions {
        &self.options
    }

    /// Find the first candidate path that selects exactly `element`.
    pub fn generate(&self, doc: &Document, element: NodeId) -> Result<XPath, SelectorError> {
        if !doc.is_element(element) {
            return Err(SelectorError::NotAnElement);
        }
        if !doc.is_connected(element) {
            return Err(SelectorError::Detached);
        }

        let mut queue = VecDeque::from([XPath::any()]);
        let mut seen: HashSet<String> = HashSet::from([XPath::any().to_string()]);
        let mut generated = 0usize;

        while let Some(xpath) = queue.pop_front() {
            for candidate in self.transform(doc, element, &xpath) {
                if !seen.insert(candidate.to_string()) {
                    continue;
                }
                if uniquely_locates(doc, &candidate, element) {
                    return Ok(candidate);
                }
                generated += 1;
                if generated >= self.options.max_candidates {
                    return Err(SelectorError::SearchExhausted {
                        limit: self.options.max_candidates,
                    });
                }
                queue.push_back(candidate);
            }
        }

        Err(SelectorError::SearchExhausted { limit: generated })
    }

    fn transform(&self, doc: &Document, element: NodeId, xpath: &XPath) -> Vec<XPath> {
        // The head step describes the ancestor `level - 1` steps above.
        let Some(ancestor) = doc.ancestor(element, xpath.level() - 1) else {
            return Vec::new();
        };
        let Some(head) = xpath.head() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        out.extend(convert_star(doc, ancestor, xpath, head));
        out.extend(add_id(doc, ancestor, xpath, head));
        out.extend(add_text(doc, ancestor, xpath, head));
        out.extend(self.add_attribute(doc, ancestor, xpath, head));
        out.extend(self.add_attribute_set(doc, ancestor, xpath, head));
        out.extend(add_position(doc, ancestor, xpath, head));
        out.extend(add_level(doc, element, xpath));
        out
    }

    /// Anchor attributes of `ancestor`: priority list first, then the rest in
    /// source order. Ids, blacklisted names and unquotable values are skipped.
    fn eligible_attributes(&self, doc: &Document, ancestor: NodeId) -> Vec<AttributeTest> {
        let attrs = doc.attributes(ancestor);
        let usable = |name: &str, value: &str| {
            name != "id"
                && !self.options.attribute_blacklist.iter().any(|b| b == name)
                && is_quotable(value)
        };

        let mut out: Vec<AttributeTest> = self
            .options
            .attribute_priority
            .iter()
            .filter_map(|p| attrs.iter().find(|(k, _)| k == p))
            .filter(|(k, v)| usable(k, v))
            .map(|(k, v)| AttributeTest::new(k.as_str(), v.as_str()))
            .collect();

        for (k, v) in attrs {
            let prioritised = self.options.attribute_priority.iter().any(|p| p == k);
            if !prioritised && usable(k, v) {
                out.push(AttributeTest::new(k.as_str(), v.as_str()));
            }
        }
        out
    }

    fn add_attribute(
        &self,
        doc: &Document,
        ancestor: NodeId,
        xpath: &XPath,
        head: &XPathStep,
    ) -> Vec<XPath> {
        if !head.predicates.is_empty() {
            return Vec::new();
        }
        self.eligible_attributes(doc, ancestor)
            .into_iter()
            .map(|attr| with_head_predicate(xpath, Predicate::Attributes(vec![attr])))
            .collect()
    }

    fn add_attribute_set(
        &self,
        doc: &Document,
        ancestor: NodeId,
        xpath: &XPath,
        head: &XPathStep,
    ) -> Vec<XPath> {
        if !head.predicates.is_empty() {
            return Vec::new();
        }
        let mut attrs = self.eligible_attributes(doc, ancestor);
        attrs.truncate(self.options.max_attribute_set.min(ATTRIBUTE_SET_LIMIT));

        let mut sets = power_set(&attrs);
        sets.retain(|set| set.len() >= 2);
        // Smaller sets first; ties keep priority order from the power set.
        sets.sort_by_key(|set| set.len());

        sets.into_iter()
            .map(|set| with_head_predicate(xpath, Predicate::Attributes(set)))
            .collect()
    }
}

fn with_head_predicate(xpath: &XPath, predicate: Predicate) -> XPath {
    let mut next = xpath.clone();
    if let Some(head) = next.head_mut() {
        head.predicates.push(predicate);
    }
    next
}

fn convert_star(doc: &Document, ancestor: NodeId, xpath: &XPath, head: &XPathStep) -> Vec<XPath> {
    if head.test != NodeTest::Any {
        return Vec::new();
    }
    let Some(tag) = doc.tag_name(ancestor) else {
        return Vec::new();
    };
    let mut next = xpath.clone();
    if let Some(head) = next.head_mut() {
        head.test = NodeTest::Tag(tag.to_lowercase());
    }
    vec![next]
}

fn add_id(doc: &Document, ancestor: NodeId, xpath: &XPath, head: &XPathStep) -> Vec<XPath> {
    match doc.element_id(ancestor) {
        Some(id) if head.predicates.is_empty() && is_quotable(id) => {
            vec![with_head_predicate(
                xpath,
                Predicate::Attributes(vec![AttributeTest::new("id", id)]),
            )]
        }
        _ => Vec::new(),
    }
}

/// `text()` is the first text child only, so an element whose first text
/// child is blank gets no text anchor even if later text follows.
fn add_text(doc: &Document, ancestor: NodeId, xpath: &XPath, head: &XPathStep) -> Vec<XPath> {
    if head.has_position() || head.has_text() {
        return Vec::new();
    }
    match doc.first_text(ancestor).map(str::trim) {
        Some(text) if !text.is_empty() && is_quotable(text) => {
            vec![with_head_predicate(
                xpath,
                Predicate::ContainsText(text.to_string()),
            )]
        }
        _ => Vec::new(),
    }
}

fn add_position(doc: &Document, ancestor: NodeId, xpath: &XPath, head: &XPathStep) -> Vec<XPath> {
    if head.has_position() {
        return Vec::new();
    }
    let Some(parent) = doc.parent(ancestor) else {
        return Vec::new();
    };
    let tag = doc.tag_name(ancestor).unwrap_or_default();
    let position = doc
        .child_elements(parent)
        .filter(|c| match head.test {
            NodeTest::Any => true,
            NodeTest::Tag(_) => doc
                .tag_name(*c)
                .is_some_and(|t| t.eq_ignore_ascii_case(tag)),
        })
        .position(|c| c == ancestor);

    match position {
        Some(p) => vec![with_head_predicate(xpath, Predicate::Position(p + 1))],
        None => Vec::new(),
    }
}

fn add_level(doc: &Document, element: NodeId, xpath: &XPath) -> Vec<XPath> {
    if xpath.level() > doc.depth(element) {
        return Vec::new();
    }
    let mut steps = Vec::with_capacity(xpath.level() + 1);
    steps.push(XPathStep::new(NodeTest::Any));
    steps.extend(xpath.steps.iter().cloned());
    vec![XPath { steps }]
}

/// All subsets, ordered by the binary counter over `items`.
fn power_set<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    (0..1usize << items.len())
        .map(|mask| {
            items
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, item)| item.clone())
                .collect()
        })
        .collect()
}
