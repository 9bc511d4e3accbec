//! Evaluate parsed selectors against a [`Document`].

use crate::dom::{Document, NodeId};
use clickpath_parser::{CssCompound, CssPath, NodeTest, Predicate, XPath, XPathStep};

/// All elements matched by a structural path, in document order.
///
/// Segments are joined by the child combinator; the first segment may match at
/// any depth. The empty path denotes the document node.
pub fn resolve_css_path(doc: &Document, path: &CssPath) -> Vec<NodeId> {
    let Some((last, rest)) = path.segments.split_last() else {
        return vec![doc.root()];
    };

    doc.elements()
        .into_iter()
        .filter(|el| compound_matches(doc, *el, last) && ancestors_match(doc, *el, rest))
        .collect()
}

fn ancestors_match(doc: &Document, element: NodeId, rest: &[CssCompound]) -> bool {
    let mut current = element;
    for compound in rest.iter().rev() {
        match doc.parent_element(current) {
            Some(parent) if compound_matches(doc, parent, compound) => current = parent,
            _ => return false,
        }
    }
    true
}

fn compound_matches(doc: &Document, element: NodeId, compound: &CssCompound) -> bool {
    if let Some(tag) = &compound.tag {
        let matches = doc
            .tag_name(element)
            .is_some_and(|t| t.eq_ignore_ascii_case(tag));
        if !matches {
            return false;
        }
    }
    if let Some(id) = &compound.id
        && doc.element_id(element) != Some(id.as_str())
    {
        return false;
    }
    if let Some(k) = compound.nth_child {
        let Some(parent) = doc.parent(element) else {
            return false;
        };
        let position = doc.child_elements(parent).position(|c| c == element);
        if position.map(|p| p + 1) != Some(k) {
            return false;
        }
    }
    true
}

/// All elements selected by a location path, in document order.
pub fn evaluate_xpath(doc: &Document, xpath: &XPath) -> Vec<NodeId> {
    let Some((last, rest)) = xpath.steps.split_last() else {
        return Vec::new();
    };

    doc.elements()
        .into_iter()
        .filter(|el| step_matches(doc, *el, last) && steps_match_upwards(doc, *el, rest))
        .collect()
}

/// Whether the path selects `element` and nothing else.
pub fn uniquely_locates(doc: &Document, xpath: &XPath, element: NodeId) -> bool {
    let Some((last, rest)) = xpath.steps.split_last() else {
        return false;
    };
    if !step_matches(doc, element, last) || !steps_match_upwards(doc, element, rest) {
        return false;
    }
    evaluate_xpath(doc, xpath) == [element]
}

fn steps_match_upwards(doc: &Document, element: NodeId, rest: &[XPathStep]) -> bool {
    let mut current = element;
    for step in rest.iter().rev() {
        match doc.parent_element(current) {
            Some(parent) if step_matches(doc, parent, step) => current = parent,
            _ => return false,
        }
    }
    true
}

/// `child::test[p1][p2]...` evaluated from the element's parent.
fn step_matches(doc: &Document, element: NodeId, step: &XPathStep) -> bool {
    if !node_test_matches(doc, element, &step.test) {
        return false;
    }
    if step.predicates.is_empty() {
        return true;
    }
    let Some(parent) = doc.parent(element) else {
        return false;
    };

    let mut candidates: Vec<NodeId> = doc
        .child_elements(parent)
        .filter(|c| node_test_matches(doc, *c, &step.test))
        .collect();

    for predicate in &step.predicates {
        candidates = match predicate {
            Predicate::Position(k) => k
                .checked_sub(1)
                .and_then(|i| candidates.get(i).copied())
                .into_iter()
                .collect(),
            other => candidates
                .into_iter()
                .filter(|c| predicate_holds(doc, *c, other))
                .collect(),
        };
        if !candidates.contains(&element) {
            return false;
        }
    }
    true
}

fn node_test_matches(doc: &Document, element: NodeId, test: &NodeTest) -> bool {
    match test {
        NodeTest::Any => doc.is_element(element),
        NodeTest::Tag(tag) => doc
            .tag_name(element)
            .is_some_and(|t| t.eq_ignore_ascii_case(tag)),
    }
}

fn predicate_holds(doc: &Document, element: NodeId, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Attributes(tests) => tests
            .iter()
            .all(|t| doc.attr(element, &t.name) == Some(t.value.as_str())),
        Predicate::ContainsText(text) => doc
            .first_text(element)
            .unwrap_or_default()
            .contains(text.as_str()),
        // Positions are handled over the candidate list.
        Predicate::Position(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickpath_parser::{parse_css_path, parse_xpath};

    const PAGE: &str = r#"<html><body>
        <ul id="list"><li class="a">A</li><li class="b">B</li><li class="a">C</li></ul>
        <p>Next</p>
    </body></html>"#;

    fn texts(doc: &Document, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|id| doc.first_text(*id).unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn css_paths_follow_child_combinators() {
        let doc = Document::parse_markup(PAGE).unwrap();
        let hits = resolve_css_path(&doc, &parse_css_path("#list > li:nth-child(3)").unwrap());
        assert_eq!(texts(&doc, &hits), vec!["C"]);

        let hits = resolve_css_path(&doc, &parse_css_path("ul > li").unwrap());
        assert_eq!(hits.len(), 3);

        let hits = resolve_css_path(&doc, &parse_css_path("body > li").unwrap());
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_css_path_is_the_document() {
        let doc = Document::parse_markup(PAGE).unwrap();
        assert_eq!(
            resolve_css_path(&doc, &parse_css_path("").unwrap()),
            vec![doc.root()]
        );
    }

    #[test]
    fn position_applies_after_attribute_filter() {
        let doc = Document::parse_markup(PAGE).unwrap();
        let hits = evaluate_xpath(&doc, &parse_xpath("//li[@class='a'][2]").unwrap());
        assert_eq!(texts(&doc, &hits), vec!["C"]);

        let hits = evaluate_xpath(&doc, &parse_xpath("//li[2][@class='a']").unwrap());
        assert!(hits.is_empty());
    }

    #[test]
    fn star_steps_and_text_predicates() {
        let doc = Document::parse_markup(PAGE).unwrap();
        let hits = evaluate_xpath(&doc, &parse_xpath("//*/p[contains(text(),'Nex')]").unwrap());
        assert_eq!(texts(&doc, &hits), vec!["Next"]);

        let hits = evaluate_xpath(&doc, &parse_xpath("//*[@id='list']/*[1]").unwrap());
        assert_eq!(texts(&doc, &hits), vec!["A"]);
    }

    #[test]
    fn uniqueness_requires_single_match() {
        let doc = Document::parse_markup(PAGE).unwrap();
        let first = evaluate_xpath(&doc, &parse_xpath("//li[1]").unwrap())[0];
        assert!(uniquely_locates(&doc, &parse_xpath("//li[1]").unwrap(), first));
        assert!(!uniquely_locates(&doc, &parse_xpath("//li[@class='a']").unwrap(), first));
    }
}
