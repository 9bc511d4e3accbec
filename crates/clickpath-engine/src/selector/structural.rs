use crate::dom::{Document, NodeId};
use clickpath_parser::escape_css_ident;
use serde::{Deserialize, Serialize};

/// What to do once an element with an id is reached while walking up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdAnchor {
    /// The id segment starts the path; ancestors are not visited.
    #[default]
    Stop,
    /// Keep prepending ancestor segments above the id.
    Continue,
}

/// Build a structural CSS path for `element`, anchoring at the nearest id.
pub fn build_structural_selector(doc: &Document, element: NodeId) -> String {
    build_structural_selector_with(doc, element, IdAnchor::Stop)
}

/// Build a structural CSS path for `element`.
///
/// Segments are `#id` (escaped as a CSS identifier), a bare tag when the tag is unique among the parent's
/// element children, or `tag:nth-child(k)` with `k` counted over all element
/// children. The result is lower-cased as a whole, ids included, so
/// mixed-case ids do not survive the trip. The document node yields `""`.
pub fn build_structural_selector_with(doc: &Document, element: NodeId, anchor: IdAnchor) -> String {
    let mut path: Vec<String> = Vec::new();

    // Clicks on text resolve to the element around it.
    let mut current = if doc.text(element).is_some() {
        match doc.parent(element) {
            Some(parent) => parent,
            None => return String::new(),
        }
    } else {
        element
    };

    while let Some(parent) = doc.parent(current) {
        if let Some(id) = doc.element_id(current) {
            path.push(format!("#{}", escape_css_ident(id)));
            if anchor == IdAnchor::Stop {
                break;
            }
        } else {
            path.push(segment(doc, current, parent));
        }
        current = parent;
    }

    path.reverse();
    path.join(" > ").to_lowercase()
}

fn segment(doc: &Document, node: NodeId, parent: NodeId) -> String {
    let tag = doc.tag_name(node).unwrap_or_default();
    let same_tag = doc
        .child_elements(parent)
        .filter(|sibling| {
            doc.tag_name(*sibling)
                .is_some_and(|t| t.eq_ignore_ascii_case(tag))
        })
        .count();

    if same_tag <= 1 {
        tag.to_string()
    } else {
        let position = doc
            .child_elements(parent)
            .position(|sibling| sibling == node)
            .unwrap_or(0);
        format!("{}:nth-child({})", tag, position + 1)
    }
}
