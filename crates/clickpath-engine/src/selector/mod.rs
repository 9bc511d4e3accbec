pub mod resolve;
pub mod robust;
pub mod structural;

pub use resolve::{evaluate_xpath, resolve_css_path, uniquely_locates};
pub use robust::{ATTRIBUTE_SET_LIMIT, RobulaOptions, RobulaPlus};
pub use structural::{IdAnchor, build_structural_selector, build_structural_selector_with};

use crate::dom::{Document, NodeId};
use clickpath_common::protocol::Selector;
use clickpath_parser::{ParseError, parse_css_path, parse_xpath};

/// Find every node a selector designates, in document order.
pub fn locate(doc: &Document, selector: &Selector) -> Result<Vec<NodeId>, ParseError> {
    match selector {
        Selector::Structural(text) => Ok(resolve_css_path(doc, &parse_css_path(text)?)),
        Selector::Robust(text) => Ok(evaluate_xpath(doc, &parse_xpath(text.trim())?)),
    }
}

/// [`locate`] for untagged text; the language is detected from the prefix.
pub fn locate_str(doc: &Document, selector: &str) -> Result<Vec<NodeId>, ParseError> {
    locate(doc, &Selector::detect(selector))
}
