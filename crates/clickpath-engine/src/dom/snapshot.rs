use super::{Document, DomError, NodeId};
use clickpath_common::protocol::{ClickCapture, SnapshotNode};

impl Document {
    /// Rebuild a document from a snapshot rooted at `documentElement`.
    ///
    /// The snapshot's `text` becomes the first child of its element so that
    /// `text()` predicates evaluate as they did in the page.
    pub fn from_snapshot(root: &SnapshotNode) -> Document {
        let mut doc = Document::new();
        let mut pending = vec![(doc.root(), root)];
        while let Some((parent, node)) = pending.pop() {
            let id = doc.append_element(
                parent,
                &node.tag,
                node.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            );
            if let Some(text) = &node.text {
                doc.append_text(id, text);
            }
            // Reverse so children are appended in source order.
            for child in node.children.iter().rev() {
                pending.push((id, child));
            }
        }
        doc
    }

    /// [`Document::from_snapshot`] for the JSON form the capture script emits.
    pub fn parse_snapshot_json(json: &str) -> Result<Document, DomError> {
        let root: SnapshotNode = serde_json::from_str(json)?;
        Ok(Document::from_snapshot(&root))
    }
}

/// Follow the capture's child-index path from `documentElement`.
pub fn locate_target(doc: &Document, capture: &ClickCapture) -> Option<NodeId> {
    let mut current = doc.document_element()?;
    for index in &capture.target {
        current = doc.child_elements(current).nth(*index)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_structure() {
        let snapshot = SnapshotNode::new("HTML").with_child(
            SnapshotNode::new("BODY")
                .with_child(SnapshotNode::new("P").with_text("one"))
                .with_child(SnapshotNode::new("P").with_attr("class", "x").with_text("two")),
        );
        let doc = Document::from_snapshot(&snapshot);
        let tags: Vec<_> = doc
            .elements()
            .into_iter()
            .filter_map(|id| doc.tag_name(id))
            .collect();
        assert_eq!(tags, vec!["HTML", "BODY", "P", "P"]);

        let capture = ClickCapture {
            url: String::new(),
            button: Default::default(),
            target: vec![0, 1],
            snapshot,
        };
        let target = locate_target(&doc, &capture).unwrap();
        assert_eq!(doc.attr(target, "class"), Some("x"));
        assert_eq!(doc.first_text(target), Some("two"));
    }

    #[test]
    fn snapshot_json_drops_null_attributes() {
        let doc = Document::parse_snapshot_json(
            r#"{"tag":"HTML","attrs":{"lang":"en","dir":null},"children":[{"tag":"BODY","text":"hi"}]}"#,
        )
        .unwrap();
        let html = doc.document_element().unwrap();
        assert_eq!(doc.attributes(html).len(), 1);
        assert_eq!(doc.first_text(doc.elements()[1]), Some("hi"));
        assert!(matches!(
            Document::parse_snapshot_json("{\"attrs\":{}}"),
            Err(DomError::Snapshot(_))
        ));
    }

    #[test]
    fn blank_snapshot_text_is_kept() {
        let snapshot = SnapshotNode::new("HTML")
            .with_child(SnapshotNode::new("LI").with_text("\n  ").with_child(SnapshotNode::new("B")));
        let doc = Document::from_snapshot(&snapshot);
        let li = doc.elements()[1];
        assert_eq!(doc.first_text(li), Some("\n  "));
    }

    #[test]
    fn out_of_range_paths_do_not_resolve() {
        let snapshot = SnapshotNode::new("html").with_child(SnapshotNode::new("body"));
        let doc = Document::from_snapshot(&snapshot);
        let capture = ClickCapture {
            url: String::new(),
            button: Default::default(),
            target: vec![3],
            snapshot,
        };
        assert_eq!(locate_target(&doc, &capture), None);
    }
}
