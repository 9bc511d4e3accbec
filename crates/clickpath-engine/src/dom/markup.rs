use super::{Document, DomError, NodeId};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// HTML elements that never have content and are often left unclosed.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

impl Document {
    /// Build a document from well-formed markup.
    ///
    /// Accepts XHTML-style input plus unclosed void elements. Text inside
    /// elements is kept as written, whitespace between tags included, so
    /// `text()` sees the same first text node a browser would. Comments,
    /// doctypes and processing instructions are ignored. An end tag closes
    /// everything up to the nearest open element of the same name; stray end
    /// tags are ignored.
    pub fn parse_markup(markup: &str) -> Result<Document, DomError> {
        let mut doc = Document::new();
        let mut stack: Vec<(NodeId, String)> = Vec::new();

        let mut reader = Reader::from_str(markup);
        reader.check_end_names(false);

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event().map_err(|e| DomError::Markup {
                position,
                message: e.to_string(),
            })?;
            let parent = stack.last().map(|(id, _)| *id).unwrap_or(doc.root());

            match event {
                Event::Start(ref e) => {
                    let (tag, attrs) = read_start(e, position)?;
                    let id = doc.append_element(parent, &tag, attrs);
                    if !is_void(&tag) {
                        stack.push((id, tag));
                    }
                }
                Event::Empty(ref e) => {
                    let (tag, attrs) = read_start(e, position)?;
                    doc.append_element(parent, &tag, attrs);
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if let Some(open) = stack
                        .iter()
                        .rposition(|(_, tag)| tag.eq_ignore_ascii_case(&name))
                    {
                        stack.truncate(open);
                    }
                }
                Event::Text(ref e) => {
                    let text = e.unescape().map_err(|e| DomError::Markup {
                        position,
                        message: e.to_string(),
                    })?;
                    if !text.is_empty() && parent != doc.root() {
                        doc.append_text(parent, &text);
                    }
                }
                Event::CData(ref e) => {
                    let text = String::from_utf8_lossy(&e.clone().into_inner()).to_string();
                    if parent != doc.root() {
                        doc.append_text(parent, &text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if doc.document_element().is_none() {
            return Err(DomError::Empty);
        }
        Ok(doc)
    }
}

fn read_start(
    e: &BytesStart<'_>,
    position: usize,
) -> Result<(String, Vec<(String, String)>), DomError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for attr in e.html_attributes().with_checks(false) {
        let attr = attr.map_err(|err| DomError::Markup {
            position,
            message: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
        attrs.push((key, value));
    }
    Ok((tag, attrs))
}
