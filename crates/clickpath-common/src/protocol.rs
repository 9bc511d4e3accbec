use crate::error::ProtocolError;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Console prefix marking an interaction record emitted by the page logger.
pub const INTERACTION_PREFIX: &str = "SCANNER_INTERACTION";

/// Console prefix marking a click capture emitted by the capture script.
pub const CAPTURE_PREFIX: &str = "CLICKPATH_CAPTURE";

/// Event name used for click records.
pub const CLICK_EVENT: &str = "click";

/// Attribute maps keep the page's attribute order. The capture script
/// serializes missing attributes as `null`; those entries are dropped.
mod attribute_map {
    use super::*;

    pub fn serialize<S>(attrs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(attrs.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(AttributeVisitor)
    }

    struct AttributeVisitor;

    impl<'de> Visitor<'de> for AttributeVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of attribute names to strings or null")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut attrs: Vec<(String, String)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, value)) = map.next_entry::<String, Option<String>>()? {
                let Some(value) = value else {
                    continue;
                };
                match attrs.iter_mut().find(|(k, _)| *k == name) {
                    Some(entry) => entry.1 = value,
                    None => attrs.push((name, value)),
                }
            }
            Ok(attrs)
        }
    }
}

/// One reported interaction: which event happened and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub event: String,
    pub selector: String,
}

impl InteractionRecord {
    pub fn new(event: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            selector: selector.into(),
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self::new(CLICK_EVENT, selector)
    }

    /// Encode as a console line, `SCANNER_INTERACTION{"event":..,"selector":..}`.
    pub fn to_console_line(&self) -> Result<String, ProtocolError> {
        Ok(format!("{}{}", INTERACTION_PREFIX, serde_json::to_string(self)?))
    }
}

/// Parse a console line. Lines without the interaction prefix are not
/// interactions and yield `Ok(None)`.
pub fn parse_console_line(line: &str) -> Result<Option<InteractionRecord>, ProtocolError> {
    let Some(payload) = line.trim().strip_prefix(INTERACTION_PREFIX) else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(payload)?))
}

/// Which builder produced a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Structural,
    Robust,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Structural => write!(f, "structural"),
            SelectorKind::Robust => write!(f, "robust"),
        }
    }
}

/// A selector string tagged with the language it is written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS child-combinator path, e.g. `#list > li:nth-child(2)`.
    Structural(String),
    /// XPath location path, e.g. `//ul[@id='list']/li[2]`.
    Robust(String),
}

impl Selector {
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::Structural(_) => SelectorKind::Structural,
            Selector::Robust(_) => SelectorKind::Robust,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Structural(s) | Selector::Robust(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Selector::Structural(s) | Selector::Robust(s) => s,
        }
    }

    /// Guess the language from the text: location paths start with `/`.
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('/') {
            Selector::Robust(text.to_string())
        } else {
            Selector::Structural(text.to_string())
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to repeat a recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAction {
    pub action: String,
    pub selector: String,
}

impl ReplayAction {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let field = |name: &'static str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or(ProtocolError::MissingField(name))
        };
        Ok(Self {
            action: field("action")?,
            selector: field("selector")?,
        })
    }
}

/// Mouse button as reported by `MouseEvent.button`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum PointerButton {
    #[default]
    Primary,
    Auxiliary,
    Secondary,
    Other(u16),
}

impl From<u16> for PointerButton {
    fn from(value: u16) -> Self {
        match value {
            0 => PointerButton::Primary,
            1 => PointerButton::Auxiliary,
            2 => PointerButton::Secondary,
            n => PointerButton::Other(n),
        }
    }
}

impl From<PointerButton> for u16 {
    fn from(value: PointerButton) -> Self {
        match value {
            PointerButton::Primary => 0,
            PointerButton::Auxiliary => 1,
            PointerButton::Secondary => 2,
            PointerButton::Other(n) => n,
        }
    }
}

/// Serialized element as produced by the capture script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub tag: String,
    /// Attributes in page order.
    #[serde(default, with = "attribute_map")]
    pub attrs: Vec<(String, String)>,
    /// First direct text node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: SnapshotNode) -> Self {
        self.children.push(child);
        self
    }
}

/// One click observed in a live page, with the document it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickCapture {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub button: PointerButton,
    /// Element-child indices from `documentElement` down to the target.
    pub target: Vec<usize>,
    /// Tree rooted at `documentElement`.
    pub snapshot: SnapshotNode,
}

impl ClickCapture {
    /// Decode a console payload. Returns `Ok(None)` when the text does not
    /// carry the capture prefix.
    pub fn from_console_text(text: &str) -> Result<Option<Self>, ProtocolError> {
        let Some(payload) = text.trim().strip_prefix(CAPTURE_PREFIX) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(payload)?))
    }
}

/// Messages delivered to the application channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMessage {
    #[serde(rename = "URLChanged")]
    UrlChanged(String),
    ScanComplete(String),
    Log(String),
    SocketError(String),
    GuacamoleMsg(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_line_carries_prefix() {
        let line = InteractionRecord::click("#list > li:nth-child(2)")
            .to_console_line()
            .unwrap();
        assert_eq!(
            line,
            r##"SCANNER_INTERACTION{"event":"click","selector":"#list > li:nth-child(2)"}"##
        );
        let parsed = parse_console_line(&line).unwrap().unwrap();
        assert_eq!(parsed.selector, "#list > li:nth-child(2)");
    }

    #[test]
    fn unrelated_console_lines_are_skipped() {
        assert!(parse_console_line("Event Listener registered.").unwrap().is_none());
        assert!(parse_console_line("SCANNER_INTERACTION{oops").is_err());
    }

    #[test]
    fn replay_action_requires_both_keys() {
        let ok = ReplayAction::from_json(r#"{"action":"click","selector":"//a[1]"}"#).unwrap();
        assert_eq!(ok.action, "click");

        let err = ReplayAction::from_json(r#"{"action":"click"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField("selector")));
        assert!(ReplayAction::from_json("not json").is_err());
    }

    #[test]
    fn capture_drops_null_attributes() {
        let text = r#"CLICKPATH_CAPTURE{"url":"http://x","button":0,"target":[0],
            "snapshot":{"tag":"HTML","attrs":{"lang":"en","dir":null},
            "children":[{"tag":"BODY"}]}}"#;
        let capture = ClickCapture::from_console_text(text).unwrap().unwrap();
        assert_eq!(capture.button, PointerButton::Primary);
        assert_eq!(capture.snapshot.attrs.len(), 1);
        assert_eq!(capture.snapshot.children[0].tag, "BODY");
    }

    #[test]
    fn snapshot_attributes_keep_page_order() {
        let node: SnapshotNode = serde_json::from_str(
            r#"{"tag":"INPUT","attrs":{"type":"text","name":"q","autocomplete":null,"class":"search"}}"#,
        )
        .unwrap();
        let names: Vec<_> = node.attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["type", "name", "class"]);

        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(
            json,
            r#"{"tag":"INPUT","attrs":{"type":"text","name":"q","class":"search"}}"#
        );
    }

    #[test]
    fn session_messages_are_externally_tagged() {
        let json = serde_json::to_string(&SessionMessage::UrlChanged("http://a".into())).unwrap();
        assert_eq!(json, r#"{"URLChanged":"http://a"}"#);
        let back: SessionMessage = serde_json::from_str(r#"{"SocketError":"Websocket closed."}"#).unwrap();
        assert_eq!(back, SessionMessage::SocketError("Websocket closed.".into()));
    }

    #[test]
    fn selector_detects_language() {
        assert_eq!(Selector::detect("//li[2]").kind(), SelectorKind::Robust);
        assert_eq!(Selector::detect("#a > b").kind(), SelectorKind::Structural);
    }
}
