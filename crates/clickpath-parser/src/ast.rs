use serde::{Deserialize, Serialize};
use std::fmt;

/// A structural path: compounds joined by the child combinator.
///
/// An empty path denotes the document itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CssPath {
    pub segments: Vec<CssCompound>,
}

impl CssPath {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// `tag`, `#id`, `tag#id`, each optionally followed by `:nth-child(k)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CssCompound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub nth_child: Option<usize>,
}

impl CssCompound {
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            tag: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn nth_child(mut self, index: usize) -> Self {
        self.nth_child = Some(index);
        self
    }
}

impl fmt::Display for CssCompound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            f.write_str(tag)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{}", escape_css_ident(id))?;
        }
        if let Some(k) = self.nth_child {
            write!(f, ":nth-child({})", k)?;
        }
        Ok(())
    }
}

impl fmt::Display for CssPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Escape `value` so it reads back as a single CSS identifier, the way
/// `CSS.escape` does. Leading digits and control characters become hex
/// escapes; other ASCII punctuation is backslash-escaped.
pub fn escape_css_ident(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let leading_dash = value.starts_with('-');
    for (i, c) in value.chars().enumerate() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("\\{:x} ", c as u32)),
            '0'..='9' if i == 0 || (i == 1 && leading_dash) => {
                out.push_str(&format!("\\{:x} ", c as u32))
            }
            '-' if value == "-" => out.push_str("\\-"),
            c if c == '-' || c == '_' || c.is_ascii_alphanumeric() || !c.is_ascii() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Absolute location path of the form `//step/step/...`.
///
/// The first step (the head) matches at any depth; later steps are children
/// of the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XPath {
    pub steps: Vec<XPathStep>,
}

impl XPath {
    /// `//*`, the most general path.
    pub fn any() -> Self {
        Self {
            steps: vec![XPathStep::new(NodeTest::Any)],
        }
    }

    /// Number of steps.
    pub fn level(&self) -> usize {
        self.steps.len()
    }

    pub fn head(&self) -> Option<&XPathStep> {
        self.steps.first()
    }

    pub fn head_mut(&mut self) -> Option<&mut XPathStep> {
        self.steps.first_mut()
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XPathStep {
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

impl XPathStep {
    pub fn new(test: NodeTest) -> Self {
        Self {
            test,
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn has_position(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, Predicate::Position(_)))
    }

    pub fn has_text(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, Predicate::ContainsText(_)))
    }
}

impl fmt::Display for XPathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.test)?;
        for predicate in &self.predicates {
            write!(f, "[{}]", predicate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeTest {
    Any,
    Tag(String),
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTest::Any => f.write_str("*"),
            NodeTest::Tag(tag) => f.write_str(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// `@a='x'` or `@a='x' and @b='y'`.
    Attributes(Vec<AttributeTest>),
    /// `contains(text(),'x')`, tested against the first text child.
    ContainsText(String),
    /// `[k]`, 1-based.
    Position(usize),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Attributes(tests) => {
                for (i, test) in tests.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    write!(f, "@{}={}", test.name, quote(&test.value))?;
                }
                Ok(())
            }
            Predicate::ContainsText(text) => write!(f, "contains(text(),{})", quote(text)),
            Predicate::Position(k) => write!(f, "{}", k),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeTest {
    pub name: String,
    pub value: String,
}

impl AttributeTest {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Whether a value can be written as an XPath 1.0 string literal.
pub fn is_quotable(value: &str) -> bool {
    !(value.contains('\'') && value.contains('"'))
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}
