use super::ast::*;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "selector.pest"]
pub struct SelectorParser;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Pest error: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),
    #[error("Unknown rule: {0:?}")]
    UnknownRule(Rule),
    #[error("Invalid index: {0}")]
    InvalidIndex(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        ParseError::Pest(Box::new(e))
    }
}

/// Parse a structural path such as `html > body > ul#list > li:nth-child(2)`.
pub fn parse_css_path(input: &str) -> Result<CssPath, ParseError> {
    let mut pairs = SelectorParser::parse(Rule::css_path, input)?;
    let mut path = CssPath::default();

    if let Some(root) = pairs.next() {
        for inner in root.into_inner() {
            match inner.as_rule() {
                Rule::compound => path.segments.push(parse_compound(inner)?),
                Rule::EOI => {}
                other => return Err(ParseError::UnknownRule(other)),
            }
        }
    }

    Ok(path)
}

fn parse_compound(pair: Pair<Rule>) -> Result<CssCompound, ParseError> {
    let mut compound = CssCompound::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::tag_name => compound.tag = Some(inner.as_str().to_string()),
            Rule::id_part => {
                let text = inner.as_str();
                compound.id = Some(unescape_ident(text.strip_prefix('#').unwrap_or(text)));
            }
            Rule::nth_child => {
                let index = inner
                    .into_inner()
                    .next()
                    .ok_or(ParseError::UnknownRule(Rule::nth_child))?;
                compound.nth_child = Some(parse_index(index.as_str())?);
            }
            other => return Err(ParseError::UnknownRule(other)),
        }
    }
    Ok(compound)
}

/// Undo CSS escapes: `\3a ` (hex code point, optional trailing space) and
/// `\:` (the character itself).
fn unescape_ident(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
            continue;
        }
        if chars.peek() == Some(&' ') {
            chars.next();
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .filter(|c| *c != '\0')
            .unwrap_or('\u{FFFD}');
        out.push(decoded);
    }
    out
}

/// Parse a robust path such as `//ul[@id='list']/li[2]`.
pub fn parse_xpath(input: &str) -> Result<XPath, ParseError> {
    let mut pairs = SelectorParser::parse(Rule::xpath, input)?;
    let mut steps = Vec::new();

    if let Some(root) = pairs.next() {
        for inner in root.into_inner() {
            match inner.as_rule() {
                Rule::step => steps.push(parse_step(inner)?),
                Rule::EOI => {}
                other => return Err(ParseError::UnknownRule(other)),
            }
        }
    }

    Ok(XPath { steps })
}

fn parse_step(pair: Pair<Rule>) -> Result<XPathStep, ParseError> {
    let mut inner = pair.into_inner();
    let test_pair = inner
        .next()
        .ok_or(ParseError::UnknownRule(Rule::step))?;
    let test = parse_node_test(test_pair)?;

    let mut step = XPathStep::new(test);
    for predicate in inner {
        step.predicates.push(parse_predicate(predicate)?);
    }
    Ok(step)
}

fn parse_node_test(pair: Pair<Rule>) -> Result<NodeTest, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or(ParseError::UnknownRule(Rule::node_test))?;
    match inner.as_rule() {
        Rule::star => Ok(NodeTest::Any),
        Rule::tag_name => Ok(NodeTest::Tag(inner.as_str().to_string())),
        other => Err(ParseError::UnknownRule(other)),
    }
}

fn parse_predicate(pair: Pair<Rule>) -> Result<Predicate, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or(ParseError::UnknownRule(Rule::predicate))?;
    match inner.as_rule() {
        Rule::position => Ok(Predicate::Position(parse_index(inner.as_str())?)),
        Rule::contains_text => {
            let literal = inner
                .into_inner()
                .next()
                .ok_or(ParseError::UnknownRule(Rule::contains_text))?;
            Ok(Predicate::ContainsText(parse_literal(literal)))
        }
        Rule::attr_conj => {
            let mut tests = Vec::new();
            for attr in inner.into_inner() {
                let mut parts = attr.into_inner();
                let name = parts
                    .next()
                    .ok_or(ParseError::UnknownRule(Rule::attr_eq))?;
                let value = parts
                    .next()
                    .ok_or(ParseError::UnknownRule(Rule::attr_eq))?;
                tests.push(AttributeTest::new(name.as_str(), parse_literal(value)));
            }
            Ok(Predicate::Attributes(tests))
        }
        other => Err(ParseError::UnknownRule(other)),
    }
}

fn parse_literal(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|quoted| quoted.as_str().to_string())
        .unwrap_or_default()
}

fn parse_index(text: &str) -> Result<usize, ParseError> {
    match text.parse::<usize>() {
        Ok(0) | Err(_) => Err(ParseError::InvalidIndex(text.to_string())),
        Ok(k) => Ok(k),
    }
}
