pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{parse_css_path, parse_xpath, ParseError, Rule, SelectorParser};

/// A parsed selector in either language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorExpr {
    Css(CssPath),
    XPath(XPath),
}

/// Parse a selector, picking the language from its first character:
/// location paths start with `/`, everything else is a structural path.
pub fn parse_selector(input: &str) -> Result<SelectorExpr, ParseError> {
    if input.trim_start().starts_with('/') {
        Ok(SelectorExpr::XPath(parse_xpath(input.trim())?))
    } else {
        Ok(SelectorExpr::Css(parse_css_path(input)?))
    }
}
