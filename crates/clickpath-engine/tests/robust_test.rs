use clickpath_common::error::SelectorError;
use clickpath_engine::dom::{Document, NodeId};
use clickpath_engine::selector::{RobulaOptions, RobulaPlus, evaluate_xpath, locate_str};
use clickpath_parser::parse_xpath;

const SHOP: &str = r#"<html>
  <head><title>Shop</title></head>
  <body>
    <div id="nav"><a href="/">Home</a><a href="/cart">Cart</a></div>
    <div class="content">
      <p>One</p><p>Two</p>
      <ul id="list"><li>A</li><li>B</li></ul>
      <form>
        <input name="q" type="text">
        <input name="page" type="hidden">
        <button type="submit" class="primary">Go</button>
        <button type="reset" class="primary">Go</button>
      </form>
    </div>
  </body>
</html>"#;

fn by_tag(doc: &Document, tag: &str) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|id| doc.tag_name(*id) == Some(tag))
        .collect()
}

#[test]
fn test_every_element_is_uniquely_located() {
    let doc = Document::parse_markup(SHOP).unwrap();
    let robula = RobulaPlus::default();

    for el in doc.elements() {
        let xpath = robula.generate(&doc, el).unwrap();
        let text = xpath.to_string();
        assert!(text.starts_with("//"), "{}", text);

        let reparsed = parse_xpath(&text).unwrap();
        assert_eq!(evaluate_xpath(&doc, &reparsed), vec![el], "{}", text);
    }
}

#[test]
fn test_unique_tag_wins_first() {
    let doc = Document::parse_markup(SHOP).unwrap();
    let form = by_tag(&doc, "form")[0];
    assert_eq!(RobulaPlus::default().generate(&doc, form).unwrap().to_string(), "//form");
}

#[test]
fn test_id_anchor_for_ambiguous_tag() {
    let doc = Document::parse_markup(
        r#"<html><body><ul id="list"><li>A</li></ul><ul><li>C</li></ul></body></html>"#,
    )
    .unwrap();
    let list = by_tag(&doc, "ul")[0];
    assert_eq!(
        RobulaPlus::default().generate(&doc, list).unwrap().to_string(),
        "//*[@id='list']"
    );
}

#[test]
fn test_text_anchor() {
    let doc = Document::parse_markup(
        r#"<html><body><ul id="list"><li>A</li><li>B</li></ul></body></html>"#,
    )
    .unwrap();
    let second = by_tag(&doc, "li")[1];
    assert_eq!(
        RobulaPlus::default().generate(&doc, second).unwrap().to_string(),
        "//*[contains(text(),'B')]"
    );
}

#[test]
fn test_attribute_anchor_prefers_priority_list() {
    let doc = Document::parse_markup(SHOP).unwrap();
    let hidden = by_tag(&doc, "input")[1];
    let xpath = RobulaPlus::default().generate(&doc, hidden).unwrap().to_string();
    assert_eq!(xpath, "//*[@name='page']");
}

#[test]
fn test_position_when_nothing_else_distinguishes() {
    let doc = Document::parse_markup("<html><body><p/><p/></body></html>").unwrap();
    let second = by_tag(&doc, "p")[1];
    let xpath = RobulaPlus::default().generate(&doc, second).unwrap().to_string();
    assert_eq!(xpath, "//*[2]");
    assert_eq!(locate_str(&doc, &xpath).unwrap(), vec![second]);
}

#[test]
fn test_detached_element_is_rejected() {
    let mut doc = Document::parse_markup(SHOP).unwrap();
    let orphan = doc.create_detached_element("div");
    assert_eq!(
        RobulaPlus::default().generate(&doc, orphan),
        Err(SelectorError::Detached)
    );

    let li = by_tag(&doc, "li")[0];
    doc.detach(li);
    assert_eq!(RobulaPlus::default().generate(&doc, li), Err(SelectorError::Detached));
}

#[test]
fn test_non_elements_are_rejected() {
    let doc = Document::parse_markup(SHOP).unwrap();
    let li = by_tag(&doc, "li")[0];
    let text = doc.children(li)[0];

    let robula = RobulaPlus::default();
    assert_eq!(robula.generate(&doc, text), Err(SelectorError::NotAnElement));
    assert_eq!(robula.generate(&doc, doc.root()), Err(SelectorError::NotAnElement));
}

#[test]
fn test_candidate_limit() {
    let doc = Document::parse_markup("<html><body><p/><p/></body></html>").unwrap();
    let second = by_tag(&doc, "p")[1];
    let robula = RobulaPlus::new(RobulaOptions {
        max_candidates: 1,
        ..RobulaOptions::default()
    });
    assert_eq!(
        robula.generate(&doc, second),
        Err(SelectorError::SearchExhausted { limit: 1 })
    );
}

#[test]
fn test_blacklisted_attributes_are_not_used() {
    let doc = Document::parse_markup(SHOP).unwrap();
    let robula = RobulaPlus::default();
    for a in by_tag(&doc, "a") {
        let xpath = robula.generate(&doc, a).unwrap().to_string();
        assert!(!xpath.contains("@href"), "{}", xpath);
    }
}

#[test]
fn test_blank_first_text_is_not_a_text_anchor() {
    // In a browser text() is the first text node, here "\n    ".
    let doc = Document::parse_markup(
        "<html><body><ul>\n  <li>\n    <b>x</b>Next</li>\n  <li>Other</li>\n</ul></body></html>",
    )
    .unwrap();
    let first = by_tag(&doc, "li")[0];
    let xpath = RobulaPlus::default().generate(&doc, first).unwrap().to_string();
    assert!(!xpath.contains("contains(text()"), "{}", xpath);
    assert_eq!(xpath, "//li[1]");
    assert!(evaluate_xpath(&doc, &parse_xpath("//*[contains(text(),'Next')]").unwrap()).is_empty());
}

#[test]
fn test_large_attribute_set_option_is_bounded() {
    let attrs: String = (0..64).map(|i| format!(" data-{i}=\"v{i}\"")).collect();
    let markup = format!("<html><body><p{attrs}/><p/></body></html>");
    let doc = Document::parse_markup(&markup).unwrap();
    let target = by_tag(&doc, "p")[0];

    let robula = RobulaPlus::new(RobulaOptions {
        max_attribute_set: 64,
        ..RobulaOptions::default()
    });
    assert_eq!(
        robula.generate(&doc, target).unwrap().to_string(),
        "//*[@data-0='v0']"
    );
}
