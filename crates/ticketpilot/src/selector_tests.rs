use super::*;

#[test]
fn test_css_prefix() {
    let selector = Selector::from("css:div.o_form_view input");
    match selector {
        Selector::Css(q) => assert_eq!(q, "div.o_form_view input"),
        _ => panic!("Expected Css selector"),
    }
}

#[test]
fn test_bare_css() {
    assert_eq!(
        Selector::from("#login"),
        Selector::Css("#login".to_string())
    );
    assert_eq!(
        Selector::from(".btn-primary"),
        Selector::Css(".btn-primary".to_string())
    );
    assert_eq!(
        Selector::from("input[name='password']"),
        Selector::Css("input[name='password']".to_string())
    );
    assert_eq!(Selector::from("button"), Selector::Css("button".to_string()));
}

#[test]
fn test_compound_tag_css() {
    assert_eq!(
        Selector::from("p.alert"),
        Selector::Css("p.alert".to_string())
    );
    assert_eq!(
        Selector::from("div#main"),
        Selector::Css("div#main".to_string())
    );
    assert_eq!(
        Selector::from("span.badge.text-bg-danger"),
        Selector::Css("span.badge.text-bg-danger".to_string())
    );
}

#[test]
fn test_text_selector() {
    let selector = Selector::from("text:Log note");
    match selector {
        Selector::Text { tag, text } => {
            assert_eq!(tag, None);
            assert_eq!(text, "Log note");
        }
        _ => panic!("Expected Text selector"),
    }
}

#[test]
fn test_tagged_text_selector() {
    let selector = Selector::from("button:text:Save");
    match selector {
        Selector::Text { tag, text } => {
            assert_eq!(tag.as_deref(), Some("button"));
            assert_eq!(text, "Save");
        }
        _ => panic!("Expected Text selector"),
    }
}

#[test]
fn test_xpath_selector() {
    let selector = Selector::from("//div[@name='description']");
    match selector {
        Selector::XPath(q) => assert_eq!(q, "//div[@name='description']"),
        _ => panic!("Expected XPath selector"),
    }

    let selector = Selector::from("xpath://a[contains(., 'Helpdesk')]");
    match selector {
        Selector::XPath(q) => assert_eq!(q, "//a[contains(., 'Helpdesk')]"),
        _ => panic!("Expected XPath selector"),
    }
}

#[test]
fn test_name_and_placeholder() {
    assert_eq!(
        Selector::from("name:partner_id"),
        Selector::Name("partner_id".to_string())
    );
    assert_eq!(
        Selector::from("placeholder:Subject..."),
        Selector::Placeholder("Subject...".to_string())
    );
}

#[test]
fn test_label_selector() {
    assert_eq!(
        Selector::from("label:Customer"),
        Selector::Label("Customer".to_string())
    );
}

#[test]
fn test_chain_selector() {
    let selector = Selector::from(".o_form_view >> name:name >> nth:0");
    match selector {
        Selector::Chain(parts) => {
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0], Selector::Css(".o_form_view".to_string()));
            assert_eq!(parts[1], Selector::Name("name".to_string()));
            assert_eq!(parts[2], Selector::Nth(0));
        }
        _ => panic!("Expected Chain selector, got: {selector:?}"),
    }
}

#[test]
fn test_visible_filter() {
    assert_eq!(Selector::from("visible:true"), Selector::Visible(true));
    assert_eq!(Selector::from("visible:false"), Selector::Visible(false));
}

#[test]
fn test_nth_selector() {
    assert_eq!(Selector::from("nth:2"), Selector::Nth(2));
    assert_eq!(Selector::from("nth=0"), Selector::Nth(0));
    match Selector::from("nth:abc") {
        Selector::Invalid(reason) => assert!(reason.contains("abc")),
        other => panic!("Expected Invalid selector, got: {other:?}"),
    }
}

#[test]
fn test_empty_selector_is_invalid() {
    match Selector::from("") {
        Selector::Invalid(_) => {}
        other => panic!("Expected Invalid selector, got: {other:?}"),
    }
}

#[test]
fn test_chain_validity_error_surfaces() {
    let selector = Selector::from("#form >> nth:oops");
    assert!(selector.validity_error().is_some());

    let selector = Selector::from("#form >> name:name");
    assert!(selector.validity_error().is_none());
}

#[test]
fn test_segments_flattening() {
    let chained = Selector::from("a >> b");
    assert_eq!(chained.segments().len(), 2);

    let single = Selector::from("#login");
    assert_eq!(single.segments(), vec![Selector::Css("#login".to_string())]);
}

#[test]
fn test_whitespace_trimmed() {
    let selector = Selector::from("  name:login  ");
    assert_eq!(selector, Selector::Name("login".to_string()));
}
