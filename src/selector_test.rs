// Unit tests for selector module

use super::*;

#[test]
fn test_selector_display() {
    assert_eq!(Selector::css("#login .button").to_string(), "#login .button");
    assert_eq!(
        Selector::xpath("//div[@id='x']").to_string(),
        "xpath: //div[@id='x']"
    );
}

#[test]
fn test_selector_from_str_is_css() {
    let selector: Selector = "ul#list li".into();
    assert_eq!(selector, Selector::Css("ul#list li".to_string()));
}

#[test]
fn test_engine_registry_lifecycle() {
    let id = "test-session-registry";
    assert!(!engine_installed(id));

    mark_engine_installed(id);
    assert!(engine_installed(id));

    // Other sessions are unaffected
    assert!(!engine_installed("some-other-session"));

    forget_session(id);
    assert!(!engine_installed(id));
}
