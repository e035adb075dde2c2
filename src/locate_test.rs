// Unit tests for locator descriptions

use super::*;
use crate::condition::text;
use pretty_assertions::assert_eq;

#[test]
fn test_describe_simple_find() {
    let locator = Locator::find(Selector::css("#login"));
    assert_eq!(locator.describe(), "#login");
}

#[test]
fn test_describe_collection_with_index() {
    let locator = Locator::find_all(Selector::css("#list li")).nth(3);
    assert_eq!(locator.describe(), "#list li[3]");
}

#[test]
fn test_describe_filter_then_index() {
    let locator = Locator::find_all(Selector::css("#list li"))
        .filtered(text("milk"))
        .nth(0);
    assert_eq!(locator.describe(), "#list li.filter(text \"milk\")[0]");
}

#[test]
fn test_describe_nested_find() {
    let locator = Locator::find(Selector::css("#form")).child(Selector::css("input.name"));
    assert_eq!(locator.describe(), "#form/input.name");
}

#[test]
fn test_describe_last_and_xpath() {
    let locator = Locator::find_all(Selector::xpath("//li")).last();
    assert_eq!(locator.describe(), "xpath: //li:last");
}

#[test]
fn test_describe_active_element() {
    assert_eq!(Locator::active().describe(), "active element");
}

#[test]
fn test_describe_does_not_require_resolution() {
    // A locator over a selector that could never match still describes itself
    let locator = Locator::find(Selector::css("#does-not-exist")).child(Selector::css(".x"));
    assert_eq!(locator.describe(), "#does-not-exist/.x");
}
