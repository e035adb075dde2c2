// Tests for collection waits through the public session API

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};

use webwait::collection::{empty, exact_texts, size, size_greater_than, size_less_than, texts};
use webwait::condition::{css_class, text};

mod common;
use common::{expect_err, session_with, FakeDriver, FakeElement};

fn cart_with(items: &[&str]) -> FakeDriver {
    let mut driver = FakeDriver::new();
    for item in items {
        driver = driver.with_element(FakeElement::new("#cart li").tag("li").text(item));
    }
    driver
}

#[tokio::test]
async fn test_expected_size_passes_on_the_first_attempt() -> Result<()> {
    common::init_tracing();
    let driver = Arc::new(cart_with(&["Apples", "Pears", "Plums"]));
    let session = session_with(
        driver.clone(),
        Duration::from_secs(4),
        Duration::from_millis(100),
    );

    session.find_all("#cart li").should_have(size(3)).await?;

    assert_eq!(driver.find_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_collection_growing_to_expected_size_is_awaited() -> Result<()> {
    let driver = Arc::new(
        cart_with(&["Apples"])
            .with_element(
                FakeElement::new("#cart li")
                    .tag("li")
                    .text("Pears")
                    .appears_after(Duration::from_millis(400)),
            )
            .with_element(
                FakeElement::new("#cart li")
                    .tag("li")
                    .text("Plums")
                    .appears_after(Duration::from_millis(400)),
            ),
    );
    let session = session_with(
        driver,
        Duration::from_secs(2),
        Duration::from_millis(50),
    );
    let started = Instant::now();

    session.find_all("#cart li").should_have(size(3)).await?;

    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(started.elapsed() < Duration::from_millis(1_500));
    Ok(())
}

#[tokio::test]
async fn test_size_mismatch_reports_actual_and_elements() {
    let driver = Arc::new(cart_with(&["Apples", "Pears"]));
    let session = session_with(
        driver,
        Duration::from_millis(250),
        Duration::from_millis(100),
    );

    let err = expect_err(
        session
            .find_all("#cart li")
            .should_have(size_less_than(2))
            .await,
    );

    assert_eq!(
        err.to_string(),
        "List size mismatch: expected: < 2, actual: 2, collection: #cart li\nElements: [<li>Apples</li>, <li>Pears</li>]\nTimeout: 250 ms."
    );
}

#[tokio::test]
async fn test_empty_collection_renders_an_empty_elements_list() {
    let driver = Arc::new(FakeDriver::new());
    let session = session_with(
        driver,
        Duration::from_secs(1),
        Duration::from_millis(200),
    );

    let err = expect_err(session.find_all("#cart li").should_have(size(3)).await);

    assert_eq!(
        err.to_string(),
        "List size mismatch: expected: = 3, actual: 0, collection: #cart li\nElements: []\nTimeout: 1 s."
    );
}

#[tokio::test]
async fn test_should_be_empty() -> Result<()> {
    let driver = Arc::new(FakeDriver::new());
    let session = session_with(
        driver.clone(),
        Duration::from_secs(4),
        Duration::from_millis(100),
    );

    session.find_all("#errors li").should_be(empty()).await?;
    assert_eq!(driver.find_calls(), 1);

    let full = Arc::new(cart_with(&["Apples"]));
    let session = session_with(
        full,
        Duration::from_millis(250),
        Duration::from_millis(100),
    );
    let err = expect_err(session.find_all("#cart li").should_be(empty()).await);
    assert_eq!(
        err.to_string(),
        "List size mismatch: expected: = 0, actual: 1, collection: #cart li\nElements: [<li>Apples</li>]\nTimeout: 250 ms."
    );
    Ok(())
}

#[tokio::test]
async fn test_texts_match_partial_and_case_insensitive() -> Result<()> {
    let driver = Arc::new(cart_with(&["Hello  World", "Goodbye Moon"]));
    let session = session_with(
        driver,
        Duration::from_secs(4),
        Duration::from_millis(100),
    );

    session
        .find_all("#cart li")
        .should_have(texts(["hello", "bye moon"]))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_texts_mismatch_lists_both_sides() {
    let driver = Arc::new(cart_with(&["Apples", "Pears"]));
    let session = session_with(
        driver,
        Duration::from_millis(250),
        Duration::from_millis(100),
    );

    let err = expect_err(
        session
            .find_all("#cart li")
            .should_have(texts(["Apples", "Cherries"]))
            .await,
    );

    assert_eq!(
        err.to_string(),
        "Texts mismatch\nActual: [Apples, Pears]\nExpected: [Apples, Cherries]\nCollection: #cart li\nTimeout: 250 ms."
    );
}

#[tokio::test]
async fn test_exact_texts_fold_whitespace_but_need_every_item() -> Result<()> {
    let driver = Arc::new(cart_with(&["  Alpha ", "beta"]));
    let session = session_with(
        driver,
        Duration::from_millis(250),
        Duration::from_millis(100),
    );
    let items = session.find_all("#cart li");

    items.should_have(exact_texts(["alpha", "BETA"])).await?;

    let err = expect_err(items.should_have(exact_texts(["alpha"])).await);
    assert_eq!(
        err.to_string(),
        "Texts mismatch\nActual: [  Alpha , beta]\nExpected: [alpha]\nCollection: #cart li\nTimeout: 250 ms."
    );
    Ok(())
}

#[tokio::test]
async fn test_derived_handles_index_into_the_live_collection() -> Result<()> {
    let driver = Arc::new(cart_with(&["Apples", "Pears", "Plums"]));
    let session = session_with(
        driver,
        Duration::from_millis(250),
        Duration::from_millis(100),
    );
    let items = session.find_all("#cart li");

    assert_eq!(items.get(1).describe(), "#cart li[1]");
    items.first().should_have(text("Apples")).await?;
    items.get(1).should_have(text("Pears")).await?;
    items.last().should_have(text("Plums")).await?;

    // Out of range stays retryable and times out as not-found
    let err = expect_err(items.get(5).should_have(text("Figs")).await);
    assert_eq!(
        err.to_string(),
        "Element not found {#cart li[5]}\nExpected: text \"Figs\"\nTimeout: 250 ms.\nCaused by: no such element: index 5 out of range, collection has 3 element(s)"
    );
    Ok(())
}

#[tokio::test]
async fn test_filter_by_keeps_only_matching_elements() -> Result<()> {
    let driver = Arc::new(
        FakeDriver::new()
            .with_element(FakeElement::new("#todo li").tag("li").text("Write tests"))
            .with_element(
                FakeElement::new("#todo li")
                    .tag("li")
                    .text("Ship release")
                    .attr("class", "done"),
            )
            .with_element(FakeElement::new("#todo li").tag("li").text("Update docs")),
    );
    let session = session_with(
        driver,
        Duration::from_secs(4),
        Duration::from_millis(100),
    );
    let done = session.find_all("#todo li").filter_by(css_class("done"));

    done.should_have(size(1)).await?;
    done.first().should_have(text("Ship release")).await?;
    Ok(())
}

#[tokio::test]
async fn test_unwaiting_reads_reflect_the_current_page() -> Result<()> {
    let driver = Arc::new(cart_with(&["Apples", "Pears"]));
    let session = session_with(
        driver,
        Duration::from_secs(30),
        Duration::from_millis(100),
    );
    let started = Instant::now();

    assert_eq!(session.find_all("#cart li").size().await?, 2);
    assert_eq!(
        session.find_all("#cart li").texts().await?,
        vec!["Apples".to_string(), "Pears".to_string()]
    );
    assert_eq!(session.find_all("#wishlist li").size().await?, 0);
    assert!(session.find_all("#wishlist li").texts().await?.is_empty());

    // A missing parent reads as an empty collection, not an error
    let orphaned = session.find("#missing-box").find_all("li");
    assert_eq!(orphaned.size().await?, 0);

    assert!(started.elapsed() < Duration::from_millis(500));
    Ok(())
}

#[tokio::test]
async fn test_alias_replaces_the_selector_in_failures() {
    let driver = Arc::new(FakeDriver::new());
    let session = session_with(
        driver,
        Duration::from_millis(250),
        Duration::from_millis(100),
    );

    let err = expect_err(
        session
            .find_all("#cart li")
            .as_("cart rows")
            .should_have(size(3))
            .await,
    );

    assert_eq!(
        err.to_string(),
        "List size mismatch: expected: = 3, actual: 0, collection: cart rows\nElements: []\nTimeout: 250 ms."
    );
}

#[tokio::test]
async fn test_per_call_timeout_overrides_the_session_default() {
    let driver = Arc::new(FakeDriver::new());
    let session = session_with(
        driver,
        Duration::from_secs(30),
        Duration::from_millis(100),
    );
    let started = Instant::now();

    let err = expect_err(
        session
            .find_all("#cart li")
            .should_have_within(size_greater_than(0), Duration::from_millis(300))
            .await,
    );

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(
        err.to_string(),
        "List size mismatch: expected: > 0, actual: 0, collection: #cart li\nElements: []\nTimeout: 300 ms."
    );
}

#[tokio::test]
async fn test_invalid_selector_is_fatal_for_collections() {
    let driver = Arc::new(FakeDriver::new());
    let session = session_with(
        driver.clone(),
        Duration::from_secs(4),
        Duration::from_millis(100),
    );

    let err = expect_err(session.find_all("###cart").should_have(size(1)).await);

    assert_eq!(
        err.to_string(),
        "Invalid selector {###cart}\nCaused by: invalid selector: ###cart is not a valid selector"
    );
    assert_eq!(driver.find_calls(), 1);
}
