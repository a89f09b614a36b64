mod common;

use common::{FakeBackend, FakePage, PLAY_INVOICE, listing_page};
use jobpilot_engine::backend::BackendError;
use jobpilot_engine::jobs::{JobDiscovery, JobRecord, JobTrigger, TriggerOutcome};
use jobpilot_engine::protocol::{ElementHandle, Scope, Selector};
use jobpilot_engine::resolution::ElementResolver;
use jobpilot_engine::strategy::StrategyTable;
use std::sync::Arc;
use std::time::Duration;

fn resolver() -> ElementResolver {
    ElementResolver::new(Arc::new(StrategyTable::builtin()), Duration::ZERO)
}

fn discovery() -> JobDiscovery {
    JobDiscovery::new(resolver(), Duration::ZERO)
}

fn trigger() -> JobTrigger {
    JobTrigger::new(resolver(), Duration::ZERO, Duration::ZERO)
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_discovers_rows_in_document_order() {
    let mut backend = FakeBackend::new(listing_page());

    let report = discovery()
        .discover(&mut backend, Scope::Page, 50)
        .await
        .unwrap();

    assert_eq!(report.names(), vec!["Invoice Sync", "Report Gen", "Cleanup"]);
    assert_eq!(
        report.records[1],
        JobRecord {
            name: "Report Gen".into(),
            index: 1
        }
    );
    // `tbody tr` is the seventh row-group strategy.
    assert_eq!(report.strategy, Some(6));
    assert!(!report.is_structural_miss());
}

#[tokio::test]
async fn test_discovery_never_exceeds_max_count() {
    let mut page = FakePage::new().rows(
        Selector::css(".job-row"),
        &(100..110).collect::<Vec<u32>>(),
    );
    for id in 100..110 {
        page = page
            .show_in(id, Selector::css("td:first-child"), id + 100)
            .text(id + 100, &format!("Job {}", id));
    }
    let mut backend = FakeBackend::new(page);

    let report = discovery()
        .discover(&mut backend, Scope::Page, 4)
        .await
        .unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.names(), vec!["Job 100", "Job 101", "Job 102", "Job 103"]);
}

#[tokio::test]
async fn test_max_count_zero_returns_nothing() {
    let mut backend = FakeBackend::new(listing_page());

    let report = discovery()
        .discover(&mut backend, Scope::Page, 0)
        .await
        .unwrap();

    assert!(report.records.is_empty());
}

#[tokio::test]
async fn test_rows_without_a_name_are_skipped() {
    let page = FakePage::new()
        .rows(Selector::css("tbody tr"), &[1, 2, 3])
        .show_in(1, Selector::css("td:first-child"), 11)
        .text(11, "Alpha")
        // Row 2 has a name cell with blank text.
        .show_in(2, Selector::css("td:first-child"), 12)
        .text(12, "   ")
        // Row 3 only has a title cell.
        .show_in(3, Selector::css(r#"[class*="title"]"#), 13)
        .text(13, "Gamma");
    let mut backend = FakeBackend::new(page);

    let report = discovery()
        .discover(&mut backend, Scope::Page, 50)
        .await
        .unwrap();

    assert_eq!(report.names(), vec!["Alpha", "Gamma"]);
    assert_eq!(report.records[1].index, 2);
}

#[tokio::test]
async fn test_first_productive_strategy_wins_without_merging() {
    let page = FakePage::new()
        .rows(Selector::css(r#"tr[data-testid*="job"]"#), &[1])
        .show_in(1, Selector::css("td:first-child"), 11)
        .text(11, "From testid")
        .rows(Selector::css("tbody tr"), &[2])
        .show_in(2, Selector::css("td:first-child"), 12)
        .text(12, "From tbody");
    let mut backend = FakeBackend::new(page);

    let report = discovery()
        .discover(&mut backend, Scope::Page, 50)
        .await
        .unwrap();

    assert_eq!(report.names(), vec!["From testid"]);
    assert_eq!(report.strategy, Some(0));
}

#[tokio::test]
async fn test_unnamed_rows_fall_through_to_next_strategy() {
    let page = FakePage::new()
        .rows(Selector::css(r#"tr[data-testid*="job"]"#), &[1])
        .rows(Selector::css(".process-row"), &[2])
        .show_in(2, Selector::css(r#"[class*="name"]"#), 12)
        .text(12, "Payroll");
    let mut backend = FakeBackend::new(page);

    let report = discovery()
        .discover(&mut backend, Scope::Page, 50)
        .await
        .unwrap();

    assert_eq!(report.names(), vec!["Payroll"]);
    assert_eq!(report.rows_matched, 2);
}

#[tokio::test]
async fn test_structural_miss_is_reported() {
    let mut backend = FakeBackend::new(FakePage::new().show(Selector::css("nav"), 1));

    let report = discovery()
        .discover(&mut backend, Scope::Page, 50)
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert!(report.is_structural_miss());
    assert_eq!(report.rows_matched, 0);
}

// ============================================================================
// Trigger
// ============================================================================

#[tokio::test]
async fn test_trigger_clicks_control_inside_row() {
    let mut backend = FakeBackend::new(listing_page());

    let outcome = trigger()
        .trigger(&mut backend, Scope::Page, "Invoice Sync")
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::RowScoped);
    assert!(outcome.succeeded());
    assert_eq!(backend.clicks, vec![ElementHandle(PLAY_INVOICE)]);
}

#[tokio::test]
async fn test_trigger_nonexistent_job_returns_not_triggered() {
    let mut backend = FakeBackend::new(listing_page());

    let outcome = trigger()
        .trigger(&mut backend, Scope::Page, "Ghost Job")
        .await
        .expect("a missing job is not an error");

    assert_eq!(outcome, TriggerOutcome::NotTriggered);
    assert!(!outcome.succeeded());
    assert!(backend.clicks.is_empty());
}

#[tokio::test]
async fn test_global_fallback_when_control_is_a_sibling() {
    // Row exists but holds no control; the play button follows the name button.
    let sibling = Selector::next_sibling(
        Selector::css_with_text("button", "Report Gen"),
        r#"button[aria-label*="play" i]"#,
    );
    let page = listing_page().show(sibling, 77);
    let mut backend = FakeBackend::new(page);

    let outcome = trigger()
        .trigger(&mut backend, Scope::Page, "Report Gen")
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::GlobalFallback);
    assert_eq!(backend.clicks, vec![ElementHandle(77)]);
}

#[tokio::test]
async fn test_failed_click_moves_to_fallback_pass() {
    let near = Selector::near(r#"button[title*="play" i]"#, "Invoice Sync");
    let page = listing_page().show(near, 88);
    let mut backend = FakeBackend::new(page).click_error(
        PLAY_INVOICE,
        BackendError::ScriptError("element is covered".into()),
    );

    let outcome = trigger()
        .trigger(&mut backend, Scope::Page, "Invoice Sync")
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::GlobalFallback);
    assert_eq!(backend.clicks, vec![ElementHandle(88)]);
}

#[tokio::test]
async fn test_passes_are_independently_callable() {
    let mut backend = FakeBackend::new(listing_page());
    let trigger = trigger();

    let global = trigger
        .global_pass(&mut backend, Scope::Page, "Invoice Sync")
        .await
        .unwrap();
    let row = trigger
        .row_scoped_pass(&mut backend, Scope::Page, "Invoice Sync")
        .await
        .unwrap();

    assert!(!global);
    assert!(row);
}

#[tokio::test]
async fn test_trigger_propagates_lost_connection() {
    let mut backend =
        FakeBackend::new(listing_page()).fatal(BackendError::ConnectionLost("closed".into()));

    let result = trigger()
        .trigger(&mut backend, Scope::Page, "Invoice Sync")
        .await;

    assert!(matches!(result, Err(BackendError::ConnectionLost(_))));
}
