mod common;

use async_trait::async_trait;
use common::*;
use jobpilot_engine::backend::BackendError;
use jobpilot_engine::orchestrator::{
    Flow, FlowReport, OperatorPrompt, Orchestrator, OrchestratorError, OrchestratorState,
};
use jobpilot_engine::protocol::{ElementHandle, Selector};
use jobpilot_engine::session::{SessionState, UnknownSessionPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

struct CountingPrompt {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl OperatorPrompt for CountingPrompt {
    async fn await_manual_login(&mut self) -> std::io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn orchestrator(backend: FakeBackend, dir: &TempDir) -> Orchestrator<FakeBackend> {
    Orchestrator::new(backend, with_credentials(test_config(dir.path()))).unwrap()
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_fills_credentials_and_submits() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(console_backend(), &dir);
    orch.start().await.unwrap();

    assert!(orch.login().await.unwrap());

    let backend = orch.backend();
    assert_eq!(backend.navigations, vec![CONSOLE_URL.to_string()]);
    assert_eq!(
        backend.fills,
        vec![
            (ElementHandle(USERNAME), "robot@example.com".to_string()),
            (ElementHandle(PASSWORD), "hunter2".to_string()),
        ]
    );
    assert_eq!(backend.clicks, vec![ElementHandle(SUBMIT)]);
    assert_eq!(
        orch.state(),
        OrchestratorState::LoggedIn(SessionState::Authenticated)
    );
}

#[tokio::test]
async fn test_login_when_already_authenticated() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(FakeBackend::new(home_page()), &dir);
    orch.start().await.unwrap();

    assert!(orch.login().await.unwrap());
    // Idempotent: a second call is just as safe.
    assert!(orch.login().await.unwrap());
    assert!(orch.backend().fills.is_empty());
}

#[tokio::test]
async fn test_login_returns_false_when_still_unauthenticated() {
    let dir = TempDir::new().unwrap();
    // Submitting leaves the login form in place.
    let mut orch = orchestrator(FakeBackend::new(login_page()), &dir);
    orch.start().await.unwrap();

    let logged_in = orch.login().await.expect("a failed login is not an error");

    assert!(!logged_in);
    assert_eq!(
        orch.state(),
        OrchestratorState::LoggedIn(SessionState::Unauthenticated)
    );
    assert_eq!(orch.backend().closes, 0, "session stays open for manual login");
}

#[tokio::test]
async fn test_login_without_credentials() {
    let dir = TempDir::new().unwrap();
    let mut orch = Orchestrator::new(console_backend(), test_config(dir.path())).unwrap();
    orch.start().await.unwrap();

    assert!(!orch.login().await.unwrap());
    assert!(orch.backend().fills.is_empty());
}

#[tokio::test]
async fn test_login_presses_enter_without_button() {
    let dir = TempDir::new().unwrap();
    let form = FakePage::new()
        .show(Selector::css(r#"input[type="email"]"#), USERNAME)
        .show(Selector::css(r#"input[type="password"]"#), PASSWORD)
        .show(Selector::text("Login"), SIGN_IN_TEXT);
    let mut backend = FakeBackend::new(form);
    let home = backend.add_page(home_page());
    let mut orch = orchestrator(backend.on_enter(home), &dir);
    orch.start().await.unwrap();

    assert!(orch.login().await.unwrap());
    assert_eq!(orch.backend().keys, vec!["Enter".to_string()]);
}

#[tokio::test]
async fn test_login_missing_username_field() {
    let dir = TempDir::new().unwrap();
    let page = FakePage::new().show(Selector::text("Sign in"), SIGN_IN_TEXT);
    let mut orch = orchestrator(FakeBackend::new(page), &dir);
    orch.start().await.unwrap();

    assert!(!orch.login().await.unwrap());
    assert!(orch.backend().keys.is_empty());
}

#[tokio::test]
async fn test_unknown_session_follows_policy() {
    let dir = TempDir::new().unwrap();
    let blank = || FakeBackend::new(FakePage::new());

    let mut optimistic = orchestrator(blank(), &dir);
    optimistic.start().await.unwrap();
    assert!(optimistic.login().await.unwrap());

    let mut config = test_config(dir.path());
    config.session.on_unknown = UnknownSessionPolicy::AssumeUnauthenticated;
    let mut strict = Orchestrator::new(blank(), config).unwrap();
    strict.start().await.unwrap();
    assert!(!strict.login().await.unwrap());
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_navigation_falls_back_to_direct_url() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(FakePage::new().show(Selector::css("nav"), 1))
        .at_url("https://console.test/home");
    let mut orch = orchestrator(backend, &dir);
    orch.start().await.unwrap();

    orch.navigate_to_listing().await.unwrap();

    assert_eq!(
        orch.backend().navigations,
        vec!["https://console.test/jobs".to_string()]
    );
    assert_eq!(orch.state(), OrchestratorState::Ready);
}

#[tokio::test]
async fn test_navigation_recognizes_listing_url() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(FakePage::new()).at_url("https://console.test/org/processes");
    let mut orch = orchestrator(backend, &dir);
    orch.start().await.unwrap();

    orch.navigate_to_listing().await.unwrap();

    assert!(orch.backend().navigations.is_empty());
}

// ============================================================================
// Flows
// ============================================================================

#[tokio::test]
async fn test_list_jobs_returns_three_names() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(console_backend(), &dir);

    let report = orch.run(Flow::ListJobs).await.unwrap();

    assert!(report.login);
    let FlowReport::Jobs(jobs) = report.result else {
        panic!("expected a job list");
    };
    let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["Invoice Sync", "Report Gen", "Cleanup"]);
    assert_eq!(orch.backend().closes, 1);
}

#[tokio::test]
async fn test_run_jobs_reports_each_outcome_in_order() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(console_backend(), &dir);

    let report = orch
        .run(Flow::RunJobs(vec!["Invoice Sync".into(), "Ghost Job".into()]))
        .await
        .unwrap();

    let FlowReport::Outcomes(outcomes) = report.result else {
        panic!("expected outcomes");
    };
    assert_eq!(
        outcomes.to_pairs(),
        vec![
            ("Invoice Sync".to_string(), true),
            ("Ghost Job".to_string(), false),
        ]
    );
    assert_eq!(
        orch.backend()
            .clicks
            .iter()
            .filter(|c| **c == ElementHandle(PLAY_INVOICE))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_run_all_triggers_discovered_jobs() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(console_backend(), &dir);

    let report = orch.run(Flow::RunAll).await.unwrap();

    let FlowReport::Outcomes(outcomes) = report.result else {
        panic!("expected outcomes");
    };
    assert_eq!(
        outcomes.to_pairs(),
        vec![
            ("Invoice Sync".to_string(), true),
            ("Report Gen".to_string(), false),
            ("Cleanup".to_string(), false),
        ]
    );
    assert_eq!(orch.state(), OrchestratorState::Closed);
}

#[tokio::test]
async fn test_discovery_failure_writes_debug_screenshot() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(FakeBackend::new(home_page()), &dir);

    let report = orch.run(Flow::ListJobs).await.unwrap();

    assert_eq!(report.result, FlowReport::Jobs(Vec::new()));
    assert!(dir.path().join("jobs_page_debug.png").exists());
    assert_eq!(orch.backend().screenshots, 1);
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_close_runs_once_after_fatal_error() {
    let dir = TempDir::new().unwrap();
    let backend = console_backend().fatal(BackendError::ConnectionLost("browser crashed".into()));
    let mut orch = orchestrator(backend, &dir);

    let result = orch.run(Flow::ListJobs).await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Backend(BackendError::ConnectionLost(_)))
    ));
    assert_eq!(orch.backend().closes, 1);
    assert!(dir.path().join("error_screenshot.png").exists());
}

#[tokio::test]
async fn test_close_runs_once_when_launch_fails() {
    let dir = TempDir::new().unwrap();
    let backend = console_backend().launch_error(BackendError::Other("no chrome".into()));
    let mut orch = orchestrator(backend, &dir);

    let result = orch.run(Flow::ListJobs).await;

    assert!(result.is_err());
    assert_eq!(orch.backend().closes, 1);
    assert_eq!(orch.backend().screenshots, 0);
}

#[tokio::test]
async fn test_interrupt_tears_down_once() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(console_backend().hang_on_navigate(), &dir);

    let result = orch
        .run_until(Flow::RunAll, tokio::time::sleep(Duration::from_millis(20)))
        .await;

    assert!(matches!(result, Err(OrchestratorError::Interrupted)));
    assert_eq!(orch.backend().closes, 1);
    assert_eq!(orch.state(), OrchestratorState::Closed);
}

#[tokio::test]
async fn test_close_is_idempotent_and_final() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(console_backend(), &dir);
    orch.run(Flow::ListJobs).await.unwrap();

    orch.close().await;
    orch.close().await;

    assert_eq!(orch.backend().closes, 1);
    assert!(matches!(
        orch.list_jobs().await,
        Err(OrchestratorError::Closed)
    ));
}

// ============================================================================
// Manual login
// ============================================================================

#[tokio::test]
async fn test_prompt_consulted_when_visible_login_fails() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = with_credentials(test_config(dir.path()));
    config.browser.headless = false;
    let mut orch = Orchestrator::new(FakeBackend::new(login_page()), config)
        .unwrap()
        .with_prompt(Box::new(CountingPrompt {
            calls: calls.clone(),
        }));

    let report = orch.run(Flow::ListJobs).await.unwrap();

    assert!(!report.login);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prompt_skipped_when_login_succeeds_or_headless() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut visible = with_credentials(test_config(dir.path()));
    visible.browser.headless = false;
    let mut ok = Orchestrator::new(console_backend(), visible)
        .unwrap()
        .with_prompt(Box::new(CountingPrompt {
            calls: calls.clone(),
        }));
    ok.run(Flow::ListJobs).await.unwrap();

    let mut headless = Orchestrator::new(
        FakeBackend::new(login_page()),
        with_credentials(test_config(dir.path())),
    )
    .unwrap()
    .with_prompt(Box::new(CountingPrompt {
        calls: calls.clone(),
    }));
    headless.run(Flow::ListJobs).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
