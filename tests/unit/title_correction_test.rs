//! Unit tests for the title-correction coordinator, on paused tokio time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use tabsig::database::{MemoryStore, StorageAdapter};
use tabsig::managers::tab_repository::TabRepository;
use tabsig::services::title_correction::{
    CorrectionDecision, CorrectionOutcome, TabHost, TitleCorrectionConfig,
    TitleCorrectionCoordinator,
};
use tabsig::types::errors::HostError;
use tabsig::types::tab::{TabId, TabRecord, TabSignature};

#[derive(Default)]
struct MockHost {
    titles: Mutex<HashMap<TabId, String>>,
    forced: Mutex<Vec<(TabId, String)>>,
    disconnected: bool,
}

impl MockHost {
    fn show(&self, tab_id: TabId, title: &str) {
        self.titles.lock().unwrap().insert(tab_id, title.to_string());
    }

    fn forced(&self) -> Vec<(TabId, String)> {
        self.forced.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabHost for MockHost {
    async fn tab_title(&self, tab_id: TabId) -> Result<Option<String>, HostError> {
        if self.disconnected {
            return Err(HostError::Disconnected);
        }
        Ok(self.titles.lock().unwrap().get(&tab_id).cloned())
    }

    async fn force_title(&self, tab_id: TabId, title: &str) -> Result<(), HostError> {
        self.forced.lock().unwrap().push((tab_id, title.to_string()));
        self.show(tab_id, title);
        Ok(())
    }
}

async fn setup(host: Arc<MockHost>) -> (TitleCorrectionCoordinator, Arc<TabRepository>) {
    let repo = Arc::new(TabRepository::new(StorageAdapter::new(Arc::new(
        MemoryStore::new(),
    ))));
    repo.save(&TabRecord::new(
        1,
        "https://a.com",
        0,
        TabSignature::new(Some("Custom"), None),
    ))
    .await
    .unwrap();
    repo.save(&TabRecord::new(2, "https://b.com", 1, TabSignature::default()))
        .await
        .unwrap();
    let coordinator = TitleCorrectionCoordinator::new(
        Arc::clone(&repo),
        host,
        TitleCorrectionConfig::default(),
    );
    (coordinator, repo)
}

async fn outcome(decision: CorrectionDecision) -> CorrectionOutcome {
    match decision {
        CorrectionDecision::Scheduled(handle) => handle.await.unwrap(),
        other => panic!("expected a scheduled correction, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_untracked_tabs_are_left_alone() {
    let host = Arc::new(MockHost::default());
    let (coordinator, _repo) = setup(host.clone()).await;

    assert!(matches!(
        coordinator.handle_title_change(99, "Anything").await.unwrap(),
        CorrectionDecision::NotTracked
    ));
    // Record exists but carries no custom title.
    assert!(matches!(
        coordinator.handle_title_change(2, "Anything").await.unwrap(),
        CorrectionDecision::NotTracked
    ));
    assert_eq!(coordinator.tracked_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_matching_or_empty_title_is_ignored() {
    let host = Arc::new(MockHost::default());
    let (coordinator, _repo) = setup(host.clone()).await;

    assert!(matches!(
        coordinator.handle_title_change(1, "Custom").await.unwrap(),
        CorrectionDecision::Ignored
    ));
    assert!(matches!(
        coordinator.handle_title_change(1, "").await.unwrap(),
        CorrectionDecision::Ignored
    ));
    assert!(host.forced().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_drifted_title_is_forced_after_delay() {
    let host = Arc::new(MockHost::default());
    host.show(1, "Page title");
    let (coordinator, _repo) = setup(host.clone()).await;

    let start = Instant::now();
    let decision = coordinator.handle_title_change(1, "Page title").await.unwrap();
    assert_eq!(outcome(decision).await, CorrectionOutcome::Forced);
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(host.forced(), vec![(1, "Custom".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_recheck_skips_when_title_already_restored() {
    let host = Arc::new(MockHost::default());
    host.show(1, "Page title");
    let (coordinator, _repo) = setup(host.clone()).await;

    let decision = coordinator.handle_title_change(1, "Page title").await.unwrap();
    // Something else restores the title before the delay elapses.
    host.show(1, "Custom");
    assert_eq!(outcome(decision).await, CorrectionOutcome::AlreadyCorrect);
    assert!(host.forced().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_closed_tab_is_not_forced() {
    let host = Arc::new(MockHost::default());
    let (coordinator, _repo) = setup(host.clone()).await;

    // The host has no live title for tab 1: it closed before the re-check.
    let decision = coordinator.handle_title_change(1, "Page").await.unwrap();
    assert_eq!(outcome(decision).await, CorrectionOutcome::TabGone);
    assert!(host.forced().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_within_threshold_window() {
    let host = Arc::new(MockHost::default());
    let (coordinator, _repo) = setup(host.clone()).await;

    let mut handles = Vec::new();
    for expected_retries in 0..=4 {
        match coordinator.handle_title_change(1, "Fight").await.unwrap() {
            CorrectionDecision::Scheduled(handle) => handles.push(handle),
            other => panic!("expected scheduled, got {:?}", other),
        }
        assert_eq!(coordinator.state_of(1).unwrap().retries_used, expected_retries);
    }
    assert!(matches!(
        coordinator.handle_title_change(1, "Fight").await.unwrap(),
        CorrectionDecision::RateLimited
    ));
    assert_eq!(coordinator.state_of(1).unwrap().retries_used, 4);

    for handle in handles {
        handle.await.unwrap();
    }

    // Once the window has passed the budget resets.
    tokio::time::advance(Duration::from_millis(1001)).await;
    let decision = coordinator.handle_title_change(1, "Fight").await.unwrap();
    assert!(matches!(decision, CorrectionDecision::Scheduled(_)));
    let state = coordinator.state_of(1).unwrap();
    assert_eq!(state.retries_used, 0);
    assert_eq!(state.last_correction, Instant::now());
}

#[tokio::test(start_paused = true)]
async fn test_retry_keeps_original_window_start() {
    let host = Arc::new(MockHost::default());
    let (coordinator, _repo) = setup(host.clone()).await;

    coordinator.handle_title_change(1, "Fight").await.unwrap();
    let first = coordinator.state_of(1).unwrap().last_correction;
    tokio::time::advance(Duration::from_millis(500)).await;
    coordinator.handle_title_change(1, "Fight").await.unwrap();
    assert_eq!(coordinator.state_of(1).unwrap().last_correction, first);
}

#[tokio::test(start_paused = true)]
async fn test_host_failure_is_reported_in_outcome() {
    let host = Arc::new(MockHost {
        disconnected: true,
        ..Default::default()
    });
    let (coordinator, _repo) = setup(host.clone()).await;

    let decision = coordinator.handle_title_change(1, "Other").await.unwrap();
    assert!(matches!(outcome(decision).await, CorrectionOutcome::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_drops_stale_entries() {
    let host = Arc::new(MockHost::default());
    let (coordinator, _repo) = setup(host.clone()).await;

    coordinator.handle_title_change(1, "Other").await.unwrap();
    assert_eq!(coordinator.tracked_count(), 1);

    assert_eq!(coordinator.cleanup_stale_entries(Instant::now()), 0);
    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(coordinator.cleanup_stale_entries(Instant::now()), 1);
    assert_eq!(coordinator.tracked_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_forget_removes_state() {
    let host = Arc::new(MockHost::default());
    let (coordinator, _repo) = setup(host.clone()).await;

    coordinator.handle_title_change(1, "Other").await.unwrap();
    coordinator.forget(1);
    assert!(coordinator.state_of(1).is_none());
}
