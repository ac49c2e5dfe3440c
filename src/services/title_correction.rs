//! Title-correction coordinator.
//!
//! Pages rewrite `document.title` on their own schedule. When a tab with a
//! custom title reports a different one, the coordinator pushes the stored
//! title back through the [`TabHost`]. Pages that fight back in a tight loop
//! get a bounded number of quick retries per threshold window, after which
//! drift is tolerated until the window passes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::managers::tab_repository::TabRepository;
use crate::types::errors::{HostError, RepositoryError};
use crate::types::tab::TabId;

/// Outbound boundary to the layer that owns live tab titles.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// The title the tab currently shows, or `None` if the tab is gone.
    async fn tab_title(&self, tab_id: TabId) -> Result<Option<String>, HostError>;
    /// Overwrites the tab's visible title.
    async fn force_title(&self, tab_id: TabId, title: &str) -> Result<(), HostError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleCorrectionConfig {
    /// Corrections further apart than this reset the retry budget.
    pub threshold: Duration,
    /// Quick corrections allowed inside one threshold window.
    pub max_retries: u32,
    /// Wait before re-checking and forcing the title.
    pub delay: Duration,
    /// Entries untouched for longer than this are dropped by cleanup.
    pub stale_after: Duration,
    pub cleanup_interval: Duration,
}

impl Default for TitleCorrectionConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(1000),
            max_retries: 4,
            delay: Duration::from_millis(100),
            stale_after: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionState {
    pub last_correction: Instant,
    pub retries_used: u32,
}

/// What `handle_title_change` decided.
#[derive(Debug)]
pub enum CorrectionDecision {
    /// The tab has no stored custom title.
    NotTracked,
    /// The observed title needs no correction.
    Ignored,
    /// A correction was scheduled; the handle resolves once it ran.
    Scheduled(JoinHandle<CorrectionOutcome>),
    /// Retry budget exhausted inside the current window.
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// The tab already showed the desired title when re-checked.
    AlreadyCorrect,
    /// The tab closed before the re-check; nothing was sent.
    TabGone,
    Forced,
    Failed(String),
}

pub struct TitleCorrectionCoordinator {
    repository: Arc<TabRepository>,
    host: Arc<dyn TabHost>,
    config: TitleCorrectionConfig,
    states: Mutex<HashMap<TabId, CorrectionState>>,
}

impl TitleCorrectionCoordinator {
    pub fn new(
        repository: Arc<TabRepository>,
        host: Arc<dyn TabHost>,
        config: TitleCorrectionConfig,
    ) -> Self {
        Self {
            repository,
            host,
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TitleCorrectionConfig {
        &self.config
    }

    /// Reacts to tab `tab_id` now showing `new_title`.
    pub async fn handle_title_change(
        &self,
        tab_id: TabId,
        new_title: &str,
    ) -> Result<CorrectionDecision, RepositoryError> {
        let desired = self
            .repository
            .get_by_id(tab_id)
            .await?
            .and_then(|record| record.signature.title);
        let Some(desired) = desired else {
            return Ok(CorrectionDecision::NotTracked);
        };
        if desired == new_title || new_title.is_empty() {
            return Ok(CorrectionDecision::Ignored);
        }

        let now = Instant::now();
        let mut states = self.states();
        let previous = states.get(&tab_id).copied();
        let threshold_passed = previous
            .map_or(true, |s| now.duration_since(s.last_correction) > self.config.threshold);
        let has_retries_left =
            previous.map_or(true, |s| s.retries_used < self.config.max_retries);

        if !threshold_passed && !has_retries_left {
            debug!(tab_id, "Title correction rate limited");
            return Ok(CorrectionDecision::RateLimited);
        }

        let next = match previous {
            Some(state) if !threshold_passed => CorrectionState {
                last_correction: state.last_correction,
                retries_used: state.retries_used + 1,
            },
            _ => CorrectionState {
                last_correction: now,
                retries_used: 0,
            },
        };
        states.insert(tab_id, next);
        drop(states);

        debug!(tab_id, observed = %new_title, desired = %desired, retries_used = next.retries_used, "Scheduling title correction");
        let host = Arc::clone(&self.host);
        let delay = self.config.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            correct_title(host.as_ref(), tab_id, &desired).await
        });
        Ok(CorrectionDecision::Scheduled(handle))
    }

    /// Drops entries whose last correction is older than the stale threshold.
    /// Returns how many were removed.
    pub fn cleanup_stale_entries(&self, now: Instant) -> usize {
        let stale_after = self.config.stale_after;
        let mut states = self.states();
        let before = states.len();
        states.retain(|_, s| now.saturating_duration_since(s.last_correction) <= stale_after);
        let removed = before - states.len();
        if removed > 0 {
            debug!(removed, "Dropped stale title correction entries");
        }
        removed
    }

    /// Forgets a tab entirely, e.g. once it is closed.
    pub fn forget(&self, tab_id: TabId) {
        self.states().remove(&tab_id);
    }

    pub fn state_of(&self, tab_id: TabId) -> Option<CorrectionState> {
        self.states().get(&tab_id).copied()
    }

    pub fn tracked_count(&self) -> usize {
        self.states().len()
    }

    /// Spawns the periodic stale-entry sweep.
    pub fn start_cleanup(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            interval_secs = self.config.cleanup_interval.as_secs(),
            "Starting title correction cleanup"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.cleanup_interval);
            loop {
                ticker.tick().await;
                self.cleanup_stale_entries(Instant::now());
            }
        })
    }

    fn states(&self) -> MutexGuard<'_, HashMap<TabId, CorrectionState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn correct_title(host: &dyn TabHost, tab_id: TabId, desired: &str) -> CorrectionOutcome {
    match host.tab_title(tab_id).await {
        Ok(Some(current)) if current == desired => {
            debug!(tab_id, "Title already correct");
            return CorrectionOutcome::AlreadyCorrect;
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            debug!(tab_id, "Tab gone before title re-check");
            return CorrectionOutcome::TabGone;
        }
        Err(e) => {
            warn!(tab_id, error = %e, "Could not read tab title");
            return CorrectionOutcome::Failed(e.to_string());
        }
    }

    match host.force_title(tab_id, desired).await {
        Ok(()) => CorrectionOutcome::Forced,
        Err(e) => {
            warn!(tab_id, error = %e, "Could not force tab title");
            CorrectionOutcome::Failed(e.to_string())
        }
    }
}
