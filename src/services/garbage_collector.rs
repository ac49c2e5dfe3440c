//! Garbage collector for closed tab records.
//!
//! Closed records are kept for a while so a reopened tab (undo-close, session
//! restore, browser restart) can pick its signature back up. After the
//! retention threshold they are deleted in one batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::managers::tab_repository::TabRepository;
use crate::types::errors::RepositoryError;
use crate::types::tab::{TabId, TabRecord};

/// Default retention of closed records.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(13 * 60 * 60);

/// Default sweep interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub examined: usize,
    pub removed: Vec<TabId>,
}

/// Returns the ids of records that should be deleted at `now`.
///
/// Open records are always kept. Closed records are kept while they have been
/// closed for at most `retention`. A closed record without a timestamp is
/// treated as closed long ago.
pub fn garbage_collection_filter(
    records: &[TabRecord],
    now: DateTime<Utc>,
    retention: Duration,
) -> Vec<TabId> {
    records
        .iter()
        .filter(|record| {
            if !record.is_closed {
                return false;
            }
            match record.closed_at {
                // Negative elapsed time (clock moved back) keeps the record.
                Some(closed_at) => now
                    .signed_duration_since(closed_at)
                    .to_std()
                    .map_or(false, |elapsed| elapsed > retention),
                None => true,
            }
        })
        .map(|record| record.id)
        .collect()
}

pub struct GarbageCollector {
    repository: Arc<TabRepository>,
    retention: Duration,
    interval: Duration,
}

impl GarbageCollector {
    pub fn new(repository: Arc<TabRepository>, retention: Duration, interval: Duration) -> Self {
        Self {
            repository,
            retention,
            interval,
        }
    }

    pub fn with_defaults(repository: Arc<TabRepository>) -> Self {
        Self::new(repository, DEFAULT_RETENTION, DEFAULT_INTERVAL)
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// One read-filter-delete cycle, under the repository lock.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<CollectionStats, RepositoryError> {
        let repository = &self.repository;
        repository
            .run_exclusive(|| async {
                let records = repository.get_all().await?;
                let removed = garbage_collection_filter(&records, now, self.retention);
                if !removed.is_empty() {
                    repository.delete_many(&removed).await?;
                }
                Ok::<_, RepositoryError>(CollectionStats {
                    examined: records.len(),
                    removed,
                })
            })
            .await
    }

    /// Spawns the periodic sweep. A failed sweep is logged and retried on the next tick.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Starting garbage collector"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.run_once(Utc::now()).await {
                    Ok(stats) if !stats.removed.is_empty() => {
                        info!(removed = ?stats.removed, examined = stats.examined, "Collected closed tab records");
                    }
                    Ok(stats) => debug!(examined = stats.examined, "Nothing to collect"),
                    Err(e) => warn!(error = %e, "Garbage collection sweep failed"),
                }
            }
        })
    }
}
