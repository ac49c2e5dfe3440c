//! Host lifecycle bindings.
//!
//! Each browser event maps to one repository operation run under
//! [`TabRepository::run_exclusive`]. Store failures are logged and swallowed
//! so the event source keeps going; invariant violations are returned.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::managers::tab_repository::TabRepository;
use crate::services::schema_migration::SchemaMigrationManager;
use crate::services::title_correction::{CorrectionDecision, TitleCorrectionCoordinator};
use crate::types::errors::{MigrationError, RepositoryError};
use crate::types::tab::{InstallReason, TabChange, TabId, TabMove};

pub struct LifecycleHandler {
    repository: Arc<TabRepository>,
    coordinator: Arc<TitleCorrectionCoordinator>,
    migrations: SchemaMigrationManager,
}

impl LifecycleHandler {
    pub fn new(
        repository: Arc<TabRepository>,
        coordinator: Arc<TitleCorrectionCoordinator>,
        migrations: SchemaMigrationManager,
    ) -> Self {
        Self {
            repository,
            coordinator,
            migrations,
        }
    }

    /// Tab closed: keep its record around as closed so a reopen can find it.
    pub async fn on_tab_removed(&self, tab_id: TabId) -> Result<(), RepositoryError> {
        self.coordinator.forget(tab_id);
        let repository = &self.repository;
        let result = repository
            .run_exclusive(|| repository.mark_tab_closed(tab_id, Utc::now()))
            .await;
        absorb("tab_removed", result).map(|_| ())
    }

    /// Tab updated: re-key after a discard, and push back a drifting title.
    pub async fn on_tab_updated(
        &self,
        tab_id: TabId,
        change: &TabChange,
    ) -> Result<Option<CorrectionDecision>, RepositoryError> {
        if change.is_fresh_discard() {
            match (change.url.as_deref(), change.index) {
                (Some(url), Some(index)) => {
                    let repository = &self.repository;
                    let result = repository
                        .run_exclusive(|| repository.reattach_discarded_tab(tab_id, url, index))
                        .await;
                    absorb("tab_discarded", result.map(|_| ()))?;
                }
                _ => warn!(tab_id, "Discard update without url or index"),
            }
        }

        let Some(title) = change.title.as_deref() else {
            return Ok(None);
        };
        match self.coordinator.handle_title_change(tab_id, title).await {
            Ok(decision) => Ok(Some(decision)),
            Err(e) => absorb::<()>("title_changed", Err(e)).map(|_| None),
        }
    }

    pub async fn on_tab_moved(&self, tab_id: TabId, movement: &TabMove) -> Result<(), RepositoryError> {
        let repository = &self.repository;
        let result = repository
            .run_exclusive(|| repository.update_index(tab_id, movement.to_index))
            .await;
        absorb("tab_moved", result).map(|_| ())
    }

    /// Browser start: tab ids from the previous session are meaningless now.
    pub async fn on_startup(&self) -> Result<usize, RepositoryError> {
        let repository = &self.repository;
        let result = repository
            .run_exclusive(|| repository.mark_all_open_as_closed(Utc::now()))
            .await;
        if let Ok(count) = &result {
            info!(closed = count, "Closed records from previous session");
        }
        absorb("startup", result).map(|count| count.unwrap_or(0))
    }

    pub async fn on_installed(&self, reason: InstallReason) -> Result<usize, RepositoryError> {
        info!(reason = ?reason, "Installed");
        let repository = &self.repository;
        let result = repository
            .run_exclusive(|| async {
                match reason {
                    InstallReason::Install => {
                        if let Err(e) = self.migrations.stamp_current(repository.storage()).await {
                            log_migration_error(&e);
                        }
                    }
                    InstallReason::Update => {
                        if let Err(e) = self.migrations.apply_to_store(repository.storage()).await {
                            log_migration_error(&e);
                        }
                    }
                    InstallReason::BrowserUpdate | InstallReason::SharedModuleUpdate => {}
                }
                repository.mark_all_open_as_closed(Utc::now()).await
            })
            .await;
        absorb("installed", result).map(|count| count.unwrap_or(0))
    }
}

fn log_migration_error(e: &MigrationError) {
    error!(error = %e, "Schema migration failed");
}

/// Swallows store-level failures, passes fatal ones through.
fn absorb<T>(event: &str, result: Result<T, RepositoryError>) -> Result<Option<T>, RepositoryError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => {
            error!(event, error = %e, "Fatal repository error");
            Err(e)
        }
        Err(e) => {
            error!(event, error = %e, "Repository operation failed");
            Ok(None)
        }
    }
}
