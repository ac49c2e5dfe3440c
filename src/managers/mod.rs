// Tab signature state managers
// Managers own the persisted keyspaces: tab records and settings.

pub mod settings_repository;
pub mod tab_repository;
