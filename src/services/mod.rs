// Tab signature services
// Services run on top of the repositories: garbage collection, title correction,
// schema migration and the host lifecycle bindings.

pub mod garbage_collector;
pub mod lifecycle;
pub mod schema_migration;
pub mod title_correction;
