// Tab signature shared type definitions
// Each submodule defines types used across the repository, services and host bindings.

pub mod errors;
pub mod settings;
pub mod tab;
