//! tabsig — keeps user-assigned tab titles and favicons attached to the right
//! browser tab across reloads, closes, reopens, discards and restarts.
//!
//! This library crate exposes all modules for use by the host binary and integration tests.

pub mod app;
pub mod config;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
