// macOS keeps config and data together under Application Support.

use std::env;
use std::path::PathBuf;

use super::APP_DIR_NAME;

fn application_support() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
        .join("Library")
        .join("Application Support")
}

pub fn get_config_dir() -> PathBuf {
    application_support().join(APP_DIR_NAME)
}

pub fn get_data_dir() -> PathBuf {
    get_config_dir()
}
