// Windows: roaming app data for config, local app data for the signature store.

use std::env;
use std::path::PathBuf;

use super::APP_DIR_NAME;

pub fn get_config_dir() -> PathBuf {
    env_dir("APPDATA").join(APP_DIR_NAME)
}

pub fn get_data_dir() -> PathBuf {
    env_dir("LOCALAPPDATA").join(APP_DIR_NAME)
}

fn env_dir(var: &str) -> PathBuf {
    env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
}
