// Linux paths follow the XDG base directory layout.

use std::env;
use std::path::PathBuf;

use super::APP_DIR_NAME;

pub fn get_config_dir() -> PathBuf {
    xdg_dir(env::var("XDG_CONFIG_HOME").ok(), home(), &[".config"])
}

pub fn get_data_dir() -> PathBuf {
    xdg_dir(env::var("XDG_DATA_HOME").ok(), home(), &[".local", "share"])
}

fn home() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// `$XDG_*_HOME/tabsig` when the variable is set and non-empty, else `~/<fallback>/tabsig`.
fn xdg_dir(xdg: Option<String>, home: PathBuf, fallback: &[&str]) -> PathBuf {
    match xdg.filter(|v| !v.is_empty()) {
        Some(base) => PathBuf::from(base).join(APP_DIR_NAME),
        None => fallback
            .iter()
            .fold(home, |path, part| path.join(part))
            .join(APP_DIR_NAME),
    }
}
