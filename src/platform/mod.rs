// Platform-specific locations of the config file and the signature database.
//
// Selected at compile time with `cfg(target_os)`.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Directory name used under every platform base directory.
pub const APP_DIR_NAME: &str = "tabsig";

/// Directory holding `config.json`.
///
/// - **Linux**: `$XDG_CONFIG_HOME/tabsig` or `~/.config/tabsig`
/// - **macOS**: `~/Library/Application Support/tabsig`
/// - **Windows**: `%APPDATA%\tabsig`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
}

/// Directory holding the SQLite signature store.
///
/// - **Linux**: `$XDG_DATA_HOME/tabsig` or `~/.local/share/tabsig`
/// - **macOS**: `~/Library/Application Support/tabsig`
/// - **Windows**: `%LOCALAPPDATA%\tabsig`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
}
