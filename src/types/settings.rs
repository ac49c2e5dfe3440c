use serde::{Deserialize, Serialize};

/// Store key of the emoji rendering style setting.
pub const SETTINGS_KEY_EMOJI_STYLE: &str = "settings.emoji_style";

/// Store key of the persisted schema version.
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// How emoji favicons are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmojiStyle {
    /// The operating system's emoji font.
    Native,
    /// Remote emoji images.
    Twemoji,
}

impl EmojiStyle {
    /// Platform default: macOS renders system emoji well, everything else gets images.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            EmojiStyle::Native
        } else {
            EmojiStyle::Twemoji
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmojiStyle::Native => "native",
            EmojiStyle::Twemoji => "twemoji",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "native" => Some(EmojiStyle::Native),
            "twemoji" => Some(EmojiStyle::Twemoji),
            _ => None,
        }
    }
}

impl Default for EmojiStyle {
    fn default() -> Self {
        Self::platform_default()
    }
}
