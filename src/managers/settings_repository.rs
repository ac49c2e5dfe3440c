//! Settings keyspace.
//!
//! Settings share the key-value store with tab records but live under fixed
//! string keys, so tab scans never see them.

use serde_json::Value;
use tracing::{debug, warn};

use crate::database::store::StorageAdapter;
use crate::types::errors::SettingsError;
use crate::types::settings::{EmojiStyle, SETTINGS_KEY_EMOJI_STYLE};

pub struct SettingsRepository {
    storage: StorageAdapter,
}

impl SettingsRepository {
    pub fn new(storage: StorageAdapter) -> Self {
        Self { storage }
    }

    /// The stored emoji style, or `None` if unset or unrecognized.
    pub async fn get_emoji_style(&self) -> Result<Option<EmojiStyle>, SettingsError> {
        let stored = self.storage.get_one(SETTINGS_KEY_EMOJI_STYLE).await?;
        let style = match stored {
            Some(Value::String(s)) => {
                let parsed = EmojiStyle::parse(&s);
                if parsed.is_none() {
                    warn!(value = %s, "Ignoring unknown emoji style");
                }
                parsed
            }
            Some(other) => {
                warn!(value = %other, "Ignoring non-string emoji style");
                None
            }
            None => None,
        };
        debug!(style = ?style, "get_emoji_style");
        Ok(style)
    }

    pub async fn set_emoji_style(&self, style: EmojiStyle) -> Result<(), SettingsError> {
        debug!(style = style.as_str(), "set_emoji_style");
        self.storage
            .set_one(SETTINGS_KEY_EMOJI_STYLE, Value::String(style.as_str().to_string()))
            .await?;
        Ok(())
    }

    /// Accepts the raw string a UI sends.
    pub async fn set_emoji_style_str(&self, style: &str) -> Result<EmojiStyle, SettingsError> {
        let parsed = EmojiStyle::parse(style)
            .ok_or_else(|| SettingsError::InvalidValue(format!("unknown emoji style '{}'", style)))?;
        self.set_emoji_style(parsed).await?;
        Ok(parsed)
    }

    /// Returns the stored style, writing the platform default first if none is stored.
    pub async fn get_or_init_emoji_style(&self) -> Result<EmojiStyle, SettingsError> {
        if let Some(style) = self.get_emoji_style().await? {
            return Ok(style);
        }
        let style = EmojiStyle::platform_default();
        self.set_emoji_style(style).await?;
        Ok(style)
    }
}
