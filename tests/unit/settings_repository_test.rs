//! Unit tests for the emoji style setting.

use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use tabsig::database::{MemoryStore, StorageAdapter};
use tabsig::managers::settings_repository::SettingsRepository;
use tabsig::types::errors::SettingsError;
use tabsig::types::settings::{EmojiStyle, SETTINGS_KEY_EMOJI_STYLE};

fn setup() -> (SettingsRepository, StorageAdapter) {
    let storage = StorageAdapter::new(Arc::new(MemoryStore::new()));
    (SettingsRepository::new(storage.clone()), storage)
}

#[tokio::test]
async fn test_unset_style_is_none() {
    let (settings, _) = setup();
    assert_eq!(settings.get_emoji_style().await.unwrap(), None);
}

#[rstest]
#[case("native", EmojiStyle::Native)]
#[case("twemoji", EmojiStyle::Twemoji)]
#[tokio::test]
async fn test_set_style_from_string(#[case] raw: &str, #[case] expected: EmojiStyle) {
    let (settings, storage) = setup();
    assert_eq!(settings.set_emoji_style_str(raw).await.unwrap(), expected);
    assert_eq!(settings.get_emoji_style().await.unwrap(), Some(expected));
    assert_eq!(
        storage.get_one(SETTINGS_KEY_EMOJI_STYLE).await.unwrap(),
        Some(json!(raw))
    );
}

#[tokio::test]
async fn test_unknown_style_is_rejected_and_not_written() {
    let (settings, storage) = setup();
    let err = settings.set_emoji_style_str("sparkly").await.unwrap_err();
    assert!(matches!(err, SettingsError::InvalidValue(_)));
    assert_eq!(storage.get_one(SETTINGS_KEY_EMOJI_STYLE).await.unwrap(), None);
}

#[tokio::test]
async fn test_garbage_stored_value_reads_as_none() {
    let (settings, storage) = setup();
    storage.set_one(SETTINGS_KEY_EMOJI_STYLE, json!(17)).await.unwrap();
    assert_eq!(settings.get_emoji_style().await.unwrap(), None);
}

#[tokio::test]
async fn test_get_or_init_writes_platform_default_once() {
    let (settings, storage) = setup();
    let style = settings.get_or_init_emoji_style().await.unwrap();
    assert_eq!(style, EmojiStyle::platform_default());
    assert_eq!(
        storage.get_one(SETTINGS_KEY_EMOJI_STYLE).await.unwrap(),
        Some(json!(style.as_str()))
    );

    settings.set_emoji_style(EmojiStyle::Native).await.unwrap();
    assert_eq!(settings.get_or_init_emoji_style().await.unwrap(), EmojiStyle::Native);
}
