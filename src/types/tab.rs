use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host-assigned tab identifier. Reused by the browser over time, so it is
/// not a stable key across a tab's whole lifetime.
pub type TabId = i64;

/// Everything persisted about a tracked tab.
///
/// Stored verbatim (camelCase JSON) under the decimal string of `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    pub id: TabId,
    pub url: String,
    pub index: u32,
    pub is_closed: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub signature: TabSignature,
}

impl TabRecord {
    /// A fresh, open record.
    pub fn new(id: TabId, url: &str, index: u32, signature: TabSignature) -> Self {
        Self {
            id,
            url: url.to_string(),
            index,
            is_closed: false,
            closed_at: None,
            signature,
        }
    }

    /// Marks the record closed at `at`. Keeps the original timestamp if the
    /// record is already closed.
    pub fn mark_closed(&mut self, at: DateTime<Utc>) {
        if !self.is_closed || self.closed_at.is_none() {
            self.is_closed = true;
            self.closed_at = Some(at);
        }
    }

    /// Clears closed state.
    pub fn reopen(&mut self) {
        self.is_closed = false;
        self.closed_at = None;
    }
}

/// The user-controlled part of a record. `None` means "show the page's own value".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TabSignature {
    pub title: Option<String>,
    pub favicon: Option<FaviconDescriptor>,
}

impl TabSignature {
    pub fn new(title: Option<&str>, favicon: Option<FaviconDescriptor>) -> Self {
        Self {
            title: title.map(str::to_string),
            favicon,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.favicon.is_none()
    }
}

/// Favicon override. The wire tags are the ones already present in user stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum FaviconDescriptor {
    /// Emoji drawn with the system font.
    #[serde(rename = "systemEmojiFavicon")]
    SystemEmoji(String),
    /// Emoji drawn from a remote image set.
    #[serde(rename = "twemojiFavicon")]
    RemoteEmojiImage(String),
    /// Arbitrary absolute image URL.
    #[serde(rename = "urlFavicon")]
    Url(String),
}

impl FaviconDescriptor {
    pub fn type_tag(&self) -> &'static str {
        match self {
            FaviconDescriptor::SystemEmoji(_) => "systemEmojiFavicon",
            FaviconDescriptor::RemoteEmojiImage(_) => "twemojiFavicon",
            FaviconDescriptor::Url(_) => "urlFavicon",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            FaviconDescriptor::SystemEmoji(s)
            | FaviconDescriptor::RemoteEmojiImage(s)
            | FaviconDescriptor::Url(s) => s,
        }
    }
}

/// Subset of a host tab-update notification the core reacts to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub discarded: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TabChange {
    /// True for the update the host fires right after unloading a tab to save memory.
    pub fn is_fresh_discard(&self) -> bool {
        self.status.as_deref() == Some("unloaded") && self.discarded == Some(true)
    }
}

/// Host tab-move notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMove {
    pub window_id: i64,
    #[serde(default)]
    pub from_index: Option<u32>,
    pub to_index: u32,
}

/// Why the host reported an install event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    BrowserUpdate,
    SharedModuleUpdate,
}
