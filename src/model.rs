use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a chapter on its host site.
///
/// Some sites key chapters by a numeric post ID, others by an opaque string
/// (usually the chapter URL). Identifiers are only compared for equality;
/// reading order comes from the position in [`ChapterMetaData`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChapterIdentifier {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for ChapterIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for ChapterIdentifier {
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for ChapterIdentifier {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

impl From<String> for ChapterIdentifier {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub id: ChapterIdentifier,
    pub title: String,
    /// Directly fetchable URL. When absent the site resolver maps `id` to a URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Whether the host page marked this chapter as current at scrape time.
    #[serde(default)]
    pub is_default_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ChapterIdentifier>,
    pub title: String,
    /// Ascending reading order.
    pub chapters: Vec<ChapterInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMetaData {
    pub is_grouped: bool,
    pub volumes: Vec<VolumeInfo>,
}

impl ChapterMetaData {
    /// Wraps a flat chapter list in the single synthetic volume used by
    /// ungrouped sites.
    pub fn flat(volume_id: &str, chapters: Vec<ChapterInfo>) -> Self {
        Self {
            is_grouped: false,
            volumes: vec![VolumeInfo {
                id: Some(ChapterIdentifier::from(volume_id)),
                title: "Chapters".to_owned(),
                chapters,
            }],
        }
    }
}

/// A fetched chapter. `content` is sanitized HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterData {
    pub id: ChapterIdentifier,
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Series and chapter post IDs embedded in a kolnovel chapter page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelInfo {
    pub seri: u64,
    pub id: u64,
}
