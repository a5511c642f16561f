use thiserror::Error;

use crate::model::ChapterIdentifier;

/// Why loading a single chapter failed. All variants are recoverable: the
/// controller stays at its current chapter and a later advance may retry.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("resolve url for chapter {id}: {reason}")]
    Resolution {
        id: ChapterIdentifier,
        reason: String,
    },

    #[error("GET {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no chapter content found at {url}")]
    Parse { url: String },
}

/// Failures that prevent a reading session from starting.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("unsupported site: {0} (pass --site to choose an extractor)")]
    UnsupportedSite(String),

    #[error("build http client: {reason}")]
    Client { reason: String },

    #[error("load start page")]
    StartPage(#[from] LoadError),

    #[error("no chapter found on start page: {url}")]
    InitialChapterUnavailable { url: String },

    #[error("fetch chapter list: {reason}")]
    ChapterList { reason: String },

    #[error("chapter metadata unavailable for {url}")]
    MetadataUnavailable { url: String },
}
