//! Per-site scraping of chapter pages.
//!
//! Every supported site provides an [`Extractor`]: two pure functions over a
//! parsed document. Chapter lists are always returned in ascending reading
//! order; sites that render their selects newest-first reverse them here.

pub mod cenel;
pub mod kolnovel;

use std::sync::{Arc, OnceLock};

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::{ChapterData, ChapterIdentifier, ChapterMetaData, NovelInfo};

pub trait Extractor: Send + Sync {
    /// Extracts the chapter shown by `doc`. `url` is the address the document
    /// was fetched from. `None` means the content container was not found.
    fn extract_chapter_data(&self, doc: &Html, url: Option<&str>) -> Option<ChapterData>;

    /// Extracts the volume/chapter tree. `current` marks the chapter the
    /// document belongs to when the page itself does not flag it.
    fn extract_chapters_meta_data(
        &self,
        doc: &Html,
        current: Option<&ChapterIdentifier>,
    ) -> Option<ChapterMetaData>;

    /// Series information for sites whose chapter list lives behind a
    /// separate request.
    fn novel_info(&self, _doc: &Html) -> Option<NovelInfo> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Site {
    Kolnovel,
    Cenel,
}

impl Site {
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.strip_prefix("www.").unwrap_or(host);
        match host {
            "kolnovel.com" => Some(Self::Kolnovel),
            "cenele.com" => Some(Self::Cenel),
            _ => None,
        }
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        url.host_str().and_then(Self::from_host)
    }

    /// Stable key used for per-site settings.
    pub fn key(self) -> &'static str {
        match self {
            Self::Kolnovel => "kolnovel",
            Self::Cenel => "cenel",
        }
    }

    pub fn extractor(self) -> Arc<dyn Extractor> {
        match self {
            Self::Kolnovel => Arc::new(kolnovel::KolnovelExtractor),
            Self::Cenel => Arc::new(cenel::CenelExtractor),
        }
    }
}

pub(crate) fn selector(cache: &'static OnceLock<Selector>, css: &str) -> &'static Selector {
    cache.get_or_init(|| Selector::parse(css).expect("static selector must parse"))
}

pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}
