//! Starting a reading session from a chapter page.
//!
//! Launch fetches the start page once, extracts the chapter it shows and the
//! chapter tree, and wires a [`FetchPipeline`] with the site's resolver. The
//! tree comes from the page itself or, for sites that serve it separately,
//! from a second request.

use std::sync::Arc;
use std::time::Duration;

use scraper::Html;
use url::Url;

use crate::error::LaunchError;
use crate::extractor::{Extractor, Site};
use crate::fetch::{FetchOptions, FetchPipeline, HttpClient};
use crate::metadata::ChapterIndex;
use crate::model::{ChapterData, ChapterIdentifier, ChapterMetaData, NovelInfo};
use crate::resolver::{DirectLinkResolver, KolnovelEndpoint, KolnovelRedirectResolver, UrlResolver};

/// Everything needed to start a session, built from CLI args.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Overrides host-based site detection.
    pub site: Option<Site>,
    pub fetch: FetchOptions,
}

impl SessionConfig {
    pub fn new(site: Option<Site>, user_agent: String, timeout_secs: Option<u64>) -> Self {
        Self {
            site,
            fetch: FetchOptions {
                user_agent,
                timeout: timeout_secs.map(Duration::from_secs),
                ..FetchOptions::default()
            },
        }
    }

    pub fn site_for(&self, url: &Url) -> Result<Site, LaunchError> {
        self.site
            .or_else(|| Site::from_url(url))
            .ok_or_else(|| LaunchError::UnsupportedSite(url.host_str().unwrap_or_default().to_owned()))
    }
}

/// A launched session, ready to hand to a controller.
pub struct Launched {
    pub site: Site,
    /// Key for per-novel progress records.
    pub novel_key: String,
    pub initial: ChapterData,
    pub index: ChapterIndex,
    pub pipeline: FetchPipeline,
}

/// Where the chapter tree comes from.
enum Listing {
    Page(ChapterMetaData),
    Remote(NovelInfo),
}

pub async fn launch(config: &SessionConfig, url: &Url) -> Result<Launched, LaunchError> {
    let site = config.site_for(url)?;
    let http = HttpClient::new(&config.fetch).map_err(|err| LaunchError::Client {
        reason: format!("{err:#}"),
    })?;
    let extractor = site.extractor();

    tracing::info!(site = site.key(), %url, "launching reader");
    let body = http.get_html(url.as_str()).await?;
    let (initial, listing) = read_start_page(extractor.as_ref(), &body, url)?;

    let novel_info = match &listing {
        Listing::Remote(info) => Some(*info),
        Listing::Page(_) => None,
    };
    let meta = match listing {
        Listing::Page(meta) => meta,
        Listing::Remote(info) => {
            let endpoint = kolnovel_endpoint(&http, url)?;
            let list = endpoint
                .chapter_list(info)
                .await
                .map_err(|err| LaunchError::ChapterList {
                    reason: format!("{err:#}"),
                })?;
            let doc = Html::parse_document(&list);
            extractor
                .extract_chapters_meta_data(&doc, Some(&initial.id))
                .ok_or_else(|| LaunchError::MetadataUnavailable {
                    url: endpoint.url().to_string(),
                })?
        }
    };

    let resolver: Arc<dyn UrlResolver> = match site {
        Site::Kolnovel => Arc::new(KolnovelRedirectResolver::new(kolnovel_endpoint(&http, url)?)),
        Site::Cenel => Arc::new(DirectLinkResolver),
    };

    let index = ChapterIndex::new(meta);
    tracing::info!(
        chapters = index.len(),
        title = %initial.title,
        "chapter list loaded"
    );

    Ok(Launched {
        site,
        novel_key: novel_key(site, url, novel_info.as_ref()),
        initial,
        index,
        pipeline: FetchPipeline::new(http, extractor, resolver),
    })
}

/// Extracts the initial chapter and the chapter listing. The parsed document
/// stays inside this function so it is never held across an await.
fn read_start_page(
    extractor: &dyn Extractor,
    body: &str,
    url: &Url,
) -> Result<(ChapterData, Listing), LaunchError> {
    let doc = Html::parse_document(body);
    let initial = extractor
        .extract_chapter_data(&doc, Some(url.as_str()))
        .ok_or_else(|| LaunchError::InitialChapterUnavailable {
            url: url.to_string(),
        })?;

    let current = ChapterIdentifier::Text(url.to_string());
    if let Some(meta) = extractor.extract_chapters_meta_data(&doc, Some(&current)) {
        return Ok((initial, Listing::Page(meta)));
    }
    match extractor.novel_info(&doc) {
        Some(info) => Ok((initial, Listing::Remote(info))),
        None => Err(LaunchError::MetadataUnavailable {
            url: url.to_string(),
        }),
    }
}

fn kolnovel_endpoint(http: &HttpClient, page: &Url) -> Result<KolnovelEndpoint, LaunchError> {
    KolnovelEndpoint::for_page(http.clone(), page).map_err(|err| LaunchError::ChapterList {
        reason: format!("{err:#}"),
    })
}

/// `kolnovel:<seri>` when the series is known, otherwise the site key and
/// the first two path segments (`cenel:novel/some-title`).
pub fn novel_key(site: Site, url: &Url, info: Option<&NovelInfo>) -> String {
    if let Some(info) = info {
        return format!("{}:{}", site.key(), info.seri);
    }
    let path = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .take(2)
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    format!("{}:{path}", site.key())
}
