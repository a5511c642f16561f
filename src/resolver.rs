//! Mapping chapter identifiers to fetchable URLs.

use async_trait::async_trait;
use url::Url;

use crate::fetch::HttpClient;
use crate::model::{ChapterInfo, ChapterMetaData, NovelInfo};

#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// `Ok(None)` means the site had no URL for this chapter.
    async fn resolve_chapter_url(
        &self,
        chapter: &ChapterInfo,
        meta: &ChapterMetaData,
    ) -> anyhow::Result<Option<String>>;
}

/// For sites whose metadata already carries every chapter's link.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectLinkResolver;

#[async_trait]
impl UrlResolver for DirectLinkResolver {
    async fn resolve_chapter_url(
        &self,
        chapter: &ChapterInfo,
        _meta: &ChapterMetaData,
    ) -> anyhow::Result<Option<String>> {
        Ok(chapter.link.clone())
    }
}

/// The kolnovel theme endpoint that serves both the chapter list and the
/// post-ID to URL redirect lookup.
#[derive(Debug, Clone)]
pub struct KolnovelEndpoint {
    http: HttpClient,
    url: Url,
}

impl KolnovelEndpoint {
    pub fn new(http: HttpClient, url: Url) -> Self {
        Self { http, url }
    }

    /// Endpoint on the same origin as `page`.
    pub fn for_page(http: HttpClient, page: &Url) -> anyhow::Result<Self> {
        let url = page.join(crate::extractor::kolnovel::TEMPLATE_PATH)?;
        Ok(Self::new(http, url))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Chapter list markup (a `#menu_chap_bot` select) for a series.
    pub async fn chapter_list(&self, info: NovelInfo) -> anyhow::Result<String> {
        self.http
            .post_form(
                self.url.as_str(),
                &[("seri", info.seri.to_string()), ("ID", info.id.to_string())],
            )
            .await
    }

    /// URL of the chapter with the given post ID. An empty body means the
    /// endpoint does not know the chapter.
    pub async fn redirect_url(&self, chapter_id: &str) -> anyhow::Result<Option<String>> {
        let body = self
            .http
            .post_form(self.url.as_str(), &[("data", chapter_id.to_owned())])
            .await?;
        let url = body.trim();
        Ok((!url.is_empty()).then(|| url.to_owned()))
    }
}

/// Resolves kolnovel post IDs through the theme redirect endpoint.
#[derive(Debug, Clone)]
pub struct KolnovelRedirectResolver {
    endpoint: KolnovelEndpoint,
}

impl KolnovelRedirectResolver {
    pub fn new(endpoint: KolnovelEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl UrlResolver for KolnovelRedirectResolver {
    async fn resolve_chapter_url(
        &self,
        chapter: &ChapterInfo,
        _meta: &ChapterMetaData,
    ) -> anyhow::Result<Option<String>> {
        let resolved = self.endpoint.redirect_url(&chapter.id.to_string()).await?;
        tracing::debug!(id = %chapter.id, ?resolved, "resolved kolnovel redirect");
        Ok(resolved)
    }
}
