//! Chapter fetch pipeline: resolve a URL, GET it, parse, extract.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use scraper::Html;

use crate::error::LoadError;
use crate::extractor::Extractor;
use crate::model::{ChapterData, ChapterInfo, ChapterMetaData};
use crate::resolver::UrlResolver;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/103.0.0.0 Safari/537.36";

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";

/// Per-site request options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    /// Keep cookies between requests, like a browser fetch with
    /// `credentials: "include"`.
    pub include_credentials: bool,
    /// `None` leaves timeouts to the network stack.
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            include_credentials: true,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new(options: &FetchOptions) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(options.include_credentials)
            .redirect(reqwest::redirect::Policy::limited(10));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("build http client")?;

        Ok(Self {
            client,
            user_agent: options.user_agent.clone(),
        })
    }

    /// GETs `url` and returns the body. Non-2xx responses are errors.
    pub async fn get_html(&self, url: &str) -> Result<String, LoadError> {
        let transport = |source| LoadError::Transport {
            url: url.to_owned(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, HTML_ACCEPT)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }

    /// POSTs an `application/x-www-form-urlencoded` body and returns the
    /// response text.
    pub async fn post_form(&self, url: &str, form: &[(&str, String)]) -> anyhow::Result<String> {
        let response = self
            .client
            .post(url)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(form)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("POST {url}: HTTP {}", status.as_u16());
        }

        response
            .text()
            .await
            .with_context(|| format!("read body: {url}"))
    }
}

/// Turns a chapter from the metadata tree into fetched content.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    async fn load(
        &self,
        chapter: &ChapterInfo,
        meta: &ChapterMetaData,
    ) -> Result<ChapterData, LoadError>;
}

pub struct FetchPipeline {
    http: HttpClient,
    extractor: Arc<dyn Extractor>,
    resolver: Arc<dyn UrlResolver>,
}

impl FetchPipeline {
    pub fn new(
        http: HttpClient,
        extractor: Arc<dyn Extractor>,
        resolver: Arc<dyn UrlResolver>,
    ) -> Self {
        Self {
            http,
            extractor,
            resolver,
        }
    }

    async fn resolve_url(
        &self,
        chapter: &ChapterInfo,
        meta: &ChapterMetaData,
    ) -> Result<String, LoadError> {
        if let Some(link) = chapter.link.as_deref() {
            return Ok(link.to_owned());
        }

        let resolution_error = |reason: String| LoadError::Resolution {
            id: chapter.id.clone(),
            reason,
        };
        match self.resolver.resolve_chapter_url(chapter, meta).await {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Err(resolution_error("resolver returned no url".to_owned())),
            Err(err) => Err(resolution_error(format!("{err:#}"))),
        }
    }
}

#[async_trait]
impl ChapterSource for FetchPipeline {
    async fn load(
        &self,
        chapter: &ChapterInfo,
        meta: &ChapterMetaData,
    ) -> Result<ChapterData, LoadError> {
        let url = self.resolve_url(chapter, meta).await?;
        tracing::debug!(id = %chapter.id, %url, "fetching chapter");

        let body = self.http.get_html(&url).await?;
        extract_chapter(self.extractor.as_ref(), &body, &url)
    }
}

/// Parses `body` and runs the extractor over it.
pub fn extract_chapter(
    extractor: &dyn Extractor,
    body: &str,
    url: &str,
) -> Result<ChapterData, LoadError> {
    let doc = Html::parse_document(body);
    extractor
        .extract_chapter_data(&doc, Some(url))
        .ok_or_else(|| LoadError::Parse {
            url: url.to_owned(),
        })
}
