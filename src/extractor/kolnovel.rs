//! kolnovel.com: WordPress "lightnovel" theme.
//!
//! Chapters are keyed by numeric post ID (`<article id="post-123">`). The
//! chapter list is not part of the chapter page; it is served by a theme
//! template endpoint given the series and chapter IDs found in an inline
//! script. The same endpoint maps a post ID to the chapter URL.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{Extractor, selector, text_of};
use crate::model::{ChapterData, ChapterIdentifier, ChapterInfo, ChapterMetaData, NovelInfo};
use crate::sanitize::sanitize_children;

pub const TEMPLATE_PATH: &str =
    "/wp-content/themes/lightnovel_1.1.5_current/template-parts/single/list_1.php";

static CONTENT: OnceLock<Selector> = OnceLock::new();
static ARTICLE: OnceLock<Selector> = OnceLock::new();
static TITLE: OnceLock<Selector> = OnceLock::new();
static CHAPTER_SELECT: OnceLock<Selector> = OnceLock::new();
static OPTION: OnceLock<Selector> = OnceLock::new();
static ARTICLE_SCRIPTS: OnceLock<Selector> = OnceLock::new();

static POST_ID: OnceLock<Regex> = OnceLock::new();
static SERI: OnceLock<Regex> = OnceLock::new();
static SCRIPT_ID: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default)]
pub struct KolnovelExtractor;

impl Extractor for KolnovelExtractor {
    fn extract_chapter_data(&self, doc: &Html, url: Option<&str>) -> Option<ChapterData> {
        let content = doc.select(selector(&CONTENT, "#kol_content")).next()?;

        let Some(article) = doc.select(selector(&ARTICLE, "article")).next() else {
            tracing::warn!("kolnovel: article element not found");
            return None;
        };
        let Some(id) = article.value().id().and_then(parse_post_id) else {
            tracing::warn!(article_id = ?article.value().id(), "kolnovel: chapter id not found");
            return None;
        };

        let title = doc
            .select(selector(&TITLE, "#Top_Up > div.cat-series"))
            .next()
            .map(text_of)
            .unwrap_or_default();

        Some(ChapterData {
            id: ChapterIdentifier::Numeric(id),
            title,
            url: url.unwrap_or_default().to_owned(),
            content: sanitize_children(content),
        })
    }

    fn extract_chapters_meta_data(
        &self,
        doc: &Html,
        current: Option<&ChapterIdentifier>,
    ) -> Option<ChapterMetaData> {
        let chapter_select = doc
            .select(selector(&CHAPTER_SELECT, "#menu_chap_bot"))
            .next()?;
        let options = chapter_select
            .select(selector(&OPTION, "option"))
            .collect::<Vec<_>>();

        // The select lists the newest chapter first.
        let chapters = options
            .into_iter()
            .rev()
            .filter_map(|option| {
                let value = option.value().attr("value")?.trim().parse::<u64>().ok()?;
                let id = ChapterIdentifier::Numeric(value);
                Some(ChapterInfo {
                    is_default_selected: current == Some(&id),
                    id,
                    title: text_of(option),
                    link: None,
                })
            })
            .collect();

        Some(ChapterMetaData::flat("kolnovel-chapters", chapters))
    }

    fn novel_info(&self, doc: &Html) -> Option<NovelInfo> {
        let seri_re = SERI.get_or_init(|| Regex::new(r"'seri'\s*:\s*(\d+)").expect("seri regex"));
        let id_re = SCRIPT_ID.get_or_init(|| Regex::new(r"'ID'\s*:\s*(\d+)").expect("id regex"));

        doc.select(selector(&ARTICLE_SCRIPTS, "article script"))
            .find_map(|script| {
                let source = script.text().collect::<String>();
                let seri = seri_re.captures(&source)?.get(1)?.as_str().parse().ok()?;
                let id = id_re.captures(&source)?.get(1)?.as_str().parse().ok()?;
                Some(NovelInfo { seri, id })
            })
    }
}

fn parse_post_id(article_id: &str) -> Option<u64> {
    let re = POST_ID.get_or_init(|| Regex::new(r"post-(\d+)").expect("post id regex"));
    re.captures(article_id)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER_PAGE: &str = r#"<!doctype html>
<html><body>
<div id="Top_Up"><div class="cat-series">Chapter 12 - The Gate</div></div>
<article id="post-5012" class="post">
  <style>.hide-me{display:none}</style>
  <div id="kol_content">
    <p class="hide-me">First line.</p>
    <p>&nbsp;</p>
    <script>track()</script>
    <p>Second <em>line</em>.</p>
  </div>
  <script>var data = { 'seri': 77, 'ID': 5012 };</script>
</article>
</body></html>"#;

    const LIST_RESPONSE: &str = r#"<select id="menu_chap_bot">
  <option value="5013">Chapter 13</option>
  <option value="5012">Chapter 12</option>
  <option value="5011">Chapter 11</option>
</select>"#;

    #[test]
    fn extracts_chapter_content_and_post_id() {
        let doc = Html::parse_document(CHAPTER_PAGE);
        let chapter = KolnovelExtractor
            .extract_chapter_data(&doc, Some("https://kolnovel.com/c-12/"))
            .expect("chapter");

        assert_eq!(chapter.id, ChapterIdentifier::Numeric(5012));
        assert_eq!(chapter.title, "Chapter 12 - The Gate");
        assert_eq!(chapter.url, "https://kolnovel.com/c-12/");
        assert!(chapter.content.starts_with("<p>First line.</p>"));
        assert!(chapter.content.ends_with("<p>Second <em>line</em>.</p>"));
        assert!(!chapter.content.contains("track()"));
        assert!(!chapter.content.contains("nbsp"));
        assert!(!chapter.content.contains("class="));
    }

    #[test]
    fn missing_content_container_is_none() {
        let doc = Html::parse_document("<article id=\"post-1\"></article>");
        assert!(KolnovelExtractor.extract_chapter_data(&doc, None).is_none());
    }

    #[test]
    fn chapter_list_is_ascending() {
        let doc = Html::parse_document(LIST_RESPONSE);
        let meta = KolnovelExtractor
            .extract_chapters_meta_data(&doc, Some(&ChapterIdentifier::Numeric(5012)))
            .expect("metadata");

        assert!(!meta.is_grouped);
        let chapters = &meta.volumes[0].chapters;
        let ids = chapters.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids, vec![
            ChapterIdentifier::Numeric(5011),
            ChapterIdentifier::Numeric(5012),
            ChapterIdentifier::Numeric(5013),
        ]);
        assert!(chapters[1].is_default_selected);
        assert!(chapters.iter().all(|c| c.link.is_none()));
    }

    #[test]
    fn missing_select_is_none() {
        let doc = Html::parse_document("<div></div>");
        assert!(KolnovelExtractor.extract_chapters_meta_data(&doc, None).is_none());
    }

    #[test]
    fn reads_novel_info_from_inline_script() {
        let doc = Html::parse_document(CHAPTER_PAGE);
        assert_eq!(
            KolnovelExtractor.novel_info(&doc),
            Some(NovelInfo { seri: 77, id: 5012 })
        );
    }
}
