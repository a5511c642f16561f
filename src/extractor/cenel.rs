//! cenele.com: WordPress Madara theme.
//!
//! Chapter navigation is rendered as `<select>` elements in the reading
//! header. Each option carries the chapter URL in `data-redirect`, which also
//! serves as the chapter identifier in the tree. Novels split into volumes
//! have one chapter select per volume, tied to the volume select through a
//! `for="volume-id-<id>"` attribute.

use std::collections::HashMap;
use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};

use super::{Extractor, selector, text_of};
use crate::model::{ChapterData, ChapterIdentifier, ChapterInfo, ChapterMetaData, VolumeInfo};
use crate::sanitize::sanitize_children;

static BOOKMARK: OnceLock<Selector> = OnceLock::new();
static CURRENT_CHAPTER: OnceLock<Selector> = OnceLock::new();
static HEADING: OnceLock<Selector> = OnceLock::new();
static CONTENT: OnceLock<Selector> = OnceLock::new();
static CHAPTER_SELECTS: OnceLock<Selector> = OnceLock::new();
static VOLUME_SELECT: OnceLock<Selector> = OnceLock::new();
static OPTION: OnceLock<Selector> = OnceLock::new();

const VOLUME_FOR_PREFIX: &str = "volume-id-";

#[derive(Debug, Clone, Copy, Default)]
pub struct CenelExtractor;

impl Extractor for CenelExtractor {
    fn extract_chapter_data(&self, doc: &Html, url: Option<&str>) -> Option<ChapterData> {
        let Some(content) = doc
            .select(selector(
                &CONTENT,
                "div.reading-content > div.text-left > div.text-right",
            ))
            .next()
        else {
            tracing::warn!(url, "cenel: content container not found");
            return None;
        };

        let bookmark_id = doc
            .select(selector(
                &BOOKMARK,
                r#"a.wp-manga-action-button[data-action="bookmark"]"#,
            ))
            .next()
            .and_then(|el| el.value().attr("data-chapter"))
            .filter(|id| !id.trim().is_empty());
        let current_id = doc
            .select(selector(&CURRENT_CHAPTER, "#wp-manga-current-chap"))
            .next()
            .and_then(|el| el.value().attr("data-id"))
            .filter(|id| !id.trim().is_empty());
        let id = bookmark_id.or(current_id).or(url)?;

        let title = doc
            .select(selector(&HEADING, "#chapter-heading"))
            .next()
            .map(text_of)
            .unwrap_or_default();

        Some(ChapterData {
            id: ChapterIdentifier::from(id.trim()),
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
        let chapter_selects = doc
            .select(selector(
                &CHAPTER_SELECTS,
                "#manga-reading-nav-head select.selectpicker_chapter",
            ))
            .collect::<Vec<_>>();
        let volume_select = doc
            .select(selector(
                &VOLUME_SELECT,
                "#manga-reading-nav-head select.volume-select",
            ))
            .next();

        let Some(volume_select) = volume_select else {
            let first = chapter_selects.first()?;
            return Some(ChapterMetaData::flat(
                "default-volume",
                parse_chapter_select(*first, current, true),
            ));
        };

        let by_volume = chapter_selects
            .iter()
            .filter_map(|select| {
                let volume_id = select.value().attr("for")?.strip_prefix(VOLUME_FOR_PREFIX)?;
                Some((volume_id.to_owned(), *select))
            })
            .collect::<HashMap<_, _>>();

        // Volumes are listed newest first, like chapters.
        let volumes = options_of(volume_select)
            .into_iter()
            .rev()
            .filter_map(|option| {
                let volume_id = option.value().attr("value")?.trim();
                let chapter_select = by_volume.get(volume_id)?;
                let volume_selected = option.value().attr("selected").is_some();
                Some(VolumeInfo {
                    id: Some(ChapterIdentifier::from(volume_id)),
                    title: text_of(option),
                    chapters: parse_chapter_select(*chapter_select, current, volume_selected),
                })
            })
            .collect();

        Some(ChapterMetaData {
            is_grouped: true,
            volumes,
        })
    }
}

fn options_of(select: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    select.select(selector(&OPTION, "option")).collect()
}

/// Parses one chapter select into ascending order.
///
/// Every per-volume select keeps its own `selected` option, so the attribute
/// only counts for the volume that is itself selected. A match on `current`
/// always counts.
fn parse_chapter_select(
    select: ElementRef<'_>,
    current: Option<&ChapterIdentifier>,
    trust_selected: bool,
) -> Vec<ChapterInfo> {
    options_of(select)
        .into_iter()
        .rev()
        .filter_map(|option| {
            let link = option.value().attr("data-redirect")?.trim();
            if link.is_empty() {
                return None;
            }
            let id = ChapterIdentifier::from(link);
            let selected = trust_selected && option.value().attr("selected").is_some();
            Some(ChapterInfo {
                is_default_selected: selected || current == Some(&id),
                title: text_of(option),
                link: Some(link.to_owned()),
                id,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{chapter_at, default_selected_index};

    const FLAT_PAGE: &str = r#"<!doctype html>
<html><body>
<div id="manga-reading-nav-head">
  <select class="selectpicker_chapter">
    <option data-redirect="https://cenele.com/novel/n/ch-3/">الفصل 3</option>
    <option data-redirect="https://cenele.com/novel/n/ch-2/" selected="selected">الفصل 2</option>
    <option data-redirect="https://cenele.com/novel/n/ch-1/">الفصل 1</option>
    <option>broken</option>
  </select>
</div>
<h1 id="chapter-heading">الفصل 2</h1>
<a class="wp-manga-action-button" data-action="bookmark" data-chapter="9002">bookmark</a>
<div class="reading-content"><div class="text-left"><div class="text-right">
  <p>نص الفصل</p>
  <p><span></span></p>
  <img src="ad.gif" onload="x()">
</div></div></div>
</body></html>"#;

    const GROUPED_PAGE: &str = r#"<!doctype html>
<html><body>
<div id="manga-reading-nav-head">
  <select class="volume-select">
    <option value="12">Volume 2</option>
    <option value="11" selected>Volume 1</option>
  </select>
  <select class="selectpicker_chapter" for="volume-id-11">
    <option data-redirect="https://cenele.com/n/v1-c2/" selected>V1 C2</option>
    <option data-redirect="https://cenele.com/n/v1-c1/">V1 C1</option>
  </select>
  <select class="selectpicker_chapter" for="volume-id-12">
    <option data-redirect="https://cenele.com/n/v2-c3/">V2 C3</option>
    <option data-redirect="https://cenele.com/n/v2-c2/">V2 C2</option>
    <option data-redirect="https://cenele.com/n/v2-c1/" selected>V2 C1</option>
  </select>
</div>
</body></html>"#;

    #[test]
    fn extracts_chapter_with_bookmark_id() {
        let doc = Html::parse_document(FLAT_PAGE);
        let chapter = CenelExtractor
            .extract_chapter_data(&doc, Some("https://cenele.com/novel/n/ch-2/"))
            .expect("chapter");

        assert_eq!(chapter.id, ChapterIdentifier::from("9002"));
        assert_eq!(chapter.title, "الفصل 2");
        assert_eq!(chapter.content, "<p>نص الفصل</p>");
    }

    #[test]
    fn falls_back_to_url_for_id() {
        let doc = Html::parse_document(
            r#"<div class="reading-content"><div class="text-left"><div class="text-right"><p>x</p></div></div></div>"#,
        );
        let chapter = CenelExtractor
            .extract_chapter_data(&doc, Some("https://cenele.com/n/c/"))
            .expect("chapter");
        assert_eq!(chapter.id, ChapterIdentifier::from("https://cenele.com/n/c/"));
    }

    #[test]
    fn empty_bookmark_falls_through_to_current_chapter_id() {
        let doc = Html::parse_document(
            r#"<a class="wp-manga-action-button" data-action="bookmark" data-chapter="">bookmark</a>
<input type="hidden" id="wp-manga-current-chap" data-id="9005">
<div class="reading-content"><div class="text-left"><div class="text-right"><p>x</p></div></div></div>"#,
        );
        let chapter = CenelExtractor
            .extract_chapter_data(&doc, Some("https://cenele.com/n/c/"))
            .expect("chapter");
        assert_eq!(chapter.id, ChapterIdentifier::from("9005"));
    }

    #[test]
    fn missing_content_is_none() {
        let doc = Html::parse_document(r#"<div class="reading-content"></div>"#);
        assert!(CenelExtractor.extract_chapter_data(&doc, Some("u")).is_none());
    }

    #[test]
    fn flat_list_is_ascending_with_links() {
        let doc = Html::parse_document(FLAT_PAGE);
        let meta = CenelExtractor
            .extract_chapters_meta_data(&doc, None)
            .expect("metadata");

        assert!(!meta.is_grouped);
        let titles = meta.volumes[0]
            .chapters
            .iter()
            .map(|c| c.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["الفصل 1", "الفصل 2", "الفصل 3"]);
        assert_eq!(default_selected_index(&meta), 1);
        assert_eq!(
            chapter_at(&meta, 2).and_then(|c| c.link.as_deref()),
            Some("https://cenele.com/novel/n/ch-3/")
        );
    }

    #[test]
    fn grouped_volumes_are_ascending_and_only_selected_volume_marks_current() {
        let doc = Html::parse_document(GROUPED_PAGE);
        let meta = CenelExtractor
            .extract_chapters_meta_data(&doc, None)
            .expect("metadata");

        assert!(meta.is_grouped);
        let titles = meta
            .volumes
            .iter()
            .map(|v| v.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Volume 1", "Volume 2"]);
        assert_eq!(
            chapter_at(&meta, 2).map(|c| c.title.as_str()),
            Some("V2 C1")
        );
        assert_eq!(default_selected_index(&meta), 1);
        assert!(!meta.volumes[1].chapters[0].is_default_selected);
    }

    #[test]
    fn current_identifier_marks_selection() {
        let doc = Html::parse_document(GROUPED_PAGE);
        let current = ChapterIdentifier::from("https://cenele.com/n/v2-c2/");
        let meta = CenelExtractor
            .extract_chapters_meta_data(&doc, Some(&current))
            .expect("metadata");
        assert!(meta.volumes[1].chapters[1].is_default_selected);
    }

    #[test]
    fn page_without_navigation_is_none() {
        let doc = Html::parse_document("<div id=\"manga-reading-nav-head\"></div>");
        assert!(CenelExtractor.extract_chapters_meta_data(&doc, None).is_none());
    }
}
