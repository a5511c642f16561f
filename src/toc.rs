use std::fmt::Write as _;

use anyhow::Context as _;

use crate::cli::TocArgs;
use crate::metadata::{ChapterIndex, initial_position};
use crate::session;

pub async fn run(args: TocArgs) -> anyhow::Result<()> {
    let url = args.site.start_url()?;
    let launched = session::launch(&args.site.session_config(), &url)
        .await
        .context("launch session")?;

    if args.json {
        let json = serde_json::to_string_pretty(launched.index.meta())
            .context("serialize chapter metadata")?;
        println!("{json}");
        return Ok(());
    }

    let current = initial_position(
        launched.index.meta(),
        &launched.initial.id,
        &launched.initial.url,
    );
    print!("{}", render(&launched.index, current));
    Ok(())
}

/// One line per chapter, `[global index] title`, with `*` marking `current`.
/// Grouped trees get a header line per volume.
pub fn render(index: &ChapterIndex, current: usize) -> String {
    let meta = index.meta();
    let mut out = String::new();
    for (v, volume) in meta.volumes.iter().enumerate() {
        let indent = if meta.is_grouped {
            let _ = writeln!(out, "{}", volume.title);
            "  "
        } else {
            ""
        };
        for (local, chapter) in volume.chapters.iter().enumerate() {
            let Some(global) = index.global_index(v, local) else {
                continue;
            };
            let marker = if global == current { '*' } else { ' ' };
            let _ = writeln!(out, "{indent}{marker} [{global}] {}", chapter.title);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChapterIdentifier, ChapterInfo, ChapterMetaData, VolumeInfo};

    fn chapter(id: u64) -> ChapterInfo {
        ChapterInfo {
            id: ChapterIdentifier::Numeric(id),
            title: format!("Chapter {id}"),
            link: None,
            is_default_selected: false,
        }
    }

    #[test]
    fn grouped_tree_shows_volumes_and_marker() {
        let meta = ChapterMetaData {
            is_grouped: true,
            volumes: vec![
                VolumeInfo {
                    id: Some(ChapterIdentifier::Numeric(1)),
                    title: "Volume 1".to_owned(),
                    chapters: vec![chapter(1), chapter(2)],
                },
                VolumeInfo {
                    id: Some(ChapterIdentifier::Numeric(2)),
                    title: "Volume 2".to_owned(),
                    chapters: vec![chapter(3)],
                },
            ],
        };
        let text = render(&ChapterIndex::new(meta), 2);
        assert_eq!(
            text,
            "Volume 1\n    [0] Chapter 1\n    [1] Chapter 2\nVolume 2\n  * [2] Chapter 3\n"
        );
    }

    #[test]
    fn flat_tree_has_no_headers() {
        let meta = ChapterMetaData::flat("v", vec![chapter(1), chapter(2)]);
        let text = render(&ChapterIndex::new(meta), 0);
        assert_eq!(text, "* [0] Chapter 1\n  [1] Chapter 2\n");
    }
}
