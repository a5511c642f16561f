use anyhow::Context as _;

use crate::cli::{ChapterArgs, ChapterFormat};
use crate::fetch::{HttpClient, extract_chapter};
use crate::model::ChapterData;
use crate::surface::{OutputFormat, ReaderSurface as _, TerminalSurface};

/// Fetches one chapter page and prints the chapter it shows. Unlike `read`,
/// no chapter list is needed.
pub async fn run(args: ChapterArgs) -> anyhow::Result<()> {
    let url = args.site.start_url()?;
    let config = args.site.session_config();
    let site = config.site_for(&url)?;

    let http = HttpClient::new(&config.fetch)?;
    let body = http.get_html(url.as_str()).await?;
    let chapter = extract_chapter(site.extractor().as_ref(), &body, url.as_str())?;
    tracing::debug!(id = %chapter.id, title = %chapter.title, "chapter extracted");

    write_chapter(std::io::stdout(), &chapter, args.format)
}

pub fn write_chapter(
    mut out: impl std::io::Write + Send,
    chapter: &ChapterData,
    format: ChapterFormat,
) -> anyhow::Result<()> {
    let format = match format {
        ChapterFormat::Json => {
            serde_json::to_writer_pretty(&mut out, chapter).context("serialize chapter")?;
            writeln!(out).context("write chapter")?;
            return Ok(());
        }
        ChapterFormat::Markdown => OutputFormat::Markdown,
        ChapterFormat::Html => OutputFormat::Html,
    };
    let mut surface = TerminalSurface::new(out, format);
    surface.append_chapter(chapter);
    match surface.write_error() {
        Some(err) => anyhow::bail!("{err}"),
        None => Ok(()),
    }
}
