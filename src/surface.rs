//! Where loaded chapters go.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ChapterData;
use crate::sanitize::escape;

/// The display side of a reading session. The controller never appends the
/// same chapter twice, so implementations need not de-duplicate.
pub trait ReaderSurface: Send {
    fn append_chapter(&mut self, data: &ChapterData);

    /// Points the reader's location at `url` without reloading anything.
    fn update_history(&mut self, url: &str, title: &str);

    /// Set once an append could not be shown to the reader.
    fn write_error(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Html,
}

/// Writes the reading stream to `out`, one chapter after another.
#[derive(Debug)]
pub struct TerminalSurface<W> {
    out: W,
    format: OutputFormat,
    appended: usize,
    history: Vec<HistoryEntry>,
    write_error: Option<String>,
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            appended: 0,
            history: Vec::new(),
            write_error: None,
        }
    }

    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_chapter(&mut self, data: &ChapterData) -> std::io::Result<()> {
        if self.appended > 0 {
            writeln!(self.out)?;
        }
        match self.format {
            OutputFormat::Markdown => {
                writeln!(self.out, "# {}\n", data.title)?;
                writeln!(self.out, "{}", html2md::parse_html(&data.content).trim())?;
            }
            OutputFormat::Html => {
                writeln!(
                    self.out,
                    "<section class=\"reading-content\" data-id=\"{}\" data-redirect=\"{}\">",
                    escape(&data.id.to_string()),
                    escape(&data.url)
                )?;
                writeln!(self.out, "<h1>{}</h1>", escape(&data.title))?;
                writeln!(self.out, "{}", data.content)?;
                writeln!(self.out, "</section>")?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write + Send> ReaderSurface for TerminalSurface<W> {
    fn append_chapter(&mut self, data: &ChapterData) {
        // Output after a failed write would have a hole in it.
        if self.write_error.is_some() {
            tracing::warn!(id = %data.id, "output closed, chapter dropped");
            return;
        }
        if let Err(err) = self.write_chapter(data) {
            tracing::error!(?err, id = %data.id, "write chapter");
            self.write_error = Some(format!("write chapter {}: {err}", data.id));
            return;
        }
        self.appended += 1;
    }

    fn update_history(&mut self, url: &str, title: &str) {
        tracing::info!(%url, %title, "now reading");
        self.history.push(HistoryEntry {
            url: url.to_owned(),
            title: title.to_owned(),
            at: Utc::now(),
        });
    }

    fn write_error(&self) -> Option<&str> {
        self.write_error.as_deref()
    }
}
