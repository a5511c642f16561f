use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::extractor::Site;
use crate::fetch::DEFAULT_USER_AGENT;
use crate::session::SessionConfig;
use crate::surface::OutputFormat;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read from a chapter page onward, loading chapters one after another.
    Read(ReadArgs),
    /// Print the volume/chapter tree of the novel a chapter page belongs to.
    Toc(TocArgs),
    /// Print a single extracted chapter.
    Chapter(ChapterArgs),
    /// Per-host reader setting.
    Reader {
        #[command(subcommand)]
        command: ReaderCommand,
    },
}

#[derive(Debug, Args)]
pub struct SiteArgs {
    /// Chapter page URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Extractor to use instead of detecting one from the URL host.
    #[arg(long, value_enum)]
    pub site: Option<Site>,

    /// User agent sent with every request.
    #[arg(long, env = "NOVELSCROLL_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Per-request timeout. Unset leaves timeouts to the network stack.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl SiteArgs {
    pub fn start_url(&self) -> anyhow::Result<url::Url> {
        let url = url::Url::parse(&self.url).context("parse --url")?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("--url must be http/https: {url}");
        }
        Ok(url)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.site, self.user_agent.clone(), self.timeout_secs)
    }
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    /// Number of chapters to load after the start page.
    #[arg(long, default_value_t = 1)]
    pub chapters: usize,

    /// Output file for the reading stream (default: stdout).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Output format of the reading stream.
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Progress file recording the last chapter read and reader settings.
    #[arg(long, env = "NOVELSCROLL_PROGRESS")]
    pub progress: Option<PathBuf>,

    /// Load the next chapter when fewer than this many pixels remain below
    /// the viewport.
    #[arg(long, default_value_t = crate::scroll::DEFAULT_THRESHOLD_PX)]
    pub threshold_px: f64,

    /// Minimum delay between two scroll triggers.
    #[arg(long, default_value_t = 1000)]
    pub cooldown_ms: u64,

    /// Stop after this many failed or duplicate loads.
    #[arg(long, default_value_t = 3)]
    pub max_failures: usize,
}

#[derive(Debug, Args)]
pub struct TocArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    /// Print the tree as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChapterFormat {
    Markdown,
    Html,
    Json,
}

#[derive(Debug, Args)]
pub struct ChapterArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    #[arg(long, value_enum, default_value_t = ChapterFormat::Markdown)]
    pub format: ChapterFormat,
}

#[derive(Debug, Subcommand)]
pub enum ReaderCommand {
    Enable(ReaderArgs),
    Disable(ReaderArgs),
    Status(ReaderArgs),
}

#[derive(Debug, Args)]
pub struct ReaderArgs {
    /// Site host, e.g. `kolnovel.com`.
    #[arg(long)]
    pub host: String,

    /// Progress file holding reader settings.
    #[arg(long, env = "NOVELSCROLL_PROGRESS")]
    pub progress: PathBuf,
}
