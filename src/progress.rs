//! Local reading progress and per-site reader settings, kept in one JSON
//! file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRead {
    pub url: String,
    pub title: String,
    pub global_index: usize,
    pub total_chapters: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Site key -> reader enabled. Sites not listed are enabled.
    #[serde(default)]
    pub reader_enabled: BTreeMap<String, bool>,
    /// Novel key -> last chapter shown.
    #[serde(default)]
    pub last_read: BTreeMap<String, LastRead>,
}

#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> anyhow::Result<Progress> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Progress::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read: {}", self.path.display()));
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parse progress json: {}", self.path.display()))
    }

    pub async fn save(&self, progress: &Progress) -> anyhow::Result<()> {
        write_json_atomic(&self.path, progress).await
    }

    pub async fn reader_enabled(&self, site: &str) -> anyhow::Result<bool> {
        let progress = self.load().await?;
        Ok(progress.reader_enabled.get(site).copied().unwrap_or(true))
    }

    pub async fn set_reader_enabled(&self, site: &str, enabled: bool) -> anyhow::Result<()> {
        let mut progress = self.load().await?;
        progress.reader_enabled.insert(site.to_owned(), enabled);
        self.save(&progress).await
    }

    pub async fn last_read(&self, novel_key: &str) -> anyhow::Result<Option<LastRead>> {
        let progress = self.load().await?;
        Ok(progress.last_read.get(novel_key).cloned())
    }

    pub async fn record(&self, novel_key: &str, entry: LastRead) -> anyhow::Result<()> {
        let mut progress = self.load().await?;
        progress.last_read.insert(novel_key.to_owned(), entry);
        self.save(&progress).await
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
