//! Flat addressing over the volume/chapter tree.
//!
//! The global chapter index of `(volume i, chapter j)` is the number of
//! chapters in volumes `0..i` plus `j`.

use crate::model::{ChapterIdentifier, ChapterInfo, ChapterMetaData};

/// Returns the chapter at `global_index`, walking volumes in order.
pub fn chapter_at(meta: &ChapterMetaData, global_index: usize) -> Option<&ChapterInfo> {
    let mut offset = 0_usize;
    for volume in &meta.volumes {
        let len = volume.chapters.len();
        if global_index < offset + len {
            return volume.chapters.get(global_index - offset);
        }
        offset += len;
    }
    None
}

pub fn total_chapters(meta: &ChapterMetaData) -> usize {
    meta.volumes.iter().map(|volume| volume.chapters.len()).sum()
}

/// Global index of the first chapter the host page marked as current, or 0.
pub fn default_selected_index(meta: &ChapterMetaData) -> usize {
    chapters(meta)
        .position(|chapter| chapter.is_default_selected)
        .unwrap_or(0)
}

/// Global index of the chapter whose id (or link) equals `id`.
pub fn position_of(meta: &ChapterMetaData, id: &ChapterIdentifier) -> Option<usize> {
    chapters(meta).position(|chapter| {
        &chapter.id == id
            || matches!(
                (id, chapter.link.as_deref()),
                (ChapterIdentifier::Text(text), Some(link)) if text == link
            )
    })
}

/// Where a session starts: the chapter with `id`, else the chapter linked
/// from `url`, else the page's selected chapter.
pub fn initial_position(meta: &ChapterMetaData, id: &ChapterIdentifier, url: &str) -> usize {
    position_of(meta, id)
        .or_else(|| position_of(meta, &ChapterIdentifier::Text(url.to_owned())))
        .unwrap_or_else(|| default_selected_index(meta))
}

fn chapters(meta: &ChapterMetaData) -> impl Iterator<Item = &ChapterInfo> {
    meta.volumes.iter().flat_map(|volume| volume.chapters.iter())
}

/// An immutable chapter tree with precomputed volume offsets, so lookups do
/// not re-walk the tree.
#[derive(Debug, Clone)]
pub struct ChapterIndex {
    meta: ChapterMetaData,
    // starts[i] is the global index of volume i's first chapter.
    starts: Vec<usize>,
    total: usize,
}

impl ChapterIndex {
    pub fn new(meta: ChapterMetaData) -> Self {
        let mut starts = Vec::with_capacity(meta.volumes.len());
        let mut total = 0_usize;
        for volume in &meta.volumes {
            starts.push(total);
            total += volume.chapters.len();
        }
        Self {
            meta,
            starts,
            total,
        }
    }

    pub fn meta(&self) -> &ChapterMetaData {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// `(volume, local chapter)` position of `global_index`.
    pub fn locate(&self, global_index: usize) -> Option<(usize, usize)> {
        if global_index >= self.total {
            return None;
        }
        // Last volume whose start is <= global_index. Empty volumes share a
        // start with their successor, so skip forward past them.
        let mut volume = match self.starts.binary_search(&global_index) {
            Ok(found) => found,
            Err(insert_at) => insert_at - 1,
        };
        while self.meta.volumes[volume].chapters.is_empty() {
            volume += 1;
        }
        Some((volume, global_index - self.starts[volume]))
    }

    pub fn chapter_at(&self, global_index: usize) -> Option<&ChapterInfo> {
        let (volume, local) = self.locate(global_index)?;
        self.meta.volumes[volume].chapters.get(local)
    }

    pub fn global_index(&self, volume: usize, local: usize) -> Option<usize> {
        let start = *self.starts.get(volume)?;
        (local < self.meta.volumes[volume].chapters.len()).then_some(start + local)
    }
}
