/// Album definitions
///
/// An album is a named subset of the registry described by an info file.
/// Its members are copied under `albums/<name>/files/` by the
/// synchronizer, and `albums/<name>/files.json` lists them for the
/// static album page.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::config::Paths;
use crate::error::{ArchiveError, Result};
use crate::identity::{check_filename, check_keyword};
use crate::state::cache::Cache;
use crate::state::data::FileRecord;
use crate::state::filter::{sort_records, OrderBy, RecordFilter};
use crate::sync::snapshot::Snapshot;
use crate::sync::synchronizer::{ArtifactNaming, SyncTarget};

/// Name of the album index consumed by the album page
pub const INDEX_FILE: &str = "files.json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlbumKind {
    /// Photo album, images only
    #[default]
    Pictures,
    /// Document previews (text and PDF)
    Documents,
}

/// Contents of an album info file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AlbumInfo {
    pub name: String,
    pub kind: AlbumKind,
    /// Explicit members; when set, every other criterion is ignored
    pub ids: Vec<String>,
    pub label: String,
    pub notes: String,
    pub keywords: Vec<String>,
    pub collections: Vec<String>,
    pub albums: Vec<String>,
    /// true: union of the non-empty fields; false: intersection
    pub union: bool,
    pub orderby: OrderBy,
    /// Ignored when `ids` is set (the order of `ids` wins)
    pub ascending: bool,
}

impl Default for AlbumInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: AlbumKind::default(),
            ids: Vec::new(),
            label: String::new(),
            notes: String::new(),
            keywords: Vec::new(),
            collections: Vec::new(),
            albums: Vec::new(),
            union: true,
            orderby: OrderBy::Utime,
            ascending: false,
        }
    }
}

impl AlbumInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| ArchiveError::Config(format!("{}: {e}", path.display())))?;
        let info: AlbumInfo = serde_json::from_str(&data)
            .map_err(|e| ArchiveError::Config(format!("{}: {e}", path.display())))?;
        info.check()?;
        Ok(info)
    }

    /// Write an empty album info file; never overwrites
    pub fn write_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(ArchiveError::Config(format!("file exists: {}", path.display())));
        }
        fs::write(path, serde_json::to_string_pretty(&AlbumInfo::default())?)?;
        Ok(())
    }

    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ArchiveError::Config("album name must not be empty".into()));
        }
        check_filename(&self.name)?;
        for word in self
            .keywords
            .iter()
            .chain(&self.collections)
            .chain(&self.albums)
        {
            check_keyword(word)?;
        }
        Ok(())
    }

    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            label: self.label.clone(),
            notes: self.notes.clone(),
            keywords: self.keywords.clone(),
            collections: self.collections.clone(),
            albums: self.albums.clone(),
            union: self.union,
        }
    }

    fn accepts(&self, record: &FileRecord) -> bool {
        match self.kind {
            AlbumKind::Pictures => record.is_image(),
            AlbumKind::Documents => record.is_document(),
        }
    }

    /// Current members of the album, in display order
    pub fn select_members(&self, cache: &Cache) -> Vec<FileRecord> {
        if !self.ids.is_empty() {
            return self
                .ids
                .iter()
                .filter_map(|id| {
                    let found = cache.get(id);
                    if found.is_none() {
                        warn!(album = %self.name, id = %id, "album id not in registry");
                    }
                    found
                })
                .filter(|r| self.accepts(r))
                .cloned()
                .collect();
        }

        let mut members: Vec<&FileRecord> = self
            .filter()
            .select(cache.iter())
            .into_iter()
            .filter(|r| self.accepts(r))
            .collect();
        sort_records(&mut members, self.orderby, self.ascending);
        members.into_iter().cloned().collect()
    }

    pub fn target(&self, paths: &Paths) -> SyncTarget {
        let dir = paths.album(&self.name);
        SyncTarget {
            name: format!("album {}", self.name),
            source_dir: paths.files(),
            artifact_dir: dir.join("files"),
            snapshot_path: dir.join("snapshot.msgp"),
            naming: ArtifactNaming::SourceExtension,
        }
    }
}

#[derive(Serialize)]
struct IndexEntry<'a> {
    #[serde(flatten)]
    record: &'a FileRecord,
    /// Path of the member copy, relative to the album directory
    src: String,
}

#[derive(Serialize)]
struct AlbumIndex<'a> {
    #[serde(flatten)]
    info: &'a AlbumInfo,
    files: Vec<IndexEntry<'a>>,
}

/// Rewrite the album index with the members that have a synced copy.
pub fn write_index(
    info: &AlbumInfo,
    members: &[FileRecord],
    snapshot: &Snapshot,
    target: &SyncTarget,
) -> Result<()> {
    let files = members
        .iter()
        .filter(|r| snapshot.entries.contains_key(&r.id))
        .map(|record| IndexEntry {
            record,
            src: format!("files/{}", target.artifact_name(&record.id, &record.filename)),
        })
        .collect();

    let index = AlbumIndex { info, files };
    let Some(dir) = target.artifact_dir.parent() else {
        return Err(ArchiveError::Config("album directory has no parent".into()));
    };
    let path = dir.join(INDEX_FILE);
    fs::write(&path, serde_json::to_string_pretty(&index)?)?;
    println!("Write => {}", path.display());
    Ok(())
}
