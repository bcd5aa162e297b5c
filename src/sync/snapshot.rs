/// Persisted state of one derived-artifact target.
///
/// A snapshot maps id -> (checksum, filename) and is replaced wholesale:
/// the new blob is written to a temp file next to the old one and renamed
/// over it, so readers see either the old or the new snapshot.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use super::diff::Checksummed;
use crate::error::{ArchiveError, Result};
use crate::state::data::FileRecord;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub checksum: String,
    /// Needed to find artifacts named after the source extension
    pub filename: String,
}

impl From<&FileRecord> for SnapshotEntry {
    fn from(record: &FileRecord) -> Self {
        Self {
            checksum: record.checksum.clone(),
            filename: record.filename.clone(),
        }
    }
}

impl Checksummed for SnapshotEntry {
    fn checksum(&self) -> &str {
        &self.checksum
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub entries: BTreeMap<String, SnapshotEntry>,
}

impl Snapshot {
    /// Load the snapshot at `path`; a missing file is an empty snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot yet");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ArchiveError::Storage(format!("{}: {e}", path.display())));
            }
        };
        Ok(rmp_serde::from_slice(&data)?)
    }

    /// Atomically replace the snapshot at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let blob = rmp_serde::to_vec_named(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&blob)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;

        debug!(path = %path.display(), entries = self.entries.len(), "snapshot written");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
