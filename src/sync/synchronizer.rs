use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::diff::diff;
use super::render::ArtifactRenderer;
use super::snapshot::{Snapshot, SnapshotEntry};
use crate::error::{ArchiveError, Result};
use crate::state::data::FileRecord;

/// How an artifact file is named after its source record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactNaming {
    /// `<id>.<ext>` regardless of the source, e.g. thumbnails
    FixedExtension(String),
    /// `<id>.<source extension>`, e.g. album member copies
    SourceExtension,
}

/// One derived-artifact target: the thumbnail set or one album.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub name: String,
    /// Where source files live (`files/`)
    pub source_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub naming: ArtifactNaming,
}

impl SyncTarget {
    pub fn artifact_name(&self, id: &str, filename: &str) -> String {
        match &self.naming {
            ArtifactNaming::FixedExtension(ext) => format!("{id}.{ext}"),
            ArtifactNaming::SourceExtension => match Path::new(filename).extension() {
                Some(ext) => format!("{id}.{}", ext.to_string_lossy().to_lowercase()),
                None => id.to_string(),
            },
        }
    }

    pub fn artifact_path(&self, id: &str, filename: &str) -> PathBuf {
        self.artifact_dir.join(self.artifact_name(id, filename))
    }

    /// Hidden scratch file a render writes before it is moved into place
    fn partial_path(&self, id: &str, filename: &str) -> PathBuf {
        self.artifact_dir
            .join(format!(".{}.partial", self.artifact_name(id, filename)))
    }
}

/// Outcome of one synchronization run
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Ids whose artifact was created or regenerated
    pub rendered: Vec<String>,
    /// Ids whose artifact was deleted
    pub removed: Vec<String>,
    /// Per-item failures; their snapshot entries were left untouched
    pub failed: Vec<ArchiveError>,
    pub snapshot_written: bool,
    /// The snapshot as it stands after the run
    pub snapshot: Snapshot,
}

impl SyncReport {
    /// Nothing was applied (failures may still have been reported)
    pub fn is_noop(&self) -> bool {
        self.rendered.is_empty() && self.removed.is_empty()
    }
}

/// Keeps the artifacts of one target consistent with a live item list.
pub struct Synchronizer<R> {
    target: SyncTarget,
    renderer: R,
}

impl<R: ArtifactRenderer> Synchronizer<R> {
    pub fn new(target: SyncTarget, renderer: R) -> Self {
        Self { target, renderer }
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// Reconcile artifacts with `current`.
    ///
    /// Removals are applied before additions. A render failure skips that
    /// item and keeps its old snapshot entry (or its absence) for a retry.
    /// The snapshot is rewritten only if something was applied.
    pub fn run(&self, current: &[FileRecord]) -> Result<SyncReport> {
        fs::create_dir_all(&self.target.artifact_dir)?;

        let mut snapshot = Snapshot::load(&self.target.snapshot_path)?;
        let changes = diff(current, &snapshot.entries);
        let mut report = SyncReport::default();

        if changes.is_empty() {
            info!(target_name = %self.target.name, "no changes");
            report.snapshot = snapshot;
            return Ok(report);
        }

        for id in &changes.removed_ids {
            let Some(entry) = snapshot.entries.get(id) else {
                continue;
            };
            let path = self.target.artifact_path(id, &entry.filename);
            match remove_if_present(&path) {
                Ok(()) => {
                    println!("Delete => {}", path.display());
                    snapshot.entries.remove(id);
                    report.removed.push(id.clone());
                }
                Err(e) => {
                    warn!(id = %id, path = %path.display(), error = %e, "cannot delete artifact");
                    report.failed.push(ArchiveError::Storage(format!(
                        "{}: {e}",
                        path.display()
                    )));
                }
            }
        }

        let mut pending = changes.added_or_changed;
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        for record in pending {
            match self.render_one(record) {
                Ok(path) => {
                    println!("Create => {}", path.display());
                    snapshot
                        .entries
                        .insert(record.id.clone(), SnapshotEntry::from(record));
                    report.rendered.push(record.id.clone());
                }
                Err(err) => {
                    warn!(id = %record.id, error = %err, "render failed, will retry next run");
                    report.failed.push(err);
                }
            }
        }

        if !report.is_noop() {
            snapshot.save(&self.target.snapshot_path)?;
            println!("Update => {}", self.target.snapshot_path.display());
            report.snapshot_written = true;
        }
        report.snapshot = snapshot;
        Ok(report)
    }

    fn render_one(&self, record: &FileRecord) -> Result<PathBuf> {
        let source = self.target.source_dir.join(&record.filename);
        let partial = self.target.partial_path(&record.id, &record.filename);
        let dest = self.target.artifact_path(&record.id, &record.filename);

        let rendered = self
            .renderer
            .render(&source, &partial)
            .map_err(|e| e.to_string())
            .and_then(|()| fs::rename(&partial, &dest).map_err(|e| e.to_string()));

        match rendered {
            Ok(()) => Ok(dest),
            Err(reason) => {
                let _ = remove_if_present(&partial);
                Err(ArchiveError::Render {
                    id: record.id.clone(),
                    reason: format!("{}: {reason}", record.filename),
                })
            }
        }
    }

    /// Delete every file in the artifact directory that the snapshot does
    /// not account for (leftovers of crashed runs, stray copies).
    pub fn sweep_orphans(&self) -> Result<Vec<PathBuf>> {
        let snapshot = Snapshot::load(&self.target.snapshot_path)?;
        let known: HashSet<String> = snapshot
            .entries
            .iter()
            .map(|(id, entry)| self.target.artifact_name(id, &entry.filename))
            .collect();

        let mut deleted = Vec::new();
        if !self.target.artifact_dir.exists() {
            return Ok(deleted);
        }

        for entry in WalkDir::new(&self.target.artifact_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
        {
            let entry = entry.map_err(|e| ArchiveError::Storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if known.contains(&*name) {
                continue;
            }
            let path = entry.path().to_path_buf();
            remove_if_present(&path)?;
            println!("Delete => {}", path.display());
            deleted.push(path);
        }

        debug!(target_name = %self.target.name, deleted = deleted.len(), "orphan sweep done");
        Ok(deleted)
    }
}

/// Idempotent delete: a missing file is not an error
fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
