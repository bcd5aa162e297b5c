/// Thumbnail and album commands
///
/// Both drive a [`Synchronizer`] over a subset of the cache; they differ
/// only in the target layout and the renderer.
use std::path::Path;
use tracing::{info, warn};

use super::Project;
use crate::album::{write_index, AlbumInfo, INDEX_FILE};
use crate::error::{ArchiveError, Result};
use crate::state::data::FileRecord;
use crate::sync::render::{ArtifactRenderer, CopyRenderer, ThumbnailRenderer};
use crate::sync::synchronizer::{ArtifactNaming, SyncReport, SyncTarget, Synchronizer};

fn thumbs_target(project: &Project) -> SyncTarget {
    SyncTarget {
        name: "thumbnails".into(),
        source_dir: project.paths.files(),
        artifact_dir: project.paths.thumbs(),
        snapshot_path: project.paths.thumbs_snapshot(),
        naming: ArtifactNaming::FixedExtension("jpg".into()),
    }
}

fn thumbs_synchronizer(project: &Project) -> Synchronizer<ThumbnailRenderer> {
    let (width, height) = project.config.thumb_size;
    Synchronizer::new(thumbs_target(project), ThumbnailRenderer { width, height })
}

fn print_report(report: &SyncReport) {
    if report.is_noop() && report.failed.is_empty() {
        println!("Nothing to do.");
        return;
    }
    println!(
        "rendered: {}, removed: {}, failed: {}, tracked: {}",
        report.rendered.len(),
        report.removed.len(),
        report.failed.len(),
        report.snapshot.len()
    );
    for err in &report.failed {
        println!("Failed: {err}");
    }
}

fn run_sync<R: ArtifactRenderer>(
    sync: &Synchronizer<R>,
    members: &[FileRecord],
    sweep: bool,
) -> Result<SyncReport> {
    let report = sync.run(members)?;
    print_report(&report);
    if sweep {
        let deleted = sync.sweep_orphans()?;
        info!(target_name = %sync.target().name, deleted = deleted.len(), "swept");
    }
    Ok(report)
}

/// Bring `webpages/thumbs/` in line with the image records.
pub fn thumbs(project: &Project, sweep: bool) -> Result<SyncReport> {
    let images: Vec<FileRecord> = project.cache.iter().filter(|r| r.is_image()).cloned().collect();
    run_sync(&thumbs_synchronizer(project), &images, sweep)
}

/// Write an album info template
pub fn album_new(path: &Path) -> Result<()> {
    AlbumInfo::write_template(path)?;
    println!("Create => {}", path.display());
    Ok(())
}

/// Copy the album's current members under `albums/<name>/files/` and
/// refresh its index.
pub fn album_sync(project: &Project, info_file: &Path, sweep: bool) -> Result<SyncReport> {
    let info = AlbumInfo::load(info_file)?;
    if info.ids.is_empty() && info.filter().is_empty() {
        return Err(ArchiveError::Config(format!(
            "album {} selects nothing, set ids or a filter field",
            info.name
        )));
    }

    let members = info.select_members(&project.cache);
    let target = info.target(&project.paths);
    let sync = Synchronizer::new(target.clone(), CopyRenderer);
    let report = run_sync(&sync, &members, sweep)?;
    if report.snapshot.is_empty() && !members.is_empty() {
        warn!(album = %info.name, "no member could be copied");
    }

    let index = project.paths.album(&info.name).join(INDEX_FILE);
    // Ordering and metadata may change without touching the copies
    write_index(&info, &members, &report.snapshot, &target)?;
    info!(album = %info.name, members = members.len(), index = %index.display(), "album synced");
    Ok(report)
}
