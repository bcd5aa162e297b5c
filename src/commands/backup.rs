/// Incremental backup of a project into a backup project
///
/// The backup registry plays the part of the snapshot: the main records
/// are diffed against it by id and checksum, so only new and changed
/// files are copied. A record whose content is unchanged but whose utime
/// moved only has its metadata copied. Backups are refused while either
/// side has damaged files; `fix` repairs those from the other side.
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{format_size, Project};
use crate::error::{ArchiveError, Result};
use crate::identity::file_checksum;
use crate::state::cache::Cache;
use crate::state::data::{now, FileRecord};
use crate::state::library::RegistryStore;
use crate::sync::diff::diff;

/// Free space kept on the backup volume beyond the bytes to copy
pub const DISK_MARGIN: u64 = 256 * 1024 * 1024;

/// What a backup run changes in the backup project
#[derive(Debug, Default)]
pub struct BackupPlan {
    /// Not in the backup yet
    pub added: Vec<FileRecord>,
    /// Content changed since the last backup
    pub overwritten: Vec<FileRecord>,
    /// Same content, newer metadata
    pub updated: Vec<FileRecord>,
    /// Gone from the main project (backup-side records)
    pub deleted: Vec<FileRecord>,
}

impl BackupPlan {
    /// Classify every main record against the backup registry.
    pub fn new(main: &Cache, backup: &Cache) -> Self {
        let current: Vec<FileRecord> = main.records().into_iter().cloned().collect();
        let previous: BTreeMap<String, FileRecord> = backup
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();
        let changes = diff(&current, &previous);

        let mut plan = BackupPlan::default();
        for record in changes.added_or_changed {
            if previous.contains_key(&record.id) {
                plan.overwritten.push(record.clone());
            } else {
                plan.added.push(record.clone());
            }
        }
        plan.deleted = changes
            .removed_ids
            .iter()
            .filter_map(|id| previous.get(id).cloned())
            .collect();
        plan.updated = current
            .iter()
            .filter(|r| {
                previous
                    .get(&r.id)
                    .is_some_and(|old| old.checksum == r.checksum && old.utime != r.utime)
            })
            .cloned()
            .collect();
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.overwritten.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
    }

    /// Bytes written to the backup volume by this plan
    pub fn bytes_to_copy(&self) -> u64 {
        self.added.iter().chain(&self.overwritten).map(|r| r.size).sum()
    }

    fn print(&self) {
        println!(
            "add: {}, overwrite: {}, update: {}, delete: {} ({} to copy)",
            self.added.len(),
            self.overwritten.len(),
            self.updated.len(),
            self.deleted.len(),
            format_size(self.bytes_to_copy())
        );
    }
}

struct ProjectStatus {
    files: usize,
    total_size: u64,
    damaged: usize,
}

impl ProjectStatus {
    fn of(project: &Project) -> Self {
        Self {
            files: project.cache.len(),
            total_size: project.cache.iter().map(|r| r.size).sum(),
            damaged: project.cache.iter().filter(|r| r.damaged).count(),
        }
    }

    fn print(&self, title: &str, project: &Project) {
        println!("{title:<10}{}", project.paths.files().display());
        println!("{:<10}{}", "files", self.files);
        println!("{:<10}{}", "size", format_size(self.total_size));
        println!("{:<10}{}", "damaged", self.damaged);
        println!("{:<10}{}", "backup at", project.config.last_backup_at);
    }
}

/// Print the registered backup projects, numbered from 1
pub fn list_backups(project: &Project) {
    if project.config.backups.is_empty() {
        println!("No backup projects, add one with `wuliu backup --register <dir>`");
        return;
    }
    for (i, root) in project.config.backups.iter().enumerate() {
        println!("{} {}", i + 1, root.display());
    }
}

/// Remember `root` as a backup project of `project`.
pub fn register(project: &mut Project, root: &Path) -> Result<PathBuf> {
    let root = fs::canonicalize(root)
        .map_err(|e| ArchiveError::Config(format!("{}: {e}", root.display())))?;
    let backup = Project::open(&root)?;
    check_pair(project, &backup)?;
    if project.config.backups.contains(&root) {
        return Err(ArchiveError::Config(format!(
            "already registered: {}",
            root.display()
        )));
    }
    project.config.backups.push(root.clone());
    project.config.save(&project.paths)?;
    println!("Register => {}", root.display());
    Ok(root)
}

/// Open backup project number `n` (1-based)
pub fn select(project: &Project, n: usize) -> Result<Project> {
    let root = n
        .checked_sub(1)
        .and_then(|i| project.config.backups.get(i))
        .ok_or_else(|| {
            ArchiveError::Config(format!("no backup project #{n}, run `wuliu backup` to list them"))
        })?;
    Project::open(root)
}

/// Both projects must carry the same name and only `backup` may be a backup.
fn check_pair(main: &Project, backup: &Project) -> Result<()> {
    if main.config.is_backup {
        return Err(ArchiveError::Config(
            "this is a backup project, run backups from the main project".into(),
        ));
    }
    if !backup.config.is_backup {
        return Err(ArchiveError::Config(format!(
            "not a backup project (is_backup is false): {}",
            backup.paths.project_file().display()
        )));
    }
    if main.config.project_name != backup.config.project_name {
        return Err(ArchiveError::Config(format!(
            "project names differ: '{}' != '{}'",
            main.config.project_name, backup.config.project_name
        )));
    }
    Ok(())
}

pub fn check_disk_space(needed: u64, available: u64) -> Result<()> {
    if needed == 0 || needed.saturating_add(DISK_MARGIN) <= available {
        return Ok(());
    }
    Err(ArchiveError::Config(format!(
        "not enough disk space: need {} (+{} margin), available {}",
        format_size(needed),
        format_size(DISK_MARGIN),
        format_size(available)
    )))
}

/// Copy through a temp file in the destination folder, then rename over `dst`
fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    let dir = dst
        .parent()
        .ok_or_else(|| ArchiveError::Storage(format!("no parent: {}", dst.display())))?;
    let mut from = fs::File::open(src)
        .map_err(|e| ArchiveError::Storage(format!("{}: {e}", src.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    io::copy(&mut from, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dst)?;
    Ok(())
}

/// Show both sides, refuse on damage or lack of space, and with `danger`
/// bring the backup project in line with `main`.
pub fn backup(main: &mut Project, backup: &mut Project, danger: bool) -> Result<BackupPlan> {
    let (main_status, backup_status) = (ProjectStatus::of(main), ProjectStatus::of(backup));
    main_status.print("source", main);
    println!();
    backup_status.print("target", backup);
    println!();

    check_pair(main, backup)?;
    if main_status.damaged + backup_status.damaged > 0 {
        return Err(ArchiveError::Config(
            "damaged files found, repair them (`wuliu backup -n N --fix`) before backing up".into(),
        ));
    }

    let plan = BackupPlan::new(&main.cache, &backup.cache);
    plan.print();
    let available = fs2::available_space(backup.paths.files())?;
    check_disk_space(plan.bytes_to_copy(), available)?;

    if !danger {
        println!("Preview only, add --danger to back up");
        return Ok(plan);
    }
    apply(&plan, main, backup)?;

    main.config.last_backup_at = now();
    main.config.save(&main.paths)?;
    let mut mirrored = main.config.clone();
    mirrored.is_backup = true;
    mirrored.backups = Vec::new();
    mirrored.save(&backup.paths)?;
    backup.config = mirrored;
    println!("Update => {}", backup.paths.project_file().display());
    info!(
        added = plan.added.len(),
        overwritten = plan.overwritten.len(),
        updated = plan.updated.len(),
        deleted = plan.deleted.len(),
        "backup done"
    );
    Ok(plan)
}

fn apply(plan: &BackupPlan, main: &Project, backup: &mut Project) -> Result<()> {
    for r in &plan.deleted {
        let path = backup.paths.files().join(&r.filename);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        backup.library.delete(&r.id)?;
        backup.cache.apply_delete(&r.id);
        println!("Delete => {}", path.display());
    }

    for r in &plan.updated {
        // Integrity state belongs to each copy
        let record = backup.library.update(&r.id, &mut |old| {
            let (checked, damaged) = (old.checked.clone(), old.damaged);
            *old = r.clone();
            old.checked = checked;
            old.damaged = damaged;
        })?;
        backup.cache.apply_update(record);
        debug!(id = %r.id, "metadata copied");
    }

    for r in &plan.overwritten {
        let dst = backup.paths.files().join(&r.filename);
        copy_into(&main.paths.files().join(&r.filename), &dst)?;
        let record = backup.library.update(&r.id, &mut |old| *old = r.clone())?;
        backup.cache.apply_update(record);
        println!("Overwrite => {}", dst.display());
    }

    for r in &plan.added {
        let dst = backup.paths.files().join(&r.filename);
        copy_into(&main.paths.files().join(&r.filename), &dst)?;
        backup.library.insert(r)?;
        backup.cache.apply_insert(r.clone());
        println!("Add => {}", dst.display());
    }
    Ok(())
}

/// Repair damaged files on either side from an intact copy on the other.
/// Returns the ids repaired.
pub fn fix(main: &mut Project, backup: &mut Project) -> Result<Vec<String>> {
    check_pair(main, backup)?;
    let mut fixed = fix_one_way(main, backup)?;
    fixed.extend(fix_one_way(backup, main)?);
    Ok(fixed)
}

fn fix_one_way(damaged_side: &mut Project, good_side: &Project) -> Result<Vec<String>> {
    let damaged: Vec<FileRecord> = damaged_side
        .cache
        .records()
        .into_iter()
        .filter(|r| r.damaged)
        .cloned()
        .collect();
    if damaged.is_empty() {
        println!("No damaged files => {}", damaged_side.paths.files().display());
        return Ok(Vec::new());
    }

    let mut fixed = Vec::new();
    for r in damaged {
        let target = damaged_side.paths.files().join(&r.filename);
        let source = good_side.paths.files().join(&r.filename);
        let intact = source.is_file() && file_checksum(&source)? == r.checksum;
        if !intact {
            println!("Not fixed => {}", target.display());
            continue;
        }
        copy_into(&source, &target)?;
        let checked_at = now();
        let record = damaged_side.library.update(&r.id, &mut |rec| {
            rec.damaged = false;
            rec.checked = checked_at.clone();
        })?;
        damaged_side.cache.apply_update(record);
        println!("Fixed => {} (from {})", target.display(), source.display());
        fixed.push(r.id);
    }
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::files::{add, delete, edit, init, overwrite, verify};
    use crate::commands::testutil::{drop_in_input, project};
    use crate::identity::{derive_checksum, derive_id};
    use crate::state::edit::EditFiles;
    use tempfile::TempDir;

    fn backup_project(name: &str) -> (TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path(), name, true).unwrap();
        let project = Project::open(dir.path()).unwrap();
        (dir, project)
    }

    fn record(name: &str, content: &[u8], utime: &str) -> FileRecord {
        let mut r = FileRecord::new(name);
        r.checksum = derive_checksum(content);
        r.size = content.len() as u64;
        r.utime = utime.into();
        r
    }

    fn ids(records: &[FileRecord]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_plan_classifies_changes() {
        let t1 = "2024-01-01 00:00:00+00:00";
        let t2 = "2024-02-01 00:00:00+00:00";
        let main: Cache = vec![
            record("new.txt", b"n", t1),
            record("changed.txt", b"v2", t2),
            record("tagged.txt", b"t", t2),
            record("same.txt", b"s", t1),
        ]
        .into_iter()
        .collect();
        let backup: Cache = vec![
            record("changed.txt", b"v1", t1),
            record("tagged.txt", b"t", t1),
            record("same.txt", b"s", t1),
            record("gone.txt", b"g", t1),
        ]
        .into_iter()
        .collect();

        let plan = BackupPlan::new(&main, &backup);
        assert_eq!(ids(&plan.added), vec![derive_id("new.txt")]);
        assert_eq!(ids(&plan.overwritten), vec![derive_id("changed.txt")]);
        assert_eq!(ids(&plan.updated), vec![derive_id("tagged.txt")]);
        assert_eq!(ids(&plan.deleted), vec![derive_id("gone.txt")]);
        assert_eq!(plan.bytes_to_copy(), 3);

        assert!(BackupPlan::new(&main, &main).is_empty());
    }

    #[test]
    fn test_disk_space_check() {
        assert!(check_disk_space(0, 0).is_ok());
        assert!(check_disk_space(10, DISK_MARGIN + 10).is_ok());
        assert!(matches!(
            check_disk_space(10, DISK_MARGIN + 9),
            Err(ArchiveError::Config(_))
        ));
    }

    #[test]
    fn test_backup_follows_main_project() {
        let (dir, mut main) = project();
        let (_bk_dir, mut bk) = backup_project("wuliu");
        drop_in_input(&main, "a.txt", b"alpha");
        drop_in_input(&main, "b.txt", b"beta");
        drop_in_input(&main, "c.txt", b"gamma");
        add(&mut main, None, true).unwrap();

        // Preview copies nothing
        backup(&mut main, &mut bk, false).unwrap();
        assert!(bk.cache.is_empty());

        let plan = backup(&mut main, &mut bk, true).unwrap();
        assert_eq!(plan.added.len(), 3);
        assert_eq!(bk.library.count().unwrap(), 3);
        assert_eq!(fs::read(bk.paths.files().join("a.txt")).unwrap(), b"alpha");
        assert!(bk.config.is_backup);
        assert_eq!(bk.config.last_backup_at, main.config.last_backup_at);

        delete(&mut main, &[], &["a.txt".to_string()], true).unwrap();
        drop_in_input(&main, "b.txt", b"beta v2");
        overwrite(&mut main, true).unwrap();
        let cfg = dir.path().join("edit.json");
        let mut e = EditFiles::new(Vec::new(), vec!["c.txt".into()]);
        e.label = "greek".into();
        fs::write(&cfg, e.to_json().unwrap()).unwrap();
        // Keep utime strictly newer than the backed-up one
        std::thread::sleep(std::time::Duration::from_millis(1100));
        edit(&mut main, &cfg, true).unwrap();

        let plan = backup(&mut main, &mut bk, true).unwrap();
        assert_eq!(ids(&plan.deleted), vec![derive_id("a.txt")]);
        assert_eq!(ids(&plan.overwritten), vec![derive_id("b.txt")]);
        assert_eq!(ids(&plan.updated), vec![derive_id("c.txt")]);
        assert!(!bk.paths.files().join("a.txt").exists());
        assert_eq!(fs::read(bk.paths.files().join("b.txt")).unwrap(), b"beta v2");
        assert_eq!(bk.library.select_by_id(&derive_id("c.txt")).unwrap().label, "greek");

        assert!(backup(&mut main, &mut bk, true).unwrap().is_empty());
    }

    #[test]
    fn test_damaged_files_block_backup_until_fixed() {
        let (_dir, mut main) = project();
        let (_bk_dir, mut bk) = backup_project("wuliu");
        drop_in_input(&main, "a.txt", b"alpha");
        add(&mut main, None, true).unwrap();
        backup(&mut main, &mut bk, true).unwrap();

        fs::write(main.paths.files().join("a.txt"), b"bit rot").unwrap();
        verify(&mut main, None).unwrap();
        assert!(matches!(
            backup(&mut main, &mut bk, true),
            Err(ArchiveError::Config(_))
        ));

        let fixed = fix(&mut main, &mut bk).unwrap();
        assert_eq!(fixed, vec![derive_id("a.txt")]);
        assert_eq!(fs::read(main.paths.files().join("a.txt")).unwrap(), b"alpha");
        assert!(!main.library.select_by_id(&derive_id("a.txt")).unwrap().damaged);
        assert!(backup(&mut main, &mut bk, true).is_ok());
    }

    #[test]
    fn test_pairing_rules() {
        let (_dir, mut main) = project();
        let (_other_dir, mut other) = backup_project("photos");
        assert!(matches!(
            backup(&mut main, &mut other, false),
            Err(ArchiveError::Config(_))
        ));

        let (_plain_dir, mut plain) = project();
        assert!(matches!(
            backup(&mut main, &mut plain, false),
            Err(ArchiveError::Config(_))
        ));
    }

    #[test]
    fn test_register_and_select() {
        let (_dir, mut main) = project();
        let (bk_dir, _bk) = backup_project("wuliu");

        let root = register(&mut main, bk_dir.path()).unwrap();
        assert!(matches!(
            register(&mut main, bk_dir.path()),
            Err(ArchiveError::Config(_))
        ));
        let reloaded = Project::open(main.paths.project_file().parent().unwrap()).unwrap();
        assert_eq!(reloaded.config.backups, vec![root]);

        assert!(select(&main, 1).is_ok());
        assert!(matches!(select(&main, 0), Err(ArchiveError::Config(_))));
        assert!(matches!(select(&main, 2), Err(ArchiveError::Config(_))));
    }
}
