use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{format_size, move_file, names_in, print_id_and_name, Project};
use crate::config::{Paths, ProjectConfig};
use crate::error::{ArchiveError, Result};
use crate::identity::{check_filename, derive_id, file_checksum, type_by_filename};
use crate::state::data::{now, FileRecord};
use crate::state::dedup::{explain_conflicts, find_batch_conflicts, find_existing};
use crate::state::edit::EditFiles;
use crate::state::filter::{sort_records, OrderBy, RecordFilter};
use crate::state::library::{Library, RegistryStore};

/// Create the project layout, `project.json` and an empty registry.
///
/// A backup project is initialized the same way with `is_backup` set and
/// the name of the project it mirrors.
pub fn init(root: &Path, name: &str, is_backup: bool) -> Result<()> {
    check_filename(name)?;
    let paths = Paths::new(root);
    if paths.project_file().exists() {
        return Err(ArchiveError::Config(format!(
            "{} exists, already a project",
            paths.project_file().display()
        )));
    }

    // Fails if project.db already exists
    let library = Library::create(&paths.database())?;
    println!("Create => {}", library.path().display());

    for dir in paths.folders() {
        fs::create_dir_all(&dir)?;
    }
    let config = ProjectConfig {
        project_name: name.to_string(),
        is_backup,
        ..Default::default()
    };
    config.save(&paths)?;
    println!("Create => {}", paths.project_file().display());
    Ok(())
}

fn read_edit_file(path: &Path) -> Result<EditFiles> {
    let data = fs::read_to_string(path)
        .map_err(|e| ArchiveError::Config(format!("{}: {e}", path.display())))?;
    let edit = EditFiles::from_json(&data)
        .map_err(|e| ArchiveError::Config(format!("{}: {e}", path.display())))?;
    edit.check()?;
    Ok(edit)
}

/// Write an edit file template listing every name in `input/`.
pub fn new_config(project: &Project, path: &Path) -> Result<()> {
    if path.exists() {
        return Err(ArchiveError::Config(format!("file exists: {}", path.display())));
    }
    let names = names_in(&project.paths.input())?;
    fs::write(path, EditFiles::new(Vec::new(), names).to_json()?)?;
    println!("Create => {}", path.display());
    Ok(())
}

/// Build a record for a file sitting in `folder`
fn record_from(folder: &Path, name: &str) -> Result<FileRecord> {
    check_filename(name)?;
    let path = folder.join(name);
    let mut record = FileRecord::new(name);
    record.checksum = file_checksum(&path)?;
    record.size = fs::metadata(&path)?.len();
    record.file_type = type_by_filename(name);
    Ok(record)
}

/// Find new files in `input/`, run the duplicate gate, and (with `danger`)
/// move them into `files/` and register them.
///
/// Any collision refuses the whole batch and names every conflict.
pub fn add(project: &mut Project, config: Option<&Path>, danger: bool) -> Result<Vec<FileRecord>> {
    let input = project.paths.input();
    let input_names = names_in(&input)?;

    let (names, edit) = match config {
        None => (input_names, None),
        Some(path) => {
            let edit = read_edit_file(path)?;
            if !edit.ids.is_empty() {
                return Err(ArchiveError::Config(
                    "new files cannot be selected by id".into(),
                ));
            }
            let wanted = if edit.filenames.is_empty() {
                input_names.clone()
            } else {
                edit.filenames.clone()
            };
            let mut names = Vec::new();
            for name in wanted {
                if input_names.contains(&name) {
                    names.push(name);
                } else {
                    println!("Not Found: {name}");
                }
            }
            (names, Some(edit))
        }
    };

    let mut candidates = Vec::with_capacity(names.len());
    for name in &names {
        let mut record = record_from(&input, name)?;
        if let Some(edit) = &edit {
            edit.apply_to(&mut record);
        }
        candidates.push(record);
    }

    if candidates.is_empty() {
        println!("No new files in {}", input.display());
        return Ok(Vec::new());
    }

    let inside_batch = find_batch_conflicts(&candidates);
    if !inside_batch.is_empty() {
        println!("Files with the same name or content in {}:", input.display());
        print_id_and_name(&inside_batch);
        return Err(duplicates(&inside_batch));
    }

    let existing = find_existing(&candidates, &project.cache);
    if !existing.is_empty() {
        for reason in explain_conflicts(&candidates, &project.cache) {
            println!("{reason}");
        }
        return Err(duplicates(&existing));
    }

    let files = project.paths.files();
    let taken: Vec<String> = candidates
        .iter()
        .map(|r| files.join(&r.filename))
        .filter(|p| p.exists())
        .map(|p| p.display().to_string())
        .collect();
    if !taken.is_empty() {
        return Err(ArchiveError::Config(format!(
            "unregistered files with the same name exist: {}",
            taken.join(", ")
        )));
    }

    if !danger {
        for r in &candidates {
            println!("{:<12} {}", format!("({})", format_size(r.size)), r.filename);
        }
        println!("Preview only, add --danger to add {} file(s)", candidates.len());
        return Ok(Vec::new());
    }

    for record in &candidates {
        let src = input.join(&record.filename);
        let dst = files.join(&record.filename);
        move_file(&src, &dst, false)?;
        if let Err(err) = project.library.insert(record) {
            // Keep files/ and the registry in agreement
            let _ = move_file(&dst, &src, false);
            return Err(err);
        }
        project.cache.apply_insert(record.clone());
        println!("Add => {}", dst.display());
    }
    info!(count = candidates.len(), "files added");
    Ok(candidates)
}

fn duplicates(records: &[FileRecord]) -> ArchiveError {
    ArchiveError::Duplicates(
        records
            .iter()
            .map(|r| (r.id.clone(), r.filename.clone()))
            .collect(),
    )
}

/// Resolve an id list or a filename list to registered ids
fn resolve_ids(project: &Project, ids: &[String], filenames: &[String]) -> Result<Vec<String>> {
    match (ids.is_empty(), filenames.is_empty()) {
        (true, true) => Err(ArchiveError::Config("no files specified".into())),
        (false, false) => Err(ArchiveError::Config(
            "specify files by id or by filename, not both".into(),
        )),
        _ => {
            let ids: Vec<String> = if ids.is_empty() {
                filenames.iter().map(|name| derive_id(name)).collect()
            } else {
                ids.to_vec()
            };
            for id in &ids {
                if !project.cache.contains(id) {
                    return Err(ArchiveError::NotFound(id.clone()));
                }
            }
            Ok(ids)
        }
    }
}

/// Apply the attribute values of an edit file to its targets.
pub fn edit(project: &mut Project, config: &Path, danger: bool) -> Result<Vec<FileRecord>> {
    let edit = read_edit_file(config)?;
    let ids = resolve_ids(project, &edit.ids, &edit.filenames)?;

    if !danger {
        print_id_and_name(ids.iter().filter_map(|id| project.cache.get(id)));
        println!("Preview only, add --danger to edit {} file(s)", ids.len());
        return Ok(Vec::new());
    }

    let mut updated = Vec::with_capacity(ids.len());
    for id in &ids {
        let record = project.library.update(id, &mut |r| {
            edit.apply_to(r);
            r.touch();
        })?;
        println!("Update => {}: {}", record.id, record.filename);
        project.cache.apply_update(record.clone());
        updated.push(record);
    }
    Ok(updated)
}

/// Rename a managed file. The record moves to the id of the new name.
pub fn rename(project: &mut Project, id: &str, new_name: &str) -> Result<FileRecord> {
    check_filename(new_name)?;
    let old = project.library.select_by_id(id)?;
    if old.filename == new_name {
        return Err(ArchiveError::Config("new name equals the old name".into()));
    }

    let src = project.paths.files().join(&old.filename);
    let dst = project.paths.files().join(new_name);
    if !src.is_file() {
        return Err(ArchiveError::NotFound(src.display().to_string()));
    }

    let mut renamed = old.clone();
    renamed.id = derive_id(new_name);
    renamed.filename = new_name.to_string();
    renamed.file_type = type_by_filename(new_name);
    renamed.touch();

    // Claim the new id first; a taken id aborts before anything moves
    project.library.insert(&renamed)?;
    if let Err(err) = move_file(&src, &dst, false) {
        project.library.delete(&renamed.id)?;
        return Err(err);
    }
    project.library.delete(&old.id)?;

    project.cache.apply_delete(&old.id);
    project.cache.apply_insert(renamed.clone());
    println!("Rename {} => {}", src.display(), dst.display());
    Ok(renamed)
}

/// Replace managed files with same-named files from `input/`.
///
/// Checksum, size and utime follow the new content. Files whose content
/// did not change are reported and left in `input/`.
pub fn overwrite(project: &mut Project, danger: bool) -> Result<Vec<FileRecord>> {
    let input = project.paths.input();
    let names = names_in(&input)?;
    if names.is_empty() {
        println!("No files in {}", input.display());
        return Ok(Vec::new());
    }

    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| project.cache.by_filename(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(ArchiveError::Config(format!(
            "cannot overwrite files that are not registered: {}",
            unknown.join(", ")
        )));
    }

    let mut updated = Vec::new();
    for name in &names {
        let src = input.join(name);
        let checksum = file_checksum(&src)?;
        let size = fs::metadata(&src)?.len();
        let Some(current) = project.cache.by_filename(name) else {
            continue;
        };
        if current.checksum == checksum {
            println!("Unchanged: {name}");
            continue;
        }
        let id = current.id.clone();
        let dst = project.paths.files().join(name);
        println!("{} <= {}", dst.display(), src.display());
        if !danger {
            continue;
        }

        move_file(&src, &dst, true)?;
        let record = project.library.update(&id, &mut |r| {
            r.checksum = checksum.clone();
            r.size = size;
            r.touch();
        })?;
        project.cache.apply_update(record.clone());
        updated.push(record);
    }
    if !danger {
        println!("Preview only, add --danger to overwrite");
    }
    Ok(updated)
}

/// Move files to `recyclebin/` and drop their records.
pub fn delete(
    project: &mut Project,
    ids: &[String],
    filenames: &[String],
    danger: bool,
) -> Result<Vec<FileRecord>> {
    let ids = resolve_ids(project, ids, filenames)?;
    if !danger {
        print_id_and_name(ids.iter().filter_map(|id| project.cache.get(id)));
        println!("Preview only, add --danger to delete {} file(s)", ids.len());
        return Ok(Vec::new());
    }

    let mut deleted = Vec::with_capacity(ids.len());
    for id in &ids {
        let record = project.library.select_by_id(id)?;
        let src = project.paths.files().join(&record.filename);
        let dst = project.paths.recyclebin().join(&record.filename);
        if src.exists() {
            move_file(&src, &dst, true)?;
            println!("Recycle => {}", dst.display());
        } else {
            warn!(id = %id, path = %src.display(), "file already gone, dropping record");
        }
        project.library.delete(id)?;
        project.cache.apply_delete(id);
        deleted.push(record);
    }
    Ok(deleted)
}

/// Filtered listing, newest first by default
pub fn list(
    project: &Project,
    filter: &RecordFilter,
    order: OrderBy,
    ascending: bool,
    limit: Option<usize>,
) -> Vec<FileRecord> {
    let mut records = filter.select(project.cache.iter());
    sort_records(&mut records, order, ascending);
    if let Some(n) = limit {
        records.truncate(n);
    }

    if records.is_empty() {
        println!("(none)");
    }
    for r in &records {
        let like = if r.like > 0 { format!(" ♥{}", r.like) } else { String::new() };
        println!(
            "{}  {:>11}  {}{}  {}",
            r.id,
            format_size(r.size),
            r.utime,
            like,
            r.filename
        );
    }
    records.into_iter().cloned().collect()
}

/// Re-hash managed files, least recently checked first, and record the
/// result. Stops after `limit_bytes` (at least one file is checked).
pub fn verify(project: &mut Project, limit_bytes: Option<u64>) -> Result<Vec<FileRecord>> {
    let mut queue: Vec<FileRecord> = project.cache.iter().cloned().collect();
    queue.sort_by(|a, b| a.checked.cmp(&b.checked).then_with(|| a.id.cmp(&b.id)));

    let checked_at = now();
    let mut checked_size = 0u64;
    let mut checked_count = 0usize;
    for record in queue {
        if let Some(limit) = limit_bytes {
            if checked_count > 0 && checked_size >= limit {
                break;
            }
        }
        let path = project.paths.files().join(&record.filename);
        let damaged = match file_checksum(&path) {
            Ok(sum) => sum != record.checksum,
            Err(err) => {
                warn!(id = %record.id, error = %err, "cannot read file");
                true
            }
        };
        let updated = project.library.update(&record.id, &mut |r| {
            r.checked = checked_at.clone();
            r.damaged = damaged;
        })?;
        project.cache.apply_update(updated);
        checked_size += record.size;
        checked_count += 1;
    }

    println!("Checked {} file(s), {}", checked_count, format_size(checked_size));
    let mut damaged: Vec<FileRecord> = project.cache.iter().filter(|r| r.damaged).cloned().collect();
    damaged.sort_by(|a, b| a.id.cmp(&b.id));
    println!("Damaged: {}", damaged.len());
    print_id_and_name(&damaged);
    Ok(damaged)
}

/// Files in `files/` without a record, and records without a file.
pub fn orphans(project: &mut Project) -> Result<(Vec<String>, Vec<FileRecord>)> {
    let on_disk = names_in(&project.paths.files())?;
    let file_orphans: Vec<String> = on_disk
        .iter()
        .filter(|name| project.cache.by_filename(name).is_none())
        .cloned()
        .collect();
    let record_orphans: Vec<FileRecord> = project
        .cache
        .records()
        .into_iter()
        .filter(|r| !on_disk.contains(&r.filename))
        .cloned()
        .collect();

    project.config.orphan_last_check = now();
    project.config.orphan_files_count = file_orphans.len();
    project.config.orphan_records_count = record_orphans.len();
    project.config.save(&project.paths)?;

    println!("file-orphans:{}", if file_orphans.is_empty() { " (none)" } else { "" });
    for name in &file_orphans {
        println!("{name}");
    }
    println!("record-orphans:{}", if record_orphans.is_empty() { " (none)" } else { "" });
    print_id_and_name(&record_orphans);
    Ok((file_orphans, record_orphans))
}

/// Copy a managed file and/or its record as JSON into `output/`.
///
/// Neither flag set exports both. Files above the configured size limit
/// and existing destinations are refused.
pub fn export(project: &Project, id: &str, file: bool, meta: bool) -> Result<Vec<PathBuf>> {
    let record = project.library.select_by_id(id)?;
    let (file, meta) = if file || meta { (file, meta) } else { (true, true) };
    let output = project.paths.output();
    fs::create_dir_all(&output)?;

    let mut written = Vec::new();
    if meta {
        let dst = output.join(format!("{}.json", record.filename));
        if dst.exists() {
            return Err(ArchiveError::Config(format!("file exists: {}", dst.display())));
        }
        fs::write(&dst, serde_json::to_string_pretty(&record)?)?;
        println!("Export => {}", dst.display());
        written.push(dst);
    }
    if file {
        let limit = project.config.export_size_limit_mb.saturating_mul(1024 * 1024);
        if record.size > limit {
            return Err(ArchiveError::Config(format!(
                "{} is {}, above the export limit of {} MB",
                record.filename,
                format_size(record.size),
                project.config.export_size_limit_mb
            )));
        }
        let dst = output.join(&record.filename);
        if dst.exists() {
            return Err(ArchiveError::Config(format!("file exists: {}", dst.display())));
        }
        fs::copy(project.paths.files().join(&record.filename), &dst)?;
        println!("Export => {}", dst.display());
        written.push(dst);
    }
    Ok(written)
}

/// Registry totals: record count and size, damage and bookkeeping times.
pub fn info(project: &Project) -> Result<(u64, u64)> {
    let count = project.library.count()?;
    let total: u64 = project.cache.iter().map(|r| r.size).sum();
    let damaged = project.cache.iter().filter(|r| r.damaged).count();

    let kind = if project.config.is_backup { " (backup)" } else { "" };
    println!("project: {}{kind}", project.config.project_name);
    if project.cache.is_empty() {
        println!("files:   0 (empty registry)");
    } else {
        println!("files:   {count}, {}", format_size(total));
    }
    println!("damaged: {damaged}");
    println!("backups: {}", project.config.backups.len());
    println!("last backup:       {}", project.config.last_backup_at);
    println!("last orphan check: {}", project.config.orphan_last_check);
    Ok((count, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::{drop_in_input, project};

    #[test]
    fn test_init_twice_fails() {
        let (dir, _project) = project();
        assert!(matches!(init(dir.path(), "wuliu", false), Err(ArchiveError::Config(_))));
    }

    #[test]
    fn test_add_preview_then_danger() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"alpha");
        drop_in_input(&project, "b.txt", b"beta");

        assert!(add(&mut project, None, false).unwrap().is_empty());
        assert!(project.cache.is_empty());

        let added = add(&mut project, None, true).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(project.library.count().unwrap(), 2);
        assert_eq!(project.cache.len(), 2);
        assert!(project.paths.files().join("a.txt").exists());
        assert!(!project.paths.input().join("a.txt").exists());

        let stored = project.library.select_by_id(&derive_id("a.txt")).unwrap();
        assert_eq!(stored.file_type, "text/txt");
        assert_eq!(stored.size, 5);
    }

    #[test]
    fn test_add_with_edit_file() {
        let (dir, mut project) = project();
        drop_in_input(&project, "cat.jpg", b"meow");
        drop_in_input(&project, "dog.jpg", b"woof");
        let cfg = dir.path().join("add.json");
        let mut edit = EditFiles::new(Vec::new(), vec!["cat.jpg".into()]);
        edit.albums = vec!["pets".into()];
        fs::write(&cfg, edit.to_json().unwrap()).unwrap();

        let added = add(&mut project, Some(&cfg), true).unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].albums, vec!["pets".to_string()]);
        assert!(project.paths.input().join("dog.jpg").exists());
    }

    #[test]
    fn test_add_rejects_duplicate_content_and_names_existing() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "original.txt", b"same bytes");
        add(&mut project, None, true).unwrap();

        drop_in_input(&project, "copy.txt", b"same bytes");
        match add(&mut project, None, true) {
            Err(ArchiveError::Duplicates(list)) => {
                assert_eq!(list, vec![(derive_id("original.txt"), "original.txt".to_string())]);
            }
            other => panic!("expected Duplicates, got {other:?}"),
        }
        // Nothing moved, nothing inserted
        assert!(project.paths.input().join("copy.txt").exists());
        assert_eq!(project.library.count().unwrap(), 1);
    }

    #[test]
    fn test_add_rejects_duplicates_inside_batch() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"twin");
        drop_in_input(&project, "b.txt", b"twin");
        assert!(matches!(add(&mut project, None, true), Err(ArchiveError::Duplicates(_))));
        assert!(project.cache.is_empty());
    }

    #[test]
    fn test_add_rejects_bad_filename() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "bad name.txt", b"x");
        assert!(matches!(add(&mut project, None, true), Err(ArchiveError::InvalidFilename(_))));
    }

    #[test]
    fn test_edit_updates_store_and_cache() {
        let (dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"alpha");
        add(&mut project, None, true).unwrap();

        let cfg = dir.path().join("edit.json");
        let mut e = EditFiles::new(vec![derive_id("a.txt")], Vec::new());
        e.like = 2;
        e.keywords = vec!["greek".into()];
        fs::write(&cfg, e.to_json().unwrap()).unwrap();

        edit(&mut project, &cfg, true).unwrap();
        let stored = project.library.select_by_id(&derive_id("a.txt")).unwrap();
        assert_eq!(stored.like, 2);
        assert_eq!(project.cache.get(&stored.id), Some(&stored));
        assert!(stored.utime >= stored.ctime);
    }

    #[test]
    fn test_rename_moves_record_to_new_id() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "old.txt", b"content");
        add(&mut project, None, true).unwrap();

        let renamed = rename(&mut project, &derive_id("old.txt"), "new.md").unwrap();
        assert_eq!(renamed.id, derive_id("new.md"));
        assert_eq!(renamed.file_type, "text/md");
        assert!(project.paths.files().join("new.md").exists());
        assert!(!project.paths.files().join("old.txt").exists());
        assert!(matches!(
            project.library.select_by_id(&derive_id("old.txt")),
            Err(ArchiveError::NotFound(_))
        ));
        assert!(project.cache.get(&derive_id("new.md")).is_some());
        assert!(project.cache.get(&derive_id("old.txt")).is_none());
    }

    #[test]
    fn test_overwrite_changes_checksum() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"v1");
        add(&mut project, None, true).unwrap();
        let before = project.cache.by_filename("a.txt").unwrap().clone();

        drop_in_input(&project, "a.txt", b"version two");
        let updated = overwrite(&mut project, true).unwrap();
        assert_eq!(updated.len(), 1);
        assert_ne!(updated[0].checksum, before.checksum);
        assert_eq!(updated[0].size, 11);
        assert_eq!(fs::read(project.paths.files().join("a.txt")).unwrap(), b"version two");
    }

    #[test]
    fn test_overwrite_rejects_unregistered_names() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "stranger.txt", b"?");
        assert!(matches!(overwrite(&mut project, true), Err(ArchiveError::Config(_))));
    }

    #[test]
    fn test_delete_moves_to_recyclebin() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"alpha");
        add(&mut project, None, true).unwrap();

        let deleted = delete(&mut project, &[], &["a.txt".to_string()], true).unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(project.paths.recyclebin().join("a.txt").exists());
        assert!(project.cache.is_empty());
        assert_eq!(project.library.count().unwrap(), 0);

        assert!(matches!(
            delete(&mut project, &["NOPE".to_string()], &[], true),
            Err(ArchiveError::NotFound(_))
        ));
    }

    #[test]
    fn test_verify_flags_damaged_files() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"alpha");
        drop_in_input(&project, "b.txt", b"beta");
        add(&mut project, None, true).unwrap();

        fs::write(project.paths.files().join("b.txt"), b"bit rot").unwrap();
        let damaged = verify(&mut project, None).unwrap();
        assert_eq!(damaged.len(), 1);
        assert_eq!(damaged[0].filename, "b.txt");
        assert!(project.library.select_by_id(&derive_id("b.txt")).unwrap().damaged);
    }

    #[test]
    fn test_orphans_report() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"alpha");
        add(&mut project, None, true).unwrap();

        fs::write(project.paths.files().join("stray.txt"), b"?").unwrap();
        fs::remove_file(project.paths.files().join("a.txt")).unwrap();

        let (files, records) = orphans(&mut project).unwrap();
        assert_eq!(files, vec!["stray.txt".to_string()]);
        assert_eq!(records.len(), 1);
        let config = ProjectConfig::load(&project.paths).unwrap();
        assert_eq!(config.orphan_files_count, 1);
        assert_eq!(config.orphan_records_count, 1);
    }

    #[test]
    fn test_export_file_and_meta() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"alpha");
        add(&mut project, None, true).unwrap();
        let id = derive_id("a.txt");

        let written = export(&project, &id, false, false).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read(project.paths.output().join("a.txt")).unwrap(), b"alpha");
        let meta = fs::read_to_string(project.paths.output().join("a.txt.json")).unwrap();
        assert_eq!(FileRecord::from_json(&meta).unwrap().id, id);

        // Never overwrites
        assert!(matches!(export(&project, &id, true, false), Err(ArchiveError::Config(_))));
        assert!(matches!(export(&project, "NOPE", true, false), Err(ArchiveError::NotFound(_))));
    }

    #[test]
    fn test_export_size_limit() {
        let (_dir, mut project) = project();
        drop_in_input(&project, "big.bin", &vec![1u8; 2 * 1024 * 1024]);
        add(&mut project, None, true).unwrap();
        project.config.export_size_limit_mb = 1;
        assert!(matches!(
            export(&project, &derive_id("big.bin"), true, false),
            Err(ArchiveError::Config(_))
        ));
        // Metadata alone has no size limit
        assert_eq!(export(&project, &derive_id("big.bin"), false, true).unwrap().len(), 1);
    }

    #[test]
    fn test_info_totals() {
        let (_dir, mut project) = project();
        assert_eq!(info(&project).unwrap(), (0, 0));
        drop_in_input(&project, "a.txt", b"alpha");
        drop_in_input(&project, "b.txt", b"beta");
        add(&mut project, None, true).unwrap();
        assert_eq!(info(&project).unwrap(), (2, 9));
    }

    #[test]
    fn test_init_backup_project() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path(), "photos", true).unwrap();
        let config = ProjectConfig::load(&Paths::new(dir.path())).unwrap();
        assert!(config.is_backup);
        assert_eq!(config.project_name, "photos");

        let other = tempfile::tempdir().unwrap();
        assert!(matches!(
            init(other.path(), "bad name", false),
            Err(ArchiveError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_list_filters_and_limits() {
        let (dir, mut project) = project();
        drop_in_input(&project, "a.txt", b"alpha");
        drop_in_input(&project, "b.txt", b"beta");
        let cfg = dir.path().join("add.json");
        let mut e = EditFiles::new(Vec::new(), vec!["a.txt".into()]);
        e.label = "first".into();
        fs::write(&cfg, e.to_json().unwrap()).unwrap();
        add(&mut project, Some(&cfg), true).unwrap();
        add(&mut project, None, true).unwrap();

        let filter = RecordFilter { label: "first".into(), union: true, ..Default::default() };
        let found = list(&project, &filter, OrderBy::Utime, false, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "a.txt");

        let all = list(&project, &RecordFilter::default(), OrderBy::Filename, true, Some(1));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].filename, "a.txt");
    }
}
