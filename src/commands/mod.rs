/// Command implementations
///
/// Every command except `init` opens the project, loads the registry
/// into a cache once, and keeps that cache in step with each store write.
/// - Registry maintenance: add, edit, rename, overwrite, delete, list,
///   verify, orphans, export, info (files.rs)
/// - Derived artifacts: thumbnails and albums (artifacts.rs)
/// - Incremental backup into a backup project (backup.rs)

pub mod artifacts;
pub mod backup;
pub mod files;

use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{Paths, ProjectConfig};
use crate::error::{ArchiveError, Result};
use crate::state::cache::Cache;
use crate::state::data::FileRecord;
use crate::state::library::{Library, RegistryStore};

/// An opened project: configuration, registry and its cache
pub struct Project {
    pub paths: Paths,
    pub config: ProjectConfig,
    pub library: Library,
    pub cache: Cache,
}

impl Project {
    pub fn open(root: &Path) -> Result<Self> {
        let paths = Paths::new(root);
        let config = ProjectConfig::load(&paths)?;
        let library = Library::open(&paths.database())?;
        let cache = library.load_cache()?;
        debug!(root = %root.display(), records = cache.len(), "project opened");
        Ok(Self {
            paths,
            config,
            library,
            cache,
        })
    }
}

/// Names of the regular files directly inside `dir`, sorted
pub fn names_in(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ArchiveError::Storage(e.to_string()))?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Move a file, refusing to replace anything unless `replace` is set
pub fn move_file(src: &Path, dst: &Path, replace: bool) -> Result<()> {
    if !replace && dst.exists() {
        return Err(ArchiveError::Config(format!("file exists: {}", dst.display())));
    }
    std::fs::rename(src, dst).map_err(|e| {
        ArchiveError::Storage(format!("{} => {}: {e}", src.display(), dst.display()))
    })
}

/// Human readable size, e.g. "1.50 MB"
pub fn format_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    let size = size as f64;
    if size < KB * KB {
        format!("{:.2} KB", size / KB)
    } else if size < KB * KB * KB {
        format!("{:.2} MB", size / KB / KB)
    } else {
        format!("{:.2} GB", size / KB / KB / KB)
    }
}

pub fn print_id_and_name<'a>(records: impl IntoIterator<Item = &'a FileRecord>) {
    for r in records {
        println!("{}: {}", r.id, r.filename);
    }
}
