/// Project configuration and on-disk layout
///
/// A project is a directory holding `project.json`, the registry
/// (`project.db`) and the managed folders. Every component receives a
/// [`Paths`] built from the project root instead of reading globals.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{ArchiveError, Result};
use crate::sync::render::THUMBNAIL_SIZE;

pub const REPO_NAME: &str = "Wuliu File Manager";
pub const REPO_URL: &str = "https://github.com/ahui2016/wuliu";
pub const DEFAULT_PROJECT_NAME: &str = "wuliu";

/// Contents of `project.json`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    pub repo_name: String,
    pub repo_url: String,
    /// A main project and its backups share this name
    pub project_name: String,
    /// Backup projects only receive files through `backup`
    pub is_backup: bool,
    /// Roots of the backup projects, selected by 1-based position
    pub backups: Vec<PathBuf>,
    /// Time of the last backup, copied to the backup project as well
    pub last_backup_at: String,
    /// Largest file `export` copies out, in MB
    pub export_size_limit_mb: u64,
    /// Thumbnail width and height in pixels
    pub thumb_size: (u32, u32),
    /// Last time the orphan report ran
    pub orphan_last_check: String,
    /// Files in `files/` without a record
    pub orphan_files_count: usize,
    /// Records without a file in `files/`
    pub orphan_records_count: usize,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            repo_name: REPO_NAME.to_string(),
            repo_url: REPO_URL.to_string(),
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            is_backup: false,
            backups: Vec::new(),
            last_backup_at: String::new(),
            export_size_limit_mb: 100,
            thumb_size: THUMBNAIL_SIZE,
            orphan_last_check: String::new(),
            orphan_files_count: 0,
            orphan_records_count: 0,
        }
    }
}

impl ProjectConfig {
    /// Read `project.json`, refusing directories that are not projects
    pub fn load(paths: &Paths) -> Result<Self> {
        let path = paths.project_file();
        let data = fs::read_to_string(&path).map_err(|_| {
            ArchiveError::Config(format!(
                "{} not found, not a project (run `wuliu init` first)",
                path.display()
            ))
        })?;
        let config: ProjectConfig = serde_json::from_str(&data)
            .map_err(|e| ArchiveError::Config(format!("{}: {e}", path.display())))?;
        if config.repo_name != REPO_NAME {
            return Err(ArchiveError::Config(format!(
                "repo_name ({}) != '{REPO_NAME}'",
                config.repo_name
            )));
        }
        if config.thumb_size.0 == 0 || config.thumb_size.1 == 0 {
            return Err(ArchiveError::Config("thumb_size must be non-zero".into()));
        }
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> Result<()> {
        fs::write(paths.project_file(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Every location the tool reads or writes, relative to one project root
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn project_file(&self) -> PathBuf {
        self.root.join("project.json")
    }

    pub fn database(&self) -> PathBuf {
        self.root.join("project.db")
    }

    /// Managed files
    pub fn files(&self) -> PathBuf {
        self.root.join("files")
    }

    /// Drop zone for new files and overwrites
    pub fn input(&self) -> PathBuf {
        self.root.join("input")
    }

    /// Exported files and metadata
    pub fn output(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Deleted files end up here
    pub fn recyclebin(&self) -> PathBuf {
        self.root.join("recyclebin")
    }

    pub fn webpages(&self) -> PathBuf {
        self.root.join("webpages")
    }

    pub fn thumbs(&self) -> PathBuf {
        self.webpages().join("thumbs")
    }

    pub fn thumbs_snapshot(&self) -> PathBuf {
        self.root.join("thumbs.msgp")
    }

    pub fn albums(&self) -> PathBuf {
        self.root.join("albums")
    }

    pub fn album(&self, name: &str) -> PathBuf {
        self.albums().join(name)
    }

    /// Folders created by `init`
    pub fn folders(&self) -> Vec<PathBuf> {
        vec![
            self.files(),
            self.input(),
            self.output(),
            self.recyclebin(),
            self.webpages(),
            self.thumbs(),
            self.albums(),
        ]
    }
}
