/// Shared data structures for the registry
///
/// These structs represent the data model that flows between
/// the database layer, the dedup gate and the artifact synchronizer.
use serde::{Deserialize, Serialize};

use crate::identity::derive_id;

/// Timestamp format stored in records (RFC 3339, second precision)
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Current local time in the record timestamp format
pub fn now() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// Represents a single managed file in the registry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FileRecord {
    /// CRC-32 of the filename in base 36 (primary key)
    pub id: String,
    /// Filename only (e.g., "DSC_0001.jpg"), unique in `files/`
    pub filename: String,
    /// BLAKE3 of the content, lower-case hex
    pub checksum: String,
    /// Length in bytes
    pub size: u64,
    /// Coarse type, e.g. "image/jpeg", "office/docx"
    #[serde(rename = "type")]
    pub file_type: String,
    /// Rating weight
    pub like: u64,
    pub label: String,
    pub notes: String,
    pub keywords: Vec<String>,
    /// A file may belong to several collections
    pub collections: Vec<String>,
    /// Albums are mostly used for pictures
    pub albums: Vec<String>,
    /// When the file entered the archive
    pub ctime: String,
    /// Last update of content or metadata
    pub utime: String,
    /// Last integrity check
    pub checked: String,
    /// Result of the last integrity check
    pub damaged: bool,
}

impl FileRecord {
    /// Create a record for `filename` with a derived id and fresh timestamps
    pub fn new(filename: &str) -> Self {
        let now = now();
        Self {
            id: derive_id(filename),
            filename: filename.to_string(),
            ctime: now.clone(),
            utime: now.clone(),
            checked: now,
            ..Default::default()
        }
    }

    /// Convert to JSON string for database storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string (from database)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_image(&self) -> bool {
        self.file_type.starts_with("image/")
    }

    /// Documents that an album can preview directly
    pub fn is_document(&self) -> bool {
        self.file_type.starts_with("text/") || self.file_type == "application/pdf"
    }

    /// Refresh `utime`, keeping `utime >= ctime`
    pub fn touch(&mut self) {
        let now = now();
        self.utime = if now < self.ctime { self.ctime.clone() } else { now };
    }
}
