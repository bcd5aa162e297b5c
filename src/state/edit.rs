/// Batch edit of file attributes
///
/// An edit file names its targets (by id or by filename, never both) and
/// carries the attribute values to apply. The same JSON shape is used
/// when adding files, where it supplies the initial tags.
use serde::{Deserialize, Serialize};

use super::data::FileRecord;
use crate::error::{ArchiveError, Result};
use crate::identity::{check_filename, check_keyword};

/// Attribute values applied to a set of files
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EditFiles {
    /// Select files by id
    pub ids: Vec<String>,
    /// Select files by name
    pub filenames: Vec<String>,

    pub like: u64,
    pub label: String,
    pub notes: String,
    pub keywords: Vec<String>,
    pub collections: Vec<String>,
    pub albums: Vec<String>,
}

impl EditFiles {
    /// Create an edit targeting the given ids or filenames
    pub fn new(ids: Vec<String>, filenames: Vec<String>) -> Self {
        Self {
            ids,
            filenames,
            ..Default::default()
        }
    }

    /// Convert to pretty JSON for a template file
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from an edit file
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check the target selection and every tag against the allow-list
    pub fn check(&self) -> Result<()> {
        if !self.ids.is_empty() && !self.filenames.is_empty() {
            return Err(ArchiveError::Config(
                "specify files by id or by filename, not both".into(),
            ));
        }
        for name in &self.filenames {
            check_filename(name)?;
        }
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

    /// Copy the attribute values onto a record
    pub fn apply_to(&self, record: &mut FileRecord) {
        record.like = self.like;
        record.label = self.label.clone();
        record.notes = self.notes.clone();
        record.keywords = self.keywords.clone();
        record.collections = self.collections.clone();
        record.albums = self.albums.clone();
    }
}
