/// Error types shared by the registry, the dedup gate and the artifact
/// synchronizer.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("duplicate id {id} (existing file: {filename})")]
    DuplicateId { id: String, filename: String },

    #[error("duplicate checksum: content already stored as {id} ({filename})")]
    DuplicateChecksum { id: String, filename: String },

    /// A batch was refused; every conflicting (id, filename) is listed.
    #[error("{} duplicate file(s): {}", .0.len(), format_pairs(.0))]
    Duplicates(Vec<(String, String)>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid filename {0:?}: only [0-9a-zA-Z_.-] is allowed")]
    InvalidFilename(String),

    #[error("invalid keyword {0:?}: only [0-9a-zA-Z_.-] is allowed")]
    InvalidKeyword(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cannot render {id}: {reason}")]
    Render { id: String, reason: String },

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

fn format_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(id, name)| format!("{id}: {name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<rusqlite::Error> for ArchiveError {
    fn from(err: rusqlite::Error) -> Self {
        ArchiveError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        ArchiveError::Storage(format!("json: {err}"))
    }
}

impl From<rmp_serde::encode::Error> for ArchiveError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ArchiveError::Storage(format!("snapshot encode: {err}"))
    }
}

impl From<rmp_serde::decode::Error> for ArchiveError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        ArchiveError::Storage(format!("snapshot decode: {err}"))
    }
}

impl From<tempfile::PersistError> for ArchiveError {
    fn from(err: tempfile::PersistError) -> Self {
        ArchiveError::Storage(format!("atomic replace failed: {}", err.error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_message_names_every_conflict() {
        let err = ArchiveError::Duplicates(vec![
            ("1ABC".into(), "a.jpg".into()),
            ("2DEF".into(), "b.jpg".into()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("1ABC: a.jpg"));
        assert!(msg.contains("2DEF: b.jpg"));
    }
}
