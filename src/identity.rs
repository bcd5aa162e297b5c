/// File identity and content checksums
///
/// - The id of a file is derived from its name only, so the same name
///   always maps to the same registry key.
/// - The checksum is derived from the content and drives both duplicate
///   detection and artifact change detection.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{ArchiveError, Result};

/// Base 36 alphabet, upper case
const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Read buffer used while hashing files
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Derive the registry id of a filename.
///
/// CRC-32 (IEEE) of the UTF-8 name, written in upper-case base 36.
pub fn derive_id(filename: &str) -> String {
    to_base36(crc32fast::hash(filename.as_bytes()))
}

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(7);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// BLAKE3 digest of a byte slice, lower-case hex.
pub fn derive_checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// BLAKE3 digest of a file, streamed so only one buffer is resident.
/// Files that fit in one buffer are hashed in a single call.
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| ArchiveError::Storage(format!("{}: {e}", path.display())))?;
    if file.metadata()?.len() <= HASH_BUFFER_SIZE as u64 {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        return Ok(derive_checksum(&bytes));
    }

    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn is_allowed(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
}

/// Reject names with characters outside `[0-9a-zA-Z_.-]`.
pub fn check_filename(name: &str) -> Result<()> {
    if !is_allowed(name) || name == "." || name == ".." {
        return Err(ArchiveError::InvalidFilename(name.to_string()));
    }
    Ok(())
}

/// Same allow-list as filenames, applied to keywords, collections and albums.
pub fn check_keyword(word: &str) -> Result<()> {
    if !is_allowed(word) {
        return Err(ArchiveError::InvalidKeyword(word.to_string()));
    }
    Ok(())
}

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Coarse content type from the file extension.
pub fn type_by_filename(filename: &str) -> String {
    let ext = match Path::new(filename).extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return OCTET_STREAM.to_string(),
    };

    let family = match ext.as_str() {
        "zip" | "rar" | "7z" | "gz" | "tar" | "bz" | "bz2" | "xz" => "compressed",
        "md" | "txt" | "json" | "xml" | "html" | "htm" | "yaml" | "toml" | "csv" | "js"
        | "ts" | "go" | "py" | "rs" | "c" | "h" | "cpp" => "text",
        "doc" | "docx" | "ppt" | "pptx" | "rtf" | "xls" | "xlsx" | "odt" => "office",
        "epub" | "mobi" | "azw" | "azw3" | "djvu" => "ebook",
        "jpg" | "jpeg" => return "image/jpeg".to_string(),
        "png" | "gif" | "webp" | "bmp" | "tiff" | "avif" => "image",
        "tif" => return "image/tiff".to_string(),
        "svg" => return "image/svg+xml".to_string(),
        "mp3" => return "audio/mpeg".to_string(),
        "ogg" | "flac" | "wav" | "m4a" => "audio",
        "mp4" | "webm" | "mov" | "mkv" | "avi" => "video",
        "pdf" => return "application/pdf".to_string(),
        _ => return OCTET_STREAM.to_string(),
    };
    format!("{family}/{ext}")
}
