/// Duplicate prevention gate run before any batch insert.
///
/// The registry table only enforces unique ids; unique content is
/// enforced here and nowhere else.
use std::collections::{HashMap, HashSet};

use super::cache::Cache;
use super::data::FileRecord;
use crate::error::ArchiveError;

/// Existing records grouped by checksum. Several records may share one
/// checksum since updates are not gated on content.
fn index_by_checksum(cache: &Cache) -> HashMap<&str, Vec<&FileRecord>> {
    let mut index: HashMap<&str, Vec<&FileRecord>> = HashMap::new();
    for r in cache.iter().filter(|r| !r.checksum.is_empty()) {
        index.entry(r.checksum.as_str()).or_default().push(r);
    }
    index
}

/// Existing records that collide with any candidate, by id or by checksum.
///
/// Returns the records already in the cache (not the candidates), each at
/// most once, sorted by id.
pub fn find_existing(candidates: &[FileRecord], cache: &Cache) -> Vec<FileRecord> {
    let by_checksum = index_by_checksum(cache);

    let mut found: HashMap<&str, &FileRecord> = HashMap::new();
    for candidate in candidates {
        if let Some(existing) = cache.get(&candidate.id) {
            found.insert(existing.id.as_str(), existing);
        }
        for &existing in by_checksum.get(candidate.checksum.as_str()).into_iter().flatten() {
            found.insert(existing.id.as_str(), existing);
        }
    }

    let mut result: Vec<FileRecord> = found.into_values().cloned().collect();
    result.sort_by(|a, b| a.id.cmp(&b.id));
    result
}

/// Every reason each candidate is refused, naming the record it collides
/// with: its id collision first, then one line per record with the same
/// content.
pub fn explain_conflicts(candidates: &[FileRecord], cache: &Cache) -> Vec<ArchiveError> {
    let by_checksum = index_by_checksum(cache);

    let mut reasons = Vec::new();
    for candidate in candidates {
        if let Some(existing) = cache.get(&candidate.id) {
            reasons.push(ArchiveError::DuplicateId {
                id: existing.id.clone(),
                filename: existing.filename.clone(),
            });
        }
        let mut same_content: Vec<&FileRecord> = by_checksum
            .get(candidate.checksum.as_str())
            .cloned()
            .unwrap_or_default();
        same_content.sort_by(|a, b| a.id.cmp(&b.id));
        for existing in same_content {
            reasons.push(ArchiveError::DuplicateChecksum {
                id: existing.id.clone(),
                filename: existing.filename.clone(),
            });
        }
    }
    reasons
}

/// Candidates that collide with an earlier candidate of the same batch.
pub fn find_batch_conflicts(candidates: &[FileRecord]) -> Vec<FileRecord> {
    let mut ids = HashSet::new();
    let mut sums = HashSet::new();
    let mut conflicts = Vec::new();
    for candidate in candidates {
        let dup_id = !ids.insert(candidate.id.as_str());
        let dup_sum = !sums.insert(candidate.checksum.as_str());
        if dup_id || dup_sum {
            conflicts.push(candidate.clone());
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::derive_checksum;

    fn record(name: &str, content: &[u8]) -> FileRecord {
        let mut r = FileRecord::new(name);
        r.checksum = derive_checksum(content);
        r
    }

    #[test]
    fn test_same_content_different_name_reports_existing() {
        let existing = record("old.jpg", b"pixels");
        let cache: Cache = vec![existing.clone()].into_iter().collect();

        let found = find_existing(&[record("new.jpg", b"pixels")], &cache);
        assert_eq!(found, vec![existing]);
    }

    #[test]
    fn test_same_name_reports_existing() {
        let existing = record("a.txt", b"one");
        let cache: Cache = vec![existing.clone()].into_iter().collect();

        let found = find_existing(&[record("a.txt", b"two")], &cache);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, existing.id);
    }

    #[test]
    fn test_new_files_pass_the_gate() {
        let cache: Cache = vec![record("a.txt", b"one")].into_iter().collect();
        let found = find_existing(&[record("b.txt", b"two"), record("c.txt", b"three")], &cache);
        assert!(found.is_empty());
    }

    #[test]
    fn test_existing_record_reported_once() {
        let existing = record("a.txt", b"one");
        let cache: Cache = vec![existing].into_iter().collect();
        // Collides by id and by checksum at once
        let found = find_existing(&[record("a.txt", b"one"), record("z.txt", b"one")], &cache);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_explain_conflicts() {
        let existing = record("a.txt", b"one");
        let cache: Cache = vec![existing.clone()].into_iter().collect();
        let reasons = explain_conflicts(
            &[record("a.txt", b"two"), record("b.txt", b"one"), record("c.txt", b"new")],
            &cache,
        );
        assert_eq!(reasons.len(), 2);
        assert!(matches!(&reasons[0], ArchiveError::DuplicateId { id, .. } if *id == existing.id));
        assert!(matches!(
            &reasons[1],
            ArchiveError::DuplicateChecksum { filename, .. } if filename == "a.txt"
        ));
    }

    #[test]
    fn test_every_record_sharing_a_checksum_is_reported() {
        let a = record("a.txt", b"same");
        let b = record("b.txt", b"same");
        let cache: Cache = vec![a.clone(), b.clone()].into_iter().collect();

        let mut expected = vec![a, b];
        expected.sort_by(|x, y| x.id.cmp(&y.id));
        let found = find_existing(&[record("c.txt", b"same")], &cache);
        assert_eq!(found, expected);

        let reasons = explain_conflicts(&[record("c.txt", b"same")], &cache);
        assert_eq!(reasons.len(), 2);
        assert!(reasons
            .iter()
            .all(|e| matches!(e, ArchiveError::DuplicateChecksum { .. })));
    }

    #[test]
    fn test_id_and_content_collisions_both_explained() {
        let named = record("a.txt", b"one");
        let same_bytes = record("b.txt", b"two");
        let cache: Cache = vec![named.clone(), same_bytes.clone()].into_iter().collect();

        // Same name as a.txt, same content as b.txt
        let reasons = explain_conflicts(&[record("a.txt", b"two")], &cache);
        assert_eq!(reasons.len(), 2);
        assert!(matches!(&reasons[0], ArchiveError::DuplicateId { id, .. } if *id == named.id));
        assert!(matches!(
            &reasons[1],
            ArchiveError::DuplicateChecksum { id, .. } if *id == same_bytes.id
        ));

        let found = find_existing(&[record("a.txt", b"two")], &cache);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_batch_conflicts() {
        let batch = vec![
            record("a.txt", b"same"),
            record("b.txt", b"other"),
            record("c.txt", b"same"),
        ];
        let conflicts = find_batch_conflicts(&batch);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].filename, "c.txt");
    }
}
