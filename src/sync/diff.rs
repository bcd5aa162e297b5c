/// Snapshot diff: classify live items against the last persisted state.
///
/// Unchanged items (same id, same checksum) land in neither output, which
/// is what makes a repeated sync with no changes a no-op.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::state::data::FileRecord;

/// Anything that carries a content checksum
pub trait Checksummed {
    fn checksum(&self) -> &str;
}

/// A live item with an identity and a checksum
pub trait Tracked: Checksummed {
    fn id(&self) -> &str;
}

impl Checksummed for String {
    fn checksum(&self) -> &str {
        self
    }
}

impl Checksummed for FileRecord {
    fn checksum(&self) -> &str {
        &self.checksum
    }
}

impl Tracked for FileRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Result of [`diff`]. No ordering is promised for `added_or_changed`.
#[derive(Debug)]
pub struct Diff<'a, T> {
    pub added_or_changed: Vec<&'a T>,
    pub removed_ids: BTreeSet<String>,
}

impl<T> Diff<'_, T> {
    pub fn is_empty(&self) -> bool {
        self.added_or_changed.is_empty() && self.removed_ids.is_empty()
    }
}

pub fn diff<'a, T, C>(current: &'a [T], previous: &BTreeMap<String, C>) -> Diff<'a, T>
where
    T: Tracked,
    C: Checksummed,
{
    let added_or_changed = current
        .iter()
        .filter(|item| match previous.get(item.id()) {
            Some(old) => old.checksum() != item.checksum(),
            None => true,
        })
        .collect();

    let live: HashSet<&str> = current.iter().map(|item| item.id()).collect();
    let removed_ids = previous
        .keys()
        .filter(|id| !live.contains(id.as_str()))
        .cloned()
        .collect();

    Diff {
        added_or_changed,
        removed_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item(&'static str, &'static str);

    impl Checksummed for Item {
        fn checksum(&self) -> &str {
            self.1
        }
    }

    impl Tracked for Item {
        fn id(&self) -> &str {
            self.0
        }
    }

    fn previous(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(id, sum)| (id.to_string(), sum.to_string()))
            .collect()
    }

    #[test]
    fn test_added_and_removed() {
        let prev = previous(&[("A", "x"), ("B", "y")]);
        let current = vec![Item("A", "x"), Item("C", "z")];

        let d = diff(&current, &prev);
        let added: Vec<&str> = d.added_or_changed.iter().map(|i| i.id()).collect();
        assert_eq!(added, vec!["C"]);
        assert_eq!(d.removed_ids, BTreeSet::from(["B".to_string()]));
    }

    #[test]
    fn test_changed_checksum() {
        let prev = previous(&[("A", "x")]);
        let current = vec![Item("A", "x2")];
        let d = diff(&current, &prev);
        assert_eq!(d.added_or_changed.len(), 1);
        assert!(d.removed_ids.is_empty());
    }

    #[test]
    fn test_unchanged_is_empty() {
        let prev = previous(&[("A", "x"), ("B", "y")]);
        let current = vec![Item("B", "y"), Item("A", "x")];
        assert!(diff(&current, &prev).is_empty());
    }

    #[test]
    fn test_first_run_adds_everything() {
        let prev = previous(&[]);
        let current = vec![Item("A", "x"), Item("B", "y")];
        let d = diff(&current, &prev);
        assert_eq!(d.added_or_changed.len(), 2);
        assert!(d.removed_ids.is_empty());
    }

    #[test]
    fn test_works_on_records() {
        let mut r = FileRecord::new("a.jpg");
        r.checksum = "abc".into();
        let prev = previous(&[(r.id.as_str(), "abc"), ("GONE", "zzz")]);
        let current = [r];
        let d = diff(&current, &prev);
        assert!(d.added_or_changed.is_empty());
        assert_eq!(d.removed_ids.len(), 1);
    }
}
