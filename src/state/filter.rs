/// Simple field filters over the cache.
///
/// Used by `list` and by album membership. A filter with every field
/// empty selects all records.
use serde::{Deserialize, Serialize};

use super::data::FileRecord;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub label: String,
    pub notes: String,
    pub keywords: Vec<String>,
    pub collections: Vec<String>,
    pub albums: Vec<String>,
    /// true: any non-empty field may match; false: all of them must
    pub union: bool,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.label.is_empty()
            && self.notes.is_empty()
            && self.keywords.is_empty()
            && self.collections.is_empty()
            && self.albums.is_empty()
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut checks: Vec<bool> = Vec::with_capacity(5);
        if !self.label.is_empty() {
            checks.push(record.label == self.label);
        }
        if !self.notes.is_empty() {
            checks.push(record.notes == self.notes);
        }
        for (wanted, have) in [
            (&self.keywords, &record.keywords),
            (&self.collections, &record.collections),
            (&self.albums, &record.albums),
        ] {
            if wanted.is_empty() {
                continue;
            }
            checks.push(if self.union {
                wanted.iter().any(|w| have.contains(w))
            } else {
                wanted.iter().all(|w| have.contains(w))
            });
        }

        if self.union {
            checks.into_iter().any(|ok| ok)
        } else {
            checks.into_iter().all(|ok| ok)
        }
    }

    pub fn select<'a>(
        &self,
        records: impl IntoIterator<Item = &'a FileRecord>,
    ) -> Vec<&'a FileRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Utime,
    Ctime,
    Size,
    Like,
    Filename,
}

/// Sort records in place; ties fall back to the id so output is stable.
pub fn sort_records(records: &mut [&FileRecord], order: OrderBy, ascending: bool) {
    records.sort_by(|a, b| {
        let primary = match order {
            OrderBy::Utime => a.utime.cmp(&b.utime),
            OrderBy::Ctime => a.ctime.cmp(&b.ctime),
            OrderBy::Size => a.size.cmp(&b.size),
            OrderBy::Like => a.like.cmp(&b.like),
            OrderBy::Filename => a.filename.cmp(&b.filename),
        };
        let primary = if ascending { primary } else { primary.reverse() };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}
