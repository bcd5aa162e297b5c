use std::collections::HashMap;

use super::data::FileRecord;

/// Disposable in-memory mirror of the registry for one invocation.
///
/// Never the source of truth for uniqueness; callers re-apply each
/// successful store mutation here.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    records: HashMap<String, FileRecord>,
}

impl Cache {
    pub fn apply_insert(&mut self, record: FileRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn apply_update(&mut self, record: FileRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn apply_delete(&mut self, id: &str) -> Option<FileRecord> {
        self.records.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&FileRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn by_filename(&self, filename: &str) -> Option<&FileRecord> {
        self.records.values().find(|r| r.filename == filename)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// All records sorted by id
    pub fn records(&self) -> Vec<&FileRecord> {
        let mut all: Vec<&FileRecord> = self.records.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<FileRecord> for Cache {
    fn from_iter<T: IntoIterator<Item = FileRecord>>(iter: T) -> Self {
        let mut cache = Cache::default();
        for record in iter {
            cache.apply_insert(record);
        }
        cache
    }
}
