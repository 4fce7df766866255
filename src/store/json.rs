//! JSON-file implementation of the diff store.
//!
//! The whole relation lives in one schema-versioned JSON document
//! (`.stacked/diffs.json`). Every mutation rewrites the file atomically:
//! write to a `.tmp` sibling, fsync it, rename over the original, and fsync
//! the directory, so readers see either the old or the new document, never
//! a partial write.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DiffRecord, DiffStore, StoreError, StoreResult};
use crate::types::{DiffId, PrNumber};

/// Current schema version. Increment on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    schema_version: u32,
    diffs: Vec<DiffRecord>,
}

impl Document {
    fn empty() -> Document {
        Document {
            schema_version: SCHEMA_VERSION,
            diffs: Vec::new(),
        }
    }
}

/// File-backed diff store.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    records: Vec<DiffRecord>,
}

impl JsonStore {
    /// Open the store at `path`, creating an empty one if the file does not
    /// exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<JsonStore> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(contents) => {
                let doc: Document = serde_json::from_str(&contents)?;
                if doc.schema_version != SCHEMA_VERSION {
                    return Err(StoreError::SchemaMismatch {
                        expected: SCHEMA_VERSION,
                        got: doc.schema_version,
                    });
                }
                doc.diffs
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(JsonStore { path, records })
    }

    /// Create an empty store file on disk (used by `init`).
    pub fn init(path: impl Into<PathBuf>) -> StoreResult<JsonStore> {
        let store = JsonStore {
            path: path.into(),
            records: Vec::new(),
        };
        store.flush()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StoreResult<()> {
        let doc = Document {
            schema_version: SCHEMA_VERSION,
            diffs: self.records.clone(),
        };
        let contents = serde_json::to_string_pretty(&doc)?;

        // Both the file and its directory need an fsync before the rename
        // can be relied on across a crash.
        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            OpenOptions::new().read(true).open(dir)?.sync_all()?;
        }
        Ok(())
    }

    fn children_of<'a>(&'a self, id: &'a DiffId) -> impl Iterator<Item = &'a DiffRecord> {
        self.records
            .iter()
            .filter(move |r| r.parent_id.as_ref() == Some(id))
    }
}

impl DiffStore for JsonStore {
    fn get(&self, id: &DiffId) -> StoreResult<Option<DiffRecord>> {
        Ok(self.records.iter().find(|r| &r.id == id).cloned())
    }

    fn create(&mut self, record: DiffRecord) -> StoreResult<()> {
        if self.records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateId { id: record.id });
        }
        if let Some(parent) = &record.parent_id {
            if let Some(existing) = self.children_of(parent).next() {
                return Err(StoreError::ParentTaken {
                    parent: parent.clone(),
                    existing: existing.id.clone(),
                });
            }
        }
        self.records.push(record);
        self.flush()
    }

    fn update_review_handle(&mut self, id: &DiffId, handle: PrNumber) -> StoreResult<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        record.review_handle = Some(handle);
        self.flush()
    }

    fn get_child(&self, id: &DiffId) -> StoreResult<Option<DiffRecord>> {
        let mut children = self.children_of(id);
        let first = children.next().cloned();
        if children.next().is_some() {
            return Err(StoreError::AmbiguousChild { parent: id.clone() });
        }
        Ok(first)
    }

    fn delete(&mut self, id: &DiffId) -> StoreResult<()> {
        let before = self.records.len();
        self.records.retain(|r| &r.id != id);
        if self.records.len() == before {
            return Ok(());
        }
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, branch: &str, parent: Option<&str>) -> DiffRecord {
        DiffRecord {
            id: DiffId::new(id),
            branch: branch.to_string(),
            review_handle: None,
            parent_id: parent.map(DiffId::new),
        }
    }

    fn open_temp() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("diffs.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn get_missing_is_none() {
        let (_dir, store) = open_temp();
        assert_eq!(store.get(&DiffId::new("dnope1")).unwrap(), None);
        assert_eq!(store.get_child(&DiffId::new("dnope1")).unwrap(), None);
    }

    #[test]
    fn create_then_get() {
        let (_dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        let fetched = store.get(&DiffId::new("dabc12")).unwrap().unwrap();
        assert_eq!(fetched.branch, "fix-typo");
        assert_eq!(fetched.review_handle, None);
        assert_eq!(fetched.parent_id, None);
    }

    #[test]
    fn duplicate_id_rejected() {
        let (_dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        let err = store.create(record("dabc12", "other", None)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
    }

    #[test]
    fn parent_uniqueness_enforced() {
        let (_dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        store
            .create(record("dxyz99", "add-docs", Some("dabc12")))
            .unwrap();
        let err = store
            .create(record("dqqq11", "sibling", Some("dabc12")))
            .unwrap_err();
        assert!(matches!(err, StoreError::ParentTaken { .. }));
    }

    #[test]
    fn get_child_reverse_lookup() {
        let (_dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        store
            .create(record("dxyz99", "add-docs", Some("dabc12")))
            .unwrap();
        let child = store.get_child(&DiffId::new("dabc12")).unwrap().unwrap();
        assert_eq!(child.id, DiffId::new("dxyz99"));
        assert_eq!(store.get_child(&DiffId::new("dxyz99")).unwrap(), None);
    }

    #[test]
    fn get_child_rejects_hand_edited_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diffs.json");
        // A store file that violates the parent-uniqueness the write path
        // enforces, as a hand edit could produce.
        std::fs::write(
            &path,
            r#"{
              "schema_version": 1,
              "diffs": [
                {"id": "dabc12", "branch": "a"},
                {"id": "dxyz99", "branch": "b", "parent_id": "dabc12"},
                {"id": "dqqq11", "branch": "c", "parent_id": "dabc12"}
              ]
            }"#,
        )
        .unwrap();
        let store = JsonStore::open(&path).unwrap();
        let err = store.get_child(&DiffId::new("dabc12")).unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousChild { .. }));
    }

    #[test]
    fn update_review_handle_persists() {
        let (dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        store
            .update_review_handle(&DiffId::new("dabc12"), PrNumber(42))
            .unwrap();

        // Reopen from disk: the handle survived.
        let reopened = JsonStore::open(dir.path().join("diffs.json")).unwrap();
        let fetched = reopened.get(&DiffId::new("dabc12")).unwrap().unwrap();
        assert_eq!(fetched.review_handle, Some(PrNumber(42)));
    }

    #[test]
    fn update_missing_is_not_found() {
        let (_dir, mut store) = open_temp();
        let err = store
            .update_review_handle(&DiffId::new("dnope1"), PrNumber(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        store.delete(&DiffId::new("dabc12")).unwrap();
        store.delete(&DiffId::new("dabc12")).unwrap();
        assert_eq!(store.get(&DiffId::new("dabc12")).unwrap(), None);
    }

    #[test]
    fn deleting_parent_frees_the_link() {
        let (_dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        store
            .create(record("dxyz99", "add-docs", Some("dabc12")))
            .unwrap();
        store.delete(&DiffId::new("dxyz99")).unwrap();
        store
            .create(record("dqqq11", "replacement", Some("dabc12")))
            .unwrap();
    }

    #[test]
    fn schema_mismatch_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diffs.json");
        std::fs::write(&path, r#"{"schema_version": 99, "diffs": []}"#).unwrap();
        let err = JsonStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { got: 99, .. }));
    }

    #[test]
    fn every_mutation_is_readable_after_reopen() {
        let (dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        store
            .create(record("dxyz99", "add-docs", Some("dabc12")))
            .unwrap();
        store.delete(&DiffId::new("dxyz99")).unwrap();

        let reopened = JsonStore::open(dir.path().join("diffs.json")).unwrap();
        assert!(reopened.get(&DiffId::new("dabc12")).unwrap().is_some());
        assert_eq!(reopened.get(&DiffId::new("dxyz99")).unwrap(), None);
        assert!(!dir.path().join("diffs.json.tmp").exists());
    }

    #[test]
    fn atomic_rewrite_leaves_no_tmp_file() {
        let (dir, mut store) = open_temp();
        store.create(record("dabc12", "fix-typo", None)).unwrap();
        assert!(dir.path().join("diffs.json").exists());
        assert!(!dir.path().join("diffs.json.tmp").exists());
    }
}
