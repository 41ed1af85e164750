//! Sharded YAML file backend.
//!
//! ## Storage Layout
//!
//! ```text
//! <records_dir>/
//!   <kind>/
//!     <s1>/
//!       <s2>/
//!         <id>/
//!           record.yaml
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the id. Files are written to a
//! temporary sibling and renamed into place, so readers never see a half-written record.

use super::{RecordKind, StorageBackend};
use crate::constants::RECORD_FILE_NAME;
use crate::{CoreError, CoreResult};
use secu_uuid::RecordId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Opens (creating if needed) a file backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(CoreError::StorageDirCreation)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_dir(&self, kind: RecordKind, id: &RecordId) -> PathBuf {
        id.sharded_dir(&self.root.join(kind.dir_name()))
    }

    fn record_path(&self, kind: RecordKind, id: &RecordId) -> PathBuf {
        self.record_dir(kind, id).join(RECORD_FILE_NAME)
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, kind: RecordKind, id: &RecordId) -> CoreResult<Option<String>> {
        match fs::read_to_string(self.record_path(kind, id)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::FileRead(e)),
        }
    }

    fn write(&self, kind: RecordKind, id: &RecordId, contents: &str) -> CoreResult<()> {
        let dir = self.record_dir(kind, id);
        fs::create_dir_all(&dir).map_err(CoreError::StorageDirCreation)?;

        let path = dir.join(RECORD_FILE_NAME);
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, contents).map_err(CoreError::FileWrite)?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            CoreError::FileWrite(e)
        })
    }

    fn remove(&self, kind: RecordKind, id: &RecordId) -> CoreResult<bool> {
        match fs::remove_dir_all(self.record_dir(kind, id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoreError::FileRemove(e)),
        }
    }

    fn scan(&self, kind: RecordKind) -> CoreResult<Vec<String>> {
        let mut out = Vec::new();

        let s1_iter = match fs::read_dir(self.root.join(kind.dir_name())) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }
            let Ok(s2_iter) = fs::read_dir(&s1_path) else {
                continue;
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }
                let Ok(id_iter) = fs::read_dir(&s2_path) else {
                    continue;
                };

                for id_ent in id_iter.flatten() {
                    let record_path = id_ent.path().join(RECORD_FILE_NAME);
                    if !record_path.is_file() {
                        continue;
                    }
                    match fs::read_to_string(&record_path) {
                        Ok(text) => out.push(text),
                        Err(e) => {
                            tracing::warn!("cannot read {}: {}", record_path.display(), e)
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_uses_sharded_layout() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();
        let id = RecordId::parse("550e8400e29b41d4a716446655440000").unwrap();

        backend.write(RecordKind::Consultation, &id, "cost: '10'").unwrap();

        let expected = temp
            .path()
            .join("consultations/55/0e/550e8400e29b41d4a716446655440000/record.yaml");
        assert!(expected.is_file());
        assert_eq!(
            backend.read(RecordKind::Consultation, &id).unwrap().as_deref(),
            Some("cost: '10'")
        );
    }

    #[test]
    fn test_read_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();
        assert!(backend
            .read(RecordKind::Person, &RecordId::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_scan_skips_stray_entries() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();
        backend.write(RecordKind::Doctor, &RecordId::new(), "a").unwrap();
        backend.write(RecordKind::Doctor, &RecordId::new(), "b").unwrap();
        fs::write(temp.path().join("doctors/README"), "not a shard").unwrap();

        let mut texts = backend.scan(RecordKind::Doctor).unwrap();
        texts.sort();
        assert_eq!(texts, vec!["a", "b"]);
        assert!(backend.scan(RecordKind::Account).unwrap().is_empty());
    }

    #[test]
    fn test_remove_deletes_record_dir() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();
        let id = RecordId::new();
        backend.write(RecordKind::Media, &id, "x").unwrap();

        assert!(backend.remove(RecordKind::Media, &id).unwrap());
        assert!(!id.sharded_dir(&temp.path().join("media")).exists());
        assert!(!backend.remove(RecordKind::Media, &id).unwrap());
    }

    #[test]
    fn test_overwrite_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();
        let id = RecordId::new();
        backend.write(RecordKind::Person, &id, "v1").unwrap();
        backend.write(RecordKind::Person, &id, "v2").unwrap();

        let dir = id.sharded_dir(&temp.path().join("persons"));
        let names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("record.yaml")]);
    }
}
