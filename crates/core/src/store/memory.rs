//! In-process backend.

use super::{RecordKind, StorageBackend};
use crate::{CoreError, CoreResult};
use secu_uuid::RecordId;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<RecordKind, BTreeMap<RecordId, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, kind: RecordKind, id: &RecordId) -> CoreResult<Option<String>> {
        let records = self.records.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(records.get(&kind).and_then(|m| m.get(id)).cloned())
    }

    fn write(&self, kind: RecordKind, id: &RecordId, contents: &str) -> CoreResult<()> {
        let mut records = self.records.write().map_err(|_| CoreError::LockPoisoned)?;
        records
            .entry(kind)
            .or_default()
            .insert(id.clone(), contents.to_owned());
        Ok(())
    }

    fn remove(&self, kind: RecordKind, id: &RecordId) -> CoreResult<bool> {
        let mut records = self.records.write().map_err(|_| CoreError::LockPoisoned)?;
        Ok(records
            .get_mut(&kind)
            .and_then(|m| m.remove(id))
            .is_some())
    }

    fn scan(&self, kind: RecordKind) -> CoreResult<Vec<String>> {
        let records = self.records.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(records
            .get(&kind)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_isolated() {
        let backend = MemoryBackend::new();
        let id = RecordId::new();
        backend.write(RecordKind::Person, &id, "a: 1").unwrap();

        assert!(backend.read(RecordKind::Doctor, &id).unwrap().is_none());
        assert_eq!(backend.scan(RecordKind::Person).unwrap().len(), 1);
        assert!(backend.scan(RecordKind::Doctor).unwrap().is_empty());
    }

    #[test]
    fn test_remove_reports_presence() {
        let backend = MemoryBackend::new();
        let id = RecordId::new();
        backend.write(RecordKind::Account, &id, "x").unwrap();

        assert!(backend.remove(RecordKind::Account, &id).unwrap());
        assert!(!backend.remove(RecordKind::Account, &id).unwrap());
    }
}
