//! Record storage.
//!
//! [`RecordStore`] is the typed facade every service talks to. It serialises records to YAML
//! and hands the text to an object-safe [`StorageBackend`], so swapping the in-memory backend
//! for the sharded file backend changes nothing above this module.
//!
//! ## Guarantees
//!
//! - Each mutation (`create`, `update`, `delete`) runs under one store-wide lock, so checks and
//!   writes inside a single call cannot interleave with another mutation.
//! - Reads observe every completed write.
//! - Records carry a `version`. `update` and `delete` compare it with the stored version and
//!   fail with [`CoreError::Conflict`] when they differ, so of two racing transitions on the
//!   same record at most one is applied.
//! - Unique keys declared by [`Record::unique_keys`] are enforced on create and update.
//!
//! Nothing spans more than one call; services validate fully before their first write.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::config::{CoreConfig, StorageKind};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secu_uuid::RecordId;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Collection a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Person,
    Insured,
    Doctor,
    Consultation,
    Prescription,
    Reimbursement,
    Account,
    Media,
}

impl RecordKind {
    /// Directory name used by the file backend.
    pub fn dir_name(self) -> &'static str {
        match self {
            RecordKind::Person => "persons",
            RecordKind::Insured => "insured",
            RecordKind::Doctor => "doctors",
            RecordKind::Consultation => "consultations",
            RecordKind::Prescription => "prescriptions",
            RecordKind::Reimbursement => "reimbursements",
            RecordKind::Account => "accounts",
            RecordKind::Media => "media",
        }
    }

    /// Human readable singular, used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Person => "person",
            RecordKind::Insured => "insured",
            RecordKind::Doctor => "doctor",
            RecordKind::Consultation => "consultation",
            RecordKind::Prescription => "prescription",
            RecordKind::Reimbursement => "reimbursement",
            RecordKind::Account => "account",
            RecordKind::Media => "media",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A persistable entity.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn id(&self) -> &RecordId;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn created_at(&self) -> DateTime<Utc>;

    /// `(key name, normalised value)` pairs that must be unique within the kind.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Raw text storage keyed by kind and id.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    fn read(&self, kind: RecordKind, id: &RecordId) -> CoreResult<Option<String>>;
    fn write(&self, kind: RecordKind, id: &RecordId, contents: &str) -> CoreResult<()>;
    /// Returns `false` if nothing was stored.
    fn remove(&self, kind: RecordKind, id: &RecordId) -> CoreResult<bool>;
    fn scan(&self, kind: RecordKind) -> CoreResult<Vec<String>>;
}

#[derive(Debug)]
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Opens the backend selected by `cfg`.
    pub fn open(cfg: &CoreConfig) -> CoreResult<Self> {
        let backend: Arc<dyn StorageBackend> = match cfg.storage() {
            StorageKind::Memory => Arc::new(MemoryBackend::new()),
            StorageKind::File => Arc::new(FileBackend::new(cfg.records_dir())?),
        };
        Ok(Self::new(backend))
    }

    pub fn find_by_id<T: Record>(&self, id: &RecordId) -> CoreResult<Option<T>> {
        self.backend
            .read(T::KIND, id)?
            .map(|text| decode::<T>(&text))
            .transpose()
    }

    /// Like [`RecordStore::find_by_id`] but a missing record is [`CoreError::NotFound`].
    pub fn get<T: Record>(&self, id: &RecordId) -> CoreResult<T> {
        self.find_by_id(id)?
            .ok_or_else(|| CoreError::not_found(T::KIND.label(), id))
    }

    pub fn exists<T: Record>(&self, id: &RecordId) -> CoreResult<bool> {
        Ok(self.backend.read(T::KIND, id)?.is_some())
    }

    /// All records of a kind, oldest first.
    ///
    /// Entries that fail to parse are logged and skipped.
    pub fn list<T: Record>(&self) -> CoreResult<Vec<T>> {
        let mut records: Vec<T> = self
            .backend
            .scan(T::KIND)?
            .iter()
            .filter_map(|text| match decode::<T>(text) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("skipping unreadable {} record: {}", T::KIND, e);
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(records)
    }

    pub fn find_where<T: Record>(&self, predicate: impl Fn(&T) -> bool) -> CoreResult<Vec<T>> {
        Ok(self
            .list::<T>()?
            .into_iter()
            .filter(|r| predicate(r))
            .collect())
    }

    pub fn find_one_where<T: Record>(
        &self,
        predicate: impl Fn(&T) -> bool,
    ) -> CoreResult<Option<T>> {
        Ok(self.list::<T>()?.into_iter().find(|r| predicate(r)))
    }

    pub fn find_by_unique_key<T: Record>(&self, key: &str, value: &str) -> CoreResult<Option<T>> {
        self.find_one_where(|r: &T| {
            r.unique_keys()
                .iter()
                .any(|(name, v)| *name == key && v == value)
        })
    }

    pub fn count<T: Record>(&self) -> CoreResult<usize> {
        Ok(self.backend.scan(T::KIND)?.len())
    }

    pub fn count_where<T: Record>(&self, predicate: impl Fn(&T) -> bool) -> CoreResult<usize> {
        Ok(self.find_where(predicate)?.len())
    }

    pub fn sum_where<T: Record>(
        &self,
        predicate: impl Fn(&T) -> bool,
        value: impl Fn(&T) -> Decimal,
    ) -> CoreResult<Decimal> {
        Ok(self
            .find_where(predicate)?
            .iter()
            .map(value)
            .fold(Decimal::ZERO, |acc, v| acc + v))
    }

    /// Inserts a new record at version 1.
    ///
    /// # Errors
    ///
    /// [`CoreError::Conflict`] if the id is taken or a unique key is already used.
    pub fn create<T: Record>(&self, mut record: T) -> CoreResult<T> {
        let _guard = self.lock()?;

        if self.backend.read(T::KIND, record.id())?.is_some() {
            return Err(CoreError::Conflict(format!(
                "{} {} already exists",
                T::KIND,
                record.id()
            )));
        }
        self.check_unique(&record)?;

        record.set_version(1);
        self.backend
            .write(T::KIND, record.id(), &encode(&record)?)?;
        Ok(record)
    }

    /// Replaces a stored record, bumping its version.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the record no longer exists
    /// - [`CoreError::Conflict`] if it was modified since `record` was read, or a unique key
    ///   collides with another record
    pub fn update<T: Record>(&self, mut record: T) -> CoreResult<T> {
        let _guard = self.lock()?;

        let current: T = self
            .find_by_id(record.id())?
            .ok_or_else(|| CoreError::not_found(T::KIND.label(), record.id()))?;
        check_version(&current, &record)?;
        self.check_unique(&record)?;

        record.set_version(current.version() + 1);
        self.backend
            .write(T::KIND, record.id(), &encode(&record)?)?;
        Ok(record)
    }

    /// Deletes `record`, provided it has not changed since it was read.
    pub fn delete<T: Record>(&self, record: &T) -> CoreResult<()> {
        let _guard = self.lock()?;

        let current: T = self
            .find_by_id(record.id())?
            .ok_or_else(|| CoreError::not_found(T::KIND.label(), record.id()))?;
        check_version(&current, record)?;

        self.backend.remove(T::KIND, record.id())?;
        Ok(())
    }

    /// Deletes by id without a version check. Returns `false` if nothing was stored.
    pub fn delete_by_id<T: Record>(&self, id: &RecordId) -> CoreResult<bool> {
        let _guard = self.lock()?;
        self.backend.remove(T::KIND, id)
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| CoreError::LockPoisoned)
    }

    fn check_unique<T: Record>(&self, record: &T) -> CoreResult<()> {
        let keys = record.unique_keys();
        if keys.is_empty() {
            return Ok(());
        }

        for other in self.list::<T>()? {
            if other.id() == record.id() {
                continue;
            }
            let other_keys = other.unique_keys();
            if let Some((name, value)) = keys.iter().find(|k| other_keys.contains(*k)) {
                return Err(CoreError::Conflict(format!(
                    "a {} with {} '{}' already exists",
                    T::KIND,
                    name,
                    value
                )));
            }
        }
        Ok(())
    }
}

fn check_version<T: Record>(current: &T, incoming: &T) -> CoreResult<()> {
    if current.version() != incoming.version() {
        return Err(CoreError::Conflict(format!(
            "{} {} was modified concurrently (expected version {}, found {})",
            T::KIND,
            incoming.id(),
            incoming.version(),
            current.version()
        )));
    }
    Ok(())
}

fn encode<T: Record>(record: &T) -> CoreResult<String> {
    serde_yaml::to_string(record).map_err(CoreError::YamlSerialization)
}

fn decode<T: Record>(text: &str) -> CoreResult<T> {
    serde_yaml::from_str(text).map_err(CoreError::YamlDeserialization)
}
