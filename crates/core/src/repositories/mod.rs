//! Business services.
//!
//! Each service wraps the shared [`RecordStore`] and owns one area of the domain: identity,
//! coverage, practice, consultations, prescriptions, reimbursements and accounts. Services hold
//! no mutable state of their own; they are cheap to clone and safe to share across request
//! handlers.
//!
//! ## Write discipline
//!
//! Every operation loads what it needs and runs every rule before its first write. Operations
//! that write several records (registering an insured, recording a consultation) undo the
//! earlier writes when a later one fails; if the undo fails too the caller gets
//! [`CoreError::CleanupAfterFailure`] carrying both errors.

pub mod accounts;
pub mod consultations;
pub mod doctors;
pub mod insured;
pub mod persons;
pub mod prescriptions;
pub mod reimbursements;

pub use accounts::{AccountService, RegisterInput};
pub use consultations::{ConsultationService, ConsultationStats};
pub use doctors::DoctorService;
pub use insured::InsuredService;
pub use persons::PersonService;
pub use prescriptions::PrescriptionService;
pub use reimbursements::{ReimbursementBreakdown, ReimbursementService, ReimbursementStats};

use crate::config::CoreConfig;
use crate::store::{Record, RecordStore};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use secu_files::MediaStore;
use std::sync::Arc;

/// Every service, wired to one store.
#[derive(Clone, Debug)]
pub struct Services {
    pub persons: PersonService,
    pub insured: InsuredService,
    pub doctors: DoctorService,
    pub consultations: ConsultationService,
    pub prescriptions: PrescriptionService,
    pub reimbursements: ReimbursementService,
    pub accounts: AccountService,
}

impl Services {
    /// Opens the record store and media store described by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the storage directories cannot be created.
    pub fn open(cfg: Arc<CoreConfig>) -> CoreResult<Self> {
        let store = Arc::new(RecordStore::open(&cfg)?);
        let media = MediaStore::new(&cfg.media_dir())?;
        tracing::info!(
            "opened {:?} record store under {}",
            cfg.storage(),
            cfg.data_dir().display()
        );
        Ok(Self::with_store(&cfg, store, media))
    }

    pub fn with_store(cfg: &CoreConfig, store: Arc<RecordStore>, media: MediaStore) -> Self {
        let persons = PersonService::new(store.clone(), media);
        let reimbursements = ReimbursementService::new(store.clone());
        Self {
            insured: InsuredService::new(store.clone(), persons.clone()),
            doctors: DoctorService::new(store.clone(), persons.clone()),
            persons,
            consultations: ConsultationService::new(store.clone(), reimbursements.clone()),
            prescriptions: PrescriptionService::new(store.clone()),
            reimbursements,
            accounts: AccountService::new(store, cfg.password_rounds()),
        }
    }
}

/// `start` must not be after `end`.
pub(crate) fn check_period(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<()> {
    if start > end {
        return Err(CoreError::InvalidArgument(format!(
            "period start {start} is after its end {end}"
        )));
    }
    Ok(())
}

/// Runs `cleanup` after `original` failed and reports both errors if it fails as well.
pub(crate) fn compensate<T>(
    operation: &'static str,
    original: CoreError,
    cleanup: impl FnOnce() -> CoreResult<T>,
) -> CoreError {
    match cleanup() {
        Ok(_) => original,
        Err(cleanup) => {
            tracing::error!("{operation}: compensation failed: {cleanup}");
            CoreError::CleanupAfterFailure {
                operation,
                original: Box::new(original),
                cleanup: Box::new(cleanup),
            }
        }
    }
}

/// Writes `previous` back over the `saved` revision of the same record.
pub(crate) fn restore<T: Record>(store: &RecordStore, mut previous: T, saved: &T) -> CoreResult<T> {
    previous.set_version(saved.version());
    store.update(previous)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::StorageKind;
    use crate::store::{MemoryBackend, RecordKind, StorageBackend};
    use crate::models::{
        Consultation, ConsultationInput, DoctorInput, DoctorProfile, Gender, InsuredInput,
        InsuredProfile, PaymentMethod, PersonInput,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use secu_uuid::RecordId;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    pub(crate) const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    static NEXT: AtomicU64 = AtomicU64::new(1);

    fn next() -> u64 {
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) struct Fixture {
        pub services: Services,
        pub store: Arc<RecordStore>,
        _media_dir: TempDir,
    }

    pub(crate) fn fixture() -> Fixture {
        fixture_on(Arc::new(MemoryBackend::new()))
    }

    /// A fixture whose store can be told to reject writes.
    pub(crate) fn failing_fixture() -> (Fixture, Arc<FailingBackend>) {
        let backend = Arc::new(FailingBackend::default());
        (fixture_on(backend.clone()), backend)
    }

    fn fixture_on(backend: Arc<dyn StorageBackend>) -> Fixture {
        let media_dir = TempDir::new().unwrap();
        let cfg = CoreConfig::new(media_dir.path().to_path_buf(), StorageKind::Memory, 1_000)
            .unwrap();
        let store = Arc::new(RecordStore::new(backend));
        let media = MediaStore::new(&cfg.media_dir()).unwrap();
        Fixture {
            services: Services::with_store(&cfg, store.clone(), media),
            store,
            _media_dir: media_dir,
        }
    }

    /// In-memory backend that fails writes of one kind, optionally only for one id.
    #[derive(Debug, Default)]
    pub(crate) struct FailingBackend {
        inner: MemoryBackend,
        failing: Mutex<Option<(RecordKind, Option<RecordId>)>>,
    }

    impl FailingBackend {
        pub(crate) fn fail_writes(&self, kind: RecordKind) {
            *self.failing.lock().unwrap() = Some((kind, None));
        }

        pub(crate) fn fail_writes_for(&self, kind: RecordKind, id: &RecordId) {
            *self.failing.lock().unwrap() = Some((kind, Some(id.clone())));
        }

        pub(crate) fn heal(&self) {
            *self.failing.lock().unwrap() = None;
        }

        fn rejects(&self, kind: RecordKind, id: &RecordId) -> bool {
            match &*self.failing.lock().unwrap() {
                Some((k, None)) => *k == kind,
                Some((k, Some(only))) => *k == kind && only == id,
                None => false,
            }
        }
    }

    impl StorageBackend for FailingBackend {
        fn read(&self, kind: RecordKind, id: &RecordId) -> CoreResult<Option<String>> {
            self.inner.read(kind, id)
        }

        fn write(&self, kind: RecordKind, id: &RecordId, contents: &str) -> CoreResult<()> {
            if self.rejects(kind, id) {
                return Err(CoreError::FileWrite(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.write(kind, id, contents)
        }

        fn remove(&self, kind: RecordKind, id: &RecordId) -> CoreResult<bool> {
            self.inner.remove(kind, id)
        }

        fn scan(&self, kind: RecordKind) -> CoreResult<Vec<String>> {
            self.inner.scan(kind)
        }
    }

    /// A valid person whose email and phone differ on every call.
    pub(crate) fn person_input(last_name: &str) -> PersonInput {
        let n = next();
        PersonInput {
            last_name: last_name.into(),
            first_name: "Alex".into(),
            birth_date: NaiveDate::from_ymd_opt(1975, 4, 2),
            gender: Some(Gender::Other),
            address: "3 place Bellecour, Lyon".into(),
            phone: format!("+336{n:08}"),
            email: format!("{}.{n}@example.fr", last_name.to_lowercase()),
        }
    }

    pub(crate) fn insured_input(last_name: &str, method: PaymentMethod) -> InsuredInput {
        InsuredInput {
            person: person_input(last_name),
            insurance_number: format!("1{:012}", next()),
            payment_method: Some(method),
        }
    }

    impl Fixture {
        pub(crate) fn insured(&self, last_name: &str) -> InsuredProfile {
            self.services
                .insured
                .register(insured_input(last_name, PaymentMethod::BankTransfer))
                .unwrap()
        }

        pub(crate) fn generalist(&self, last_name: &str) -> DoctorProfile {
            self.services
                .doctors
                .register(DoctorInput {
                    person: person_input(last_name),
                    specialization: None,
                })
                .unwrap()
        }

        pub(crate) fn specialist(&self, last_name: &str, specialization: &str) -> DoctorProfile {
            self.services
                .doctors
                .register(DoctorInput {
                    person: person_input(last_name),
                    specialization: Some(specialization.into()),
                })
                .unwrap()
        }

        pub(crate) fn consultation(
            &self,
            insured_id: &RecordId,
            doctor_id: &RecordId,
            cost: Decimal,
        ) -> Consultation {
            self.services
                .consultations
                .create(ConsultationInput {
                    insured_id: insured_id.clone(),
                    doctor_id: doctor_id.clone(),
                    date: None,
                    cost: Some(cost),
                    notes: None,
                })
                .unwrap()
        }
    }
}
