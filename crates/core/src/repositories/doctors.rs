//! Doctor registration and practice details.
//!
//! A doctor without a specialization is a generalist. Only generalists can prescribe or act as
//! referring doctor, so turning a generalist with patients into a specialist is refused.

use super::{compensate, restore, PersonService};
use crate::models::{
    parse_specialization, Consultation, Doctor, DoctorInput, DoctorProfile, Insured, Person,
    PersonInput, Prescription,
};
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::Utc;
use secu_types::NonEmptyText;
use secu_uuid::RecordId;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct DoctorService {
    store: Arc<RecordStore>,
    persons: PersonService,
}

impl DoctorService {
    pub fn new(store: Arc<RecordStore>, persons: PersonService) -> Self {
        Self { store, persons }
    }

    /// Registers a new doctor together with their identity.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if a mandatory field is missing or malformed
    /// - [`CoreError::Conflict`] if the email is already registered
    pub fn register(&self, input: DoctorInput) -> CoreResult<DoctorProfile> {
        let now = Utc::now();
        let fields = input.person.validate(now.date_naive())?;
        let specialization = parse_specialization(input.specialization.as_deref())?;

        let id = RecordId::new();
        let person = self.store.create(Person::new(id.clone(), fields, now))?;
        let doctor = Doctor {
            id,
            specialization,
            created_at: now,
            version: 0,
        };
        let doctor = match self.store.create(doctor) {
            Ok(doctor) => doctor,
            Err(e) => {
                return Err(compensate("register doctor", e, || {
                    self.store.delete(&person)
                }))
            }
        };

        log_registered(&doctor);
        Ok(DoctorProfile { person, doctor })
    }

    /// Registers an existing person as doctor.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the person does not exist
    /// - [`CoreError::Conflict`] if the person already is a doctor
    pub fn register_existing_person(
        &self,
        person_id: &RecordId,
        specialization: Option<&str>,
    ) -> CoreResult<DoctorProfile> {
        let specialization = parse_specialization(specialization)?;
        let person: Person = self.store.get(person_id)?;
        let doctor = self.store.create(Doctor {
            id: person.id.clone(),
            specialization,
            created_at: Utc::now(),
            version: 0,
        })?;
        log_registered(&doctor);
        Ok(DoctorProfile { person, doctor })
    }

    pub fn get(&self, id: &RecordId) -> CoreResult<DoctorProfile> {
        let doctor: Doctor = self.store.get(id)?;
        self.profile(doctor)
    }

    pub fn list(&self) -> CoreResult<Vec<DoctorProfile>> {
        self.profiles(self.store.list()?)
    }

    pub fn generalists(&self) -> CoreResult<Vec<DoctorProfile>> {
        self.profiles(self.store.find_where(Doctor::is_generalist)?)
    }

    pub fn specialists(&self) -> CoreResult<Vec<DoctorProfile>> {
        self.profiles(self.store.find_where(Doctor::is_specialist)?)
    }

    /// Case-insensitive exact match on the specialization.
    pub fn by_specialization(&self, specialization: &str) -> CoreResult<Vec<DoctorProfile>> {
        let wanted = specialization.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(CoreError::InvalidArgument(
                "specialization cannot be empty".into(),
            ));
        }
        self.profiles(self.store.find_where(|d: &Doctor| {
            d.specialization
                .as_ref()
                .is_some_and(|s| s.as_str().to_lowercase() == wanted)
        })?)
    }

    pub fn search_by_name(&self, query: &str) -> CoreResult<Vec<DoctorProfile>> {
        if query.trim().is_empty() {
            return Err(CoreError::InvalidArgument(
                "search query cannot be empty".into(),
            ));
        }
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.person.matches_name(query))
            .collect())
    }

    /// Distinct specializations in use, sorted.
    pub fn specializations(&self) -> CoreResult<Vec<String>> {
        let distinct: BTreeSet<String> = self
            .store
            .list::<Doctor>()?
            .into_iter()
            .filter_map(|d| d.specialization.map(NonEmptyText::into_inner))
            .collect();
        Ok(distinct.into_iter().collect())
    }

    pub fn is_generalist(&self, id: &RecordId) -> CoreResult<bool> {
        let doctor: Doctor = self.store.get(id)?;
        Ok(doctor.is_generalist())
    }

    pub fn count(&self) -> CoreResult<usize> {
        self.store.count::<Doctor>()
    }

    /// Changes the specialization. Blank means generalist.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the doctor does not exist
    /// - [`CoreError::Conflict`] if a generalist with patients would become a specialist
    pub fn update_specialization(
        &self,
        id: &RecordId,
        specialization: Option<&str>,
    ) -> CoreResult<DoctorProfile> {
        let doctor: Doctor = self.store.get(id)?;
        let doctor = self.respecialize(doctor, parse_specialization(specialization)?)?;
        self.profile(doctor)
    }

    /// Replaces identity fields and specialization.
    pub fn update(
        &self,
        id: &RecordId,
        person: PersonInput,
        specialization: Option<&str>,
    ) -> CoreResult<DoctorProfile> {
        let doctor: Doctor = self.store.get(id)?;
        let specialization = parse_specialization(specialization)?;
        let mut identity: Person = self.store.get(id)?;
        let previous = identity.clone();
        identity.apply(person.validate(Utc::now().date_naive())?);
        if specialization.is_some() {
            self.ensure_no_patients(id)?;
        }

        let identity = self.store.update(identity)?;
        let doctor = self
            .respecialize(doctor, specialization)
            .map_err(|e| {
                compensate("update doctor", e, || {
                    restore(&self.store, previous, &identity)
                })
            })?;
        tracing::info!("updated doctor {id}");
        Ok(DoctorProfile {
            person: identity,
            doctor,
        })
    }

    /// Deletes a doctor and their identity.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the doctor does not exist
    /// - [`CoreError::Conflict`] if the doctor has consultations, patients or incoming referrals
    pub fn delete(&self, id: &RecordId) -> CoreResult<()> {
        let doctor: Doctor = self.store.get(id)?;
        let consultations = self
            .store
            .count_where(|c: &Consultation| &c.doctor_id == id)?;
        if consultations > 0 {
            return Err(CoreError::Conflict(format!(
                "doctor {id} has {consultations} consultation(s)"
            )));
        }
        self.ensure_no_patients(id)?;
        let referrals = self
            .store
            .count_where(|p: &Prescription| p.specialist_id.as_ref() == Some(id))?;
        if referrals > 0 {
            return Err(CoreError::Conflict(format!(
                "doctor {id} is the target of {referrals} referral(s)"
            )));
        }

        self.store.delete(&doctor)?;
        if let Some(person) = self.store.find_by_id::<Person>(id)? {
            self.persons.remove_identity(&person)?;
        }
        tracing::info!("deleted doctor {id}");
        Ok(())
    }

    fn respecialize(
        &self,
        mut doctor: Doctor,
        specialization: Option<NonEmptyText>,
    ) -> CoreResult<Doctor> {
        if doctor.specialization == specialization {
            return Ok(doctor);
        }
        if specialization.is_some() {
            self.ensure_no_patients(&doctor.id)?;
        }
        doctor.specialization = specialization;
        let doctor = self.store.update(doctor)?;
        match &doctor.specialization {
            Some(s) => tracing::info!("doctor {} is now a {} specialist", doctor.id, s),
            None => tracing::info!("doctor {} is now a generalist", doctor.id),
        }
        Ok(doctor)
    }

    fn ensure_no_patients(&self, id: &RecordId) -> CoreResult<()> {
        let patients = self
            .store
            .count_where(|i: &Insured| i.referring_doctor_id.as_ref() == Some(id))?;
        if patients > 0 {
            return Err(CoreError::Conflict(format!(
                "doctor {id} is the referring doctor of {patients} insured"
            )));
        }
        Ok(())
    }

    fn profile(&self, doctor: Doctor) -> CoreResult<DoctorProfile> {
        let person: Person = self.store.get(&doctor.id)?;
        Ok(DoctorProfile { person, doctor })
    }

    fn profiles(&self, doctors: Vec<Doctor>) -> CoreResult<Vec<DoctorProfile>> {
        doctors.into_iter().map(|d| self.profile(d)).collect()
    }
}

fn log_registered(doctor: &Doctor) {
    match &doctor.specialization {
        Some(s) => tracing::info!("registered {} specialist {}", s, doctor.id),
        None => tracing::info!("registered generalist {}", doctor.id),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{failing_fixture, fixture, person_input};
    use crate::store::RecordKind;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_register_generalist_and_specialist() {
        let f = fixture();
        let generalist = f.generalist("Laurent");
        let specialist = f.specialist("Dubois", "Cardiology");

        assert!(f.services.doctors.is_generalist(generalist.id()).unwrap());
        assert!(!f.services.doctors.is_generalist(specialist.id()).unwrap());
        assert_eq!(f.services.doctors.generalists().unwrap().len(), 1);
        assert_eq!(f.services.doctors.specialists().unwrap().len(), 1);
        assert_eq!(f.services.doctors.count().unwrap(), 2);
    }

    #[test]
    fn test_blank_specialization_registers_generalist() {
        let f = fixture();
        let doctor = f
            .services
            .doctors
            .register(DoctorInput {
                person: person_input("Laurent"),
                specialization: Some("   ".into()),
            })
            .unwrap();
        assert!(doctor.doctor.is_generalist());
    }

    #[test]
    fn test_register_existing_person() {
        let f = fixture();
        let person = f.services.persons.create(person_input("Blanc")).unwrap();
        let doctor = f
            .services
            .doctors
            .register_existing_person(&person.id, Some("Dermatology"))
            .unwrap();
        assert_eq!(doctor.person.id, person.id);
        assert!(matches!(
            f.services
                .doctors
                .register_existing_person(&person.id, None),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            f.services
                .doctors
                .register_existing_person(&RecordId::new(), None),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_specialization_queries() {
        let f = fixture();
        f.specialist("Dubois", "Cardiology");
        f.specialist("Morel", "cardiology");
        f.specialist("Girard", "Dermatology");
        f.generalist("Laurent");

        assert_eq!(
            f.services
                .doctors
                .by_specialization("CARDIOLOGY")
                .unwrap()
                .len(),
            2
        );
        assert!(f.services.doctors.by_specialization(" ").is_err());
        assert_eq!(
            f.services.doctors.specializations().unwrap(),
            vec!["Cardiology", "Dermatology", "cardiology"]
        );
        assert_eq!(f.services.doctors.search_by_name("mor").unwrap().len(), 1);
    }

    #[test]
    fn test_cannot_specialize_referring_doctor() {
        let f = fixture();
        let doctor = f.generalist("Laurent");
        let insured = f.insured("Martin");
        f.services
            .insured
            .set_referring_doctor(insured.id(), Some(doctor.id()))
            .unwrap();

        assert!(matches!(
            f.services
                .doctors
                .update_specialization(doctor.id(), Some("Cardiology")),
            Err(CoreError::Conflict(_))
        ));
        assert!(f.services.doctors.is_generalist(doctor.id()).unwrap());
    }

    #[test]
    fn test_update_specialization() {
        let f = fixture();
        let doctor = f.specialist("Dubois", "Cardiology");
        let updated = f
            .services
            .doctors
            .update_specialization(doctor.id(), None)
            .unwrap();
        assert!(updated.doctor.is_generalist());
        assert_eq!(updated.doctor.version, 2);
    }

    #[test]
    fn test_update_identity() {
        let f = fixture();
        let doctor = f.generalist("Laurent");
        let mut person = person_input("Laurent-Petit");
        person.email = doctor.person.email.as_str().to_owned();
        let updated = f
            .services
            .doctors
            .update(doctor.id(), person, Some("Pediatrics"))
            .unwrap();
        assert_eq!(updated.person.last_name.as_str(), "Laurent-Petit");
        assert!(updated.doctor.is_specialist());
    }

    #[test]
    fn test_delete_blocked_by_dependents() {
        let f = fixture();
        let doctor = f.generalist("Laurent");
        let insured = f.insured("Martin");
        f.consultation(insured.id(), doctor.id(), dec!(25));
        assert!(matches!(
            f.services.doctors.delete(doctor.id()),
            Err(CoreError::Conflict(_))
        ));

        let with_patient = f.generalist("Roche");
        f.services
            .insured
            .set_referring_doctor(insured.id(), Some(with_patient.id()))
            .unwrap();
        assert!(matches!(
            f.services.doctors.delete(with_patient.id()),
            Err(CoreError::Conflict(_))
        ));

        let free = f.specialist("Dubois", "Cardiology");
        f.services.doctors.delete(free.id()).unwrap();
        assert!(!f.services.persons.exists(free.id()).unwrap());
    }

    #[test]
    fn test_update_restores_identity_when_specialization_write_fails() {
        let (f, backend) = failing_fixture();
        let doctor = f.generalist("Laurent");

        backend.fail_writes(RecordKind::Doctor);
        let result =
            f.services
                .doctors
                .update(doctor.id(), person_input("Moreau"), Some("Cardiology"));
        assert!(matches!(result, Err(CoreError::FileWrite(_))));
        backend.heal();

        let stored = f.services.doctors.get(doctor.id()).unwrap();
        assert_eq!(stored.person.last_name.as_str(), "Laurent");
        assert!(stored.doctor.is_generalist());
    }
}
