//! Insured registration and coverage.
//!
//! An insured is a [`Person`] plus an [`Insured`] record under the same id. Registration writes
//! both; if the second write fails the person is removed again.

use super::{compensate, restore, PersonService};
use crate::models::{
    Consultation, Doctor, Insured, InsuredInput, InsuredProfile, PaymentMethod, Person,
    PersonInput,
};
use crate::rules;
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::Utc;
use secu_types::InsuranceNumber;
use secu_uuid::RecordId;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct InsuredService {
    store: Arc<RecordStore>,
    persons: PersonService,
}

impl InsuredService {
    pub fn new(store: Arc<RecordStore>, persons: PersonService) -> Self {
        Self { store, persons }
    }

    /// Registers a new insured person.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if a mandatory field is missing or malformed
    /// - [`CoreError::Conflict`] if the email or insurance number is already registered
    /// - [`CoreError::CleanupAfterFailure`] if the insured record could not be written and the
    ///   person created for it could not be removed
    pub fn register(&self, input: InsuredInput) -> CoreResult<InsuredProfile> {
        let now = Utc::now();
        let fields = input.person.validate(now.date_naive())?;
        let insurance_number = InsuranceNumber::new(&input.insurance_number)
            .map_err(|e| CoreError::field("insurance_number", e))?;
        let payment_method = input
            .payment_method
            .ok_or_else(|| CoreError::InvalidArgument("payment_method is required".into()))?;

        if self
            .store
            .find_by_unique_key::<Insured>("insurance_number", insurance_number.as_str())?
            .is_some()
        {
            return Err(CoreError::Conflict(format!(
                "insurance number {insurance_number} is already registered"
            )));
        }

        let id = RecordId::new();
        let person = self.store.create(Person::new(id.clone(), fields, now))?;
        let insured = Insured {
            id,
            insurance_number,
            payment_method,
            referring_doctor_id: None,
            created_at: now,
            version: 0,
        };
        let insured = match self.store.create(insured) {
            Ok(insured) => insured,
            Err(e) => {
                return Err(compensate("register insured", e, || {
                    self.store.delete(&person)
                }))
            }
        };

        tracing::info!("registered insured {}", insured.id);
        Ok(InsuredProfile { person, insured })
    }

    pub fn get(&self, id: &RecordId) -> CoreResult<InsuredProfile> {
        let insured: Insured = self.store.get(id)?;
        self.profile(insured)
    }

    pub fn list(&self) -> CoreResult<Vec<InsuredProfile>> {
        self.profiles(self.store.list()?)
    }

    pub fn find_by_insurance_number(&self, number: &str) -> CoreResult<Option<InsuredProfile>> {
        self.store
            .find_by_unique_key::<Insured>("insurance_number", number.trim())?
            .map(|insured| self.profile(insured))
            .transpose()
    }

    /// Replaces identity fields and the preferred payment method.
    ///
    /// The insurance number is fixed at registration.
    pub fn update(
        &self,
        id: &RecordId,
        person: PersonInput,
        payment_method: Option<PaymentMethod>,
    ) -> CoreResult<InsuredProfile> {
        let mut insured: Insured = self.store.get(id)?;
        let mut identity: Person = self.store.get(id)?;
        let previous = identity.clone();
        identity.apply(person.validate(Utc::now().date_naive())?);

        let identity = self.store.update(identity)?;
        if let Some(method) = payment_method {
            if method != insured.payment_method {
                insured.payment_method = method;
                insured = match self.store.update(insured) {
                    Ok(insured) => insured,
                    Err(e) => {
                        return Err(compensate("update insured", e, || {
                            restore(&self.store, previous, &identity)
                        }))
                    }
                };
            }
        }
        tracing::info!("updated insured {id}");
        Ok(InsuredProfile {
            person: identity,
            insured,
        })
    }

    /// Sets or clears the referring doctor.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the insured or the doctor does not exist
    /// - [`CoreError::Forbidden`] if the doctor is a specialist
    pub fn set_referring_doctor(
        &self,
        id: &RecordId,
        doctor_id: Option<&RecordId>,
    ) -> CoreResult<InsuredProfile> {
        let mut insured: Insured = self.store.get(id)?;
        if let Some(doctor_id) = doctor_id {
            let doctor: Doctor = self.store.get(doctor_id)?;
            rules::ensure_can_be_referring_doctor(&doctor)?;
        }
        insured.referring_doctor_id = doctor_id.cloned();
        let insured = self.store.update(insured)?;
        match &insured.referring_doctor_id {
            Some(doctor_id) => tracing::info!("insured {id} now refers to doctor {doctor_id}"),
            None => tracing::info!("insured {id} no longer has a referring doctor"),
        }
        self.profile(insured)
    }

    pub fn without_referring_doctor(&self) -> CoreResult<Vec<InsuredProfile>> {
        self.profiles(
            self.store
                .find_where(|i: &Insured| i.referring_doctor_id.is_none())?,
        )
    }

    pub fn by_payment_method(&self, method: PaymentMethod) -> CoreResult<Vec<InsuredProfile>> {
        self.profiles(
            self.store
                .find_where(|i: &Insured| i.payment_method == method)?,
        )
    }

    /// Patients of a doctor. [`CoreError::NotFound`] if the doctor does not exist.
    pub fn by_referring_doctor(&self, doctor_id: &RecordId) -> CoreResult<Vec<InsuredProfile>> {
        if !self.store.exists::<Doctor>(doctor_id)? {
            return Err(CoreError::not_found("doctor", doctor_id));
        }
        self.profiles(
            self.store
                .find_where(|i: &Insured| i.referring_doctor_id.as_ref() == Some(doctor_id))?,
        )
    }

    pub fn search_by_name(&self, query: &str) -> CoreResult<Vec<InsuredProfile>> {
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

    pub fn count(&self) -> CoreResult<usize> {
        self.store.count::<Insured>()
    }

    pub fn count_with_referring_doctor(&self) -> CoreResult<usize> {
        self.store
            .count_where(|i: &Insured| i.referring_doctor_id.is_some())
    }

    /// Deletes an insured and their identity.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the insured does not exist
    /// - [`CoreError::Conflict`] if the insured has consultations
    pub fn delete(&self, id: &RecordId) -> CoreResult<()> {
        let insured: Insured = self.store.get(id)?;
        let consultations = self
            .store
            .count_where(|c: &Consultation| &c.insured_id == id)?;
        if consultations > 0 {
            return Err(CoreError::Conflict(format!(
                "insured {id} has {consultations} consultation(s)"
            )));
        }

        self.store.delete(&insured)?;
        if let Some(person) = self.store.find_by_id::<Person>(id)? {
            self.persons.remove_identity(&person)?;
        }
        tracing::info!("deleted insured {id}");
        Ok(())
    }

    fn profile(&self, insured: Insured) -> CoreResult<InsuredProfile> {
        let person: Person = self.store.get(&insured.id)?;
        Ok(InsuredProfile { person, insured })
    }

    fn profiles(&self, insured: Vec<Insured>) -> CoreResult<Vec<InsuredProfile>> {
        insured.into_iter().map(|i| self.profile(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{failing_fixture, fixture, insured_input, person_input};
    use crate::store::RecordKind;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_register_creates_person_and_insured() {
        let f = fixture();
        let profile = f.insured("Martin");
        assert_eq!(profile.person.id, profile.insured.id);
        assert_eq!(profile.insured.payment_method, PaymentMethod::BankTransfer);
        assert!(profile.insured.referring_doctor_id.is_none());
        assert_eq!(f.services.insured.get(profile.id()).unwrap(), profile);
    }

    #[test]
    fn test_register_requires_valid_number_and_method() {
        let f = fixture();
        let mut input = insured_input("Martin", PaymentMethod::Cash);
        input.insurance_number = "12345".into();
        assert!(matches!(
            f.services.insured.register(input),
            Err(CoreError::InvalidArgument(_))
        ));

        let mut input = insured_input("Martin", PaymentMethod::Cash);
        input.payment_method = None;
        assert!(f.services.insured.register(input).is_err());
        assert_eq!(f.store.count::<Person>().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_insurance_number_conflicts_without_orphan_person() {
        let f = fixture();
        let first = f.insured("Martin");
        let mut input = insured_input("Durand", PaymentMethod::Cash);
        input.insurance_number = first.insured.insurance_number.as_str().to_owned();
        assert!(matches!(
            f.services.insured.register(input),
            Err(CoreError::Conflict(_))
        ));
        assert_eq!(f.store.count::<Person>().unwrap(), 1);
    }

    #[test]
    fn test_find_by_insurance_number() {
        let f = fixture();
        let profile = f.insured("Martin");
        let found = f
            .services
            .insured
            .find_by_insurance_number(profile.insured.insurance_number.as_str())
            .unwrap();
        assert_eq!(found.map(|p| p.insured.id), Some(profile.insured.id));
        assert!(f
            .services
            .insured
            .find_by_insurance_number("0000000000000")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_referring_doctor_must_be_generalist() {
        let f = fixture();
        let insured = f.insured("Martin");
        let cardiologist = f.specialist("Dubois", "Cardiology");
        let generalist = f.generalist("Laurent");

        assert!(matches!(
            f.services
                .insured
                .set_referring_doctor(insured.id(), Some(cardiologist.id())),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            f.services
                .insured
                .set_referring_doctor(insured.id(), Some(&RecordId::new())),
            Err(CoreError::NotFound(_))
        ));

        let updated = f
            .services
            .insured
            .set_referring_doctor(insured.id(), Some(generalist.id()))
            .unwrap();
        assert_eq!(
            updated.insured.referring_doctor_id.as_ref(),
            Some(generalist.id())
        );
        assert_eq!(
            f.services
                .insured
                .by_referring_doctor(generalist.id())
                .unwrap()
                .len(),
            1
        );
        assert_eq!(f.services.insured.count_with_referring_doctor().unwrap(), 1);

        let cleared = f
            .services
            .insured
            .set_referring_doctor(insured.id(), None)
            .unwrap();
        assert!(cleared.insured.referring_doctor_id.is_none());
        assert_eq!(
            f.services.insured.without_referring_doctor().unwrap().len(),
            1
        );
    }

    #[test]
    fn test_queries() {
        let f = fixture();
        f.insured("Martin");
        f.services
            .insured
            .register(insured_input("Moreau", PaymentMethod::Cash))
            .unwrap();

        assert_eq!(f.services.insured.count().unwrap(), 2);
        assert_eq!(
            f.services
                .insured
                .by_payment_method(PaymentMethod::Cash)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(f.services.insured.search_by_name("mor").unwrap().len(), 1);
        assert_eq!(f.services.insured.list().unwrap().len(), 2);
    }

    #[test]
    fn test_update_changes_method_and_identity() {
        let f = fixture();
        let profile = f.insured("Martin");
        let mut person = insured_input("Martinez", PaymentMethod::Cash).person;
        person.email = profile.person.email.as_str().to_owned();

        let updated = f
            .services
            .insured
            .update(profile.id(), person, Some(PaymentMethod::Cash))
            .unwrap();
        assert_eq!(updated.person.last_name.as_str(), "Martinez");
        assert_eq!(updated.insured.payment_method, PaymentMethod::Cash);
        assert_eq!(
            updated.insured.insurance_number,
            profile.insured.insurance_number
        );
    }

    #[test]
    fn test_delete_blocked_by_consultations() {
        let f = fixture();
        let insured = f.insured("Martin");
        let doctor = f.generalist("Laurent");
        f.consultation(insured.id(), doctor.id(), dec!(25));

        assert!(matches!(
            f.services.insured.delete(insured.id()),
            Err(CoreError::Conflict(_))
        ));

        let other = f.insured("Petit");
        f.services.insured.delete(other.id()).unwrap();
        assert!(!f.services.persons.exists(other.id()).unwrap());
    }

    #[test]
    fn test_update_restores_identity_when_method_write_fails() {
        let (f, backend) = failing_fixture();
        let profile = f.insured("Martin");

        backend.fail_writes(RecordKind::Insured);
        let result =
            f.services
                .insured
                .update(profile.id(), person_input("Durand"), Some(PaymentMethod::Cash));
        assert!(matches!(result, Err(CoreError::FileWrite(_))));
        backend.heal();

        let stored = f.services.insured.get(profile.id()).unwrap();
        assert_eq!(stored.person.last_name.as_str(), "Martin");
        assert_eq!(stored.person.email, profile.person.email);
        assert_eq!(stored.insured.payment_method, PaymentMethod::BankTransfer);
    }
}
