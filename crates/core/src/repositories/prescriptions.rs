//! Prescriptions issued during consultations.
//!
//! Only generalists prescribe. A prescription stays attached to the consultation it was issued
//! in; updates re-run the full validation.

use super::check_period;
use crate::models::{
    Consultation, Doctor, Insured, Prescription, PrescriptionInput, PrescriptionKind,
};
use crate::rules;
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use secu_uuid::RecordId;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PrescriptionService {
    store: Arc<RecordStore>,
}

impl PrescriptionService {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Adds a prescription to a consultation.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the consultation or the referral target does not exist
    /// - [`CoreError::Forbidden`] if the consultation's doctor is a specialist
    /// - [`CoreError::InvalidArgument`] if the kind-specific fields are missing, or the referral
    ///   target is a generalist
    pub fn create(
        &self,
        consultation_id: &RecordId,
        input: PrescriptionInput,
    ) -> CoreResult<Prescription> {
        let consultation: Consultation = self.store.get(consultation_id)?;
        let doctor: Doctor = self.store.get(&consultation.doctor_id)?;
        rules::ensure_can_prescribe(&doctor)?;
        let valid = rules::validate_prescription(input, |id| self.store.find_by_id(id))?;

        let prescription = self.store.create(Prescription {
            id: RecordId::new(),
            consultation_id: consultation.id,
            kind: valid.kind,
            medication_details: valid.medication_details,
            specialist_id: valid.specialist_id,
            created_at: Utc::now(),
            version: 0,
        })?;
        tracing::info!(
            "issued {:?} prescription {} in consultation {}",
            prescription.kind,
            prescription.id,
            prescription.consultation_id
        );
        Ok(prescription)
    }

    pub fn get(&self, id: &RecordId) -> CoreResult<Prescription> {
        self.store.get(id)
    }

    pub fn list(&self) -> CoreResult<Vec<Prescription>> {
        self.store.list()
    }

    /// [`CoreError::NotFound`] if the consultation does not exist.
    pub fn by_consultation(&self, consultation_id: &RecordId) -> CoreResult<Vec<Prescription>> {
        if !self.store.exists::<Consultation>(consultation_id)? {
            return Err(CoreError::not_found("consultation", consultation_id));
        }
        self.store
            .find_where(|p: &Prescription| &p.consultation_id == consultation_id)
    }

    pub fn by_kind(&self, kind: PrescriptionKind) -> CoreResult<Vec<Prescription>> {
        self.store.find_where(|p: &Prescription| p.kind == kind)
    }

    pub fn medications(&self) -> CoreResult<Vec<Prescription>> {
        self.by_kind(PrescriptionKind::Medication)
    }

    /// [`CoreError::NotFound`] if the insured does not exist.
    pub fn by_insured(&self, insured_id: &RecordId) -> CoreResult<Vec<Prescription>> {
        let consultations = self.consultations_of_insured(insured_id)?;
        self.store
            .find_where(|p: &Prescription| consultations.contains(&p.consultation_id))
    }

    pub fn by_insured_and_kind(
        &self,
        insured_id: &RecordId,
        kind: PrescriptionKind,
    ) -> CoreResult<Vec<Prescription>> {
        let consultations = self.consultations_of_insured(insured_id)?;
        self.store.find_where(|p: &Prescription| {
            p.kind == kind && consultations.contains(&p.consultation_id)
        })
    }

    /// Prescriptions issued by a doctor. [`CoreError::NotFound`] if the doctor does not exist.
    pub fn by_doctor(&self, doctor_id: &RecordId) -> CoreResult<Vec<Prescription>> {
        if !self.store.exists::<Doctor>(doctor_id)? {
            return Err(CoreError::not_found("doctor", doctor_id));
        }
        let consultations = self.consultation_ids(|c| &c.doctor_id == doctor_id)?;
        self.store
            .find_where(|p: &Prescription| consultations.contains(&p.consultation_id))
    }

    /// Referrals addressed to a specialist. [`CoreError::NotFound`] if the doctor does not exist.
    pub fn for_specialist(&self, specialist_id: &RecordId) -> CoreResult<Vec<Prescription>> {
        if !self.store.exists::<Doctor>(specialist_id)? {
            return Err(CoreError::not_found("doctor", specialist_id));
        }
        self.store
            .find_where(|p: &Prescription| p.specialist_id.as_ref() == Some(specialist_id))
    }

    /// Prescriptions from consultations dated within `[start, end]`.
    pub fn by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Prescription>> {
        check_period(start, end)?;
        let consultations = self.consultation_ids(|c| c.date >= start && c.date <= end)?;
        self.store
            .find_where(|p: &Prescription| consultations.contains(&p.consultation_id))
    }

    /// Replaces kind and kind-specific fields.
    pub fn update(&self, id: &RecordId, input: PrescriptionInput) -> CoreResult<Prescription> {
        let mut prescription: Prescription = self.store.get(id)?;
        let valid = rules::validate_prescription(input, |id| self.store.find_by_id(id))?;
        prescription.kind = valid.kind;
        prescription.medication_details = valid.medication_details;
        prescription.specialist_id = valid.specialist_id;
        let prescription = self.store.update(prescription)?;
        tracing::info!("updated prescription {id}");
        Ok(prescription)
    }

    pub fn delete(&self, id: &RecordId) -> CoreResult<()> {
        let prescription: Prescription = self.store.get(id)?;
        self.store.delete(&prescription)?;
        tracing::info!("deleted prescription {id}");
        Ok(())
    }

    pub fn count_medications_for_insured(&self, insured_id: &RecordId) -> CoreResult<usize> {
        Ok(self
            .by_insured_and_kind(insured_id, PrescriptionKind::Medication)?
            .len())
    }

    pub fn count_referrals_for_insured(&self, insured_id: &RecordId) -> CoreResult<usize> {
        Ok(self
            .by_insured_and_kind(insured_id, PrescriptionKind::SpecialistReferral)?
            .len())
    }

    fn consultations_of_insured(&self, insured_id: &RecordId) -> CoreResult<HashSet<RecordId>> {
        if !self.store.exists::<Insured>(insured_id)? {
            return Err(CoreError::not_found("insured", insured_id));
        }
        self.consultation_ids(|c| &c.insured_id == insured_id)
    }

    fn consultation_ids(
        &self,
        predicate: impl Fn(&Consultation) -> bool,
    ) -> CoreResult<HashSet<RecordId>> {
        Ok(self
            .store
            .find_where(predicate)?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }
}
