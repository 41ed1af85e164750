//! Consultations.
//!
//! Recording a consultation also creates its reimbursement, so every consultation has one unless
//! it was deleted explicitly. Once that reimbursement is processed the consultation is frozen.

use super::{check_period, compensate, restore, ReimbursementService};
use crate::models::{
    Consultation, ConsultationInput, ConsultationUpdate, Doctor, Insured, Prescription,
    PrescriptionInput, Reimbursement,
};
use crate::rules::{self, ValidPrescription};
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use secu_uuid::RecordId;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsultationStats {
    pub total: usize,
    pub with_generalist: usize,
    pub with_specialist: usize,
}

#[derive(Clone, Debug)]
pub struct ConsultationService {
    store: Arc<RecordStore>,
    reimbursements: ReimbursementService,
}

impl ConsultationService {
    pub fn new(store: Arc<RecordStore>, reimbursements: ReimbursementService) -> Self {
        Self {
            store,
            reimbursements,
        }
    }

    /// Records a consultation and its pending reimbursement.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the insured or the doctor does not exist
    /// - [`CoreError::InvalidArgument`] if the cost is missing or not strictly positive
    pub fn create(&self, input: ConsultationInput) -> CoreResult<Consultation> {
        let (consultation, doctor) = self.prepare(input)?;
        let (consultation, _) = self.write(consultation, &doctor, Vec::new())?;
        Ok(consultation)
    }

    /// Records a consultation together with its prescriptions.
    ///
    /// Every prescription is validated before anything is written.
    ///
    /// # Errors
    ///
    /// As [`ConsultationService::create`], plus [`CoreError::Forbidden`] if the doctor is a
    /// specialist and any prescription is given, and the prescription validation errors.
    pub fn create_with_prescriptions(
        &self,
        input: ConsultationInput,
        prescriptions: Vec<PrescriptionInput>,
    ) -> CoreResult<(Consultation, Vec<Prescription>)> {
        let (consultation, doctor) = self.prepare(input)?;
        if !prescriptions.is_empty() {
            rules::ensure_can_prescribe(&doctor)?;
        }
        let valid = prescriptions
            .into_iter()
            .map(|p| rules::validate_prescription(p, |id| self.store.find_by_id::<Doctor>(id)))
            .collect::<CoreResult<Vec<_>>>()?;
        self.write(consultation, &doctor, valid)
    }

    pub fn get(&self, id: &RecordId) -> CoreResult<Consultation> {
        self.store.get(id)
    }

    pub fn list(&self) -> CoreResult<Vec<Consultation>> {
        self.store.list()
    }

    /// [`CoreError::NotFound`] if the insured does not exist.
    pub fn by_insured(&self, insured_id: &RecordId) -> CoreResult<Vec<Consultation>> {
        if !self.store.exists::<Insured>(insured_id)? {
            return Err(CoreError::not_found("insured", insured_id));
        }
        self.store
            .find_where(|c: &Consultation| &c.insured_id == insured_id)
    }

    /// [`CoreError::NotFound`] if the doctor does not exist.
    pub fn by_doctor(&self, doctor_id: &RecordId) -> CoreResult<Vec<Consultation>> {
        if !self.store.exists::<Doctor>(doctor_id)? {
            return Err(CoreError::not_found("doctor", doctor_id));
        }
        self.store
            .find_where(|c: &Consultation| &c.doctor_id == doctor_id)
    }

    /// Consultations dated within `[start, end]`.
    pub fn by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Consultation>> {
        check_period(start, end)?;
        self.store
            .find_where(|c: &Consultation| c.date >= start && c.date <= end)
    }

    pub fn with_generalists(&self) -> CoreResult<Vec<Consultation>> {
        self.by_doctor_category(true)
    }

    pub fn with_specialists(&self) -> CoreResult<Vec<Consultation>> {
        self.by_doctor_category(false)
    }

    /// Prescriptions issued during a consultation.
    pub fn prescriptions(&self, id: &RecordId) -> CoreResult<Vec<Prescription>> {
        if !self.store.exists::<Consultation>(id)? {
            return Err(CoreError::not_found("consultation", id));
        }
        self.store
            .find_where(|p: &Prescription| &p.consultation_id == id)
    }

    pub fn reimbursement(&self, id: &RecordId) -> CoreResult<Option<Reimbursement>> {
        self.reimbursements.for_consultation(id)
    }

    /// Changes date, cost or notes and recalculates the reimbursement.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the consultation does not exist
    /// - [`CoreError::InvalidArgument`] if the new cost is not strictly positive
    /// - [`CoreError::Conflict`] if the reimbursement has been processed
    pub fn update(&self, id: &RecordId, update: ConsultationUpdate) -> CoreResult<Consultation> {
        let mut consultation: Consultation = self.store.get(id)?;
        let reimbursement = self.reimbursements.by_consultation(id)?;
        rules::ensure_consultation_editable(reimbursement.as_ref(), "update")?;
        let previous = consultation.clone();

        if let Some(cost) = update.cost {
            consultation.cost = rules::require_positive_cost(Some(cost))?;
        }
        if let Some(date) = update.date {
            consultation.date = date;
        }
        if update.notes.is_some() {
            consultation.notes = clean_notes(update.notes);
        }

        let consultation = self.store.update(consultation)?;
        if let Some(reimbursement) = reimbursement {
            if let Err(e) = self
                .reimbursements
                .recalculate_for(reimbursement, &consultation)
            {
                return Err(compensate("update consultation", e, || {
                    restore(&self.store, previous, &consultation)
                }));
            }
        }
        tracing::info!("updated consultation {id}");
        Ok(consultation)
    }

    /// Deletes a consultation with its prescriptions and reimbursement.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the consultation does not exist
    /// - [`CoreError::Conflict`] if the reimbursement has been processed
    pub fn delete(&self, id: &RecordId) -> CoreResult<()> {
        let consultation: Consultation = self.store.get(id)?;
        let reimbursement = self.reimbursements.by_consultation(id)?;
        rules::ensure_consultation_editable(reimbursement.as_ref(), "delete")?;

        for prescription in self
            .store
            .find_where(|p: &Prescription| &p.consultation_id == id)?
        {
            self.store.delete(&prescription)?;
        }
        if let Some(reimbursement) = reimbursement {
            self.store.delete(&reimbursement)?;
        }
        self.store.delete(&consultation)?;
        tracing::info!("deleted consultation {id}");
        Ok(())
    }

    pub fn stats(&self) -> CoreResult<ConsultationStats> {
        let generalists: HashSet<RecordId> = self
            .store
            .find_where(Doctor::is_generalist)?
            .into_iter()
            .map(|d| d.id)
            .collect();
        let all = self.list()?;
        let with_generalist = all
            .iter()
            .filter(|c| generalists.contains(&c.doctor_id))
            .count();
        Ok(ConsultationStats {
            total: all.len(),
            with_generalist,
            with_specialist: all.len() - with_generalist,
        })
    }

    fn by_doctor_category(&self, generalist: bool) -> CoreResult<Vec<Consultation>> {
        let doctors: HashSet<RecordId> = self
            .store
            .find_where(|d: &Doctor| d.is_generalist() == generalist)?
            .into_iter()
            .map(|d| d.id)
            .collect();
        self.store
            .find_where(|c: &Consultation| doctors.contains(&c.doctor_id))
    }

    fn prepare(&self, input: ConsultationInput) -> CoreResult<(Consultation, Doctor)> {
        let _insured: Insured = self.store.get(&input.insured_id)?;
        let doctor: Doctor = self.store.get(&input.doctor_id)?;
        let cost = rules::require_positive_cost(input.cost)?;
        let now = Utc::now();
        let consultation = Consultation {
            id: RecordId::new(),
            date: input.date.unwrap_or(now),
            insured_id: input.insured_id,
            doctor_id: input.doctor_id,
            cost,
            notes: clean_notes(input.notes),
            created_at: now,
            version: 0,
        };
        Ok((consultation, doctor))
    }

    /// Writes the consultation, its reimbursement and prescriptions, undoing earlier writes if a
    /// later one fails.
    fn write(
        &self,
        consultation: Consultation,
        doctor: &Doctor,
        prescriptions: Vec<ValidPrescription>,
    ) -> CoreResult<(Consultation, Vec<Prescription>)> {
        let consultation = self.store.create(consultation)?;
        let undo = |written: &[Prescription], reimbursement: Option<&Reimbursement>| {
            for p in written {
                self.store.delete(p)?;
            }
            if let Some(r) = reimbursement {
                self.store.delete(r)?;
            }
            self.store.delete(&consultation)
        };

        let reimbursement = match self.reimbursements.create_for(&consultation, doctor, None) {
            Ok(r) => r,
            Err(e) => return Err(compensate("record consultation", e, || undo(&[], None))),
        };

        let mut written = Vec::with_capacity(prescriptions.len());
        for valid in prescriptions {
            let prescription = Prescription {
                id: RecordId::new(),
                consultation_id: consultation.id.clone(),
                kind: valid.kind,
                medication_details: valid.medication_details,
                specialist_id: valid.specialist_id,
                created_at: Utc::now(),
                version: 0,
            };
            match self.store.create(prescription) {
                Ok(p) => written.push(p),
                Err(e) => {
                    return Err(compensate("record consultation", e, || {
                        undo(&written, Some(&reimbursement))
                    }))
                }
            }
        }

        tracing::info!(
            "recorded consultation {} ({} prescription(s))",
            consultation.id,
            written.len()
        );
        Ok((consultation, written))
    }
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{failing_fixture, fixture};
    use crate::store::RecordKind;
    use super::*;
    use crate::lifecycle::ReimbursementStatus;
    use crate::models::PrescriptionKind;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn input(insured_id: &RecordId, doctor_id: &RecordId) -> ConsultationInput {
        ConsultationInput {
            insured_id: insured_id.clone(),
            doctor_id: doctor_id.clone(),
            date: None,
            cost: Some(dec!(25.00)),
            notes: Some("  follow-up  ".into()),
        }
    }

    #[test]
    fn test_create_creates_pending_reimbursement() {
        let f = fixture();
        let insured = f.insured("Martin");
        let doctor = f.generalist("Laurent");
        let consultation = f
            .services
            .consultations
            .create(input(insured.id(), doctor.id()))
            .unwrap();
        assert_eq!(consultation.notes.as_deref(), Some("follow-up"));

        let r = f
            .services
            .consultations
            .reimbursement(&consultation.id)
            .unwrap()
            .unwrap();
        assert_eq!(r.status, ReimbursementStatus::Pending);
        assert_eq!(r.amount, dec!(25.00));
    }

    #[test]
    fn test_create_requires_existing_parties_and_positive_cost() {
        let f = fixture();
        let insured = f.insured("Martin");
        let doctor = f.generalist("Laurent");

        assert!(matches!(
            f.services
                .consultations
                .create(input(&RecordId::new(), doctor.id())),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            f.services
                .consultations
                .create(input(insured.id(), &RecordId::new())),
            Err(CoreError::NotFound(_))
        ));

        let mut free = input(insured.id(), doctor.id());
        free.cost = Some(dec!(0));
        assert!(matches!(
            f.services.consultations.create(free),
            Err(CoreError::InvalidArgument(_))
        ));
        assert_eq!(f.store.count::<Consultation>().unwrap(), 0);
    }

    #[test]
    fn test_create_with_prescriptions_validates_first() {
        let f = fixture();
        let insured = f.insured("Martin");
        let generalist = f.generalist("Laurent");
        let cardiologist = f.specialist("Dubois", "Cardiology");

        let bad = vec![
            PrescriptionInput {
                kind: Some(PrescriptionKind::Medication),
                medication_details: Some("Paracetamol 1g".into()),
                specialist_id: None,
            },
            PrescriptionInput {
                kind: Some(PrescriptionKind::SpecialistReferral),
                specialist_id: Some(generalist.id().clone()),
                ..Default::default()
            },
        ];
        assert!(f
            .services
            .consultations
            .create_with_prescriptions(input(insured.id(), generalist.id()), bad)
            .is_err());
        assert_eq!(f.store.count::<Consultation>().unwrap(), 0);
        assert_eq!(f.store.count::<Prescription>().unwrap(), 0);

        let good = vec![PrescriptionInput {
            kind: Some(PrescriptionKind::SpecialistReferral),
            specialist_id: Some(cardiologist.id().clone()),
            ..Default::default()
        }];
        let (consultation, prescriptions) = f
            .services
            .consultations
            .create_with_prescriptions(input(insured.id(), generalist.id()), good)
            .unwrap();
        assert_eq!(prescriptions.len(), 1);
        assert_eq!(
            f.services
                .consultations
                .prescriptions(&consultation.id)
                .unwrap(),
            prescriptions
        );
    }

    #[test]
    fn test_specialist_consultation_cannot_carry_prescriptions() {
        let f = fixture();
        let insured = f.insured("Martin");
        let cardiologist = f.specialist("Dubois", "Cardiology");
        let prescriptions = vec![PrescriptionInput {
            kind: Some(PrescriptionKind::Medication),
            medication_details: Some("Aspirin".into()),
            specialist_id: None,
        }];
        assert!(matches!(
            f.services
                .consultations
                .create_with_prescriptions(input(insured.id(), cardiologist.id()), prescriptions),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn test_update_recalculates_reimbursement() {
        let f = fixture();
        let insured = f.insured("Martin");
        let doctor = f.specialist("Dubois", "Cardiology");
        let consultation = f.consultation(insured.id(), doctor.id(), dec!(50));

        f.services
            .consultations
            .update(
                &consultation.id,
                ConsultationUpdate {
                    cost: Some(dec!(60)),
                    ..Default::default()
                },
            )
            .unwrap();
        let r = f
            .services
            .reimbursements
            .by_consultation(&consultation.id)
            .unwrap()
            .unwrap();
        assert_eq!(r.amount, dec!(48.00));
    }

    #[test]
    fn test_processed_consultation_is_frozen() {
        let f = fixture();
        let insured = f.insured("Martin");
        let doctor = f.generalist("Laurent");
        let consultation = f.consultation(insured.id(), doctor.id(), dec!(25));
        let r = f
            .services
            .reimbursements
            .by_consultation(&consultation.id)
            .unwrap()
            .unwrap();
        f.services.reimbursements.process(&r.id).unwrap();

        assert!(matches!(
            f.services
                .consultations
                .update(&consultation.id, ConsultationUpdate::default()),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            f.services.consultations.delete(&consultation.id),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_delete_cascades() {
        let f = fixture();
        let insured = f.insured("Martin");
        let doctor = f.generalist("Laurent");
        let (consultation, _) = f
            .services
            .consultations
            .create_with_prescriptions(
                input(insured.id(), doctor.id()),
                vec![PrescriptionInput {
                    kind: Some(PrescriptionKind::Medication),
                    medication_details: Some("Ibuprofen 400mg".into()),
                    specialist_id: None,
                }],
            )
            .unwrap();

        f.services.consultations.delete(&consultation.id).unwrap();
        assert_eq!(f.store.count::<Consultation>().unwrap(), 0);
        assert_eq!(f.store.count::<Prescription>().unwrap(), 0);
        assert_eq!(f.store.count::<Reimbursement>().unwrap(), 0);
    }

    #[test]
    fn test_queries_and_stats() {
        let f = fixture();
        let insured = f.insured("Martin");
        let generalist = f.generalist("Laurent");
        let cardiologist = f.specialist("Dubois", "Cardiology");
        f.consultation(insured.id(), generalist.id(), dec!(25));
        f.consultation(insured.id(), cardiologist.id(), dec!(50));

        assert_eq!(
            f.services
                .consultations
                .by_insured(insured.id())
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            f.services
                .consultations
                .by_doctor(cardiologist.id())
                .unwrap()
                .len(),
            1
        );
        assert!(f.services.consultations.by_doctor(&RecordId::new()).is_err());
        assert_eq!(f.services.consultations.with_generalists().unwrap().len(), 1);
        assert_eq!(f.services.consultations.with_specialists().unwrap().len(), 1);

        let now = Utc::now();
        assert_eq!(
            f.services
                .consultations
                .by_period(now - Duration::days(1), now + Duration::days(1))
                .unwrap()
                .len(),
            2
        );
        assert!(f
            .services
            .consultations
            .by_period(now, now - Duration::days(1))
            .is_err());

        assert_eq!(
            f.services.consultations.stats().unwrap(),
            ConsultationStats {
                total: 2,
                with_generalist: 1,
                with_specialist: 1,
            }
        );
    }

    #[test]
    fn test_update_keeps_old_cost_when_reimbursement_write_fails() {
        let (f, backend) = failing_fixture();
        let insured = f.insured("Martin");
        let doctor = f.generalist("Laurent");
        let consultation = f.consultation(insured.id(), doctor.id(), dec!(100));
        let halve = || ConsultationUpdate {
            cost: Some(dec!(50)),
            ..Default::default()
        };

        backend.fail_writes(RecordKind::Reimbursement);
        let result = f.services.consultations.update(&consultation.id, halve());
        assert!(matches!(result, Err(CoreError::FileWrite(_))));
        backend.heal();

        let stored = f.services.consultations.get(&consultation.id).unwrap();
        let r = f
            .services
            .consultations
            .reimbursement(&consultation.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.cost, dec!(100));
        assert_eq!(r.amount, stored.cost);

        let updated = f.services.consultations.update(&consultation.id, halve()).unwrap();
        let r = f
            .services
            .consultations
            .reimbursement(&consultation.id)
            .unwrap()
            .unwrap();
        assert_eq!(updated.cost, dec!(50));
        assert_eq!(r.amount, dec!(50.00));
    }
}
