//! Reimbursement lifecycle operations.
//!
//! Every transition loads the record, applies the transition on the model (which consults the
//! status table in [`crate::lifecycle`]) and writes it back with the version it was read at. Two
//! racing transitions on the same record therefore cannot both succeed: the second one either
//! sees the new status and fails with [`CoreError::InvalidState`], or loses the version check and
//! fails with [`CoreError::Conflict`].

use super::check_period;
use crate::lifecycle::ReimbursementStatus;
use crate::models::{Consultation, Doctor, Insured, PaymentMethod, Reimbursement};
use crate::money;
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secu_uuid::RecordId;
use std::collections::HashSet;
use std::sync::Arc;

/// Counts and sums over all reimbursements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReimbursementStats {
    pub total: usize,
    pub pending: usize,
    pub processed: usize,
    pub refused: usize,
    pub processed_amount: Decimal,
    pub pending_amount: Decimal,
}

/// How a reimbursement amount relates to the consultation cost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReimbursementBreakdown {
    pub cost: Decimal,
    pub amount: Decimal,
    pub rate: Decimal,
    pub percentage: Decimal,
    pub out_of_pocket: Decimal,
}

#[derive(Clone, Debug)]
pub struct ReimbursementService {
    store: Arc<RecordStore>,
}

impl ReimbursementService {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Creates the reimbursement for a consultation that has none.
    ///
    /// The amount follows the doctor's category; the payment method defaults to the insured's
    /// preferred one.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the consultation (or its doctor or insured) does not exist
    /// - [`CoreError::Conflict`] if the consultation already has a reimbursement
    pub fn create(
        &self,
        consultation_id: &RecordId,
        payment_method: Option<PaymentMethod>,
    ) -> CoreResult<Reimbursement> {
        let consultation: Consultation = self.store.get(consultation_id)?;
        if self.by_consultation(consultation_id)?.is_some() {
            return Err(CoreError::Conflict(format!(
                "consultation {consultation_id} already has a reimbursement"
            )));
        }
        let doctor: Doctor = self.store.get(&consultation.doctor_id)?;
        self.create_for(&consultation, &doctor, payment_method)
    }

    /// Creates the reimbursement for an already loaded consultation.
    pub(crate) fn create_for(
        &self,
        consultation: &Consultation,
        doctor: &Doctor,
        payment_method: Option<PaymentMethod>,
    ) -> CoreResult<Reimbursement> {
        let payment_method = match payment_method {
            Some(method) => method,
            None => {
                let insured: Insured = self.store.get(&consultation.insured_id)?;
                insured.payment_method
            }
        };
        let amount = money::calculate(consultation.cost, doctor.is_generalist())?;
        let reimbursement = self.store.create(Reimbursement::new(
            consultation.id.clone(),
            amount,
            payment_method,
            Utc::now(),
        ))?;
        tracing::info!(
            "created reimbursement {} of {} for consultation {}",
            reimbursement.id,
            money::format_amount(amount),
            consultation.id
        );
        Ok(reimbursement)
    }

    pub fn get(&self, id: &RecordId) -> CoreResult<Reimbursement> {
        self.store.get(id)
    }

    pub fn list(&self) -> CoreResult<Vec<Reimbursement>> {
        self.store.list()
    }

    pub fn by_status(&self, status: ReimbursementStatus) -> CoreResult<Vec<Reimbursement>> {
        self.store
            .find_where(|r: &Reimbursement| r.status == status)
    }

    pub fn pending(&self) -> CoreResult<Vec<Reimbursement>> {
        self.by_status(ReimbursementStatus::Pending)
    }

    pub fn processed(&self) -> CoreResult<Vec<Reimbursement>> {
        self.by_status(ReimbursementStatus::Processed)
    }

    pub fn refused(&self) -> CoreResult<Vec<Reimbursement>> {
        self.by_status(ReimbursementStatus::Refused)
    }

    /// Reimbursements for an insured's consultations.
    ///
    /// [`CoreError::NotFound`] if the insured does not exist.
    pub fn by_insured(&self, insured_id: &RecordId) -> CoreResult<Vec<Reimbursement>> {
        if !self.store.exists::<Insured>(insured_id)? {
            return Err(CoreError::not_found("insured", insured_id));
        }
        let consultations: HashSet<RecordId> = self
            .store
            .find_where(|c: &Consultation| &c.insured_id == insured_id)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        self.store
            .find_where(|r: &Reimbursement| consultations.contains(&r.consultation_id))
    }

    pub fn by_method(&self, method: PaymentMethod) -> CoreResult<Vec<Reimbursement>> {
        self.store
            .find_where(|r: &Reimbursement| r.payment_method == method)
    }

    /// Processed reimbursements whose processing time falls within `[start, end]`.
    pub fn processed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Reimbursement>> {
        check_period(start, end)?;
        self.store.find_where(|r: &Reimbursement| {
            r.status == ReimbursementStatus::Processed
                && r.processed_at.is_some_and(|at| at >= start && at <= end)
        })
    }

    pub fn by_consultation(&self, consultation_id: &RecordId) -> CoreResult<Option<Reimbursement>> {
        self.store
            .find_by_unique_key("consultation_id", &consultation_id.to_string())
    }

    /// Like [`ReimbursementService::by_consultation`] but the consultation must exist.
    pub fn for_consultation(
        &self,
        consultation_id: &RecordId,
    ) -> CoreResult<Option<Reimbursement>> {
        if !self.store.exists::<Consultation>(consultation_id)? {
            return Err(CoreError::not_found("consultation", consultation_id));
        }
        self.by_consultation(consultation_id)
    }

    /// PENDING to PROCESSED, stamping the processing time.
    pub fn process(&self, id: &RecordId) -> CoreResult<Reimbursement> {
        let reimbursement = self.transition(id, |r| r.process(Utc::now()))?;
        tracing::info!("processed reimbursement {id}");
        Ok(reimbursement)
    }

    /// PENDING to REFUSED. Blank reasons are stored as absent.
    pub fn refuse(&self, id: &RecordId, reason: Option<&str>) -> CoreResult<Reimbursement> {
        let reimbursement = self.transition(id, |r| r.refuse(reason, Utc::now()))?;
        tracing::info!("refused reimbursement {id}");
        Ok(reimbursement)
    }

    /// PROCESSED back to PENDING.
    pub fn revert_processing(&self, id: &RecordId) -> CoreResult<Reimbursement> {
        let reimbursement = self.transition(id, Reimbursement::revert_processing)?;
        tracing::info!("reverted processing of reimbursement {id}");
        Ok(reimbursement)
    }

    pub fn change_method(&self, id: &RecordId, method: PaymentMethod) -> CoreResult<Reimbursement> {
        let reimbursement = self.transition(id, |r| r.change_method(method))?;
        tracing::info!("reimbursement {id} will be paid by {method}");
        Ok(reimbursement)
    }

    /// Recomputes the amount from the consultation's current cost and doctor.
    pub fn recalculate(&self, id: &RecordId) -> CoreResult<Reimbursement> {
        let current: Reimbursement = self.store.get(id)?;
        let consultation: Consultation = self.store.get(&current.consultation_id)?;
        self.recalculate_for(current, &consultation)
    }

    pub(crate) fn recalculate_for(
        &self,
        mut reimbursement: Reimbursement,
        consultation: &Consultation,
    ) -> CoreResult<Reimbursement> {
        let doctor: Doctor = self.store.get(&consultation.doctor_id)?;
        let amount = money::calculate(consultation.cost, doctor.is_generalist())?;
        reimbursement.set_amount(amount)?;
        let reimbursement = self.store.update(reimbursement)?;
        tracing::info!(
            "recalculated reimbursement {}: {}",
            reimbursement.id,
            money::format_amount(amount)
        );
        Ok(reimbursement)
    }

    /// Processes every pending reimbursement independently.
    ///
    /// Failures are logged and skipped; the processed records are returned.
    pub fn process_all_pending(&self) -> CoreResult<Vec<Reimbursement>> {
        let pending = self.pending()?;
        let total = pending.len();
        let mut processed = Vec::with_capacity(total);
        for reimbursement in pending {
            match self.process(&reimbursement.id) {
                Ok(r) => processed.push(r),
                Err(e) => tracing::warn!(
                    "skipping reimbursement {} in batch processing: {}",
                    reimbursement.id,
                    e
                ),
            }
        }
        tracing::info!("batch processed {} of {} pending", processed.len(), total);
        Ok(processed)
    }

    /// Deletes a pending reimbursement.
    pub fn delete(&self, id: &RecordId) -> CoreResult<()> {
        let reimbursement: Reimbursement = self.store.get(id)?;
        reimbursement.ensure_deletable()?;
        self.store.delete(&reimbursement)?;
        tracing::info!("deleted reimbursement {id}");
        Ok(())
    }

    pub fn stats(&self) -> CoreResult<ReimbursementStats> {
        let all = self.list()?;
        let count = |status: ReimbursementStatus| all.iter().filter(|r| r.status == status).count();
        let sum = |status: ReimbursementStatus| {
            all.iter()
                .filter(|r| r.status == status)
                .fold(Decimal::ZERO, |acc, r| acc + r.amount)
        };
        Ok(ReimbursementStats {
            total: all.len(),
            pending: count(ReimbursementStatus::Pending),
            processed: count(ReimbursementStatus::Processed),
            refused: count(ReimbursementStatus::Refused),
            processed_amount: sum(ReimbursementStatus::Processed),
            pending_amount: sum(ReimbursementStatus::Pending),
        })
    }

    pub fn breakdown(&self, id: &RecordId) -> CoreResult<ReimbursementBreakdown> {
        let reimbursement: Reimbursement = self.store.get(id)?;
        let consultation: Consultation = self.store.get(&reimbursement.consultation_id)?;
        let doctor: Doctor = self.store.get(&consultation.doctor_id)?;
        Ok(ReimbursementBreakdown {
            cost: consultation.cost,
            amount: reimbursement.amount,
            rate: money::rate_for(doctor.is_generalist()),
            percentage: money::percentage(reimbursement.amount, consultation.cost),
            out_of_pocket: money::out_of_pocket(consultation.cost, reimbursement.amount),
        })
    }

    fn transition(
        &self,
        id: &RecordId,
        change: impl FnOnce(&mut Reimbursement) -> CoreResult<()>,
    ) -> CoreResult<Reimbursement> {
        let mut reimbursement: Reimbursement = self.store.get(id)?;
        change(&mut reimbursement)?;
        self.store.update(reimbursement)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{failing_fixture, fixture, Fixture};
    use crate::store::RecordKind;
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn pending_for(f: &Fixture, cost: Decimal, generalist: bool) -> Reimbursement {
        let insured = f.insured("Martin");
        let doctor = if generalist {
            f.generalist("Laurent")
        } else {
            f.specialist("Dubois", "Cardiology")
        };
        let consultation = f.consultation(insured.id(), doctor.id(), cost);
        f.services
            .reimbursements
            .by_consultation(&consultation.id)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_generalist_consultation_fully_reimbursed() {
        let f = fixture();
        let r = pending_for(&f, dec!(100.00), true);
        assert_eq!(r.amount, dec!(100.00));
        assert_eq!(r.status, ReimbursementStatus::Pending);
        assert_eq!(r.payment_method, PaymentMethod::BankTransfer);

        let breakdown = f.services.reimbursements.breakdown(&r.id).unwrap();
        assert_eq!(breakdown.out_of_pocket, dec!(0.00));
        assert_eq!(breakdown.percentage, dec!(100.00));
    }

    #[test]
    fn test_specialist_consultation_reimbursed_at_80_percent() {
        let f = fixture();
        let r = pending_for(&f, dec!(50.00), false);
        assert_eq!(r.amount, dec!(40.00));

        let breakdown = f.services.reimbursements.breakdown(&r.id).unwrap();
        assert_eq!(breakdown.out_of_pocket, dec!(10.00));
        assert_eq!(breakdown.rate, dec!(0.80));
    }

    #[test]
    fn test_second_reimbursement_conflicts() {
        let f = fixture();
        let r = pending_for(&f, dec!(25), true);
        assert!(matches!(
            f.services.reimbursements.create(&r.consultation_id, None),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            f.services.reimbursements.create(&RecordId::new(), None),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_manual_create_after_delete() {
        let f = fixture();
        let r = pending_for(&f, dec!(25), true);
        f.services.reimbursements.delete(&r.id).unwrap();
        let again = f
            .services
            .reimbursements
            .create(&r.consultation_id, Some(PaymentMethod::Cash))
            .unwrap();
        assert_eq!(again.payment_method, PaymentMethod::Cash);
        assert_eq!(again.amount, dec!(25.00));
    }

    #[test]
    fn test_process_twice_fails() {
        let f = fixture();
        let r = pending_for(&f, dec!(25), true);
        let processed = f.services.reimbursements.process(&r.id).unwrap();
        assert_eq!(processed.status, ReimbursementStatus::Processed);
        assert!(processed.processed_at.is_some());
        assert!(matches!(
            f.services.reimbursements.process(&r.id),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn test_processed_is_frozen_until_reverted() {
        let f = fixture();
        let r = pending_for(&f, dec!(25), true);
        f.services.reimbursements.process(&r.id).unwrap();

        assert!(matches!(
            f.services
                .reimbursements
                .change_method(&r.id, PaymentMethod::Cash),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            f.services.reimbursements.recalculate(&r.id),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            f.services.reimbursements.delete(&r.id),
            Err(CoreError::InvalidState(_))
        ));

        let reverted = f.services.reimbursements.revert_processing(&r.id).unwrap();
        assert_eq!(reverted.status, ReimbursementStatus::Pending);
        assert!(reverted.processed_at.is_none());

        let changed = f
            .services
            .reimbursements
            .change_method(&r.id, PaymentMethod::Cash)
            .unwrap();
        assert_eq!(changed.payment_method, PaymentMethod::Cash);
        let again = f.services.reimbursements.process(&r.id).unwrap();
        assert_eq!(again.status, ReimbursementStatus::Processed);
    }

    #[test]
    fn test_refuse_is_terminal() {
        let f = fixture();
        let r = pending_for(&f, dec!(25), true);
        let refused = f
            .services
            .reimbursements
            .refuse(&r.id, Some("  duplicate claim "))
            .unwrap();
        assert_eq!(refused.status, ReimbursementStatus::Refused);
        assert_eq!(refused.refusal_reason.as_deref(), Some("duplicate claim"));
        assert!(f.services.reimbursements.process(&r.id).is_err());
        assert!(f.services.reimbursements.revert_processing(&r.id).is_err());
        assert_eq!(f.services.reimbursements.refused().unwrap().len(), 1);
    }

    #[test]
    fn test_stale_copy_cannot_overwrite() {
        let f = fixture();
        let r = pending_for(&f, dec!(25), true);
        let stale = r.clone();
        f.services.reimbursements.process(&r.id).unwrap();

        let mut racing = stale;
        racing.refuse(None, Utc::now()).unwrap();
        assert!(matches!(
            f.store.update(racing),
            Err(CoreError::Conflict(_))
        ));
        assert_eq!(
            f.services.reimbursements.get(&r.id).unwrap().status,
            ReimbursementStatus::Processed
        );
    }

    #[test]
    fn test_process_all_pending_and_stats() {
        let f = fixture();
        let a = pending_for(&f, dec!(30), true);
        let b = pending_for(&f, dec!(50), false);
        let c = pending_for(&f, dec!(10), true);
        f.services.reimbursements.refuse(&c.id, None).unwrap();

        let processed = f.services.reimbursements.process_all_pending().unwrap();
        assert_eq!(processed.len(), 2);
        assert!(f.services.reimbursements.pending().unwrap().is_empty());

        let stats = f.services.reimbursements.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.refused, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.processed_amount, a.amount + b.amount);
        assert_eq!(stats.pending_amount, Decimal::ZERO);
    }

    #[test]
    fn test_queries() {
        let f = fixture();
        let r = pending_for(&f, dec!(30), true);
        let consultation: Consultation = f.store.get(&r.consultation_id).unwrap();

        assert_eq!(
            f.services
                .reimbursements
                .by_insured(&consultation.insured_id)
                .unwrap()
                .len(),
            1
        );
        assert!(matches!(
            f.services.reimbursements.by_insured(&RecordId::new()),
            Err(CoreError::NotFound(_))
        ));
        assert_eq!(
            f.services
                .reimbursements
                .by_method(PaymentMethod::BankTransfer)
                .unwrap()
                .len(),
            1
        );
        assert!(matches!(
            f.services
                .reimbursements
                .for_consultation(&RecordId::new()),
            Err(CoreError::NotFound(_))
        ));

        f.services.reimbursements.process(&r.id).unwrap();
        let now = Utc::now();
        let window = f
            .services
            .reimbursements
            .processed_between(now - Duration::hours(1), now + Duration::hours(1))
            .unwrap();
        assert_eq!(window.len(), 1);
        assert!(matches!(
            f.services
                .reimbursements
                .processed_between(now, now - Duration::hours(1)),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_process_all_pending_skips_records_that_fail() {
        let (f, backend) = failing_fixture();
        let a = pending_for(&f, dec!(30), true);
        let b = pending_for(&f, dec!(50), false);
        let c = pending_for(&f, dec!(20), true);

        backend.fail_writes_for(RecordKind::Reimbursement, &b.id);
        let processed = f.services.reimbursements.process_all_pending().unwrap();
        backend.heal();

        let ids: Vec<&RecordId> = processed.iter().map(|r| &r.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&&a.id) && ids.contains(&&c.id));

        let reimbursements = &f.services.reimbursements;
        assert_eq!(reimbursements.get(&a.id).unwrap().status, ReimbursementStatus::Processed);
        assert_eq!(reimbursements.get(&c.id).unwrap().status, ReimbursementStatus::Processed);
        let failed = reimbursements.get(&b.id).unwrap();
        assert_eq!(failed.status, ReimbursementStatus::Pending);
        assert!(failed.processed_at.is_none());
        assert_eq!(reimbursements.pending().unwrap(), vec![failed]);
    }
}
