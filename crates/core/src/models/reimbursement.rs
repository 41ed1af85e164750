use super::PaymentMethod;
use crate::lifecycle::{ReimbursementStatus, Transition};
use crate::CoreResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Repayment owed for one consultation.
///
/// Mutated only through the methods below, each of which checks the lifecycle first and leaves
/// the record untouched on error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Reimbursement {
    pub id: RecordId,
    pub consultation_id: RecordId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: ReimbursementStatus,
    /// Set when processed or refused.
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refusal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Reimbursement, Reimbursement, |r| vec![(
    "consultation_id",
    r.consultation_id.to_string()
)]);

impl Reimbursement {
    pub fn new(
        consultation_id: RecordId,
        amount: Decimal,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            consultation_id,
            amount,
            payment_method,
            status: ReimbursementStatus::Pending,
            processed_at: None,
            refusal_reason: None,
            created_at: now,
            version: 0,
        }
    }

    pub fn process(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.status = self.status.apply(Transition::Process)?;
        self.processed_at = Some(now);
        Ok(())
    }

    /// Blank reasons are stored as absent.
    pub fn refuse(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> CoreResult<()> {
        self.status = self.status.apply(Transition::Refuse)?;
        self.processed_at = Some(now);
        self.refusal_reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned);
        Ok(())
    }

    pub fn revert_processing(&mut self) -> CoreResult<()> {
        self.status = self.status.apply(Transition::RevertProcessing)?;
        self.processed_at = None;
        Ok(())
    }

    pub fn change_method(&mut self, payment_method: PaymentMethod) -> CoreResult<()> {
        self.status.apply(Transition::ChangeMethod)?;
        self.payment_method = payment_method;
        Ok(())
    }

    pub fn set_amount(&mut self, amount: Decimal) -> CoreResult<()> {
        self.status.apply(Transition::Recalculate)?;
        self.amount = amount;
        Ok(())
    }

    pub fn ensure_deletable(&self) -> CoreResult<()> {
        self.status.apply(Transition::Delete).map(|_| ())
    }
}
