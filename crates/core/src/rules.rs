//! Consultation and prescription rules.
//!
//! Pure checks over already-loaded records. Services load what a rule needs, call it, and only
//! write once every rule has passed.

use crate::lifecycle::ReimbursementStatus;
use crate::models::{Doctor, PrescriptionInput, PrescriptionKind, Reimbursement};
use crate::{CoreError, CoreResult};
use rust_decimal::Decimal;
use secu_types::NonEmptyText;
use secu_uuid::RecordId;

/// A consultation cost must be present and strictly positive.
pub fn require_positive_cost(cost: Option<Decimal>) -> CoreResult<Decimal> {
    match cost {
        Some(c) if c > Decimal::ZERO => Ok(c),
        Some(c) => Err(CoreError::InvalidArgument(format!(
            "cost must be strictly positive, got {c}"
        ))),
        None => Err(CoreError::InvalidArgument("cost is required".into())),
    }
}

/// Only generalists may issue prescriptions.
pub fn ensure_can_prescribe(doctor: &Doctor) -> CoreResult<()> {
    if doctor.is_generalist() {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "doctor {} is a specialist; only generalists can prescribe",
            doctor.id
        )))
    }
}

/// Only generalists may be chosen as referring doctor.
pub fn ensure_can_be_referring_doctor(doctor: &Doctor) -> CoreResult<()> {
    if doctor.is_generalist() {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "doctor {} is a specialist; a referring doctor must be a generalist",
            doctor.id
        )))
    }
}

/// A consultation whose reimbursement has been paid out can no longer change.
pub fn ensure_consultation_editable(
    reimbursement: Option<&Reimbursement>,
    action: &str,
) -> CoreResult<()> {
    match reimbursement {
        Some(r) if r.status == ReimbursementStatus::Processed => Err(CoreError::Conflict(
            format!("cannot {action} a consultation whose reimbursement is already processed"),
        )),
        _ => Ok(()),
    }
}

/// Prescription fields that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidPrescription {
    pub kind: PrescriptionKind,
    pub medication_details: Option<NonEmptyText>,
    pub specialist_id: Option<RecordId>,
}

/// Checks kind-specific requirements.
///
/// `find_doctor` resolves the referral target; an unknown id is [`CoreError::NotFound`] and a
/// generalist target is [`CoreError::InvalidArgument`].
pub fn validate_prescription(
    input: PrescriptionInput,
    find_doctor: impl Fn(&RecordId) -> CoreResult<Option<Doctor>>,
) -> CoreResult<ValidPrescription> {
    let kind = input
        .kind
        .ok_or_else(|| CoreError::InvalidArgument("prescription kind is required".into()))?;
    let medication_details = NonEmptyText::optional(input.medication_details.as_deref());

    match kind {
        PrescriptionKind::Medication => {
            let details = medication_details.ok_or_else(|| {
                CoreError::InvalidArgument(
                    "medication details are required for a medication prescription".into(),
                )
            })?;
            Ok(ValidPrescription {
                kind,
                medication_details: Some(details),
                specialist_id: None,
            })
        }
        PrescriptionKind::SpecialistReferral => {
            let specialist_id = input.specialist_id.ok_or_else(|| {
                CoreError::InvalidArgument("a specialist referral must name a specialist".into())
            })?;
            let specialist = find_doctor(&specialist_id)?
                .ok_or_else(|| CoreError::not_found("doctor", &specialist_id))?;
            if specialist.is_generalist() {
                return Err(CoreError::InvalidArgument(format!(
                    "doctor {specialist_id} is not a specialist"
                )));
            }
            Ok(ValidPrescription {
                kind,
                medication_details,
                specialist_id: Some(specialist_id),
            })
        }
    }
}
