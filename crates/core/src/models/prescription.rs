use crate::CoreError;
use chrono::{DateTime, Utc};
use secu_types::NonEmptyText;
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrescriptionKind {
    Medication,
    SpecialistReferral,
}

impl FromStr for PrescriptionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MEDICATION" => Ok(Self::Medication),
            "SPECIALIST_REFERRAL" => Ok(Self::SpecialistReferral),
            other => Err(CoreError::InvalidArgument(format!(
                "unknown prescription kind '{other}'"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Prescription {
    pub id: RecordId,
    pub consultation_id: RecordId,
    pub kind: PrescriptionKind,
    /// Present for medication prescriptions.
    #[serde(default)]
    pub medication_details: Option<NonEmptyText>,
    /// Present for specialist referrals; always a specialist.
    #[serde(default)]
    pub specialist_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Prescription, Prescription);

#[derive(Clone, Debug, Default)]
pub struct PrescriptionInput {
    pub kind: Option<PrescriptionKind>,
    pub medication_details: Option<String>,
    pub specialist_id: Option<RecordId>,
}
