use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Consultation {
    pub id: RecordId,
    pub date: DateTime<Utc>,
    pub insured_id: RecordId,
    pub doctor_id: RecordId,
    /// Strictly positive.
    pub cost: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Consultation, Consultation);

#[derive(Clone, Debug)]
pub struct ConsultationInput {
    pub insured_id: RecordId,
    pub doctor_id: RecordId,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
}

/// Editable fields; insured and doctor are fixed once recorded.
#[derive(Clone, Debug, Default)]
pub struct ConsultationUpdate {
    /// Keeps the recorded date when absent.
    pub date: Option<DateTime<Utc>>,
    pub cost: Option<Decimal>,
    /// Keeps the recorded notes when absent; blank clears them.
    pub notes: Option<String>,
}
