use super::{PaymentMethod, Person, PersonInput};
use chrono::{DateTime, Utc};
use secu_types::InsuranceNumber;
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Coverage details of an insured person. `id` is the [`Person`] id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Insured {
    pub id: RecordId,
    pub insurance_number: InsuranceNumber,
    pub payment_method: PaymentMethod,
    /// Always a generalist when set.
    #[serde(default)]
    pub referring_doctor_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Insured, Insured, |i| vec![(
    "insurance_number",
    i.insurance_number.as_str().to_owned()
)]);

#[derive(Clone, Debug, Default)]
pub struct InsuredInput {
    pub person: PersonInput,
    pub insurance_number: String,
    pub payment_method: Option<PaymentMethod>,
}

/// An insured person with their identity.
#[derive(Clone, Debug, PartialEq)]
pub struct InsuredProfile {
    pub person: Person,
    pub insured: Insured,
}

impl InsuredProfile {
    pub fn id(&self) -> &RecordId {
        &self.insured.id
    }
}
