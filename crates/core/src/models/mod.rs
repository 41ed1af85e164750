//! Domain records.
//!
//! Insured and doctors are modelled by composition: an [`Insured`] or [`Doctor`] record shares
//! its id with the [`Person`] carrying the identity fields. Relationships (an insured's
//! consultations, a doctor's patients) are derived by query rather than stored both ways.

/// Implements [`crate::store::Record`] for a struct with `id`, `version` and `created_at`
/// fields.
macro_rules! impl_record {
    ($ty:ty, $kind:ident) => {
        impl_record!($ty, $kind, |_r| Vec::new());
    };
    ($ty:ty, $kind:ident, |$r:ident| $keys:expr) => {
        impl $crate::store::Record for $ty {
            const KIND: $crate::store::RecordKind = $crate::store::RecordKind::$kind;

            fn id(&self) -> &secu_uuid::RecordId {
                &self.id
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }

            fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.created_at
            }

            fn unique_keys(&self) -> Vec<(&'static str, String)> {
                let $r = self;
                $keys
            }
        }
    };
}

mod account;
mod consultation;
mod doctor;
mod insured;
mod media;
mod person;
mod prescription;
mod reimbursement;

pub use account::{Account, Role};
pub use consultation::{Consultation, ConsultationInput, ConsultationUpdate};
pub use doctor::{parse_specialization, Doctor, DoctorInput, DoctorProfile};
pub use insured::{Insured, InsuredInput, InsuredProfile};
pub use media::Media;
pub use person::{Gender, Person, PersonFields, PersonInput};
pub use prescription::{Prescription, PrescriptionInput, PrescriptionKind};
pub use reimbursement::Reimbursement;

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a reimbursement is paid out.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Cash => "CASH",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BANK_TRANSFER" => Ok(Self::BankTransfer),
            "CASH" => Ok(Self::Cash),
            other => Err(CoreError::InvalidArgument(format!(
                "unknown payment method '{other}'"
            ))),
        }
    }
}
