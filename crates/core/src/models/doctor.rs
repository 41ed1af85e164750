use super::{Person, PersonInput};
use crate::constants::MAX_SPECIALIZATION_LEN;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use secu_types::{NonEmptyText, TextError};
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Practice details of a doctor. `id` is the [`Person`] id.
///
/// A doctor without a specialization is a generalist.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Doctor {
    pub id: RecordId,
    #[serde(default)]
    pub specialization: Option<NonEmptyText>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Doctor, Doctor);

impl Doctor {
    pub fn is_generalist(&self) -> bool {
        self.specialization.is_none()
    }

    pub fn is_specialist(&self) -> bool {
        !self.is_generalist()
    }
}

/// Blank or absent specializations mean "generalist".
pub fn parse_specialization(input: Option<&str>) -> CoreResult<Option<NonEmptyText>> {
    match input {
        None => Ok(None),
        Some(s) => match NonEmptyText::with_max_len(s, MAX_SPECIALIZATION_LEN) {
            Ok(text) => Ok(Some(text)),
            Err(TextError::Empty) => Ok(None),
            Err(e) => Err(CoreError::field("specialization", e)),
        },
    }
}

#[derive(Clone, Debug, Default)]
pub struct DoctorInput {
    pub person: PersonInput,
    /// Blank or absent registers a generalist.
    pub specialization: Option<String>,
}

/// A doctor with their identity.
#[derive(Clone, Debug, PartialEq)]
pub struct DoctorProfile {
    pub person: Person,
    pub doctor: Doctor,
}

impl DoctorProfile {
    pub fn id(&self) -> &RecordId {
        &self.doctor.id
    }
}
