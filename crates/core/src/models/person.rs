use crate::constants::MAX_AGE_YEARS;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Months, NaiveDate, Utc};
use secu_types::{EmailAddress, NonEmptyText, PhoneNumber};
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Identity shared by insured persons and doctors.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Person {
    pub id: RecordId,
    pub last_name: NonEmptyText,
    pub first_name: NonEmptyText,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub address: NonEmptyText,
    pub phone: PhoneNumber,
    pub email: EmailAddress,
    /// Id of the [`super::Media`] record holding the profile photo.
    #[serde(default)]
    pub photo_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Person, Person, |p| vec![("email", p.email.normalised())]);

/// Unvalidated person fields as received from a caller.
#[derive(Clone, Debug, Default)]
pub struct PersonInput {
    pub last_name: String,
    pub first_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: String,
    pub phone: String,
    pub email: String,
}

/// Person fields that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonFields {
    pub last_name: NonEmptyText,
    pub first_name: NonEmptyText,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub address: NonEmptyText,
    pub phone: PhoneNumber,
    pub email: EmailAddress,
}

impl PersonInput {
    /// Checks every mandatory field. `today` bounds the birth date.
    pub fn validate(self, today: NaiveDate) -> CoreResult<PersonFields> {
        let last_name =
            NonEmptyText::new(&self.last_name).map_err(|e| CoreError::field("last_name", e))?;
        let first_name =
            NonEmptyText::new(&self.first_name).map_err(|e| CoreError::field("first_name", e))?;
        let birth_date = self
            .birth_date
            .ok_or_else(|| CoreError::InvalidArgument("birth_date is required".into()))?;
        validate_birth_date(birth_date, today)?;
        let gender = self
            .gender
            .ok_or_else(|| CoreError::InvalidArgument("gender is required".into()))?;
        let address =
            NonEmptyText::new(&self.address).map_err(|e| CoreError::field("address", e))?;
        let phone = PhoneNumber::new(&self.phone).map_err(|e| CoreError::field("phone", e))?;
        let email = EmailAddress::new(&self.email).map_err(|e| CoreError::field("email", e))?;

        Ok(PersonFields {
            last_name,
            first_name,
            birth_date,
            gender,
            address,
            phone,
            email,
        })
    }
}

fn validate_birth_date(birth_date: NaiveDate, today: NaiveDate) -> CoreResult<()> {
    if birth_date >= today {
        return Err(CoreError::InvalidArgument(
            "birth_date must be in the past".into(),
        ));
    }
    let oldest = today
        .checked_sub_months(Months::new(MAX_AGE_YEARS as u32 * 12))
        .unwrap_or(NaiveDate::MIN);
    if birth_date < oldest {
        return Err(CoreError::InvalidArgument(format!(
            "birth_date cannot be more than {MAX_AGE_YEARS} years ago"
        )));
    }
    Ok(())
}

impl Person {
    pub fn new(id: RecordId, fields: PersonFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            last_name: fields.last_name,
            first_name: fields.first_name,
            birth_date: fields.birth_date,
            gender: fields.gender,
            address: fields.address,
            phone: fields.phone,
            email: fields.email,
            photo_id: None,
            created_at: now,
            version: 0,
        }
    }

    /// Overwrites identity fields, keeping id, photo and bookkeeping.
    pub fn apply(&mut self, fields: PersonFields) {
        self.last_name = fields.last_name;
        self.first_name = fields.first_name;
        self.birth_date = fields.birth_date;
        self.gender = fields.gender;
        self.address = fields.address;
        self.phone = fields.phone;
        self.email = fields.email;
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Case-insensitive substring match on first or last name.
    pub fn matches_name(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        self.last_name.as_str().to_lowercase().contains(&query)
            || self.first_name.as_str().to_lowercase().contains(&query)
    }
}
