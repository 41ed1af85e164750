//! Request handlers, one module per resource.
//!
//! Each module exposes `routes()` with its full paths; `crate::router` merges them under the
//! authentication layer. Path ids arrive as raw strings and are parsed here so a malformed id
//! gets the same JSON error body as every other failure.

pub mod auth;
pub mod consultations;
pub mod doctors;
pub mod health;
pub mod insured;
pub mod persons;
pub mod prescriptions;
pub mod reimbursements;

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use secu_core::RecordId;
use serde::Deserialize;
use std::str::FromStr;
use utoipa::IntoParams;

pub(crate) fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    Ok(RecordId::parse(raw)?)
}

/// Parses an enum path segment such as a status or payment method.
pub(crate) fn parse_enum<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = secu_core::CoreError>,
{
    Ok(raw.parse::<T>()?)
}

pub(crate) fn collect<T, U: From<T>>(items: Vec<T>) -> Vec<U> {
    items.into_iter().map(U::from).collect()
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NameQuery {
    /// Case-insensitive fragment of the last or first name.
    pub nom: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// Inclusive start, RFC 3339.
    #[serde(rename = "dateDebut")]
    pub date_debut: DateTime<Utc>,
    /// Inclusive end, RFC 3339.
    #[serde(rename = "dateFin")]
    pub date_fin: DateTime<Utc>,
}
