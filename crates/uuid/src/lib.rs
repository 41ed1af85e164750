//! Record identifiers and sharded-path utilities.
//!
//! Every stored record (person, insured, doctor, consultation, prescription, reimbursement,
//! account, media) is keyed by a *canonical* UUID: **32 lowercase hexadecimal characters**
//! (no hyphens), the same value as `Uuid::new_v4().simple().to_string()`.
//!
//! Externally supplied identifiers (path parameters, CLI arguments) must already be canonical;
//! [`RecordId::parse`] rejects uppercase, hyphenated, wrong-length or non-hex input.
//!
//! ## Sharded directory layout
//! For a canonical id `u`, file-backed storage places the record under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `secu_data/consultations/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This keeps per-directory fan-out bounded as the number of records grows.

mod service;

pub use service::{RecordId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
