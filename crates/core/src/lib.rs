//! # Secu Core
//!
//! Core business logic for the social-security administration backend.
//!
//! This crate contains the domain records, the rules that govern them and the services that
//! apply those rules on top of a record store:
//! - Persons, insured persons and doctors (composition over a shared person id)
//! - Consultations and the prescriptions issued during them
//! - Reimbursements: amount calculation and the PENDING / PROCESSED / REFUSED lifecycle
//! - Accounts with PBKDF2 password hashes and explicit roles
//! - Record persistence in memory or as sharded YAML files under the data directory
//!
//! **No API concerns**: HTTP servers, tokens and wire formats belong in `api-rest` or
//! `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod money;
pub mod repositories;
pub mod rules;
pub mod store;

pub use config::{
    password_rounds_from_env_value, storage_kind_from_env_value, CoreConfig, StorageKind,
};
pub use error::{CoreError, CoreResult};
pub use lifecycle::{ReimbursementStatus, Transition};
pub use repositories::Services;
pub use store::RecordStore;

pub use secu_files::{FileMetadata, MediaStore};
pub use secu_types::{EmailAddress, InsuranceNumber, NonEmptyText, PhoneNumber, TextError};
pub use secu_uuid::RecordId;

pub use rust_decimal::Decimal;
