//! # API Shared
//!
//! Shared definitions for the social-security REST API.
//!
//! Contains:
//! - Wire DTOs (`dto` module) with OpenAPI schemas and conversions from core records
//! - Stateless JWT issuing and verification (`auth` module)
//! - `HealthService`
//!
//! Kept free of HTTP framework types so the CLI and tests can use it without a server.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{AuthConfig, AuthError, Claims};
pub use health::{HealthRes, HealthService};
