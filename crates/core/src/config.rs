//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. Core
//! code never reads environment variables during request handling; binaries parse raw values
//! with the `*_from_env_value` helpers below and build a [`CoreConfig`].

use crate::constants::{
    DEFAULT_PASSWORD_ROUNDS, MEDIA_DIR_NAME, MIN_PASSWORD_ROUNDS, RECORDS_DIR_NAME,
};
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where records are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    /// Process-local; everything is lost on exit.
    Memory,
    /// One YAML file per record under the data directory.
    File,
}

impl FromStr for StorageKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "file" | "files" => Ok(Self::File),
            other => Err(CoreError::InvalidArgument(format!(
                "unknown storage kind '{other}' (expected 'file' or 'memory')"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    storage: StorageKind,
    password_rounds: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `password_rounds` is below
    /// [`MIN_PASSWORD_ROUNDS`].
    pub fn new(data_dir: PathBuf, storage: StorageKind, password_rounds: u32) -> CoreResult<Self> {
        if password_rounds < MIN_PASSWORD_ROUNDS {
            return Err(CoreError::InvalidArgument(format!(
                "password_rounds must be at least {MIN_PASSWORD_ROUNDS}"
            )));
        }

        Ok(Self {
            data_dir,
            storage,
            password_rounds,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join(RECORDS_DIR_NAME)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join(MEDIA_DIR_NAME)
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn password_rounds(&self) -> u32 {
        self.password_rounds
    }
}

/// Parse the storage kind from an optional string value. Absent or blank means file storage.
pub fn storage_kind_from_env_value(value: Option<String>) -> CoreResult<StorageKind> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse())
        .transpose()
        .map(|kind| kind.unwrap_or(StorageKind::File))
}

/// Parse the PBKDF2 iteration count from an optional string value.
pub fn password_rounds_from_env_value(value: Option<String>) -> CoreResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(DEFAULT_PASSWORD_ROUNDS),
        Some(v) => v.parse::<u32>().map_err(|e| {
            CoreError::InvalidArgument(format!("invalid password rounds '{v}': {e}"))
        }),
    }
}
