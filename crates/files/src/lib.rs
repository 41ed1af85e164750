//! Media file storage
//!
//! Binary uploads (profile photos) are kept apart from the structured records that reference
//! them. Records hold a [`FileMetadata`]; the bytes live in a content-addressed tree:
//!
//! ```text
//! <media_root>/
//! └── sha256/
//!     └── ab/
//!         └── cd/
//!             └── abcd3f9e…
//! ```
//!
//! Identical uploads share one stored file. Stored files are never modified in place; a
//! replacement is a new file with a new hash.
//!
//! ## Example Usage
//!
//! ```no_run
//! use secu_files::MediaStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MediaStore::new(Path::new("secu_data/media"))?;
//! let metadata = store.add_bytes(b"\x89PNG\r\n\x1a\n", "portrait.png")?;
//! let bytes = store.read(&metadata.hash)?;
//! # Ok(())
//! # }
//! ```

mod files;

pub use files::{FileMetadata, MediaStore, Sha256Hash, HASH_ALGORITHM};

/// Errors that can occur during media operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory could not be created or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Uploaded content was empty
    #[error("Cannot store empty content")]
    EmptyContent,

    /// A hash string was not 64 lowercase hex characters
    #[error("Invalid sha256 hash: {0}")]
    InvalidHash(String),

    /// No stored file for the given hash
    #[error("File not found for hash: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
