//! Content-addressed media store
//!
//! [`MediaStore`] writes uploaded bytes under their SHA-256 digest and hands back a
//! [`FileMetadata`] describing what was stored. Media type detection is best-effort, sniffed
//! from the content with `infer` rather than trusted from the client.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a crashed upload never
//! leaves a truncated file at a content address.

use crate::FilesError;
use chrono::{DateTime, Utc};
use secu_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the only hashing algorithm in use; also the first path segment under the root.
pub const HASH_ALGORITHM: &str = "sha256";

/// Lowercase hex SHA-256 digest (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    pub fn of(bytes: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        Self(hex::encode(digest))
    }

    pub fn parse(input: &str) -> Result<Self, FilesError> {
        let valid = input.len() == 64
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(FilesError::InvalidHash(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for Sha256Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Sha256Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Sha256Hash::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Metadata for a stored file
///
/// Serialised alongside the record that references the file (for example a person's photo).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Hexadecimal digest of the file content
    pub hash: Sha256Hash,

    /// Path relative to the media root where the file is stored
    pub relative_path: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// Best-effort; `None` when the content is not recognised.
    pub media_type: Option<NonEmptyText>,

    /// Client-supplied filename, reduced to its final path component
    pub original_filename: NonEmptyText,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

impl FileMetadata {
    /// True when the detected media type is an image.
    pub fn is_image(&self) -> bool {
        self.media_type
            .as_ref()
            .is_some_and(|t| t.as_str().starts_with("image/"))
    }
}

/// Content-addressed store rooted at one directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root_directory: PathBuf,
}

impl MediaStore {
    /// Opens (creating if needed) a media store rooted at `root_directory`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the path exists but is not a directory or
    /// cannot be created or canonicalised.
    pub fn new(root_directory: &Path) -> Result<Self, FilesError> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Stores `bytes` and returns their metadata.
    ///
    /// Adding content that is already stored does not rewrite the file; the returned metadata
    /// points at the existing copy.
    ///
    /// # Errors
    ///
    /// - [`FilesError::EmptyContent`] if `bytes` is empty
    /// - [`FilesError::Io`] if the shard directories or the file cannot be written
    pub fn add_bytes(
        &self,
        bytes: &[u8],
        original_filename: &str,
    ) -> Result<FileMetadata, FilesError> {
        if bytes.is_empty() {
            return Err(FilesError::EmptyContent);
        }

        let hash = Sha256Hash::of(bytes);
        let relative_path = Self::relative_path(&hash);
        let storage_path = self.root_directory.join(&relative_path);

        if !storage_path.exists() {
            let parent = storage_path
                .parent()
                .ok_or_else(|| FilesError::InvalidRootDirectory(relative_path.clone()))?;
            fs::create_dir_all(parent).map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create storage directory {}: {}", parent.display(), e),
                ))
            })?;

            let tmp_path = storage_path.with_extension("tmp");
            fs::write(&tmp_path, bytes)
                .and_then(|_| fs::rename(&tmp_path, &storage_path))
                .map_err(|e| {
                    let _ = fs::remove_file(&tmp_path);
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to write file to {}: {}", storage_path.display(), e),
                    ))
                })?;
        }

        let original_filename = Path::new(original_filename)
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| NonEmptyText::new(n).ok())
            .unwrap_or_else(|| NonEmptyText::new("upload").expect("literal is non-empty"));

        let media_type =
            Self::detect_media_type(bytes).and_then(|mime| NonEmptyText::new(mime).ok());

        Ok(FileMetadata {
            hash,
            relative_path: NonEmptyText::new(&relative_path)
                .map_err(|_| FilesError::InvalidRootDirectory(relative_path.clone()))?,
            size_bytes: bytes.len() as u64,
            media_type,
            original_filename,
            stored_at: Utc::now(),
        })
    }

    /// Sniffs the MIME type of `bytes` without storing them.
    pub fn detect_media_type(bytes: &[u8]) -> Option<&'static str> {
        infer::get(bytes).map(|kind| kind.mime_type())
    }

    /// Reads a stored file by hash.
    pub fn read(&self, hash: &Sha256Hash) -> Result<Vec<u8>, FilesError> {
        let storage_path = self.storage_path(hash);
        if !storage_path.exists() {
            return Err(FilesError::NotFound(hash.to_string()));
        }
        Ok(fs::read(&storage_path)?)
    }

    pub fn exists(&self, hash: &Sha256Hash) -> bool {
        self.storage_path(hash).is_file()
    }

    /// Deletes a stored file. Returns `false` if nothing was stored under `hash`.
    ///
    /// Callers are responsible for checking that no other record still references the hash.
    pub fn remove(&self, hash: &Sha256Hash) -> Result<bool, FilesError> {
        let storage_path = self.storage_path(hash);
        match fs::remove_file(&storage_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesError::Io(e)),
        }
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    fn storage_path(&self, hash: &Sha256Hash) -> PathBuf {
        self.root_directory.join(Self::relative_path(hash))
    }

    /// `sha256/<h0h1>/<h2h3>/<hash>`
    fn relative_path(hash: &Sha256Hash) -> String {
        let hex = hash.as_str();
        format!("{}/{}/{}/{}", HASH_ALGORITHM, &hex[0..2], &hex[2..4], hex)
    }
}
