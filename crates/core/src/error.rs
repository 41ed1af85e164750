use secu_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // Business outcomes. The REST layer maps each of these to a distinct status.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove record file: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("media storage error: {0}")]
    Files(#[from] secu_files::FilesError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("record store lock poisoned")]
    LockPoisoned,
    #[error(
        "{operation} failed and cleanup also failed: original={original}; cleanup={cleanup}"
    )]
    CleanupAfterFailure {
        operation: &'static str,
        #[source]
        original: Box<CoreError>,
        cleanup: Box<CoreError>,
    },
}

impl CoreError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id} does not exist"))
    }

    /// Prefixes a [`TextError`] with the offending field name.
    pub fn field(field: &str, err: TextError) -> Self {
        Self::InvalidArgument(format!("{field}: {err}"))
    }
}

impl From<TextError> for CoreError {
    fn from(err: TextError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
