//! Constants used throughout the core crate.

/// Default base directory for stored records and media.
pub const DEFAULT_DATA_DIR: &str = "secu_data";

/// Directory (under the data dir) holding content-addressed media.
pub const MEDIA_DIR_NAME: &str = "media";

/// Directory (under the data dir) holding record YAML files.
pub const RECORDS_DIR_NAME: &str = "records";

/// File name of a record inside its sharded directory.
pub const RECORD_FILE_NAME: &str = "record.yaml";

/// PBKDF2-SHA256 iteration count used when none is configured.
pub const DEFAULT_PASSWORD_ROUNDS: u32 = 600_000;

/// Lowest accepted iteration count.
pub const MIN_PASSWORD_ROUNDS: u32 = 1_000;

/// Upper bound on profile photo size.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

pub const MAX_SPECIALIZATION_LEN: usize = 100;

/// Birth dates further back than this are rejected as typos.
pub const MAX_AGE_YEARS: i32 = 150;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 8;
