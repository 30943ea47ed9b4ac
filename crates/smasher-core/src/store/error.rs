//! Store errors
//!
//! Every variant that touches the filesystem carries the path involved.
//! Failures a user can act on also offer a [`StorageError::recovery_suggestion`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// `ENOSPC` / `EDQUOT`
#[cfg(target_os = "linux")]
const OUT_OF_SPACE_CODES: [i32; 2] = [28, 122];
#[cfg(not(target_os = "linux"))]
const OUT_OF_SPACE_CODES: [i32; 2] = [28, 69];

/// Errors from reading or writing the key-value store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied on '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Out of disk space writing '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store file exists but is not a JSON object
    #[error("Store file '{path}' is damaged: {details}")]
    InvalidFormat { path: PathBuf, details: String },

    /// Renaming the temporary file over the store file failed
    #[error("Cannot replace '{to}' with '{from}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot encode store contents: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    /// Classify an I/O failure while reading `path`
    pub fn reading(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ => StorageError::ReadError {
                path,
                source: error,
            },
        }
    }

    /// Classify an I/O failure while writing `path`
    pub fn writing(error: io::Error, path: PathBuf) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied {
                path,
                source: error,
            }
        } else if is_out_of_space(&error) {
            StorageError::DiskFull {
                path,
                source: error,
            }
        } else {
            StorageError::WriteError {
                path,
                source: error,
            }
        }
    }

    /// What the user can do about this error, if anything
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } => {
                Some("Check permissions on the data directory, or move it with `smasher config set data_dir <path>`.")
            }
            StorageError::InvalidFormat { .. } => {
                Some("Move the damaged store file aside; a fresh one is created on next write.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Point data_dir somewhere writable with `smasher config set data_dir <path>`.")
            }
            _ => None,
        }
    }
}

fn is_out_of_space(error: &io::Error) -> bool {
    if let Some(code) = error.raw_os_error() {
        return OUT_OF_SPACE_CODES.contains(&code);
    }
    // Errors built without an OS code only say so in their message
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left") || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
