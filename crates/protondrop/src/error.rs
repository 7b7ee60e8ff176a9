use std::path::PathBuf;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::mail::MailError;

#[derive(Error, Debug)]
pub enum ProtondropError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ProtondropError {
    /// Whether the failure is worth retrying by re-invoking the job.
    ///
    /// Transport-level failures are transient; credential, authentication and
    /// disk failures need operator attention first.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProtondropError::Mail(e) if e.is_transient())
    }
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write checkpoint '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, ProtondropError>;
