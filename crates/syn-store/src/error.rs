//! Error types for the syn-store crate

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage, quarantine, and user operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A required input was empty or absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Artifact name would escape its namespace or is otherwise unusable
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    /// Retrieval reference could not be parsed
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Reference names a user that does not exist
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No artifact at the resolved location
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Artifact has already been moved to quarantine
    #[error("artifact already quarantined: {0}")]
    AlreadyQuarantined(String),

    /// An artifact with the same name already exists at the destination
    #[error("artifact already exists: {0}")]
    Conflict(String),

    /// Username already registered
    #[error("username already exists: {0}")]
    UsernameTaken(String),

    /// Username/password pair did not match
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Namespace or quarantine directory could not be created
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreateFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Promotion or quarantine move failed
    #[error("failed to move artifact into place: {0}")]
    RenameFailure(#[source] std::io::Error),

    /// Cipher pipeline error
    #[error("cipher error: {0}")]
    Crypto(#[from] syn_crypto::CryptoError),

    /// Other IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the failure is attributable to caller input rather than the server
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::MissingField(_)
            | Self::InvalidName(_)
            | Self::InvalidReference(_)
            | Self::UserNotFound(_)
            | Self::FileNotFound(_)
            | Self::AlreadyQuarantined(_)
            | Self::Conflict(_)
            | Self::UsernameTaken(_)
            | Self::InvalidCredentials => true,
            Self::Crypto(e) => e.is_client_error(),
            Self::DirectoryCreateFailure { .. } | Self::RenameFailure(_) | Self::Io(_) => false,
        }
    }
}
