//! Error types for the syn-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cipher operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Algorithm name not in the supported set
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key length or encoding does not match the algorithm
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Initialization vector malformed or missing
    #[error("invalid iv: {0}")]
    InvalidIv(String),

    /// Ciphertext truncated, misaligned, or badly padded
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// I/O failure while reading input or writing output
    #[error("stream failure: {0}")]
    StreamFailure(#[from] std::io::Error),
}

impl CryptoError {
    /// Whether this error was caused by caller-supplied parameters or data
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::StreamFailure(_))
    }
}
