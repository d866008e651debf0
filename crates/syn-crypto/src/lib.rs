//! # Syn Crypto
//!
//! Streaming symmetric encryption for the Syn Encrypt gateway.
//!
//! This crate provides:
//! - **Algorithms**: AES-128/192/256 in CBC (PKCS#7) and CTR modes, addressed
//!   by their OpenSSL-style names (`aes-256-cbc`, ...)
//! - **Key material**: raw or hex-encoded keys checked against the algorithm
//! - **Cipher sessions**: incremental `update`/`finalize` transforms that never
//!   hold more than one cipher block back
//! - **Streaming**: sync (`Read`/`Write`) and async (`AsyncRead`/`AsyncWrite`)
//!   pipelines over fixed-size chunks
//!
//! ## Envelope
//!
//! Encrypted output is always `IV (16 bytes) || ciphertext`. Decryption reads
//! the IV back from that prefix unless the caller supplies one explicitly, in
//! which case the input is treated as bare ciphertext.
//!
//! ## Example
//!
//! ```rust,ignore
//! use syn_crypto::{Algorithm, CipherKey, streaming};
//!
//! let algorithm: Algorithm = "aes-256-cbc".parse()?;
//! let key = CipherKey::parse("0123456789abcdef0123456789abcdef", algorithm)?;
//!
//! let mut sealed = Vec::new();
//! let out = streaming::encrypt_stream(algorithm, &key, &b"hello"[..], &mut sealed)?;
//!
//! let mut plain = Vec::new();
//! streaming::decrypt_stream(algorithm, &key, None, &sealed[..], &mut plain)?;
//! assert_eq!(plain, b"hello");
//! ```

pub mod error;
pub mod keys;
pub mod streaming;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use keys::{CipherKey, Iv, IV_SIZE};
pub use streaming::{transform, CipherParams, TransformOutput};
pub use symmetric::{Algorithm, CipherMode, CipherSession, Direction};

/// Cipher block size shared by every supported algorithm (AES)
pub const BLOCK_SIZE: usize = 16;

/// Read buffer size for streaming transforms (64 KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
