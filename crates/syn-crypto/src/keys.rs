//! Key and IV material
//!
//! Keys arrive from clients either as raw text of exactly the algorithm's key
//! length or as a hex string twice that long. IVs are always 16 bytes and are
//! generated from the OS RNG at encryption time.

use crate::{symmetric::Algorithm, CryptoError, Result};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an initialization vector in bytes (one AES block)
pub const IV_SIZE: usize = 16;

/// Symmetric key bound to the length required by an algorithm
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    bytes: Vec<u8>,
}

impl CipherKey {
    /// Generate a random key for the given algorithm
    pub fn generate(algorithm: Algorithm) -> Self {
        let mut bytes = vec![0u8; algorithm.key_size()];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create a key from raw bytes, checking the length against the algorithm
    pub fn from_bytes(bytes: &[u8], algorithm: Algorithm) -> Result<Self> {
        if bytes.len() != algorithm.key_size() {
            return Err(CryptoError::InvalidKey(format!(
                "{} requires a {}-byte key, got {} bytes",
                algorithm,
                algorithm.key_size(),
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Parse client-supplied key material.
    ///
    /// A hex string of exactly `2 * key_size` characters is decoded first;
    /// otherwise the UTF-8 bytes are used as-is and must be exactly
    /// `key_size` long.
    pub fn parse(material: &str, algorithm: Algorithm) -> Result<Self> {
        let size = algorithm.key_size();
        if material.len() == size * 2 {
            if let Ok(mut decoded) = hex::decode(material) {
                let key = Self::from_bytes(&decoded, algorithm);
                decoded.zeroize();
                return key;
            }
        }
        if material.len() == size {
            return Self::from_bytes(material.as_bytes(), algorithm);
        }
        Err(CryptoError::InvalidKey(format!(
            "{} requires {} raw bytes or {} hex characters, got {} characters",
            algorithm,
            size,
            size * 2,
            material.chars().count()
        )))
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the key is empty (never true for a constructed key)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Initialization vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generate a random IV
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IV_SIZE {
            return Err(CryptoError::InvalidIv(format!(
                "iv must be {} bytes, got {}",
                IV_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; IV_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Parse a hex-encoded IV
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidIv(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Hex encoding of the IV
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Get the IV bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }
}

impl fmt::Display for Iv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
