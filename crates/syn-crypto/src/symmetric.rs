//! Symmetric cipher sessions using AES in CBC and CTR modes
//!
//! A [`CipherSession`] transforms input incrementally: each `update` emits as
//! many bytes as can be produced without seeing the rest of the stream, and
//! `finalize` flushes padding (CBC) or nothing (CTR). At most one block is
//! held back between calls.

use crate::{
    keys::{CipherKey, Iv},
    CryptoError, Result, BLOCK_SIZE,
};
use aes::{Aes128, Aes192, Aes256};
use cipher::{
    block_padding::{Padding, Pkcs7},
    consts::U16,
    generic_array::GenericArray,
    BlockDecryptMut, BlockEncryptMut, BlockSizeUser, KeyIvInit, StreamCipher,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Block chaining mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherMode {
    /// Cipher block chaining with PKCS#7 padding
    Cbc,
    /// Counter mode (big-endian 128-bit counter), no padding
    Ctr,
}

/// Supported cipher algorithms
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// AES-128-CBC
    Aes128Cbc,
    /// AES-192-CBC
    Aes192Cbc,
    /// AES-256-CBC
    Aes256Cbc,
    /// AES-128-CTR
    Aes128Ctr,
    /// AES-192-CTR
    Aes192Ctr,
    /// AES-256-CTR
    Aes256Ctr,
}

impl Algorithm {
    /// Every supported algorithm
    pub const ALL: [Algorithm; 6] = [
        Self::Aes128Cbc,
        Self::Aes192Cbc,
        Self::Aes256Cbc,
        Self::Aes128Ctr,
        Self::Aes192Ctr,
        Self::Aes256Ctr,
    ];

    /// Look up an algorithm by its OpenSSL-style name (case-insensitive)
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == normalized)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(name.to_string()))
    }

    /// Get the algorithm identifier string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes128Cbc => "aes-128-cbc",
            Self::Aes192Cbc => "aes-192-cbc",
            Self::Aes256Cbc => "aes-256-cbc",
            Self::Aes128Ctr => "aes-128-ctr",
            Self::Aes192Ctr => "aes-192-ctr",
            Self::Aes256Ctr => "aes-256-ctr",
        }
    }

    /// Required key size in bytes
    pub fn key_size(&self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes128Ctr => 16,
            Self::Aes192Cbc | Self::Aes192Ctr => 24,
            Self::Aes256Cbc | Self::Aes256Ctr => 32,
        }
    }

    /// Chaining mode
    pub fn mode(&self) -> CipherMode {
        match self {
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => CipherMode::Cbc,
            Self::Aes128Ctr | Self::Aes192Ctr | Self::Aes256Ctr => CipherMode::Ctr,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl TryFrom<String> for Algorithm {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_name(&value)
    }
}

impl From<Algorithm> for String {
    fn from(alg: Algorithm) -> Self {
        alg.name().to_string()
    }
}

/// Direction of a transform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    /// Suffix appended to the display name of the produced artifact
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Encrypt => ".enc",
            Self::Decrypt => ".dec",
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental byte transform behind a session
trait BlockTransform: Send {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()>;
    fn finish(self: Box<Self>, out: &mut Vec<u8>) -> Result<()>;
}

struct CbcEncrypt<E> {
    cipher: E,
    pending: Vec<u8>,
}

impl<E> BlockTransform for CbcEncrypt<E>
where
    E: BlockEncryptMut + BlockSizeUser<BlockSize = U16> + Send,
{
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        self.pending.extend_from_slice(input);
        let ready = self.pending.len() - self.pending.len() % BLOCK_SIZE;
        if ready > 0 {
            let start = out.len();
            out.extend_from_slice(&self.pending[..ready]);
            for block in out[start..].chunks_exact_mut(BLOCK_SIZE) {
                self.cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            self.pending.drain(..ready);
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>, out: &mut Vec<u8>) -> Result<()> {
        // PKCS#7: always at least one byte of padding
        let pos = self.pending.len();
        let mut last = GenericArray::<u8, U16>::default();
        last[..pos].copy_from_slice(&self.pending);
        <Pkcs7 as Padding<U16>>::pad(&mut last, pos);
        self.cipher.encrypt_block_mut(&mut last);
        out.extend_from_slice(&last);
        Ok(())
    }
}

struct CbcDecrypt<D> {
    cipher: D,
    pending: Vec<u8>,
}

impl<D> BlockTransform for CbcDecrypt<D>
where
    D: BlockDecryptMut + BlockSizeUser<BlockSize = U16> + Send,
{
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        self.pending.extend_from_slice(input);
        let mut ready = self.pending.len() - self.pending.len() % BLOCK_SIZE;
        // The final block carries the padding; hold it until finish.
        if ready == self.pending.len() && ready > 0 {
            ready -= BLOCK_SIZE;
        }
        if ready > 0 {
            let start = out.len();
            out.extend_from_slice(&self.pending[..ready]);
            for block in out[start..].chunks_exact_mut(BLOCK_SIZE) {
                self.cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            self.pending.drain(..ready);
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>, out: &mut Vec<u8>) -> Result<()> {
        if self.pending.is_empty() {
            return Err(CryptoError::Decryption("ciphertext is empty".to_string()));
        }
        if self.pending.len() != BLOCK_SIZE {
            return Err(CryptoError::Decryption(
                "ciphertext length is not a multiple of the block size".to_string(),
            ));
        }
        let mut last = GenericArray::<u8, U16>::clone_from_slice(&self.pending);
        self.pending.clear();
        self.cipher.decrypt_block_mut(&mut last);

        let plain = <Pkcs7 as Padding<U16>>::unpad(&last)
            .map_err(|_| CryptoError::Decryption("bad padding (wrong key or iv?)".to_string()))?;
        out.extend_from_slice(plain);
        Ok(())
    }
}

struct CtrTransform<C> {
    cipher: C,
}

impl<C: StreamCipher + Send> BlockTransform for CtrTransform<C> {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        out.extend_from_slice(input);
        self.cipher.apply_keystream(&mut out[start..]);
        Ok(())
    }

    fn finish(self: Box<Self>, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

fn init<C: KeyIvInit>(key: &CipherKey, iv: &Iv) -> Result<C> {
    C::new_from_slices(key.as_bytes(), iv.as_bytes())
        .map_err(|_| CryptoError::InvalidKey(format!("key length {} rejected", key.len())))
}

fn cbc_encryptor<E>(key: &CipherKey, iv: &Iv) -> Result<Box<dyn BlockTransform>>
where
    E: KeyIvInit + BlockEncryptMut + BlockSizeUser<BlockSize = U16> + Send + 'static,
{
    Ok(Box::new(CbcEncrypt {
        cipher: init::<E>(key, iv)?,
        pending: Vec::with_capacity(BLOCK_SIZE),
    }))
}

fn cbc_decryptor<D>(key: &CipherKey, iv: &Iv) -> Result<Box<dyn BlockTransform>>
where
    D: KeyIvInit + BlockDecryptMut + BlockSizeUser<BlockSize = U16> + Send + 'static,
{
    Ok(Box::new(CbcDecrypt {
        cipher: init::<D>(key, iv)?,
        pending: Vec::with_capacity(BLOCK_SIZE * 2),
    }))
}

fn ctr_stream<C>(key: &CipherKey, iv: &Iv) -> Result<Box<dyn BlockTransform>>
where
    C: KeyIvInit + StreamCipher + Send + 'static,
{
    Ok(Box::new(CtrTransform {
        cipher: init::<C>(key, iv)?,
    }))
}

/// A keyed, initialized cipher transform in one direction
pub struct CipherSession {
    algorithm: Algorithm,
    direction: Direction,
    inner: Box<dyn BlockTransform>,
    bytes_in: u64,
}

impl CipherSession {
    /// Create a session for the given algorithm, direction, key, and IV
    pub fn new(algorithm: Algorithm, direction: Direction, key: &CipherKey, iv: &Iv) -> Result<Self> {
        if key.len() != algorithm.key_size() {
            return Err(CryptoError::InvalidKey(format!(
                "{} requires a {}-byte key, got {} bytes",
                algorithm,
                algorithm.key_size(),
                key.len()
            )));
        }

        use Algorithm::*;
        use Direction::*;
        let inner = match (algorithm, direction) {
            (Aes128Cbc, Encrypt) => cbc_encryptor::<cbc::Encryptor<Aes128>>(key, iv)?,
            (Aes192Cbc, Encrypt) => cbc_encryptor::<cbc::Encryptor<Aes192>>(key, iv)?,
            (Aes256Cbc, Encrypt) => cbc_encryptor::<cbc::Encryptor<Aes256>>(key, iv)?,
            (Aes128Cbc, Decrypt) => cbc_decryptor::<cbc::Decryptor<Aes128>>(key, iv)?,
            (Aes192Cbc, Decrypt) => cbc_decryptor::<cbc::Decryptor<Aes192>>(key, iv)?,
            (Aes256Cbc, Decrypt) => cbc_decryptor::<cbc::Decryptor<Aes256>>(key, iv)?,
            (Aes128Ctr, _) => ctr_stream::<ctr::Ctr128BE<Aes128>>(key, iv)?,
            (Aes192Ctr, _) => ctr_stream::<ctr::Ctr128BE<Aes192>>(key, iv)?,
            (Aes256Ctr, _) => ctr_stream::<ctr::Ctr128BE<Aes256>>(key, iv)?,
        };

        Ok(Self {
            algorithm,
            direction,
            inner,
            bytes_in: 0,
        })
    }

    /// Feed more input, appending whatever output is ready to `out`
    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        self.bytes_in += input.len() as u64;
        self.inner.update(input, out)
    }

    /// Finish the session, appending the trailing output to `out`
    pub fn finalize(self, out: &mut Vec<u8>) -> Result<()> {
        self.inner.finish(out)
    }

    /// Algorithm in use
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Direction of the session
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Total bytes fed so far
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }
}

/// Encrypt a complete buffer with a freshly generated IV (convenience function)
pub fn encrypt(algorithm: Algorithm, key: &CipherKey, plaintext: &[u8]) -> Result<(Iv, Vec<u8>)> {
    let iv = Iv::generate();
    let mut session = CipherSession::new(algorithm, Direction::Encrypt, key, &iv)?;
    let mut out = Vec::with_capacity(plaintext.len() + BLOCK_SIZE);
    session.update(plaintext, &mut out)?;
    session.finalize(&mut out)?;
    Ok((iv, out))
}

/// Decrypt a complete buffer (convenience function)
pub fn decrypt(algorithm: Algorithm, key: &CipherKey, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut session = CipherSession::new(algorithm, Direction::Decrypt, key, iv)?;
    let mut out = Vec::with_capacity(ciphertext.len());
    session.update(ciphertext, &mut out)?;
    session.finalize(&mut out)?;
    Ok(out)
}
