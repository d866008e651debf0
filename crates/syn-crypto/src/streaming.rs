//! Streaming encryption and decryption over readers and writers
//!
//! Input is consumed in [`DEFAULT_CHUNK_SIZE`] chunks; memory use is bounded by
//! one chunk plus one cipher block regardless of the payload size.
//!
//! Encrypted streams are framed as `IV || ciphertext`. On decryption the IV is
//! read back from that prefix unless one is passed explicitly.

use crate::{
    keys::{CipherKey, Iv, IV_SIZE},
    symmetric::{Algorithm, CipherSession, Direction},
    CryptoError, Result, DEFAULT_CHUNK_SIZE,
};
use std::io::{self, Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Everything needed to run one transform
#[derive(Clone, Debug)]
pub struct CipherParams {
    /// Algorithm to apply
    pub algorithm: Algorithm,
    /// Key material, already checked against the algorithm
    pub key: CipherKey,
    /// Explicit IV for decryption of bare ciphertext; ignored when encrypting
    pub iv: Option<Iv>,
}

impl CipherParams {
    /// Parse client-supplied algorithm name, key, and optional hex IV
    pub fn parse(algorithm: &str, key: &str, iv: Option<&str>) -> Result<Self> {
        let algorithm = Algorithm::from_name(algorithm)?;
        let key = CipherKey::parse(key, algorithm)?;
        let iv = match iv.map(str::trim).filter(|s| !s.is_empty()) {
            Some(hex) => Some(Iv::from_hex(hex)?),
            None => None,
        };
        Ok(Self { algorithm, key, iv })
    }
}

/// Summary of a completed transform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformOutput {
    /// IV used by the cipher (generated on encrypt, recovered or supplied on decrypt)
    pub iv: Iv,
    /// Bytes read from the input, including any IV prefix
    pub bytes_in: u64,
    /// Bytes written to the output, including any IV prefix
    pub bytes_out: u64,
}

fn missing_iv(e: io::Error) -> CryptoError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CryptoError::Decryption("input too short to contain an iv".to_string())
    } else {
        CryptoError::StreamFailure(e)
    }
}

/// Encrypt everything from `reader` into `writer`, prefixing a fresh IV
pub fn encrypt_stream<R: Read, W: Write>(
    algorithm: Algorithm,
    key: &CipherKey,
    mut reader: R,
    mut writer: W,
) -> Result<TransformOutput> {
    let iv = Iv::generate();
    let session = CipherSession::new(algorithm, Direction::Encrypt, key, &iv)?;
    writer.write_all(iv.as_bytes())?;

    let (bytes_in, bytes_out) = pump(session, &mut reader, &mut writer)?;
    writer.flush()?;

    Ok(TransformOutput {
        iv,
        bytes_in,
        bytes_out: bytes_out + IV_SIZE as u64,
    })
}

/// Decrypt everything from `reader` into `writer`.
///
/// Without an explicit `iv` the first 16 bytes of the input are taken as the IV.
pub fn decrypt_stream<R: Read, W: Write>(
    algorithm: Algorithm,
    key: &CipherKey,
    iv: Option<Iv>,
    mut reader: R,
    mut writer: W,
) -> Result<TransformOutput> {
    let (iv, prefix) = match iv {
        Some(iv) => (iv, 0),
        None => {
            let mut buf = [0u8; IV_SIZE];
            reader.read_exact(&mut buf).map_err(missing_iv)?;
            (Iv::from_bytes(&buf)?, IV_SIZE as u64)
        }
    };
    let session = CipherSession::new(algorithm, Direction::Decrypt, key, &iv)?;

    let (bytes_in, bytes_out) = pump(session, &mut reader, &mut writer)?;
    writer.flush()?;

    Ok(TransformOutput {
        iv,
        bytes_in: bytes_in + prefix,
        bytes_out,
    })
}

fn pump<R: Read, W: Write>(
    mut session: CipherSession,
    reader: &mut R,
    writer: &mut W,
) -> Result<(u64, u64)> {
    let mut buffer = vec![0u8; DEFAULT_CHUNK_SIZE];
    let mut out = Vec::with_capacity(DEFAULT_CHUNK_SIZE + crate::BLOCK_SIZE);
    let mut bytes_out = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        out.clear();
        session.update(&buffer[..n], &mut out)?;
        writer.write_all(&out)?;
        bytes_out += out.len() as u64;
    }

    let bytes_in = session.bytes_in();
    out.clear();
    session.finalize(&mut out)?;
    writer.write_all(&out)?;
    bytes_out += out.len() as u64;

    Ok((bytes_in, bytes_out))
}

/// Run a transform between async endpoints.
///
/// Encryption writes `IV || ciphertext`; decryption consumes the IV prefix
/// unless `params.iv` is set. The writer is flushed but not shut down.
pub async fn transform<R, W>(
    direction: Direction,
    params: &CipherParams,
    mut reader: R,
    mut writer: W,
) -> Result<TransformOutput>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (iv, prefix_in, prefix_out) = match direction {
        Direction::Encrypt => {
            let iv = Iv::generate();
            writer.write_all(iv.as_bytes()).await?;
            (iv, 0u64, IV_SIZE as u64)
        }
        Direction::Decrypt => match params.iv {
            Some(iv) => (iv, 0, 0),
            None => {
                let mut buf = [0u8; IV_SIZE];
                reader.read_exact(&mut buf).await.map_err(missing_iv)?;
                (Iv::from_bytes(&buf)?, IV_SIZE as u64, 0)
            }
        },
    };

    let mut session = CipherSession::new(params.algorithm, direction, &params.key, &iv)?;
    let mut buffer = vec![0u8; DEFAULT_CHUNK_SIZE];
    let mut out = Vec::with_capacity(DEFAULT_CHUNK_SIZE + crate::BLOCK_SIZE);
    let mut bytes_out = prefix_out;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        out.clear();
        session.update(&buffer[..n], &mut out)?;
        writer.write_all(&out).await?;
        bytes_out += out.len() as u64;
    }

    let bytes_in = session.bytes_in() + prefix_in;
    out.clear();
    session.finalize(&mut out)?;
    writer.write_all(&out).await?;
    writer.flush().await?;
    bytes_out += out.len() as u64;

    tracing::debug!(
        algorithm = %params.algorithm,
        direction = %direction,
        bytes_in,
        bytes_out,
        "Cipher transform complete"
    );

    Ok(TransformOutput {
        iv,
        bytes_in,
        bytes_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetric;
    use proptest::prelude::*;
    use std::io::Cursor;

    /// Reader that fails after yielding a fixed number of bytes
    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(0xAB);
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_stream_roundtrip_large() {
        let algorithm = Algorithm::Aes256Cbc;
        let key = CipherKey::generate(algorithm);
        // Several chunks plus a ragged tail
        let data: Vec<u8> = (0..(DEFAULT_CHUNK_SIZE * 3 + 123)).map(|i| (i % 256) as u8).collect();

        let mut sealed = Vec::new();
        let enc = encrypt_stream(algorithm, &key, Cursor::new(&data), &mut sealed).unwrap();
        assert_eq!(enc.bytes_in, data.len() as u64);
        assert_eq!(enc.bytes_out, sealed.len() as u64);
        assert_eq!(&sealed[..IV_SIZE], enc.iv.as_bytes());

        let mut plain = Vec::new();
        let dec = decrypt_stream(algorithm, &key, None, Cursor::new(&sealed), &mut plain).unwrap();
        assert_eq!(dec.iv, enc.iv);
        assert_eq!(plain, data);
    }

    #[test]
    fn test_explicit_iv_decrypts_bare_ciphertext() {
        let algorithm = Algorithm::Aes128Cbc;
        let key = CipherKey::generate(algorithm);
        let (iv, ciphertext) = symmetric::encrypt(algorithm, &key, b"bare ciphertext").unwrap();

        let mut plain = Vec::new();
        decrypt_stream(algorithm, &key, Some(iv), Cursor::new(&ciphertext), &mut plain).unwrap();
        assert_eq!(plain, b"bare ciphertext");
    }

    #[test]
    fn test_decrypt_short_input() {
        let algorithm = Algorithm::Aes256Ctr;
        let key = CipherKey::generate(algorithm);
        let result = decrypt_stream(algorithm, &key, None, Cursor::new(vec![0u8; 5]), Vec::new());
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_io_error_is_stream_failure() {
        let algorithm = Algorithm::Aes256Cbc;
        let key = CipherKey::generate(algorithm);
        let reader = FailingReader { remaining: DEFAULT_CHUNK_SIZE + 10 };
        let result = encrypt_stream(algorithm, &key, reader, Vec::new());
        assert!(matches!(result, Err(CryptoError::StreamFailure(_))));
    }

    #[test]
    fn test_params_parse() {
        let params = CipherParams::parse("aes-256-cbc", &"k".repeat(32), None).unwrap();
        assert_eq!(params.algorithm, Algorithm::Aes256Cbc);
        assert!(params.iv.is_none());

        let iv = Iv::generate();
        let params = CipherParams::parse("aes-128-ctr", &"a".repeat(32), Some(&iv.to_hex())).unwrap();
        assert_eq!(params.iv, Some(iv));

        assert!(matches!(
            CipherParams::parse("not-a-cipher", "k", None),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            CipherParams::parse("aes-256-cbc", "short", None),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            CipherParams::parse("aes-256-cbc", &"k".repeat(32), Some("nothex")),
            Err(CryptoError::InvalidIv(_))
        ));
    }

    #[tokio::test]
    async fn test_async_transform_roundtrip() {
        let params = CipherParams::parse("aes-192-cbc", &"y".repeat(24), None).unwrap();
        let data = vec![0x5Au8; DEFAULT_CHUNK_SIZE + 1];

        let mut sealed = Vec::new();
        let enc = transform(Direction::Encrypt, &params, &data[..], &mut sealed).await.unwrap();
        assert_eq!(enc.bytes_out, sealed.len() as u64);

        let mut plain = Vec::new();
        let dec = transform(Direction::Decrypt, &params, &sealed[..], &mut plain).await.unwrap();
        assert_eq!(dec.iv, enc.iv);
        assert_eq!(dec.bytes_in, sealed.len() as u64);
        assert_eq!(plain, data);
    }

    #[tokio::test]
    async fn test_async_and_sync_agree() {
        let params = CipherParams::parse("aes-256-ctr", &"z".repeat(32), None).unwrap();
        let data = b"sync and async share one envelope".to_vec();

        let mut sealed = Vec::new();
        transform(Direction::Encrypt, &params, &data[..], &mut sealed).await.unwrap();

        let mut plain = Vec::new();
        decrypt_stream(params.algorithm, &params.key, None, Cursor::new(&sealed), &mut plain).unwrap();
        assert_eq!(plain, data);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(
            alg_index in 0usize..Algorithm::ALL.len(),
            data in proptest::collection::vec(any::<u8>(), 0..4096),
        ) {
            let algorithm = Algorithm::ALL[alg_index];
            let key = CipherKey::generate(algorithm);

            let mut sealed = Vec::new();
            encrypt_stream(algorithm, &key, Cursor::new(&data), &mut sealed).unwrap();

            let mut plain = Vec::new();
            decrypt_stream(algorithm, &key, None, Cursor::new(&sealed), &mut plain).unwrap();
            prop_assert_eq!(plain, data);
        }
    }
}
