//! Upload -> transform -> promote
//!
//! Ties the cipher pipeline to storage. The transform reads a spooled upload
//! and writes a staged file; only a fully written and synced output is
//! promoted into the user's namespace.

use crate::{
    artifact::ArtifactRef,
    namespace::sanitize_name,
    storage::{StagedFile, StorageManager},
    Result,
};
use syn_crypto::{CipherParams, CryptoError, Direction, TransformOutput};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, instrument};

/// Result of a completed transform that was stored
#[derive(Clone, Debug)]
pub struct Placement {
    /// Where the output now lives
    pub reference: ArtifactRef,
    /// Cipher statistics and IV
    pub output: TransformOutput,
}

/// Run the cipher over `upload`, leaving the output in a staged file
pub async fn run_transform(
    storage: &StorageManager,
    direction: Direction,
    params: &CipherParams,
    upload: &StagedFile,
) -> Result<(StagedFile, TransformOutput)> {
    let input = File::open(upload.path())
        .await
        .map_err(CryptoError::StreamFailure)?;
    let (staged, output_file) = storage.create_staging().await?;

    let mut writer = BufWriter::new(output_file);
    let output = syn_crypto::transform(direction, params, BufReader::new(input), &mut writer).await?;
    writer.flush().await.map_err(CryptoError::StreamFailure)?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(CryptoError::StreamFailure)?;

    Ok((staged, output))
}

/// Transform a spooled upload and store the result under `user_id`.
///
/// The display name is checked before any byte is processed. On any error
/// both the upload and the partial output are removed.
#[instrument(skip(storage, params, upload), fields(algorithm = %params.algorithm))]
pub async fn process(
    storage: &StorageManager,
    user_id: &str,
    display_name: &str,
    direction: Direction,
    params: &CipherParams,
    upload: StagedFile,
) -> Result<Placement> {
    sanitize_name(display_name)?;

    let (staged, output) = run_transform(storage, direction, params, &upload).await?;
    upload.discard().await;
    debug!(bytes_in = output.bytes_in, bytes_out = output.bytes_out, "Transform complete");

    let reference = storage.place(user_id, display_name, direction, staged).await?;
    Ok(Placement { reference, output })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use bytes::Bytes;
    use rstest::rstest;
    use syn_crypto::Algorithm;
    use tempfile::TempDir;

    const KEY_256: &str = "0123456789abcdef0123456789abcdef";

    async fn setup() -> (TempDir, StorageManager) {
        let dir = TempDir::new().unwrap();
        let storage = StorageManager::new(dir.path());
        storage.init().await.unwrap();
        (dir, storage)
    }

    async fn upload(storage: &StorageManager, data: &[u8]) -> StagedFile {
        let chunk = Ok::<_, std::io::Error>(Bytes::copy_from_slice(data));
        storage.stage_upload(futures::stream::iter([chunk])).await.unwrap()
    }

    fn is_empty(path: std::path::PathBuf) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt_stored_artifact() {
        let (_dir, storage) = setup().await;
        let plaintext = b"meeting at noon, bring the documents".to_vec();
        let params = CipherParams::parse("aes-256-cbc", KEY_256, None).unwrap();

        let up = upload(&storage, &plaintext).await;
        let sealed = process(&storage, "u1", "notes.txt", Direction::Encrypt, &params, up)
            .await
            .unwrap();
        assert_eq!(sealed.reference, ArtifactRef::active("u1", "notes.txt.enc"));

        let ciphertext = std::fs::read(
            storage
                .layout()
                .artifact_path("u1", sealed.reference.area, &sealed.reference.name)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(&ciphertext[..16], sealed.output.iv.as_bytes());

        let up = upload(&storage, &ciphertext).await;
        let opened = process(&storage, "u1", "notes.txt.enc", Direction::Decrypt, &params, up)
            .await
            .unwrap();
        assert_eq!(opened.output.iv, sealed.output.iv);

        let (mut file, _) = storage.open(&opened.reference).await.unwrap();
        let mut restored = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut file, &mut restored)
            .await
            .unwrap();
        assert_eq!(restored, plaintext);

        assert!(is_empty(storage.layout().uploads_dir()));
        assert!(is_empty(storage.layout().staging_dir()));
    }

    #[rstest]
    #[case(Algorithm::Aes128Ctr)]
    #[case(Algorithm::Aes192Cbc)]
    #[tokio::test]
    async fn test_decrypt_with_explicit_iv(#[case] algorithm: Algorithm) {
        let (_dir, storage) = setup().await;
        let key = "k".repeat(algorithm.key_size());
        let parsed = syn_crypto::CipherKey::parse(&key, algorithm).unwrap();
        let (iv, bare) = syn_crypto::symmetric::encrypt(algorithm, &parsed, b"external data").unwrap();

        let params = CipherParams::parse(algorithm.name(), &key, Some(&iv.to_hex())).unwrap();
        let up = upload(&storage, &bare).await;
        let placed = process(&storage, "u1", "blob", Direction::Decrypt, &params, up)
            .await
            .unwrap();

        let path = storage
            .layout()
            .artifact_path("u1", placed.reference.area, &placed.reference.name)
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"external data");
    }

    #[tokio::test]
    async fn test_bad_name_leaves_nothing_behind() {
        let (_dir, storage) = setup().await;
        let params = CipherParams::parse("aes-256-ctr", KEY_256, None).unwrap();
        let up = upload(&storage, b"data").await;

        let result = process(&storage, "u1", "../../escape", Direction::Encrypt, &params, up).await;
        assert!(matches!(result, Err(StoreError::InvalidName(_))));
        assert!(is_empty(storage.layout().uploads_dir()));
        assert!(is_empty(storage.layout().staging_dir()));
        assert!(!storage.layout().users_dir().join("u1").exists());
    }

    #[tokio::test]
    async fn test_failed_decrypt_is_not_promoted() {
        let (_dir, storage) = setup().await;
        let params = CipherParams::parse("aes-256-cbc", KEY_256, None).unwrap();
        // IV plus a partial block
        let up = upload(&storage, &[7u8; 16 + 5]).await;

        let result = process(&storage, "u1", "garbage", Direction::Decrypt, &params, up).await;
        assert!(matches!(result, Err(StoreError::Crypto(CryptoError::Decryption(_)))));
        assert!(is_empty(storage.layout().staging_dir()));
        assert!(!storage.layout().users_dir().join("u1").exists());
    }
}
