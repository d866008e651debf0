//! Artifact storage manager
//!
//! Owns the on-disk layout. Uploads and cipher output are written to
//! temporary files under the storage root and only become visible inside a
//! user's namespace through [`StorageManager::place`], which never overwrites
//! an existing artifact.

use crate::{
    artifact::{Area, ArtifactRef},
    namespace::{artifact_name, Layout, NOTICE_FILE},
    Result, StoreError,
};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use syn_crypto::{CryptoError, Direction};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// A temporary file that is removed when dropped unless promoted
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Location of the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now
    pub async fn discard(mut self) {
        self.armed = false;
        remove_quietly(&self.path).await;
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove temporary file");
                }
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }
}

async fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&path)
        .await
        .map_err(|source| StoreError::DirectoryCreateFailure {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

fn display_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Move `src` to `dest` without ever replacing an existing `dest`.
///
/// A hard link creates the destination atomically or fails with
/// `AlreadyExists`; the source is unlinked afterwards. Volumes without hard
/// links fall back to an exclusive reservation followed by `rename`.
pub(crate) async fn move_no_clobber(src: &Path, dest: &Path) -> Result<()> {
    match fs::hard_link(src, dest).await {
        Ok(()) => {
            if let Err(e) = fs::remove_file(src).await {
                remove_quietly(dest).await;
                return Err(StoreError::RenameFailure(e));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(StoreError::Conflict(display_name_of(dest)))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::RenameFailure(e)),
        Err(e) => {
            debug!(error = %e, "Hard link unavailable, falling back to reserve-and-rename");
            match OpenOptions::new().write(true).create_new(true).open(dest).await {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(StoreError::Conflict(display_name_of(dest)));
                }
                Err(e) => return Err(StoreError::RenameFailure(e)),
            }
            if let Err(e) = fs::rename(src, dest).await {
                remove_quietly(dest).await;
                return Err(StoreError::RenameFailure(e));
            }
            Ok(())
        }
    }
}

fn stream_failure(e: io::Error) -> StoreError {
    StoreError::Crypto(CryptoError::StreamFailure(e))
}

/// Names of a user's artifacts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactListing {
    /// Active artifacts
    pub active: Vec<String>,
    /// Quarantined artifacts
    pub quarantined: Vec<String>,
}

/// Per-user artifact storage on the local filesystem
#[derive(Clone, Debug)]
pub struct StorageManager {
    layout: Layout,
}

impl StorageManager {
    /// Create a manager rooted at `root`; call [`init`](Self::init) before use
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::new(root),
        }
    }

    /// Create the top-level directories (idempotent)
    pub async fn init(&self) -> Result<()> {
        ensure_dir(self.layout.uploads_dir()).await?;
        ensure_dir(self.layout.staging_dir()).await?;
        ensure_dir(self.layout.users_dir()).await?;
        info!(root = %self.layout.root().display(), "Storage initialized");
        Ok(())
    }

    /// Directory layout
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Ensure a user's namespace directory exists (idempotent)
    pub async fn ensure_namespace(&self, user_id: &str) -> Result<PathBuf> {
        ensure_dir(self.layout.namespace(user_id)?).await
    }

    /// Ensure a user's quarantine directory exists (idempotent)
    pub async fn ensure_quarantine(&self, user_id: &str) -> Result<PathBuf> {
        ensure_dir(self.layout.quarantine_dir(user_id)?).await
    }

    /// Spool an incoming byte stream to the uploads area
    pub async fn stage_upload<S, E>(&self, stream: S) -> Result<StagedFile>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let name = format!("{}-{}", Utc::now().timestamp_millis(), uuid::Uuid::new_v4().simple());
        let path = self.layout.uploads_dir().join(name);
        let mut file = File::create(&path).await.map_err(stream_failure)?;
        let staged = StagedFile::new(path);

        let mut stream = std::pin::pin!(stream);
        let mut size = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| stream_failure(io::Error::other(e)))?;
            file.write_all(&chunk).await.map_err(stream_failure)?;
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(stream_failure)?;

        debug!(size, path = %staged.path().display(), "Upload spooled");
        Ok(staged)
    }

    /// Create an empty temporary output file in the staging area
    pub async fn create_staging(&self) -> Result<(StagedFile, File)> {
        let path = self
            .layout
            .staging_dir()
            .join(format!("{}.part", uuid::Uuid::new_v4().simple()));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(stream_failure)?;
        Ok((StagedFile::new(path), file))
    }

    /// Promote a staged artifact into the user's namespace.
    ///
    /// The stored name is `display_name` plus the direction's suffix. Fails
    /// with `Conflict` if that name is already taken; the staged file is
    /// removed on every failure path.
    #[instrument(skip(self, direction, staged), fields(direction = %direction))]
    pub async fn place(
        &self,
        user_id: &str,
        display_name: &str,
        direction: Direction,
        staged: StagedFile,
    ) -> Result<ArtifactRef> {
        let name = artifact_name(display_name, direction.suffix())?;
        self.ensure_namespace(user_id).await?;
        let dest = self.layout.artifact_path(user_id, Area::Active, &name)?;

        move_no_clobber(staged.path(), &dest).await?;
        staged.disarm();

        let reference = ArtifactRef::active(user_id, name);
        info!(reference = %reference, "Artifact stored");
        Ok(reference)
    }

    /// Open an artifact for reading, returning the file and its length
    pub async fn open(&self, reference: &ArtifactRef) -> Result<(File, u64)> {
        let path = self
            .layout
            .artifact_path(&reference.user_id, reference.area, &reference.name)?;
        let not_found = || StoreError::FileNotFound(reference.path());

        // symlink_metadata: links are never followed out of the namespace
        let meta = match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        Ok((file, meta.len()))
    }

    /// Open an active artifact by user id and name
    pub async fn read(&self, user_id: &str, name: &str) -> Result<(File, u64)> {
        self.open(&ArtifactRef::active(user_id, name)).await
    }

    /// Whether an artifact file exists at the reference's location
    pub async fn exists(&self, reference: &ArtifactRef) -> Result<bool> {
        let path = self
            .layout
            .artifact_path(&reference.user_id, reference.area, &reference.name)?;
        match fs::symlink_metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List a user's active and quarantined artifacts, sorted by name
    pub async fn list(&self, user_id: &str) -> Result<ArtifactListing> {
        let mut active = list_files(&self.layout.namespace(user_id)?).await?;
        active.retain(|name| name != NOTICE_FILE);
        let quarantined = list_files(&self.layout.quarantine_dir(user_id)?).await?;
        Ok(ArtifactListing { active, quarantined })
    }

    /// Contents of a user's quarantine notice, if one exists
    pub async fn read_notice(&self, user_id: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.layout.notice_path(user_id)?).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
