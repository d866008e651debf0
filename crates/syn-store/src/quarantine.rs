//! Quarantine workflow
//!
//! A reported artifact is moved from a user's namespace into its
//! `dangerous_files/` sub-namespace, and a warning entry is appended to the
//! user's notice file. The entry is written before the move, so a failed move
//! never loses the warning. Quarantine is one-way.

use crate::{
    artifact::{Area, ArtifactRef},
    storage::{move_no_clobber, StorageManager},
    users::UserStore,
    Result, StoreError,
};
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

/// Warning appended to the notice for every quarantined artifact
pub const WARNING_TEXT: &str =
    "**WARNING: This file may be dangerous or contain malicious code. Use with caution.**";

fn notice_entry(reference: &ArtifactRef, reporter: &str, at: DateTime<Utc>) -> String {
    format!(
        "\n\n{}\n\n- File: `{}`\n- Reported by: `{}`\n- Reported at: {}\n",
        WARNING_TEXT,
        reference.name,
        reporter,
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Moves reported artifacts into quarantine
pub struct QuarantineWorkflow {
    storage: Arc<StorageManager>,
    users: Arc<dyn UserStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl QuarantineWorkflow {
    /// Create a workflow over the given storage and user registry
    pub fn new(storage: Arc<StorageManager>, users: Arc<dyn UserStore>) -> Self {
        Self {
            storage,
            users,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Quarantine the artifact named by `reference` on behalf of `reporter`.
    ///
    /// Returns the artifact's new reference. The old reference stops
    /// resolving once this returns.
    #[instrument(skip(self))]
    pub async fn quarantine(&self, reporter: &str, reference: &str) -> Result<ArtifactRef> {
        let source = ArtifactRef::parse(reference)?;
        let target = source.quarantined();

        if source.area == Area::Quarantine {
            return Err(if self.storage.exists(&source).await? {
                StoreError::AlreadyQuarantined(source.path())
            } else {
                StoreError::FileNotFound(source.path())
            });
        }
        if !self.users.exists(&source.user_id) {
            return Err(StoreError::UserNotFound(source.user_id));
        }

        let lock = self.lock_for(&source.user_id);
        let moved = {
            let _guard = lock.lock().await;
            self.move_locked(&source, &target, reporter).await
        };
        drop(lock);
        self.release_lock(&source.user_id);
        moved?;

        warn!(
            reporter,
            owner = %source.user_id,
            artifact = %source.name,
            "Artifact quarantined"
        );
        Ok(target)
    }

    // Entries are dropped once no report for the user is running or waiting
    fn release_lock(&self, user_id: &str) {
        self.locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn move_locked(
        &self,
        source: &ArtifactRef,
        target: &ArtifactRef,
        reporter: &str,
    ) -> Result<()> {
        if !self.storage.exists(source).await? {
            return Err(if self.storage.exists(target).await? {
                StoreError::AlreadyQuarantined(source.path())
            } else {
                StoreError::FileNotFound(source.path())
            });
        }

        self.storage.ensure_quarantine(&source.user_id).await?;
        self.append_notice(source, reporter).await?;

        let layout = self.storage.layout();
        let from = layout.artifact_path(&source.user_id, source.area, &source.name)?;
        let to = layout.artifact_path(&target.user_id, target.area, &target.name)?;
        move_no_clobber(&from, &to).await
    }

    async fn append_notice(&self, source: &ArtifactRef, reporter: &str) -> Result<()> {
        let path = self.storage.layout().notice_path(&source.user_id)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(notice_entry(source, reporter, Utc::now()).as_bytes())
            .await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{NOTICE_FILE, QUARANTINE_DIR};
    use crate::users::MemoryUserStore;
    use syn_crypto::Direction;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    struct Fixture {
        _dir: TempDir,
        storage: Arc<StorageManager>,
        workflow: QuarantineWorkflow,
        owner: String,
        reporter: String,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageManager::new(dir.path()));
        storage.init().await.unwrap();
        let users = Arc::new(MemoryUserStore::new());
        let owner = users.register("alice", "pw").unwrap().id;
        let reporter = users.register("bob", "pw").unwrap().id;
        let workflow = QuarantineWorkflow::new(storage.clone(), users);
        Fixture {
            _dir: dir,
            storage,
            workflow,
            owner,
            reporter,
        }
    }

    async fn store(storage: &StorageManager, user_id: &str, name: &str, data: &[u8]) -> ArtifactRef {
        let (staged, mut file) = storage.create_staging().await.unwrap();
        file.write_all(data).await.unwrap();
        file.flush().await.unwrap();
        storage.place(user_id, name, Direction::Encrypt, staged).await.unwrap()
    }

    #[tokio::test]
    async fn test_quarantine_moves_and_warns() {
        let f = fixture().await;
        let original = store(&f.storage, &f.owner, "notes.txt", b"payload").await;

        let moved = f
            .workflow
            .quarantine(&f.reporter, &original.path())
            .await
            .unwrap();
        assert_eq!(moved, original.quarantined());

        assert!(matches!(f.storage.open(&original).await, Err(StoreError::FileNotFound(_))));
        let path = f
            .storage
            .layout()
            .artifact_path(&moved.user_id, moved.area, &moved.name)
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"payload");

        let notice = f.storage.read_notice(&f.owner).await.unwrap().unwrap();
        assert_eq!(notice.matches(WARNING_TEXT).count(), 1);
        assert!(notice.contains("notes.txt.enc"));
        assert!(notice.contains(&f.reporter));
    }

    #[tokio::test]
    async fn test_accepts_full_link() {
        let f = fixture().await;
        let original = store(&f.storage, &f.owner, "a.bin", b"x").await;
        let link = original.link("http://localhost:9000/syn/api/v1");
        let moved = f.workflow.quarantine(&f.reporter, &link).await.unwrap();
        assert_eq!(moved.area, Area::Quarantine);
    }

    #[tokio::test]
    async fn test_one_way() {
        let f = fixture().await;
        let original = store(&f.storage, &f.owner, "a.bin", b"x").await;
        let moved = f.workflow.quarantine(&f.reporter, &original.path()).await.unwrap();

        for again in [original.path(), moved.path()] {
            assert!(matches!(
                f.workflow.quarantine(&f.reporter, &again).await,
                Err(StoreError::AlreadyQuarantined(_))
            ));
        }
        let notice = f.storage.read_notice(&f.owner).await.unwrap().unwrap();
        assert_eq!(notice.matches(WARNING_TEXT).count(), 1);
    }

    #[tokio::test]
    async fn test_notice_accumulates_in_order() {
        let f = fixture().await;
        let names = ["first.txt", "second.txt", "third.txt"];
        for name in names {
            let r = store(&f.storage, &f.owner, name, b"x").await;
            f.workflow.quarantine(&f.reporter, &r.path()).await.unwrap();
        }

        let notice = f.storage.read_notice(&f.owner).await.unwrap().unwrap();
        assert_eq!(notice.matches(WARNING_TEXT).count(), 3);
        let positions: Vec<usize> = names.iter().map(|n| notice.find(n).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let listing = f.storage.list(&f.owner).await.unwrap();
        assert!(listing.active.is_empty());
        assert_eq!(listing.quarantined.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_reports_do_not_interleave() {
        let f = Arc::new(fixture().await);
        let mut refs = Vec::new();
        for i in 0..6 {
            refs.push(store(&f.storage, &f.owner, &format!("f{i}"), b"x").await);
        }
        let tasks: Vec<_> = refs
            .into_iter()
            .map(|r| {
                let f = f.clone();
                tokio::spawn(async move { f.workflow.quarantine(&f.reporter, &r.path()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let notice = f.storage.read_notice(&f.owner).await.unwrap().unwrap();
        assert_eq!(notice.matches(WARNING_TEXT).count(), 6);
        for entry in notice.split(WARNING_TEXT).skip(1) {
            assert_eq!(entry.matches("- File:").count(), 1);
        }
        assert!(f.workflow.locks.is_empty());
    }

    #[tokio::test]
    async fn test_user_locks_are_released() {
        let f = fixture().await;
        let r = store(&f.storage, &f.owner, "a.bin", b"x").await;
        f.workflow.quarantine(&f.reporter, &r.path()).await.unwrap();
        assert!(f.workflow.locks.is_empty());

        let missing = ArtifactRef::active(&f.owner, "ghost.bin");
        assert!(f.workflow.quarantine(&f.reporter, &missing.path()).await.is_err());
        assert!(f.workflow.locks.is_empty());

        // A waiter keeps the entry alive
        let held = f.workflow.lock_for(&f.owner);
        f.workflow.release_lock(&f.owner);
        assert_eq!(f.workflow.locks.len(), 1);
        drop(held);
        f.workflow.release_lock(&f.owner);
        assert!(f.workflow.locks.is_empty());
    }

    #[tokio::test]
    async fn test_errors() {
        let f = fixture().await;
        let missing = ArtifactRef::active(&f.owner, "ghost.enc");
        assert!(matches!(
            f.workflow.quarantine(&f.reporter, &missing.path()).await,
            Err(StoreError::FileNotFound(_))
        ));
        assert!(matches!(
            f.workflow.quarantine(&f.reporter, "files/nobody/a.enc").await,
            Err(StoreError::UserNotFound(_))
        ));
        assert!(matches!(
            f.workflow.quarantine(&f.reporter, "not a reference").await,
            Err(StoreError::InvalidReference(_))
        ));
        assert!(matches!(
            f.workflow.quarantine(&f.reporter, "").await,
            Err(StoreError::MissingField(_))
        ));
        // Nothing was reported, so no notice exists
        assert!(f.storage.read_notice(&f.owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_notice_cannot_be_reported() {
        let f = fixture().await;
        let first = store(&f.storage, &f.owner, "a.txt", b"x").await;
        f.workflow.quarantine(&f.reporter, &first.path()).await.unwrap();

        for name in [NOTICE_FILE, QUARANTINE_DIR] {
            let reference = format!("files/{}/{}", f.owner, name);
            assert!(matches!(
                f.workflow.quarantine(&f.reporter, &reference).await,
                Err(StoreError::InvalidName(_))
            ));
        }

        let notice = f.storage.read_notice(&f.owner).await.unwrap().unwrap();
        assert_eq!(notice.matches(WARNING_TEXT).count(), 1);
        let listing = f.storage.list(&f.owner).await.unwrap();
        assert_eq!(listing.quarantined, vec!["a.txt.enc".to_string()]);
    }

    #[tokio::test]
    async fn test_quarantine_name_clash_keeps_artifact_active() {
        let f = fixture().await;
        let first = store(&f.storage, &f.owner, "dup.txt", b"one").await;
        f.workflow.quarantine(&f.reporter, &first.path()).await.unwrap();
        let second = store(&f.storage, &f.owner, "dup.txt", b"two").await;

        assert!(matches!(
            f.workflow.quarantine(&f.reporter, &second.path()).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(f.storage.open(&second).await.is_ok());
        let notice = f.storage.read_notice(&f.owner).await.unwrap().unwrap();
        assert_eq!(notice.matches(WARNING_TEXT).count(), 2);
    }
}
