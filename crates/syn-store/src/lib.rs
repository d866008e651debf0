//! # Syn Store
//!
//! User-scoped artifact storage for the Syn Encrypt gateway.
//!
//! This crate provides:
//! - **Namespaces**: one directory per user, with every client-supplied name
//!   confined to a single path segment
//! - **Atomic promotion**: cipher output becomes visible only once complete,
//!   and an existing artifact is never overwritten
//! - **Quarantine**: reported artifacts move into `dangerous_files/` with a
//!   warning appended to the owner's notice file
//! - **Users**: an injected registry of identities
//!
//! ## Lifecycle
//!
//! ```text
//! upload --stage_upload--> uploaded --process--> stored --quarantine--> quarantined
//! ```

pub mod artifact;
pub mod error;
pub mod namespace;
pub mod pipeline;
pub mod quarantine;
pub mod storage;
pub mod users;

pub use artifact::{Area, ArtifactRef, ArtifactState};
pub use error::{Result, StoreError};
pub use namespace::{sanitize_name, Layout};
pub use pipeline::{process, Placement};
pub use quarantine::QuarantineWorkflow;
pub use storage::{ArtifactListing, StagedFile, StorageManager};
pub use users::{MemoryUserStore, User, UserStore};
