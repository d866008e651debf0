//! Namespace layout and name sanitisation
//!
//! Every filesystem path built from client input goes through this module.
//! Names are accepted only as a single, plain path segment; anything that
//! could climb out of a user's namespace is rejected, never rewritten.
//!
//! ```text
//! <root>/
//!   uploads/                     spooled uploads
//!   staging/                     cipher output awaiting promotion
//!   users/<user_id>/<name>       active artifacts
//!   users/<user_id>/dangerous_files/<name>
//!   users/<user_id>/README.md    quarantine notice
//! ```

use crate::{artifact::Area, Result, StoreError};
use std::path::{Path, PathBuf};

/// Quarantine sub-namespace directory name
pub const QUARANTINE_DIR: &str = "dangerous_files";

/// Per-user notice file name
pub const NOTICE_FILE: &str = "README.md";

/// Maximum length of an artifact name in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a user id
pub const MAX_USER_ID_LEN: usize = 64;

/// Validate an artifact name as a single confined path segment
pub fn sanitize_name(name: &str) -> Result<&str> {
    let invalid = |reason: &str| Err(StoreError::InvalidName(format!("{:?}: {}", name, reason)));

    if name.is_empty() {
        return invalid("empty name");
    }
    if name == "." || name == ".." {
        return invalid("relative path component");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("name too long");
    }
    if name.contains(['/', '\\']) {
        return invalid("path separators are not allowed");
    }
    if name.contains(':') {
        return invalid("drive or stream markers are not allowed");
    }
    if name.starts_with('~') {
        return invalid("home directory markers are not allowed");
    }
    if name.chars().any(char::is_control) {
        return invalid("control characters are not allowed");
    }
    Ok(name)
}

/// Final stored name: the display name plus the operation suffix
pub fn artifact_name(display_name: &str, suffix: &str) -> Result<String> {
    let base = sanitize_name(display_name)?;
    let name = format!("{}{}", base, suffix);
    sanitize_name(&name)?;
    Ok(name)
}

/// Validate a user id used as a namespace directory name
pub fn validate_user_id(user_id: &str) -> Result<&str> {
    let ok = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(user_id)
    } else {
        Err(StoreError::InvalidReference(format!("invalid user id {:?}", user_id)))
    }
}

fn is_reserved(name: &str) -> bool {
    name == NOTICE_FILE || name == QUARANTINE_DIR
}

/// Directory layout rooted at the storage root
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Create a layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for spooled uploads
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// Directory for cipher output awaiting promotion
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// Parent of all user namespaces
    pub fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    /// A user's namespace directory
    pub fn namespace(&self, user_id: &str) -> Result<PathBuf> {
        Ok(self.users_dir().join(validate_user_id(user_id)?))
    }

    /// A user's quarantine directory
    pub fn quarantine_dir(&self, user_id: &str) -> Result<PathBuf> {
        Ok(self.namespace(user_id)?.join(QUARANTINE_DIR))
    }

    /// A user's notice file
    pub fn notice_path(&self, user_id: &str) -> Result<PathBuf> {
        Ok(self.namespace(user_id)?.join(NOTICE_FILE))
    }

    /// Resolve an artifact location; the only place artifact paths are built.
    ///
    /// The notice file and the quarantine directory share the active
    /// namespace but are never artifacts.
    pub fn artifact_path(&self, user_id: &str, area: Area, name: &str) -> Result<PathBuf> {
        let name = sanitize_name(name)?;
        let dir = match area {
            Area::Active if is_reserved(name) => {
                return Err(StoreError::InvalidName(format!("{:?}: reserved name", name)));
            }
            Area::Active => self.namespace(user_id)?,
            Area::Quarantine => self.quarantine_dir(user_id)?,
        };
        Ok(dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("notes.txt")]
    #[case("notes.txt.enc")]
    #[case(".hidden")]
    #[case("..double-dot-prefix")]
    #[case("spaces are fine.pdf")]
    #[case("ünïcödé.bin")]
    fn test_accepts_plain_names(#[case] name: &str) {
        assert_eq!(sanitize_name(name).unwrap(), name);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("..\\windows\\system32")]
    #[case("/etc/passwd")]
    #[case("a/b")]
    #[case("C:evil")]
    #[case("~root")]
    #[case("nul\0byte")]
    #[case("line\nbreak")]
    fn test_rejects_escaping_names(#[case] name: &str) {
        assert!(matches!(sanitize_name(name), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn test_rejects_long_names() {
        assert!(sanitize_name(&"a".repeat(MAX_NAME_LEN)).is_ok());
        assert!(sanitize_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("notes.txt", ".enc").unwrap(), "notes.txt.enc");
        assert!(artifact_name("../notes.txt", ".enc").is_err());
        // Fits before the suffix but not after
        assert!(artifact_name(&"a".repeat(MAX_NAME_LEN - 2), ".dec").is_err());
    }

    #[test]
    fn test_user_id_validation() {
        assert!(validate_user_id("3f2a9c").is_ok());
        assert!(validate_user_id("user_1-a").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("..").is_err());
        assert!(validate_user_id("a/b").is_err());
    }

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new("/srv/syn");
        assert_eq!(
            layout.artifact_path("u1", Area::Active, "a.enc").unwrap(),
            PathBuf::from("/srv/syn/users/u1/a.enc")
        );
        assert_eq!(
            layout.artifact_path("u1", Area::Quarantine, "a.enc").unwrap(),
            PathBuf::from("/srv/syn/users/u1/dangerous_files/a.enc")
        );
        assert_eq!(layout.notice_path("u1").unwrap(), PathBuf::from("/srv/syn/users/u1/README.md"));
    }

    #[rstest]
    #[case(NOTICE_FILE)]
    #[case(QUARANTINE_DIR)]
    fn test_reserved_names_are_not_active_artifacts(#[case] name: &str) {
        let layout = Layout::new("/srv/syn");
        assert!(matches!(
            layout.artifact_path("u1", Area::Active, name),
            Err(StoreError::InvalidName(_))
        ));
        // Only the active namespace holds the reserved entries
        assert!(layout.artifact_path("u1", Area::Quarantine, name).is_ok());
    }

    proptest! {
        #[test]
        fn prop_resolved_paths_stay_in_namespace(name in "\\PC{0,40}") {
            let layout = Layout::new("/srv/syn");
            let namespace = layout.namespace("u1").unwrap();
            for area in [Area::Active, Area::Quarantine] {
                if let Ok(path) = layout.artifact_path("u1", area, &name) {
                    prop_assert!(path.starts_with(&namespace));
                    prop_assert!(path
                        .components()
                        .all(|c| !matches!(c, std::path::Component::ParentDir)));
                    prop_assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(name.as_str()));
                }
            }
        }
    }
}
