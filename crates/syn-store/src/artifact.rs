//! Artifact references and states

use crate::{
    namespace::{sanitize_name, validate_user_id, QUARANTINE_DIR},
    Result, StoreError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path prefix under which artifacts are addressed
pub const FILES_SEGMENT: &str = "files";

/// Sub-namespace an artifact lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    /// Directly under the user's namespace
    Active,
    /// Under the user's quarantine directory
    Quarantine,
}

/// Lifecycle state of an artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
    /// Spooled upload, not yet transformed
    Uploaded,
    /// Active artifact in the user's namespace
    Stored,
    /// Moved into quarantine; terminal
    Quarantined,
}

impl From<Area> for ArtifactState {
    fn from(area: Area) -> Self {
        match area {
            Area::Active => Self::Stored,
            Area::Quarantine => Self::Quarantined,
        }
    }
}

/// Retrieval reference: everything needed to locate an artifact
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Owning user
    pub user_id: String,
    /// Active or quarantined
    pub area: Area,
    /// Artifact name (single path segment)
    pub name: String,
}

impl ArtifactRef {
    /// Reference to an active artifact
    pub fn active(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            area: Area::Active,
            name: name.into(),
        }
    }

    /// The same artifact in quarantine
    pub fn quarantined(&self) -> Self {
        Self {
            area: Area::Quarantine,
            ..self.clone()
        }
    }

    /// State implied by the reference's area
    pub fn state(&self) -> ArtifactState {
        self.area.into()
    }

    /// Relative path form: `files/<user_id>/[dangerous_files/]<name>`
    pub fn path(&self) -> String {
        let name = urlencoding::encode(&self.name);
        match self.area {
            Area::Active => format!("{}/{}/{}", FILES_SEGMENT, self.user_id, name),
            Area::Quarantine => {
                format!("{}/{}/{}/{}", FILES_SEGMENT, self.user_id, QUARANTINE_DIR, name)
            }
        }
    }

    /// Absolute link under `base_url`
    pub fn link(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.path())
    }

    /// Parse a reference from a path or any URL containing one.
    ///
    /// The rightmost `files/` segment that is followed by a well-formed
    /// `<user_id>/[dangerous_files/]<name>` tail wins.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(StoreError::MissingField("url"));
        }
        let path = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let segments: Vec<&str> = path.split('/').collect();

        for i in (0..segments.len()).rev() {
            if segments[i] != FILES_SEGMENT {
                continue;
            }
            if let Some(reference) = Self::from_tail(&segments[i + 1..]) {
                return Ok(reference);
            }
        }

        Err(StoreError::InvalidReference(format!(
            "expected files/<user_id>/<name> in {:?}",
            trimmed
        )))
    }

    fn from_tail(tail: &[&str]) -> Option<Self> {
        let (user_id, area, raw_name) = match tail {
            [user_id, name] => (*user_id, Area::Active, *name),
            [user_id, dir, name] if *dir == QUARANTINE_DIR => (*user_id, Area::Quarantine, *name),
            _ => return None,
        };
        validate_user_id(user_id).ok()?;
        let name = urlencoding::decode(raw_name).ok()?;
        sanitize_name(&name).ok()?;
        Some(Self {
            user_id: user_id.to_string(),
            area,
            name: name.into_owned(),
        })
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
