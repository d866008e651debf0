//! User registry
//!
//! The registry is injected wherever identities are resolved; nothing reaches
//! for a process-wide list of users. [`MemoryUserStore`] is the only backend
//! and keeps everything in memory.

use crate::{Result, StoreError};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use sha2::{Digest, Sha256};
use std::fmt;

/// A registered user
#[derive(Clone)]
pub struct User {
    /// Opaque id; also the namespace directory name
    pub id: String,
    /// Unique username
    pub username: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
    password_digest: [u8; 32],
}

impl User {
    fn new(username: &str, password: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            created_at: Utc::now(),
            password_digest: digest(password),
        }
    }

    fn password_matches(&self, password: &str) -> bool {
        self.password_digest == digest(password)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

/// Lookup and registration of users
pub trait UserStore: Send + Sync {
    /// Find a user by id
    fn find_by_id(&self, id: &str) -> Option<User>;

    /// Find a user by username
    fn find_by_username(&self, username: &str) -> Option<User>;

    /// Register a new user; usernames are unique
    fn register(&self, username: &str, password: &str) -> Result<User>;

    /// Check a username/password pair
    fn verify(&self, username: &str, password: &str) -> Result<User>;

    /// Whether a user id is known
    fn exists(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }
}

/// In-memory user store
#[derive(Default)]
pub struct MemoryUserStore {
    by_id: DashMap<String, User>,
    by_username: DashMap<String, String>,
}

impl MemoryUserStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `(username, password)` pairs
    pub fn with_users<'a>(users: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let store = Self::new();
        for (username, password) in users {
            store.register(username, password)?;
        }
        Ok(store)
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_id(&self, id: &str) -> Option<User> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    fn find_by_username(&self, username: &str) -> Option<User> {
        let id = self.by_username.get(username)?.value().clone();
        self.find_by_id(&id)
    }

    fn register(&self, username: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(StoreError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(StoreError::MissingField("password"));
        }

        match self.by_username.entry(username.to_string()) {
            Entry::Occupied(_) => Err(StoreError::UsernameTaken(username.to_string())),
            Entry::Vacant(slot) => {
                let user = User::new(username, password);
                // Insert by id before releasing the username slot so lookups never miss
                self.by_id.insert(user.id.clone(), user.clone());
                slot.insert(user.id.clone());
                tracing::info!(user_id = %user.id, username = %user.username, "User registered");
                Ok(user)
            }
        }
    }

    fn verify(&self, username: &str, password: &str) -> Result<User> {
        if username.is_empty() {
            return Err(StoreError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(StoreError::MissingField("password"));
        }
        self.find_by_username(username)
            .filter(|user| user.password_matches(password))
            .ok_or(StoreError::InvalidCredentials)
    }
}
