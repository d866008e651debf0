//! Application state

use crate::auth::TokenValidator;
use crate::config::GatewayConfig;
use rand::RngCore;
use std::sync::Arc;
use syn_store::{MemoryUserStore, QuarantineWorkflow, StorageManager, User, UserStore};
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Artifact storage
    pub storage: Arc<StorageManager>,
    /// User registry
    pub users: Arc<dyn UserStore>,
    /// Quarantine workflow
    pub quarantine: QuarantineWorkflow,
    /// Credential validator
    pub validator: TokenValidator,
    /// Base URL for returned links
    pub base_url: String,
}

impl AppState {
    /// Create a new application state with an in-memory user registry
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let users = MemoryUserStore::new();
        for (username, password) in &config.seed_users {
            users.register(username, password)?;
        }
        Self::with_users(config, Arc::new(users)).await
    }

    /// Create a new application state over an existing user registry
    pub async fn with_users(
        config: GatewayConfig,
        users: Arc<dyn UserStore>,
    ) -> anyhow::Result<Self> {
        let storage = Arc::new(StorageManager::new(&config.storage_root));
        storage.init().await?;
        info!(root = %config.storage_root.display(), "Storage ready");

        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("JWT_SECRET not set, using a random secret; tokens will not survive a restart");
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                hex::encode(bytes)
            }
        };
        let validator = TokenValidator::new(&secret, config.token_ttl_secs, Arc::clone(&users));
        let quarantine = QuarantineWorkflow::new(Arc::clone(&storage), Arc::clone(&users));
        let base_url = config.base_url();

        if config.require_auth_for_retrieve {
            info!("Artifact retrieval requires authentication");
        }

        Ok(Self {
            config,
            storage,
            users,
            quarantine,
            validator,
            base_url,
        })
    }
}

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Clone, Debug)]
pub struct UserSession {
    /// User ID (from the credential's subject)
    pub user_id: String,
    /// Username
    pub username: String,
}

impl UserSession {
    /// Whether the caller owns the namespace of `user_id`
    pub fn owns(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

impl From<User> for UserSession {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
        }
    }
}
