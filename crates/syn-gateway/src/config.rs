//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Base path every API route is mounted under
pub const API_PREFIX: &str = "/syn/api/v1";

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Root directory for uploads, staging, and user namespaces
    pub storage_root: PathBuf,
    /// Externally visible API base used in returned links
    pub public_base_url: Option<String>,
    /// HS256 secret for bearer credentials
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    /// Lifetime of issued credentials (seconds)
    pub token_ttl_secs: u64,
    /// Require a credential (and namespace ownership) to retrieve artifacts
    pub require_auth_for_retrieve: bool,
    /// Rate limit (requests per second per user)
    pub rate_limit_rps: u32,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Users registered at startup as `(username, password)`
    #[serde(skip_serializing)]
    pub seed_users: Vec<(String, String)>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            storage_root: PathBuf::from("./data"),
            public_base_url: None,
            jwt_secret: None,
            token_ttl_secs: 3600,
            require_auth_for_retrieve: false,
            rate_limit_rps: 100,
            max_body_size: 512 * 1024 * 1024, // 512 MB
            cors_enabled: true,
            seed_users: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL for links handed back to clients
    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}{}", self.bind_addr(), API_PREFIX),
        }
    }
}

/// Parse `alice:secret,bob:hunter2` into username/password pairs
pub fn parse_seed_users(list: &str) -> Result<Vec<(String, String)>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((user, pass)) if !user.is_empty() && !pass.is_empty() => {
                Ok((user.to_string(), pass.to_string()))
            }
            _ => Err(format!("expected username:password, got {:?}", entry)),
        })
        .collect()
}
