//! Syn Encrypt gateway

use clap::Parser;
use std::path::PathBuf;
use syn_gateway::{config::parse_seed_users, run_server_with_shutdown, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "syn-gateway")]
#[command(about = "Authenticated file encryption and storage gateway")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SYN_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9000", env = "SYN_PORT")]
    port: u16,

    /// Root directory for uploads and user namespaces
    #[arg(long, default_value = "./data", env = "SYN_STORAGE_ROOT")]
    storage_root: PathBuf,

    /// Externally visible API base URL used in returned links
    #[arg(long, env = "SYN_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// JWT secret for token validation
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Lifetime of issued tokens in seconds
    #[arg(long, default_value = "3600", env = "SYN_TOKEN_TTL_SECS")]
    token_ttl_secs: u64,

    /// Require a token (and namespace ownership) to retrieve artifacts
    #[arg(long, env = "SYN_REQUIRE_AUTH_FOR_RETRIEVE")]
    require_auth_for_retrieve: bool,

    /// Requests per second allowed per user
    #[arg(long, default_value = "100", env = "SYN_RATE_LIMIT_RPS")]
    rate_limit_rps: u32,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "536870912", env = "SYN_MAX_BODY_SIZE")]
    max_body_size: usize,

    /// Disable CORS headers
    #[arg(long, env = "SYN_NO_CORS")]
    no_cors: bool,

    /// Users to register at startup, as `name:password,name:password`
    #[arg(long, env = "SYN_USERS")]
    users: Option<String>,

    /// Enable debug logging
    #[arg(short, long, env = "SYN_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "SYN_JSON_LOGS")]
    json_logs: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "syn_gateway={level},syn_store={level},syn_crypto={level},tower_http=debug",
            level = log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let seed_users = match args.users.as_deref() {
        Some(list) => parse_seed_users(list).map_err(anyhow::Error::msg)?,
        None => Vec::new(),
    };

    tracing::info!("Starting Syn Encrypt gateway on {}:{}", args.host, args.port);
    tracing::info!("Storage root: {}", args.storage_root.display());
    if !seed_users.is_empty() {
        tracing::info!("Registering {} seed users", seed_users.len());
    }

    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        storage_root: args.storage_root,
        public_base_url: args.public_base_url,
        jwt_secret: args.jwt_secret,
        token_ttl_secs: args.token_ttl_secs,
        require_auth_for_retrieve: args.require_auth_for_retrieve,
        rate_limit_rps: args.rate_limit_rps,
        max_body_size: args.max_body_size,
        cors_enabled: !args.no_cors,
        seed_users,
    };

    run_server_with_shutdown(config, shutdown_signal()).await
}
