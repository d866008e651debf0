//! # Syn Gateway
//!
//! HTTP gateway for Syn Encrypt.
//!
//! This crate provides:
//! - **Cipher API**: encrypt and decrypt uploads into a per-user namespace
//! - **Retrieval**: stream stored artifacts back by reference
//! - **Reporting**: move suspicious artifacts into quarantine
//! - **Authentication**: JWT bearer credentials, register and login
//! - **Rate Limiting**: per-user request throttling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                    Syn Gateway                      │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Auth Middleware │ Rate Limiter        │
//! ├─────────────────────────────────────────────────────┤
//! │  Handlers (encrypt, decrypt, files, report, users)  │
//! ├─────────────────────────────────────────────────────┤
//! │                    syn-store                        │
//! │     (namespaces, promotion, quarantine, users)      │
//! ├─────────────────────────────────────────────────────┤
//! │                    syn-crypto                       │
//! │          (AES-CBC / AES-CTR streaming)              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, ErrorCode};
pub use server::{run_server, run_server_with_shutdown};
pub use state::AppState;
