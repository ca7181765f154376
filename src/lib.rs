//! Decoy - a forward HTTP proxy that answers for the upstream
//!
//! Decoy accepts proxy requests and, by default, never contacts the target:
//! images and `HEAD` get an empty 200, authenticated requests and `CONNECT`
//! get a bare 404, unsupported schemes a 400, and everything else a minimal
//! HTML page. With forwarding enabled, unmatched requests are relayed to their
//! target instead.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use decoy::{config::EnvVarConfig, server};
//! use decoy::forwarder;
//! use decoy::types::ForwardingProvider;
//!
//! # async fn run() -> std::io::Result<()> {
//! let config = Arc::new(EnvVarConfig::new());
//! let client = forwarder::build_client(config.forwarding_config()).map_err(std::io::Error::other)?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8181").await?;
//! server::serve(listener, config, client, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```
//!
//! # Modules
//!
//! - [`args`] - Command line argument parsing
//! - [`config`] - Configuration from environment variables
//! - [`connection`] - Connection limiting and tracking
//! - [`env_vars`] - Environment variable constants
//! - [`logging`] - Log file setup
//! - [`server`] - Accept loop and startup banner
//!
//! # Re-exports from decoy-core
//!
//! - [`classifier`] - Rules and request classification
//! - [`forwarder`] - Upstream relaying
//! - [`headers`] - Header utilities
//! - [`request_handler`] - The per-request pipeline

#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod connection;
pub mod env_vars;
pub mod logging;
pub mod server;

// Re-export decoy-core modules
pub use decoy_core::classifier;
pub use decoy_core::error;
pub use decoy_core::forwarder;
pub use decoy_core::headers;
pub use decoy_core::request_handler;
pub use decoy_core::types;

// Re-export commonly used items at crate root
pub use config::{EnvVarConfig, get_forward_unmatched, get_forwarding_config, get_max_connections};
pub use decoy_core::{
    // Aggregated configuration trait
    ConfigProvider,
    // Composable configuration traits
    ClassificationProvider,
    ConnectionProvider,
    ForwardingProvider,
    // Configuration structs
    ForwardingConfig,
    StaticConfig,
    // Classification
    Decision,
    Outcome,
    Rule,
    RuleSet,
    // Errors
    DecoyError,
};
