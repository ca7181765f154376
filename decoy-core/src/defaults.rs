//! Default configuration values for Decoy.
//!
//! This module centralizes all default values used throughout Decoy,
//! ensuring consistency between production code and tests.

use std::time::Duration;

/// Default listen port.
pub const LISTEN_PORT: u16 = 8181;

/// Default bind address.
pub const BIND_ADDRESS: &str = "0.0.0.0";

/// Default upstream request timeout in seconds.
pub const PROXY_TIMEOUT_SECS: u64 = 30;

/// Default upstream request timeout duration.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(PROXY_TIMEOUT_SECS);

/// Default maximum concurrent connections.
pub const MAX_CONNECTIONS: usize = 10_000;

/// How long shutdown waits for in-flight connections.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Body of the default fallback response.
pub const EMPTY_DOCUMENT: &str = "<html></html>";
