//! Environment variable names used throughout Decoy configuration

/// Upstream request timeout in seconds
pub const PROXY_TIMEOUT_SECS: &str = "PROXY_TIMEOUT_SECS";

/// Maximum concurrent connections (0 = unlimited)
pub const MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";

/// Forward requests no short-circuit rule claims (`true`/`1`)
pub const FORWARD_UNMATCHED: &str = "FORWARD_UNMATCHED";

/// Get all environment variable names for documentation/validation
pub fn all_env_vars() -> &'static [&'static str] {
    &[PROXY_TIMEOUT_SECS, MAX_CONNECTIONS, FORWARD_UNMATCHED]
}
