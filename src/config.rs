//! Configuration management for Decoy.
//!
//! This module handles loading and caching configuration from environment variables.
//! All configurations are computed once at first access and cached for the lifetime
//! of the application using `once_cell::sync::Lazy`.
//!
//! # Example
//!
//! ```
//! use decoy::config;
//!
//! let forwarding = config::get_forwarding_config();
//! println!("Upstream timeout: {:?}", forwarding.timeout);
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::env_vars;
use decoy_core::defaults;
use decoy_core::{
    ClassificationProvider, ConnectionProvider, ForwardingConfig, ForwardingProvider, RuleSet,
};

// ============================================================================
// Cached Configuration (computed once at first access)
// ============================================================================

static FORWARDING_CONFIG: Lazy<ForwardingConfig> =
    Lazy::new(|| compute_forwarding_config(|key| env::var(key)));
static MAX_CONNECTIONS: Lazy<usize> = Lazy::new(|| compute_max_connections(|key| env::var(key)));
static FORWARD_UNMATCHED: Lazy<bool> =
    Lazy::new(|| compute_forward_unmatched(|key| env::var(key)));

// ============================================================================
// Internal Helpers
// ============================================================================

/// Parses a variable through `env_var`, falling back to `default`.
///
/// Logs a warning if the value exists but cannot be parsed.
fn parse_env_var_or_default<T, F>(env_var: &F, var_name: &str, default: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match env_var(var_name) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = var_name, value = %value, "Invalid env var value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Accepts `true`/`false` in any case as well as `1`/`0`.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

// ============================================================================
// Public Configuration Getters
// ============================================================================

/// Returns the cached upstream forwarding configuration.
///
/// Configuration is read from environment variables on first access:
/// - `PROXY_TIMEOUT_SECS`: Upstream request timeout (default: 30)
pub fn get_forwarding_config() -> &'static ForwardingConfig {
    &FORWARDING_CONFIG
}

fn compute_forwarding_config<F>(env_var: F) -> ForwardingConfig
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let timeout_secs = parse_env_var_or_default(
        &env_var,
        env_vars::PROXY_TIMEOUT_SECS,
        defaults::PROXY_TIMEOUT_SECS,
    );

    let config = ForwardingConfig {
        timeout: Duration::from_secs(timeout_secs),
    };

    if !config.is_valid() {
        warn!("Invalid forwarding configuration, using defaults");
        return ForwardingConfig::default();
    }

    config
}

/// Returns the cached maximum number of concurrent connections.
///
/// Read from `MAX_CONNECTIONS` on first access. `0` means unlimited.
///
/// **Default**: `10000`
///
/// # Example
///
/// ```
/// use decoy::config::get_max_connections;
///
/// let max_conn = get_max_connections();
/// if max_conn > 0 {
///     println!("Limiting to {} concurrent connections", max_conn);
/// }
/// ```
pub fn get_max_connections() -> usize {
    *MAX_CONNECTIONS
}

fn compute_max_connections<F>(env_var: F) -> usize
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    parse_env_var_or_default(&env_var, env_vars::MAX_CONNECTIONS, defaults::MAX_CONNECTIONS)
}

/// Returns whether `FORWARD_UNMATCHED` asks for unmatched requests to be
/// relayed upstream.
pub fn get_forward_unmatched() -> bool {
    *FORWARD_UNMATCHED
}

fn compute_forward_unmatched<F>(env_var: F) -> bool
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match env_var(env_vars::FORWARD_UNMATCHED) {
        Ok(value) => parse_flag(&value).unwrap_or_else(|| {
            warn!(
                var = env_vars::FORWARD_UNMATCHED,
                value = %value,
                "Invalid env var value, using default"
            );
            false
        }),
        Err(_) => false,
    }
}

// ============================================================================
// EnvVarConfig - ConfigProvider implementation using environment variables
// ============================================================================

/// Configuration provider backed by environment variables.
///
/// This is the provider used by the Decoy binary. Timeout and connection cap
/// come from the cached statics, the rule set is chosen once at creation.
///
/// # Example
///
/// ```
/// use decoy::config::EnvVarConfig;
/// use decoy::types::ClassificationProvider;
///
/// let config = EnvVarConfig::new().with_forward_unmatched(true);
/// assert!(config.rule_set().forwards());
/// ```
#[derive(Clone, Debug)]
pub struct EnvVarConfig {
    rules: RuleSet,
}

impl EnvVarConfig {
    /// Creates a provider, selecting the forwarding rule set when
    /// `FORWARD_UNMATCHED` is set.
    pub fn new() -> Self {
        Self {
            rules: rule_set_for(get_forward_unmatched()),
        }
    }

    /// Enables forwarding of unmatched requests (the `--forward-unmatched`
    /// flag). Passing `false` keeps whatever the environment selected.
    pub fn with_forward_unmatched(mut self, forward: bool) -> Self {
        if forward {
            self.rules = RuleSet::forwarding();
        }
        self
    }
}

fn rule_set_for(forward_unmatched: bool) -> RuleSet {
    if forward_unmatched {
        RuleSet::forwarding()
    } else {
        RuleSet::default()
    }
}

impl Default for EnvVarConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardingProvider for EnvVarConfig {
    fn forwarding_config(&self) -> &ForwardingConfig {
        get_forwarding_config()
    }
}

impl ClassificationProvider for EnvVarConfig {
    fn rule_set(&self) -> &RuleSet {
        &self.rules
    }
}

impl ConnectionProvider for EnvVarConfig {
    fn max_connections(&self) -> usize {
        get_max_connections()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Helper function to create a mock environment function for testing
    fn create_mock_env(
        vars: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, env::VarError> {
        move |key: &str| {
            vars.get(key)
                .map(|v| v.to_string())
                .ok_or(env::VarError::NotPresent)
        }
    }

    fn env_with(key: &'static str, value: &'static str) -> HashMap<&'static str, &'static str> {
        HashMap::from([(key, value)])
    }

    // ===========================================
    // Forwarding configuration
    // ===========================================

    #[test]
    fn test_forwarding_config_default() {
        let config = compute_forwarding_config(create_mock_env(HashMap::new()));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_forwarding_config_custom_timeout() {
        let env_fn = create_mock_env(env_with(env_vars::PROXY_TIMEOUT_SECS, "5"));
        let config = compute_forwarding_config(env_fn);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_forwarding_config_invalid_timeout_falls_back() {
        let env_fn = create_mock_env(env_with(env_vars::PROXY_TIMEOUT_SECS, "soon"));
        assert_eq!(compute_forwarding_config(env_fn), ForwardingConfig::default());
    }

    #[test]
    fn test_forwarding_config_zero_timeout_falls_back() {
        let env_fn = create_mock_env(env_with(env_vars::PROXY_TIMEOUT_SECS, "0"));
        assert_eq!(compute_forwarding_config(env_fn), ForwardingConfig::default());
    }

    // ===========================================
    // Connection limit
    // ===========================================

    #[test]
    fn test_max_connections() {
        assert_eq!(compute_max_connections(create_mock_env(HashMap::new())), 10_000);

        let env_fn = create_mock_env(env_with(env_vars::MAX_CONNECTIONS, "0"));
        assert_eq!(compute_max_connections(env_fn), 0);

        let env_fn = create_mock_env(env_with(env_vars::MAX_CONNECTIONS, " 250 "));
        assert_eq!(compute_max_connections(env_fn), 250);

        let env_fn = create_mock_env(env_with(env_vars::MAX_CONNECTIONS, "-1"));
        assert_eq!(compute_max_connections(env_fn), 10_000);
    }

    // ===========================================
    // Forward unmatched
    // ===========================================

    #[test]
    fn test_forward_unmatched_values() {
        for (value, expected) in [
            ("true", true),
            ("TRUE", true),
            ("1", true),
            ("false", false),
            ("0", false),
            ("yes", false),
            ("", false),
        ] {
            let env_fn = create_mock_env(env_with(env_vars::FORWARD_UNMATCHED, value));
            assert_eq!(compute_forward_unmatched(env_fn), expected, "value {value:?}");
        }
        assert!(!compute_forward_unmatched(create_mock_env(HashMap::new())));
    }

    #[test]
    fn test_rule_set_selection() {
        assert!(!rule_set_for(false).forwards());
        assert!(rule_set_for(true).forwards());
    }

    #[test]
    fn test_cli_flag_enables_forwarding() {
        let config = EnvVarConfig {
            rules: RuleSet::default(),
        };
        assert!(!config.rule_set().forwards());
        assert!(config.with_forward_unmatched(true).rule_set().forwards());
    }

    #[test]
    fn test_cli_flag_false_keeps_env_choice() {
        let config = EnvVarConfig {
            rules: RuleSet::forwarding(),
        };
        assert!(config.with_forward_unmatched(false).rule_set().forwards());
    }
}
