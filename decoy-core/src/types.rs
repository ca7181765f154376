//! Configuration types and provider traits.
//!
//! Decoy's core never reads the environment itself. Callers hand it a value
//! implementing [`ConfigProvider`], built from whatever source they like.

use std::time::Duration;

use crate::classifier::RuleSet;
use crate::defaults;

// ============================================================================
// Composable Configuration Traits
// ============================================================================

/// Configuration for the upstream transport used by the forwarder.
pub trait ForwardingProvider: Send + Sync {
    /// Returns the forwarding configuration.
    fn forwarding_config(&self) -> &ForwardingConfig;
}

/// Configuration for request classification.
pub trait ClassificationProvider: Send + Sync {
    /// Returns the ordered rules evaluated for every request.
    fn rule_set(&self) -> &RuleSet;
}

/// Configuration for connection limits.
pub trait ConnectionProvider: Send + Sync {
    /// Returns the maximum number of concurrent connections (0 = unlimited).
    fn max_connections(&self) -> usize;
}

/// Trait for complete configuration injection.
///
/// Combines [`ForwardingProvider`], [`ClassificationProvider`] and
/// [`ConnectionProvider`]. Any type implementing all three is a
/// `ConfigProvider`.
pub trait ConfigProvider: ForwardingProvider + ClassificationProvider + ConnectionProvider {}

impl<T> ConfigProvider for T where T: ForwardingProvider + ClassificationProvider + ConnectionProvider {}

/// Upstream transport settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use decoy_core::ForwardingConfig;
///
/// let config = ForwardingConfig { timeout: Duration::from_secs(5) };
/// assert!(config.is_valid());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardingConfig {
    /// Timeout for a whole upstream request, body included.
    pub timeout: Duration,
}

impl ForwardingConfig {
    /// A valid configuration has a non-zero timeout.
    pub fn is_valid(&self) -> bool {
        !self.timeout.is_zero()
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            timeout: defaults::PROXY_TIMEOUT,
        }
    }
}

/// Plain-value configuration.
///
/// The default holds the built-in rule order (forwarding disabled), a 30 second
/// upstream timeout and a 10 000 connection cap.
///
/// # Example
///
/// ```
/// use decoy_core::{ClassificationProvider, RuleSet, StaticConfig};
///
/// let config = StaticConfig::default().with_rules(RuleSet::forwarding());
/// assert!(config.rule_set().forwards());
/// ```
#[derive(Clone, Debug)]
pub struct StaticConfig {
    pub forwarding: ForwardingConfig,
    pub rules: RuleSet,
    pub max_connections: usize,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            forwarding: ForwardingConfig::default(),
            rules: RuleSet::default(),
            max_connections: defaults::MAX_CONNECTIONS,
        }
    }
}

impl StaticConfig {
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.forwarding.timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }
}

impl ForwardingProvider for StaticConfig {
    fn forwarding_config(&self) -> &ForwardingConfig {
        &self.forwarding
    }
}

impl ClassificationProvider for StaticConfig {
    fn rule_set(&self) -> &RuleSet {
        &self.rules
    }
}

impl ConnectionProvider for StaticConfig {
    fn max_connections(&self) -> usize {
        self.max_connections
    }
}
