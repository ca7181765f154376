//! Decoy Core - request classification and one-hop forwarding
//!
//! This crate holds the decision logic of the Decoy forward proxy:
//! - An ordered, first-match-wins [`RuleSet`] deciding whether a request gets
//!   a synthetic answer or is forwarded
//! - A forwarder that relays a request to the upstream named by its own target,
//!   streaming bodies both ways
//! - Header utilities: hop-by-hop stripping, multi-value copying and
//!   `X-Forwarded-For` chaining
//!
//! # Overview
//!
//! `decoy-core` knows nothing about sockets or the environment. Configuration
//! is provided via the [`ConfigProvider`] trait, and requests arrive as plain
//! `http::Request` values with any body type.
//!
//! # Example
//!
//! ```rust
//! use decoy_core::{RequestHead, RuleSet, Outcome};
//! use http::Request;
//!
//! let req = Request::get("http://example.com/logo.png").body(()).unwrap();
//! let decision = RuleSet::default().classify(&RequestHead::from(&req));
//!
//! assert!(matches!(decision.outcome, Outcome::Respond { .. }));
//! assert_eq!(decision.reason, "image request");
//! ```
//!
//! # Modules
//!
//! - [`classifier`] - Rules, rule sets and decisions
//! - [`forwarder`] - Upstream client and request relaying
//! - [`request_handler`] - The per-request pipeline
//! - [`headers`] - Header constants and header-map utilities
//! - [`types`] - Configuration types and the [`ConfigProvider`] trait
//! - [`error`] - Error types and result aliases

#![forbid(unsafe_code)]

pub mod body;
pub mod classifier;
pub mod defaults;
pub mod error;
pub mod forwarder;
pub mod headers;
pub mod request_handler;
#[cfg(test)]
pub mod test_utils;
pub mod types;

// Re-export commonly used items at crate root
pub use body::ProxyBody;
pub use classifier::{Decision, Outcome, RequestHead, Rule, RuleSet};
pub use error::{DecoyError, Result};
pub use types::{
    ClassificationProvider, ConfigProvider, ConnectionProvider, ForwardingConfig,
    ForwardingProvider, StaticConfig,
};
