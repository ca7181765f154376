//! Error types for Decoy.
//!
//! Every way a request can be refused or fail maps onto one [`DecoyError`]
//! variant, which knows the status code and body the client receives.

use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for Decoy operations.
pub type Result<T> = std::result::Result<T, DecoyError>;

/// Unified error type for Decoy operations.
///
/// # Example
///
/// ```
/// use decoy_core::error::DecoyError;
/// use hyper::StatusCode;
///
/// let err = DecoyError::UnsupportedScheme("ftp".into());
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// assert_eq!(err.user_message(), "unsupported protocol scheme ftp");
/// ```
#[derive(Debug, Error)]
pub enum DecoyError {
    /// Target scheme is neither `http` nor `https`.
    #[error("unsupported protocol scheme {0}")]
    UnsupportedScheme(String),

    /// The request carries an authentication header.
    #[error("found authentication header")]
    AuthenticationPresent,

    /// The request asked for a tunnel (CONNECT).
    #[error("tunnel establishment is not supported")]
    TunnelNotSupported,

    /// The outbound call to the upstream could not complete.
    #[error("upstream transport failure: {0}")]
    UpstreamTransportFailure(#[from] reqwest::Error),

    /// No log destination was configured at startup.
    #[error("missing required log path (--log-path)")]
    StartupConfigurationMissing,

    /// The bind address is not an IP address.
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    /// A response could not be assembled from its parts.
    #[error("failed to build response: {0}")]
    ResponseBuild(#[from] http::Error),
}

impl DecoyError {
    /// Returns the HTTP status code returned to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedScheme(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationPresent | Self::TunnelNotSupported => StatusCode::NOT_FOUND,
            Self::UpstreamTransportFailure(_)
            | Self::StartupConfigurationMissing
            | Self::InvalidBindAddress(_)
            | Self::ResponseBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the response body sent to the client.
    ///
    /// Refusals that pretend the resource does not exist get an empty body.
    /// Server-side failures never expose their details.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedScheme(_) => self.to_string(),
            Self::AuthenticationPresent | Self::TunnelNotSupported => String::new(),
            Self::UpstreamTransportFailure(_)
            | Self::StartupConfigurationMissing
            | Self::InvalidBindAddress(_)
            | Self::ResponseBuild(_) => "Server Error".to_string(),
        }
    }

    /// Returns true if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}
