//! Command line argument parsing for Decoy.
//!
//! This module defines the CLI interface using [`clap`] for argument parsing.
//!
//! # Example
//!
//! ```no_run
//! use decoy::args::Args;
//! use clap::Parser;
//!
//! let args = Args::parse();
//! if let Err(e) = args.validate() {
//!     eprintln!("Configuration error: {}", e);
//!     std::process::exit(1);
//! }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use clap::builder::{OsStringValueParser, TypedValueParser};
use decoy_core::DecoyError;
use decoy_core::defaults;

/// Command line arguments for Decoy.
///
/// `log_path` is optional at parse time so that a missing value can be
/// reported through [`Args::validate`] together with the usage text, before
/// any listener is bound.
#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    long_about = "A forward HTTP proxy that answers every request itself.\nImages and HEAD requests get an empty 200, authenticated requests and CONNECT get a 404, everything else gets an empty HTML page.\n\nExample usage:\n  decoy --log-path /var/log/decoy.log\n  decoy -p decoy.log -l 3128 --forward-unmatched"
)]
#[command(
    after_help = "Environment variables:\n  PROXY_TIMEOUT_SECS     Upstream request timeout (default: 30)\n  MAX_CONNECTIONS        Max concurrent connections (default: 10000, 0 = unlimited)\n  FORWARD_UNMATCHED      Forward unmatched requests upstream (true/false)\n  RUST_LOG               Log filter (default: info)"
)]
pub struct Args {
    /// File receiving the request and decision log (required)
    #[arg(
        long,
        short = 'p',
        value_name = "FILE",
        value_parser = OsStringValueParser::new().map(PathBuf::from)
    )]
    pub log_path: Option<PathBuf>,

    /// Address to bind to
    #[arg(
        long,
        short = 'b',
        value_name = "ADDRESS",
        default_value = defaults::BIND_ADDRESS
    )]
    pub bind: String,

    /// Port to listen on for incoming requests
    #[arg(
        long,
        short = 'l',
        value_name = "PORT",
        default_value_t = defaults::LISTEN_PORT
    )]
    pub listen: u16,

    /// Forward requests no short-circuit rule claims instead of answering
    /// them with an empty HTML page
    #[arg(long)]
    pub forward_unmatched: bool,

    /// Show detailed configuration and startup information
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Suppress configuration output, show only essential messages
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write log records as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl Args {
    /// Validates the parsed command line arguments.
    ///
    /// # Errors
    ///
    /// * [`DecoyError::StartupConfigurationMissing`] when no log path was given
    ///   (or it is empty)
    /// * [`DecoyError::InvalidBindAddress`] when `bind` is not an IP address
    ///
    /// # Example
    ///
    /// ```
    /// use decoy::args::Args;
    /// use clap::Parser;
    ///
    /// let args = Args::try_parse_from(["decoy"]).unwrap();
    /// assert!(args.validate().is_err());
    ///
    /// let args = Args::try_parse_from(["decoy", "--log-path", "decoy.log"]).unwrap();
    /// assert!(args.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), DecoyError> {
        match &self.log_path {
            Some(path) if !path.as_os_str().is_empty() => {}
            _ => return Err(DecoyError::StartupConfigurationMissing),
        }

        self.bind
            .parse::<IpAddr>()
            .map_err(|_| DecoyError::InvalidBindAddress(self.bind.clone()))?;

        Ok(())
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr, DecoyError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| DecoyError::InvalidBindAddress(self.bind.clone()))?;
        Ok(SocketAddr::new(ip, self.listen))
    }
}
