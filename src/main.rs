use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tokio::net::TcpListener;
use tracing::{error, info};

use decoy::args::Args;
use decoy::config::EnvVarConfig;
use decoy::{logging, server};
use decoy_core::{
    ClassificationProvider, ConnectionProvider, DecoyError, ForwardingProvider, forwarder,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments before anything is bound or opened
    if let Err(err) = args.validate() {
        eprintln!("Configuration error: {err}");
        if matches!(err, DecoyError::StartupConfigurationMissing) {
            eprintln!();
            let _ = Args::command().print_help();
        }
        std::process::exit(1);
    }

    let Some(log_path) = args.log_path.as_deref() else {
        std::process::exit(1);
    };

    let _log_guard = match logging::init_logging(log_path, args.json_logs) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", log_path.display());
            std::process::exit(1);
        }
    };

    let config = Arc::new(EnvVarConfig::new().with_forward_unmatched(args.forward_unmatched));
    server::print_startup_info(&args, config.as_ref());

    let http_client = match forwarder::build_client(config.forwarding_config()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Failed to build upstream client: {err}");
            std::process::exit(1);
        }
    };

    let bind_addr = match args.listen_addr() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Failed to bind to {bind_addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        address = %bind_addr,
        forwarding = config.rule_set().forwards(),
        max_connections = config.max_connections(),
        "Decoy listening"
    );
    if !args.quiet {
        println!("Decoy is running on {bind_addr}");
    }

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    if let Err(err) = server::serve(listener, config, http_client, shutdown).await {
        error!(error = %err, "Server stopped with an error");
        std::process::exit(1);
    }
}
