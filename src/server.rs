//! Accept loop, per-connection serving and the startup banner.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::args::Args;
use crate::connection::{ConnectionLimiter, ConnectionTracker};
use crate::{config, env_vars};
use decoy_core::{ConfigProvider, defaults, request_handler};

/// Serves proxy connections from `listener` until `shutdown` resolves.
///
/// On shutdown the listener is dropped, open connections are asked to finish
/// their current exchange, and the call returns once they are gone or the
/// grace period has passed.
pub async fn serve<C, S>(
    listener: TcpListener,
    config: Arc<C>,
    http_client: reqwest::Client,
    shutdown: S,
) -> io::Result<()>
where
    C: ConfigProvider + 'static,
    S: Future<Output = ()>,
{
    let limiter = ConnectionLimiter::new(config.max_connections());
    let tracker = ConnectionTracker::new();
    let (stop_tx, stop_rx) = watch::channel(false);

    tokio::pin!(shutdown);

    loop {
        let (stream, remote_addr) = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    continue;
                }
            },
        };

        let permit = match limiter.admit() {
            Ok(permit) => permit,
            Err(full) => {
                warn!(
                    remote = %remote_addr,
                    max_connections = full.max_connections,
                    "Connection limit reached, closing connection"
                );
                continue;
            }
        };

        let guard = tracker.track();
        let config = Arc::clone(&config);
        let http_client = http_client.clone();
        let stop_rx = stop_rx.clone();

        tokio::spawn(async move {
            serve_connection(stream, remote_addr, config, http_client, stop_rx).await;
            drop(guard);
            drop(permit);
        });
    }

    drop(listener);
    let open = tracker.count();
    info!(connections = open, "Shutting down, waiting for open connections");
    let _ = stop_tx.send(true);

    if tracker.drain(defaults::SHUTDOWN_GRACE).await {
        info!("All connections closed");
    } else {
        warn!(
            connections = tracker.count(),
            "Grace period elapsed with connections still open"
        );
    }

    Ok(())
}

async fn serve_connection<C>(
    stream: TcpStream,
    remote_addr: SocketAddr,
    config: Arc<C>,
    http_client: reqwest::Client,
    mut stop_rx: watch::Receiver<bool>,
) where
    C: ConfigProvider + 'static,
{
    debug!(remote = %remote_addr, "Connection opened");

    let service = service_fn(move |req| {
        request_handler::handle_request(req, remote_addr, Arc::clone(&config), http_client.clone())
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = stop_rx.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(err) = result {
        debug!(remote = %remote_addr, error = %err, "Connection error");
    }
}

/// Print startup banner with configuration
pub fn print_startup_info<C: ConfigProvider>(args: &Args, config: &C) {
    let version = env!("CARGO_PKG_VERSION");

    if args.quiet {
        println!("Decoy v{version} listening on {}:{}", args.bind, args.listen);
        return;
    }

    println!("{} v{version}", env!("CARGO_PKG_NAME"));
    println!("   {}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("Network:");
    println!("   Bind Address:   {}", args.bind);
    println!("   Listen Port:    {}", args.listen);
    match config.max_connections() {
        0 => println!("   Connections:    unlimited"),
        max => println!("   Connections:    {max} max"),
    }
    println!();

    println!("Classification:");
    let rules = config.rule_set();
    for (position, rule) in rules.rules().iter().enumerate() {
        println!("   {:>2}. {rule:?}", position + 1);
    }
    println!(
        "   Unmatched:      {}",
        if rules.forwards() { "forwarded upstream" } else { "answered locally" }
    );
    println!();

    println!("Upstream:");
    println!(
        "   Timeout:        {} seconds",
        config.forwarding_config().timeout.as_secs()
    );
    println!();

    if let Some(path) = &args.log_path {
        println!("Logging:");
        println!("   File:           {}", path.display());
        println!(
            "   Format:         {}",
            if args.json_logs { "json" } else { "text" }
        );
    }

    if args.verbose {
        print_env_config();
    }

    println!();
    println!("Server starting...");
}

/// Print environment variable configuration status (used in verbose mode)
fn print_env_config() {
    println!();
    println!("Environment Variables:");

    for &var_name in env_vars::all_env_vars() {
        match std::env::var(var_name) {
            Ok(value) => println!("   {var_name:<25} = {value}"),
            Err(_) => println!("   {var_name:<25} = [NOT SET]"),
        }
    }
    println!(
        "   {:<25} = {}",
        "(effective) forward", config::get_forward_unmatched()
    );
}
