//! Test utilities for Decoy.
//!
//! Shared helpers for unit tests: an in-memory log sink and throwaway
//! upstream servers. Only compiled when running tests (`#[cfg(test)]`).

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use http_body::Frame;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory log sink.
///
/// Installing it replaces the thread's default subscriber until the returned
/// guard is dropped.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(String::from).collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Upstream that reports what it received.
///
/// Responds `201 Created` with:
/// - `x-seen-forwarded-for`: the `X-Forwarded-For` it received (if any)
/// - `x-seen-headers`: every request header name, comma separated
/// - `x-seen-path`: the request path and query
/// - two `x-multi` values, plus `keep-alive` and `upgrade` hop-by-hop headers
/// - a body of `echo:` followed by the request body
pub async fn spawn_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let service = service_fn(echo);
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

async fn echo(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let seen_forwarded_for = req
        .headers()
        .get("x-forwarded-for")
        .map(|v| v.to_str().unwrap_or_default().to_string());
    let seen_headers = req
        .headers()
        .keys()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let seen_path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();

    let body = req.into_body().collect().await.map(|c| c.to_bytes()).unwrap_or_default();
    let mut echoed = b"echo:".to_vec();
    echoed.extend_from_slice(&body);

    let mut builder = Response::builder()
        .status(StatusCode::CREATED)
        .header("x-seen-headers", seen_headers)
        .header("x-seen-path", seen_path)
        .header("x-multi", "a")
        .header("x-multi", "b")
        .header("keep-alive", "timeout=5")
        .header("upgrade", "h2c");
    if let Some(value) = seen_forwarded_for {
        builder = builder.header("x-seen-forwarded-for", value);
    }

    Ok(builder.body(Full::new(Bytes::from(echoed))).unwrap())
}

/// Upstream that accepts connections and never answers.
pub async fn spawn_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// Sets its flag when dropped.
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Upstream whose response body streams `chunk` frames forever.
///
/// The returned flag turns `true` once the server has dropped the body stream,
/// which happens when the reading side goes away.
pub async fn spawn_endless_upstream() -> (SocketAddr, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let flag = Arc::clone(&flag);
            tokio::spawn(async move {
                let service = service_fn(move |_req: Request<Incoming>| {
                    let guard = ReleaseFlag(Arc::clone(&flag));
                    async move {
                        let chunks = stream::unfold(guard, |guard| async move {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            let frame = Frame::data(Bytes::from_static(b"chunk"));
                            Some((Ok::<_, Infallible>(frame), guard))
                        });
                        Ok::<_, Infallible>(Response::new(StreamBody::new(chunks)))
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (addr, released)
}

/// Address on which nothing is listening.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
