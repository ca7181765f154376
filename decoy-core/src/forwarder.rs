//! One-hop forwarding to the upstream named by the request target.
//!
//! The outbound request is derived from the inbound one:
//! - the target URL (scheme, authority, path and query) is used verbatim,
//! - hop-by-hop headers are dropped and `Host` is left to the client,
//! - the peer address is appended to `X-Forwarded-For`,
//! - the body is streamed, never buffered.
//!
//! The upstream response goes back with hop-by-hop headers dropped and its
//! body streamed to the client. Dropping the returned response (for example
//! when the client disconnects mid-body) drops the upstream stream with it,
//! which releases the upstream connection.

use std::net::SocketAddr;

use bytes::Bytes;
use futures_util::{TryStreamExt, future};
use http::{HeaderMap, Request, Response};
use http_body::{Body, Frame};
use http_body_util::{BodyExt, BodyStream, StreamBody};
use tracing::{debug, info};

use crate::body::{BoxError, ProxyBody};
use crate::error::Result;
use crate::headers;
use crate::types::ForwardingConfig;

/// Builds the HTTP client used for every upstream call.
///
/// Redirects are relayed to the client rather than followed, and proxy
/// settings from the environment are ignored.
pub fn build_client(config: &ForwardingConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
}

/// Derives the outbound header map from the inbound one.
///
/// When a peer address is known its IP is chained onto `X-Forwarded-For`.
pub fn outbound_headers(inbound: &HeaderMap, remote_addr: Option<SocketAddr>) -> HeaderMap {
    let mut outbound = inbound.clone();
    headers::strip_hop_by_hop(&mut outbound);
    outbound.remove(headers::HOST);

    if let Some(addr) = remote_addr {
        let host = addr.ip().to_string();
        if !headers::append_forwarded_for(&mut outbound, &host) {
            debug!(host = %host, "X-Forwarded-For left unchanged: chained value is not a valid header");
        }
    }

    outbound
}

/// Forwards `req` to its own target and returns the relayed response.
///
/// Fails with [`DecoyError::UpstreamTransportFailure`] when the upstream call
/// cannot complete; nothing has been written to the client at that point.
///
/// [`DecoyError::UpstreamTransportFailure`]: crate::error::DecoyError::UpstreamTransportFailure
pub async fn forward<B>(
    req: Request<B>,
    remote_addr: SocketAddr,
    client: &reqwest::Client,
) -> Result<Response<ProxyBody>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let target = parts.uri.to_string();
    let outbound = outbound_headers(&parts.headers, Some(remote_addr));

    debug!(url = %target, headers = %headers::flatten_headers(&outbound), "Sending upstream request");

    let mut builder = client.request(parts.method, &target).headers(outbound);
    if !body.is_end_stream() {
        builder = builder.body(reqwest::Body::wrap_stream(request_stream(body)));
    }

    let upstream = builder.send().await?;
    info!(remote = %remote_addr, status = %upstream.status(), "Upstream responded");

    relay(upstream)
}

/// Turns an inbound body into a stream of data chunks, skipping trailers.
fn request_stream<B>(
    body: B,
) -> impl futures_util::Stream<Item = std::result::Result<Bytes, BoxError>> + Send + 'static
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    TryStreamExt::map_err(BodyStream::new(body), |err| -> BoxError { err.into() })
        .try_filter_map(|frame: Frame<Bytes>| future::ready(Ok(frame.into_data().ok())))
}

/// Converts an upstream response into the client response.
fn relay(upstream: reqwest::Response) -> Result<Response<ProxyBody>> {
    let status = upstream.status();
    let mut upstream_headers = upstream.headers().clone();
    headers::strip_hop_by_hop(&mut upstream_headers);

    let stream = upstream
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(BoxError::from);

    let mut response = Response::builder()
        .status(status)
        .body(StreamBody::new(stream).boxed_unsync())?;
    headers::copy_headers(response.headers_mut(), &upstream_headers);

    Ok(response)
}
