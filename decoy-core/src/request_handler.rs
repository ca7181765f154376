//! HTTP request handling.
//!
//! This module ties the pipeline together for one request:
//! 1. Log the request (peer, method, target, headers)
//! 2. Classify it against the configured [`RuleSet`](crate::RuleSet)
//! 3. Log the decision with its reason
//! 4. Answer with a synthetic response, or forward to the upstream
//!
//! The response is fully decided before anything is returned to hyper, so a
//! request never ends up with two different statuses.
//!
//! # Connection Pooling
//!
//! The module accepts a shared [`reqwest::Client`] for HTTP connection pooling,
//! which should be configured by the caller with appropriate timeouts
//! (see [`forwarder::build_client`]).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body::Body;
use hyper::{Request, Response, StatusCode};
use tracing::{error, info};

use crate::body::{self, BoxError, ProxyBody};
use crate::classifier::{Outcome, RequestHead};
use crate::error::DecoyError;
use crate::forwarder;
use crate::headers;
use crate::types::ConfigProvider;

/// Handles an incoming HTTP request through the decoy pipeline.
///
/// # Arguments
///
/// * `req` - The incoming HTTP request
/// * `remote_addr` - The peer address of the client connection
/// * `config` - Configuration provider (rules and forwarding settings)
/// * `http_client` - HTTP client used when a request is forwarded
///
/// # Returns
///
/// Always returns `Ok`: every refusal or upstream failure is turned into a
/// response.
pub async fn handle_request<B, C>(
    req: Request<B>,
    remote_addr: SocketAddr,
    config: Arc<C>,
    http_client: reqwest::Client,
) -> Result<Response<ProxyBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
    C: ConfigProvider,
{
    info!(
        remote = %remote_addr,
        method = %req.method(),
        url = %req.uri(),
        headers = %headers::flatten_headers(req.headers()),
        "Incoming request"
    );

    let decision = config.rule_set().classify(&RequestHead::from(&req));

    let response = match decision.outcome {
        Outcome::Respond { status, body: content } => {
            info!(remote = %remote_addr, status = status.as_u16(), "{}", decision.reason);
            synthetic_response(status, content)
        }
        Outcome::Reject(err) => {
            let status = err.status_code().as_u16();
            if err.is_server_error() {
                error!(remote = %remote_addr, status, "{}", decision.reason);
            } else {
                info!(remote = %remote_addr, status, "{}", decision.reason);
            }
            create_error_response(&err)
        }
        Outcome::Forward => {
            info!(remote = %remote_addr, "{}", decision.reason);
            match forwarder::forward(req, remote_addr, &http_client).await {
                Ok(response) => response,
                Err(err) => {
                    if err.is_server_error() {
                        error!(remote = %remote_addr, error = %err, "Upstream request failed");
                    } else {
                        info!(remote = %remote_addr, error = %err, "Upstream request failed");
                    }
                    create_error_response(&err)
                }
            }
        }
    };

    Ok(response)
}

/// Builds a classifier-decided response.
///
/// A non-empty body is served as HTML; an empty body gets no content type.
pub fn synthetic_response(status: StatusCode, content: &'static str) -> Response<ProxyBody> {
    if content.is_empty() {
        return bare_response(status);
    }

    Response::builder()
        .status(status)
        .header(headers::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(body::full(Bytes::from_static(content.as_bytes())))
        .unwrap_or_else(|_| bare_response(status))
}

/// Creates the response sent to the client for `err`.
///
/// # Example
///
/// ```
/// use decoy_core::error::DecoyError;
/// use decoy_core::request_handler::create_error_response;
/// use hyper::StatusCode;
///
/// let response = create_error_response(&DecoyError::TunnelNotSupported);
/// assert_eq!(response.status(), StatusCode::NOT_FOUND);
/// ```
pub fn create_error_response(err: &DecoyError) -> Response<ProxyBody> {
    let message = err.user_message();
    if message.is_empty() {
        return bare_response(err.status_code());
    }

    Response::builder()
        .status(err.status_code())
        .header(headers::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body::full(message))
        .unwrap_or_else(|_| bare_response(err.status_code()))
}

fn bare_response(status: StatusCode) -> Response<ProxyBody> {
    let mut response = Response::new(body::empty());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Rule, RuleSet};
    use crate::test_utils::{LogCapture, closed_port, spawn_silent_upstream, spawn_upstream};
    use crate::types::StaticConfig;
    use http::Method;
    use http_body_util::{BodyExt, Empty};

    fn peer() -> SocketAddr {
        "203.0.113.9:51000".parse().unwrap()
    }

    fn request(method: Method, uri: &str, headers: &[(&str, &str)]) -> Request<Empty<Bytes>> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Empty::new()).unwrap()
    }

    async fn send(
        config: StaticConfig,
        req: Request<Empty<Bytes>>,
    ) -> (StatusCode, http::HeaderMap, Bytes) {
        let client = forwarder::build_client(&config.forwarding).unwrap();
        let response = handle_request(req, peer(), Arc::new(config), client)
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    // ===========================================
    // Default rule set
    // ===========================================

    #[tokio::test]
    async fn test_unsupported_scheme_returns_400_with_scheme() {
        for scheme in ["ftp", "gopher", "ws"] {
            let req = request(Method::GET, &format!("{scheme}://example.com/x"), &[]);
            let (status, _, body) = send(StaticConfig::default(), req).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(String::from_utf8_lossy(&body).contains(scheme));
        }
    }

    #[tokio::test]
    async fn test_origin_form_request_returns_400() {
        let req = request(Method::GET, "/relative", &[]);
        let (status, _, body) = send(StaticConfig::default(), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "unsupported protocol scheme ");
    }

    #[tokio::test]
    async fn test_auth_headers_return_empty_404() {
        for name in ["authorization", "www-authenticate", "proxy-authorization"] {
            let req = request(Method::POST, "http://example.com/login", &[(name, "secret")]);
            let (status, _, body) = send(StaticConfig::default(), req).await;

            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_head_returns_empty_200() {
        let req = request(Method::HEAD, "https://example.com/big.iso", &[]);
        let (status, resp_headers, body) = send(StaticConfig::default(), req).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert!(resp_headers.get(headers::CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_connect_returns_empty_404() {
        let req = request(Method::CONNECT, "https://example.com:443/", &[]);
        let (status, _, body) = send(StaticConfig::default(), req).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_image_returns_empty_200() {
        for ext in ["png", "jpg", "gif"] {
            let req = request(Method::GET, &format!("http://example.com/pic.{ext}"), &[]);
            let (status, _, body) = send(StaticConfig::default(), req).await;

            assert_eq!(status, StatusCode::OK);
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_fallback_returns_empty_document() {
        for uri in [
            "http://example.com/",
            "http://example.com/pic.pngx",
            "http://example.com/a.png/b",
        ] {
            let req = request(Method::GET, uri, &[]);
            let (status, resp_headers, body) = send(StaticConfig::default(), req).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "<html></html>");
            assert_eq!(
                resp_headers.get(headers::CONTENT_TYPE).unwrap(),
                "text/html; charset=utf-8"
            );
        }
    }

    #[tokio::test]
    async fn test_default_rules_never_contact_upstream() {
        // Target points at a closed port: any forwarding attempt would yield 500
        let addr = closed_port().await;
        let req = request(Method::GET, &format!("http://{addr}/"), &[]);
        let (status, _, body) = send(StaticConfig::default(), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html></html>");
    }

    // ===========================================
    // Forwarding configurations
    // ===========================================

    #[tokio::test]
    async fn test_forwarding_rule_set_reaches_upstream() {
        let upstream = spawn_upstream().await;
        let config = StaticConfig::default().with_rules(RuleSet::forwarding());
        let req = request(
            Method::GET,
            &format!("http://{upstream}/page"),
            &[("x-forwarded-for", "10.0.0.1")],
        );

        let (status, resp_headers, body) = send(config, req).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            resp_headers.get("x-seen-forwarded-for").unwrap(),
            "10.0.0.1, 203.0.113.9"
        );
        assert_eq!(body, "echo:");
    }

    #[tokio::test]
    async fn test_forward_failure_returns_500() {
        let addr = closed_port().await;
        let config = StaticConfig::default().with_rules(RuleSet::from(vec![Rule::Forward]));
        let req = request(Method::GET, &format!("http://{addr}/"), &[]);

        let (status, _, body) = send(config, req).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Server Error");
    }

    #[tokio::test]
    async fn test_upstream_timeout_returns_500() {
        let upstream = spawn_silent_upstream().await;
        let config = StaticConfig::default()
            .with_rules(RuleSet::forwarding())
            .with_timeout(std::time::Duration::from_millis(200));
        let req = request(Method::GET, &format!("http://{upstream}/slow"), &[]);

        let (status, resp_headers, body) = send(config, req).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp_headers.get(headers::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body, "Server Error");
    }

    // ===========================================
    // Logging
    // ===========================================

    #[tokio::test]
    async fn test_client_errors_are_logged_at_info() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let req = request(Method::GET, "ftp://example.com/file", &[]);
        let _ = send(StaticConfig::default(), req).await;

        let logs = capture.contents();
        assert!(logs.contains("unsupported protocol scheme ftp"));
        assert!(logs.contains("INFO"));
        assert!(!logs.contains("ERROR"));
    }

    #[tokio::test]
    async fn test_request_and_decision_are_logged() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let req = request(
            Method::GET,
            "http://example.com/index",
            &[("accept", "text/html"), ("x-multi", "a"), ("x-multi", "b")],
        );
        let _ = send(StaticConfig::default(), req).await;

        let lines = capture.lines();
        assert_eq!(lines.len(), 2, "unexpected log lines: {lines:?}");
        assert!(lines[0].contains("Incoming request"));
        assert!(lines[0].contains("203.0.113.9:51000"));
        assert!(lines[0].contains("http://example.com/index"));
        assert!(lines[0].contains("x-multi: a,b"));
        assert!(lines[1].contains("returning empty HTML"));
    }

    #[tokio::test]
    async fn test_connect_with_auth_logs_auth_reason() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let req = request(
            Method::CONNECT,
            "https://example.com:443/",
            &[("authorization", "Bearer t")],
        );
        let (status, _, body) = send(StaticConfig::default(), req).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
        let logs = capture.contents();
        assert!(logs.contains("found authentication header"));
        assert!(!logs.contains("CONNECT request"));
    }

    #[tokio::test]
    async fn test_forward_failure_is_logged_at_error() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let addr = closed_port().await;
        let config = StaticConfig::default().with_rules(RuleSet::from(vec![Rule::Forward]));
        let _ = send(config, request(Method::GET, &format!("http://{addr}/"), &[])).await;

        let logs = capture.contents();
        assert!(logs.contains("forwarding to upstream"));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("Upstream request failed"));
    }

    // ===========================================
    // Response helpers
    // ===========================================

    #[tokio::test]
    async fn test_create_error_response_body() {
        let response = create_error_response(&DecoyError::UnsupportedScheme("file".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(headers::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "unsupported protocol scheme file");
    }

    #[tokio::test]
    async fn test_create_error_response_empty_for_not_found() {
        let response = create_error_response(&DecoyError::AuthenticationPresent);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().is_empty());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
