use http::Version;
use http::header::{
    CONNECTION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE, VIA,
};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Name this gateway announces itself with in `Via` headers.
pub const VIA_NAME: &str = "linkgate";

static HOP_BY_HOP_NAMES: &[HeaderName] = &[
    CONNECTION,
    TRANSFER_ENCODING,
    TE,
    TRAILER,
    UPGRADE,
    PROXY_AUTHORIZATION,
    PROXY_AUTHENTICATE,
];

pub async fn run_http_service<S, E>(host: &str, port: u16, service: S) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(host, port, "Listening for connections");
    let service_arc = Arc::new(service);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        // auto-detects h1/h2 per socket
        tokio::spawn(async move {
            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await
            {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection closed with error");
            }
        });
    }
}

/// Plain-text response carrying the status' canonical reason.
pub fn make_error_response<E>(status_code: StatusCode) -> Response<BoxBody<Bytes, E>>
where
    E: 'static,
{
    let message = status_code
        .canonical_reason()
        .unwrap_or("an error occurred");

    let mut response = Response::new(full_body(format!("{message}\n")));
    *response.status_mut() = status_code;
    response
}

/// JSON response with the given status.
pub fn make_json_response<E>(status_code: StatusCode, json: Vec<u8>) -> Response<BoxBody<Bytes, E>>
where
    E: 'static,
{
    let mut response = Response::new(full_body(json));
    *response.status_mut() = status_code;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Wraps an in-memory payload into the boxed body type shared by all services.
pub fn full_body<E, T>(data: T) -> BoxBody<Bytes, E>
where
    E: 'static,
    T: Into<Bytes>,
{
    Full::new(data.into()).map_err(|e| match e {}).boxed()
}

pub fn is_http1(v: Version) -> bool {
    matches!(v, Version::HTTP_09 | Version::HTTP_10 | Version::HTTP_11)
}

/// Appends `<version> linkgate` to the Via header, creating it when absent.
pub fn add_via_header(headers: &mut HeaderMap, version: Version) {
    let version_str = match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => {
            tracing::warn!(?version, "Unknown HTTP version, skipping Via header");
            return;
        }
    };

    let hop = format!("{version_str} {VIA_NAME}");
    let combined = match headers.get(VIA).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {hop}"),
        None => hop,
    };

    if let Ok(value) = HeaderValue::from_str(&combined) {
        headers.insert(VIA, value);
    }
}

// HTTP/1.x only: drops the standard hop-by-hop headers, anything named in
// Connection, and keep-alive for 0.9/1.0. h2 and h3 carry no hop-by-hop headers.
pub fn filter_hop_by_hop(headers: &mut HeaderMap, version: Version) -> &mut HeaderMap {
    if !is_http1(version) {
        return headers;
    }

    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| HeaderName::from_bytes(t.as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP_NAMES.iter().chain(listed.iter()) {
        headers.remove(name);
    }

    if matches!(version, Version::HTTP_09 | Version::HTTP_10) {
        headers.remove(HeaderName::from_static("keep-alive"));
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn test_filter_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert("X-Trace", HeaderValue::from_static("abc"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));

        let filtered = filter_hop_by_hop(&mut headers, Version::HTTP_11);

        assert_eq!(filtered.len(), 1);
        assert_eq!(
            filtered.get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/html"))
        );
        assert!(filtered.get("x-trace").is_none());
    }

    #[test]
    fn test_filter_skipped_for_http2() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let filtered = filter_hop_by_hop(&mut headers, Version::HTTP_2);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_via_header() {
        let mut headers = HeaderMap::new();
        add_via_header(&mut headers, Version::HTTP_11);
        assert_eq!(headers.get(VIA).unwrap(), "1.1 linkgate");

        add_via_header(&mut headers, Version::HTTP_2);
        assert_eq!(headers.get(VIA).unwrap(), "1.1 linkgate, 2 linkgate");
    }

    #[test]
    fn test_error_and_json_responses() {
        let response = make_error_response::<Infallible>(StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            make_json_response::<Infallible>(StatusCode::BAD_REQUEST, b"{\"ok\":false}".to_vec());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
