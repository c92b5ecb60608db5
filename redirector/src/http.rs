use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::{Request, Response};
use hyper_util::client::legacy::Client;
use shared::http::{add_via_header, filter_hop_by_hop};
use std::time::Duration;
use tokio::time::timeout;

use crate::errors::RedirectorError;

/// Forwards a pass-through request to the page-rendering upstream.
///
/// The request path and query are kept, hop-by-hop headers are dropped in both
/// directions and a Via header is added. The timeout covers the whole exchange,
/// including collecting the response body.
pub async fn send_to_upstream<C, B>(
    client: &Client<C, B>,
    upstream_url: &url::Url,
    request: Request<B>,
    timeout_secs: u64,
) -> Result<Response<Bytes>, RedirectorError>
where
    C: hyper_util::client::legacy::connect::Connect + Clone + Send + Sync + 'static,
    B: hyper::body::Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let upstream_identifier = upstream_url.host_str().unwrap_or(upstream_url.as_str());

    let path_and_query = match request.uri().path_and_query() {
        Some(pq) => pq.as_str(),
        None => {
            return Err(RedirectorError::InternalError(
                "Request URI missing path and query".to_string(),
            ));
        }
    };

    let mut url = upstream_url.clone();
    match path_and_query.split_once('?') {
        Some((path, query)) => {
            url.set_path(path);
            url.set_query(Some(query));
        }
        None => {
            url.set_path(path_and_query);
            url.set_query(None);
        }
    }
    let upstream_uri = url.to_string();

    let (mut parts, body) = request.into_parts();
    let request_version = parts.version;
    filter_hop_by_hop(&mut parts.headers, request_version);
    add_via_header(&mut parts.headers, request_version);
    // the client derives Host from the upstream URI
    parts.headers.remove(hyper::header::HOST);

    let mut req_builder = Request::builder()
        .method(parts.method)
        .uri(upstream_uri)
        .version(parts.version);

    for (name, value) in parts.headers.iter() {
        req_builder = req_builder.header(name, value);
    }

    let upstream_request = req_builder
        .body(body)
        .map_err(|e| RedirectorError::InternalError(format!("Failed to build request: {e}")))?;

    let exchange = async {
        let response = client.request(upstream_request).await.map_err(|e| {
            RedirectorError::UpstreamRequestFailed(upstream_identifier.to_string(), e.to_string())
        })?;

        let (mut parts, body) = response.into_parts();
        let response_version = parts.version;
        filter_hop_by_hop(&mut parts.headers, response_version);
        add_via_header(&mut parts.headers, response_version);

        let body_bytes = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| RedirectorError::ResponseBodyError(e.to_string()))?;

        Ok::<_, RedirectorError>(Response::from_parts(parts, body_bytes))
    };

    timeout(Duration::from_secs(timeout_secs), exchange)
        .await
        .map_err(|_| RedirectorError::UpstreamTimeout(upstream_identifier.to_string()))?
}
