use crate::bounce;
use crate::config::{BounceSettings, Config, UpstreamConfig, ValidationError};
use crate::direct::{DirectEndpoint, DirectResponse};
use crate::edge::{EdgeDecision, EdgeInterceptor};
use crate::errors::{DestinationError, RedirectorError};
use crate::http::send_to_upstream;
use crate::metrics_defs::{BOUNCE_PAGE_RENDERS, PASS_THROUGH, REDIRECT_REJECTED, REQUEST_DURATION};
use crate::pipeline::Resolver;
use http::header::{ALLOW, CACHE_CONTROL, CONTENT_TYPE, LOCATION, REFERER};
use http::{HeaderValue, Method};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use registry::Registry;
use shared::http::{full_body, make_error_response, make_json_response};
use shared::{counter, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

type GatewayResponse = Response<BoxBody<Bytes, RedirectorError>>;

struct Upstream {
    client: Client<HttpConnector, Incoming>,
    url: Url,
    timeout_secs: u64,
}

impl Upstream {
    fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Upstream {
            client,
            url: config.url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

struct Gateway {
    edge: EdgeInterceptor,
    direct: DirectEndpoint,
    direct_path: String,
    bounce: BounceSettings,
    upstream: Option<Upstream>,
}

/// Main listener service: direct endpoint, bounce page, and the edge
/// interceptor in front of everything else.
pub struct GatewayService {
    inner: Arc<Gateway>,
}

impl GatewayService {
    pub fn new(config: &Config, registry: Registry) -> Result<Self, ValidationError> {
        let resolver = Arc::new(Resolver::new(
            registry,
            &config.redirect,
            &config.bounce,
            Duration::from_millis(config.registry.increment_wait_ms),
        ));

        let gateway = Gateway {
            edge: EdgeInterceptor::new(&config.redirect, &config.bounce, resolver.clone())?,
            direct: DirectEndpoint::new(resolver),
            direct_path: config.redirect.direct_path.clone(),
            bounce: config.bounce.clone(),
            upstream: config.upstream.as_ref().map(Upstream::new),
        };

        Ok(GatewayService {
            inner: Arc::new(gateway),
        })
    }
}

impl Gateway {
    async fn handle(&self, req: Request<Incoming>) -> GatewayResponse {
        let start = Instant::now();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);

        let (handler, response) = if path == self.direct_path {
            let response = self.direct(req.method(), query.as_deref()).await;
            ("direct", response)
        } else if path == self.bounce.path {
            ("bounce", self.bounce_page(req.method(), query.as_deref()))
        } else {
            ("edge", self.edge(req, &path, query.as_deref()).await)
        };

        histogram!(REQUEST_DURATION, "handler" => handler, "status" => response.status().as_u16().to_string())
            .record(start.elapsed().as_secs_f64());
        response
    }

    async fn direct(&self, method: &Method, query: Option<&str>) -> GatewayResponse {
        let outcome = self.direct.handle(method, query).await;
        let status = outcome.status();
        match outcome {
            DirectResponse::Redirect(location) => match redirect(status, &location) {
                Some(response) => response,
                None => {
                    tracing::warn!(location, "Redirect target is not a valid header value");
                    rejected(DestinationError::InvalidDestination(location))
                }
            },
            DirectResponse::BadRequest(error) => rejected(error),
            DirectResponse::MethodNotAllowed => {
                let mut response = make_error_response(status);
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
                response
            }
        }
    }

    fn bounce_page(&self, method: &Method, query: Option<&str>) -> GatewayResponse {
        if method != Method::GET && method != Method::HEAD {
            return make_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        match bounce::render(query, &self.bounce) {
            Ok(html) => {
                counter!(BOUNCE_PAGE_RENDERS).increment(1);
                let mut response = Response::new(full_body(html));
                let headers = response.headers_mut();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "Bounce page cannot navigate");
                counter!(REDIRECT_REJECTED, "surface" => "bounce", "reason" => "bad_destination")
                    .increment(1);
                make_error_response(StatusCode::BAD_REQUEST)
            }
        }
    }

    async fn edge(&self, req: Request<Incoming>, path: &str, query: Option<&str>) -> GatewayResponse {
        let referer = req
            .headers()
            .get(REFERER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match self.edge.intercept(path, query, referer.as_deref()).await {
            EdgeDecision::Redirect { status, location } => match redirect(status, &location) {
                Some(response) => response,
                None => {
                    tracing::warn!(path, location, "Redirect target is not a valid header value");
                    self.pass_through(req).await
                }
            },
            EdgeDecision::PassThrough(reason) => {
                counter!(PASS_THROUGH, "reason" => reason.as_str()).increment(1);
                self.pass_through(req).await
            }
        }
    }

    async fn pass_through(&self, req: Request<Incoming>) -> GatewayResponse {
        let Some(upstream) = &self.upstream else {
            return make_error_response(StatusCode::NOT_FOUND);
        };

        match send_to_upstream(&upstream.client, &upstream.url, req, upstream.timeout_secs).await {
            Ok(response) => response.map(full_body),
            Err(e) => {
                tracing::warn!(error = %e, "Upstream request failed");
                let status = match e {
                    RedirectorError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                make_error_response(status)
            }
        }
    }
}

fn redirect(status: StatusCode, location: &str) -> Option<GatewayResponse> {
    let value = HeaderValue::from_bytes(location.as_bytes()).ok()?;
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = status;
    response.headers_mut().insert(LOCATION, value);
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Some(response)
}

/// 400 with the JSON error body of the direct endpoint.
fn rejected(error: DestinationError) -> GatewayResponse {
    counter!(REDIRECT_REJECTED, "surface" => "direct", "reason" => rejection_reason(&error))
        .increment(1);
    let outcome = DirectResponse::BadRequest(error);
    make_json_response(outcome.status(), outcome.error_body().unwrap_or_default())
}

fn rejection_reason(error: &DestinationError) -> &'static str {
    match error {
        DestinationError::MissingDestination => "missing",
        DestinationError::InvalidDestination(_) => "invalid",
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = GatewayResponse;
    type Error = RedirectorError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.handle(req).await) })
    }
}
