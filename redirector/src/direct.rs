use crate::errors::DestinationError;
use crate::merge::first_value;
use crate::pipeline::{RedirectRequest, Resolver, query_pairs};
use crate::pixel::TO_PARAM;
use http::{Method, StatusCode};
use serde::Serialize;
use std::sync::Arc;

const PAGE_KEY_PARAM: &str = "pageId";

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug, PartialEq)]
pub enum DirectResponse {
    Redirect(String),
    BadRequest(DestinationError),
    MethodNotAllowed,
}

impl DirectResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            DirectResponse::Redirect(_) => StatusCode::FOUND,
            DirectResponse::BadRequest(_) => StatusCode::BAD_REQUEST,
            DirectResponse::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// JSON error body for rejected destinations.
    pub fn error_body(&self) -> Option<Vec<u8>> {
        let DirectResponse::BadRequest(error) = self else {
            return None;
        };
        serde_json::to_vec(&ErrorBody {
            ok: false,
            error: error.to_string(),
        })
        .ok()
    }
}

/// Redirect endpoint for callers that already know the destination.
///
/// `to` carries the destination, `pageId` the optional registry key. Every other
/// parameter feeds the merge.
pub struct DirectEndpoint {
    resolver: Arc<Resolver>,
}

impl DirectEndpoint {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        DirectEndpoint { resolver }
    }

    pub async fn handle(&self, method: &Method, query: Option<&str>) -> DirectResponse {
        if method != Method::GET && method != Method::HEAD {
            return DirectResponse::MethodNotAllowed;
        }

        let mut params = query_pairs(query);
        let destination = first_value(&params, TO_PARAM).map(str::to_string);
        params.retain(|(name, _)| name != TO_PARAM);

        let request = RedirectRequest {
            destination,
            page_key: first_value(&params, PAGE_KEY_PARAM)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            params,
            ..Default::default()
        };

        match self.resolver.resolve_redirect(request).await {
            Ok(resolved) => DirectResponse::Redirect(resolved.target_url),
            Err(error) => {
                tracing::debug!(error = %error, "Rejected direct redirect");
                DirectResponse::BadRequest(error)
            }
        }
    }
}
