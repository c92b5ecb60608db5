use crate::config::{BounceSettings, RedirectSettings, ValidationError};
use crate::errors::RedirectError;
use crate::metrics_defs::ABSORBED_FAILURES;
use crate::pipeline::{RedirectRequest, RedirectSource, Resolver, query_pairs};
use http::StatusCode;
use routing::{PathPattern, PatternSet};
use shared::counter;
use std::sync::Arc;
use url::Url;

const SLUG_PARAM: &str = "slug";

/// Why a request was left to the upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassReason {
    Ignored,
    NoMatch,
    NotFound,
    LookupFailed,
    InvalidDestination,
}

impl PassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassReason::Ignored => "ignored",
            PassReason::NoMatch => "no_match",
            PassReason::NotFound => "not_found",
            PassReason::LookupFailed => "lookup_failed",
            PassReason::InvalidDestination => "invalid_destination",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum EdgeDecision {
    PassThrough(PassReason),
    Redirect { status: StatusCode, location: String },
}

/// Inspects every inbound path and answers short links with a redirect.
pub struct EdgeInterceptor {
    patterns: PatternSet<()>,
    ignore_prefixes: Vec<String>,
    listing_path: Option<String>,
    status: StatusCode,
    resolver: Arc<Resolver>,
}

impl EdgeInterceptor {
    pub fn new(
        redirect: &RedirectSettings,
        bounce: &BounceSettings,
        resolver: Arc<Resolver>,
    ) -> Result<Self, ValidationError> {
        let patterns = redirect
            .short_link_patterns
            .iter()
            .map(|p| PathPattern::parse(p).map(|pattern| (pattern, ())))
            .collect::<Result<Vec<_>, _>>()?;

        // the gateway's own endpoints are never short links
        let mut ignore_prefixes = redirect.ignore_prefixes.clone();
        ignore_prefixes.push(redirect.direct_path.clone());
        ignore_prefixes.push(bounce.path.clone());

        let patterns = PatternSet::new(patterns);
        if patterns.is_empty() {
            tracing::info!("No short link patterns configured, every request passes through");
        }

        Ok(EdgeInterceptor {
            patterns,
            ignore_prefixes,
            listing_path: redirect.listing_path.clone(),
            status: redirect.edge_status_code(),
            resolver,
        })
    }

    fn is_ignored(&self, path: &str) -> bool {
        path == "/"
            || self
                .ignore_prefixes
                .iter()
                .any(|prefix| covers(prefix, path))
    }

    fn redirect_source(&self, referer: Option<&str>) -> RedirectSource {
        let from_listing = match (&self.listing_path, referer.and_then(|r| Url::parse(r).ok())) {
            (Some(listing), Some(referer)) => {
                referer.path().trim_end_matches('/') == listing.trim_end_matches('/')
            }
            _ => false,
        };

        if from_listing {
            RedirectSource::Linktree
        } else {
            RedirectSource::Direct
        }
    }

    pub async fn intercept(
        &self,
        path: &str,
        query: Option<&str>,
        referer: Option<&str>,
    ) -> EdgeDecision {
        if self.is_ignored(path) {
            return EdgeDecision::PassThrough(PassReason::Ignored);
        }

        let Some(slug) = self
            .patterns
            .resolve(path)
            .and_then(|m| m.params.get(SLUG_PARAM).copied())
        else {
            return EdgeDecision::PassThrough(PassReason::NoMatch);
        };

        let record = match self.resolver.registry().lookup_by_slug(slug).await {
            Ok(Some(record)) => record,
            Ok(None) => return EdgeDecision::PassThrough(PassReason::NotFound),
            Err(source) => {
                let error = RedirectError::RegistryLookupFailed {
                    key: slug.to_string(),
                    operation: "lookup_by_slug",
                    source,
                };
                tracing::warn!(error = %error, "Passing short link through");
                counter!(ABSORBED_FAILURES, "operation" => "lookup_by_slug").increment(1);
                return EdgeDecision::PassThrough(PassReason::LookupFailed);
            }
        };

        let request = RedirectRequest {
            destination: Some(record.destination_url.clone()),
            page_key: Some(record.id.clone()),
            record: Some(record),
            params: query_pairs(query),
            redirect_source: Some(self.redirect_source(referer)),
        };

        match self.resolver.resolve_redirect(request).await {
            Ok(resolved) => EdgeDecision::Redirect {
                status: self.status,
                location: resolved.target_url,
            },
            Err(error) => {
                tracing::warn!(slug, error = %error, "Registry destination rejected");
                EdgeDecision::PassThrough(PassReason::InvalidDestination)
            }
        }
    }
}

/// `prefix` covers `path` on a segment boundary: `/health` covers `/health` and
/// `/health/live` but not `/healthy-deals`.
fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}
