//! The redirect pipeline shared by the edge interceptor and the direct endpoint.
//!
//! classify → merge → pixel decision. Only destination problems come back as
//! errors; every registry failure is logged and resolved to an untracked
//! redirect.

use crate::classify::{Destination, classify};
use crate::config::{BounceSettings, RedirectSettings};
use crate::errors::{DestinationError, RedirectError};
use crate::merge::{append_if_absent, merge, strip_internal_keys};
use crate::metrics_defs::{ABSORBED_FAILURES, REDIRECTS};
use crate::pixel::PixelRouter;
use indexmap::IndexMap;
use registry::{CampaignLinkRecord, Registry};
use shared::counter;
use std::time::Duration;
use url::form_urlencoded;

pub const REDIRECT_SOURCE_PARAM: &str = "redirect_source";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectSource {
    /// Visitor came from the internal link listing page.
    Linktree,
    Direct,
}

impl RedirectSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectSource::Linktree => "Linktree",
            RedirectSource::Direct => "Direct",
        }
    }
}

/// One inbound redirect, as seen by the pipeline.
#[derive(Clone, Debug, Default)]
pub struct RedirectRequest {
    /// Raw destination, classified before anything else happens.
    pub destination: Option<String>,
    /// Registry key driving the counter update and the pixel decision.
    pub page_key: Option<String>,
    /// Registry entry already fetched by the caller. Looked up by
    /// `page_key` when absent.
    pub record: Option<CampaignLinkRecord>,
    /// Inbound query parameters in request order, repeated keys included.
    pub params: Vec<(String, String)>,
    pub redirect_source: Option<RedirectSource>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRedirect {
    pub target_url: String,
    pub uses_bounce_page: bool,
    pub merged_params: IndexMap<String, String>,
    pub redirect_source: Option<RedirectSource>,
}

pub struct Resolver {
    registry: Registry,
    pixel: PixelRouter,
    allow_incoming_utm_override: bool,
    increment_wait: Duration,
}

impl Resolver {
    pub fn new(
        registry: Registry,
        redirect: &RedirectSettings,
        bounce: &BounceSettings,
        increment_wait: Duration,
    ) -> Self {
        Resolver {
            pixel: PixelRouter::new(registry.clone(), bounce.clone()),
            registry,
            allow_incoming_utm_override: redirect.allow_incoming_utm_override,
            increment_wait,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn resolve_redirect(
        &self,
        request: RedirectRequest,
    ) -> Result<ResolvedRedirect, DestinationError> {
        let destination = classify(request.destination.as_deref())?;

        // record lookup and pixel read are independent registry calls
        let page_key = request.page_key.as_deref();
        let known = request.record;
        let (record, pixel) = tokio::join!(
            async move {
                match (known, page_key) {
                    (Some(record), _) => Some(record),
                    (None, Some(key)) => self.lookup(key).await,
                    (None, None) => None,
                }
            },
            self.pixel.prepare(page_key),
        );
        let utm = record.map(|r| r.utm).unwrap_or_default();

        let (target_url, merged_params) = match destination {
            Destination::Absolute(url) => {
                let merged = merge(
                    &url,
                    &utm,
                    &request.params,
                    self.allow_incoming_utm_override,
                )?;
                let mut params = merged.params;
                let target = match request.redirect_source {
                    Some(source) => {
                        params
                            .entry(REDIRECT_SOURCE_PARAM.to_string())
                            .or_insert_with(|| source.as_str().to_string());
                        append_if_absent(&merged.target_url, REDIRECT_SOURCE_PARAM, source.as_str())
                    }
                    None => merged.target_url,
                };
                (target, params)
            }
            Destination::Relative(path) => {
                let path = strip_internal_keys(&path);
                let params = relative_query(&path);
                (path, params)
            }
        };

        let decision = self.pixel.route(pixel, &target_url, &request.params);

        if let Some(increment) = decision.increment {
            if tokio::time::timeout(self.increment_wait, increment)
                .await
                .is_err()
            {
                tracing::debug!(
                    key = request.page_key.as_deref().unwrap_or_default(),
                    "Answering before the usage counter update finished"
                );
            }
        }

        let (target_url, uses_bounce_page) = match decision.bounce_params.as_deref() {
            Some(params) => (self.pixel.bounce_url(params), true),
            None => (target_url, false),
        };
        let target = if uses_bounce_page { "bounce" } else { "destination" };
        counter!(REDIRECTS, "target" => target).increment(1);

        Ok(ResolvedRedirect {
            target_url,
            uses_bounce_page,
            merged_params,
            redirect_source: request.redirect_source,
        })
    }

    async fn lookup(&self, key: &str) -> Option<CampaignLinkRecord> {
        match self.registry.lookup_by_page_key(key).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                tracing::debug!(key, "No registry entry for page key");
                None
            }
            Err(source) => {
                let error = RedirectError::RegistryLookupFailed {
                    key: key.to_string(),
                    operation: "lookup_by_page_key",
                    source,
                };
                tracing::warn!(error = %error, "Redirecting without registry defaults");
                counter!(ABSORBED_FAILURES, "operation" => "lookup_by_page_key").increment(1);
                None
            }
        }
    }
}

/// Decodes a query string into its pairs, in order and with repeated keys.
pub fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .into_owned()
        .collect()
}

/// Decodes a query string into an ordered map; the first occurrence of a key wins.
pub fn query_params(query: Option<&str>) -> IndexMap<String, String> {
    let mut params = IndexMap::new();
    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

fn relative_query(path: &str) -> IndexMap<String, String> {
    let without_fragment = path.split('#').next().unwrap_or_default();
    query_params(without_fragment.split_once('?').map(|(_, q)| q))
}
