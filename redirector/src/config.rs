use http::StatusCode;
use routing::{PathPattern, PatternError};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Navigation never happens sooner than this after the pixel fired.
pub const MIN_SETTLE: Duration = Duration::from_millis(500);

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Edge redirect status must be a 3xx code, got {0}")]
    InvalidRedirectStatus(u16),

    #[error("Invalid short link pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    #[error("Short link pattern does not capture {{slug}}: {0}")]
    PatternWithoutSlug(String),

    #[error("Path must start with '/': {0}")]
    NotAbsolutePath(String),

    #[error("Bounce page and direct endpoint share the path {0}")]
    PathConflict(String),
}

/// Redirector configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    /// Page-rendering origin that receives every request the edge lets through.
    /// Without it, pass-through requests are answered with 404.
    pub upstream: Option<UpstreamConfig>,
    pub registry: registry::config::Config,
    #[serde(default)]
    pub redirect: RedirectSettings,
    #[serde(default)]
    pub bounce: BounceSettings,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.redirect.validate()?;
        self.bounce.validate()?;

        if self.redirect.direct_path == self.bounce.path {
            return Err(ValidationError::PathConflict(self.bounce.path.clone()));
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    pub url: Url,
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

/// Redirect policy shared by the edge interceptor and the direct endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedirectSettings {
    /// Lets UTM parameters of the inbound request win over the registry's.
    /// Off by default to protect campaign attribution.
    pub allow_incoming_utm_override: bool,
    /// Status used by the edge interceptor for resolved short links.
    pub edge_status: u16,
    /// Path patterns that identify short links; each captures `{slug}`.
    pub short_link_patterns: Vec<String>,
    /// Path prefixes the edge interceptor never inspects.
    pub ignore_prefixes: Vec<String>,
    pub direct_path: String,
    /// Referer path of the internal link listing page.
    pub listing_path: Option<String>,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        RedirectSettings {
            allow_incoming_utm_override: false,
            edge_status: StatusCode::TEMPORARY_REDIRECT.as_u16(),
            short_link_patterns: vec!["/{slug}".into()],
            ignore_prefixes: vec![
                "/_next".into(),
                "/static".into(),
                "/assets".into(),
                "/api/".into(),
                "/favicon.ico".into(),
                "/robots.txt".into(),
                "/sitemap.xml".into(),
                "/health".into(),
            ],
            direct_path: "/api/redirect".into(),
            listing_path: Some("/links".into()),
        }
    }
}

impl RedirectSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(300..400).contains(&self.edge_status) || StatusCode::from_u16(self.edge_status).is_err()
        {
            return Err(ValidationError::InvalidRedirectStatus(self.edge_status));
        }

        for pattern in &self.short_link_patterns {
            let parsed = PathPattern::parse(pattern)?;
            if !parsed.param_names().any(|name| name == "slug") {
                return Err(ValidationError::PatternWithoutSlug(pattern.clone()));
            }
        }

        let paths = self
            .ignore_prefixes
            .iter()
            .chain(std::iter::once(&self.direct_path))
            .chain(self.listing_path.iter());
        for path in paths {
            if !path.starts_with('/') {
                return Err(ValidationError::NotAbsolutePath(path.clone()));
            }
        }

        Ok(())
    }

    pub fn edge_status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.edge_status).unwrap_or(StatusCode::TEMPORARY_REDIRECT)
    }
}

/// Settings of the tracking bounce page.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BounceSettings {
    pub path: String,
    /// `fbSource` used when the registry entry names no pixel source.
    pub default_source: String,
    pub settle_ms: u64,
    /// Pixel id loaded by the served page. Without it the page only navigates.
    pub pixel_id: Option<String>,
    pub event_name: String,
}

impl Default for BounceSettings {
    fn default() -> Self {
        BounceSettings {
            path: "/track".into(),
            default_source: "Unknown source".into(),
            settle_ms: MIN_SETTLE.as_millis() as u64,
            pixel_id: None,
            event_name: "Lead".into(),
        }
    }
}

impl BounceSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.path.starts_with('/') {
            return Err(ValidationError::NotAbsolutePath(self.path.clone()));
        }
        Ok(())
    }

    /// Configured settle delay, never below [`MIN_SETTLE`].
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms).max(MIN_SETTLE)
    }
}
