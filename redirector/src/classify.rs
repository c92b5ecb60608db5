//! Destination classification.
//!
//! Turns the raw destination of a request into either an absolute `http(s)`
//! URL or a site-relative path. Anything else is rejected before any registry
//! work happens.

use crate::errors::DestinationError;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestinationKind {
    Absolute,
    Relative,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Normalized absolute URL, always `http` or `https`.
    Absolute(String),
    /// Site path starting with a single `/`, kept verbatim.
    Relative(String),
}

impl Destination {
    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::Absolute(_) => DestinationKind::Absolute,
            Destination::Relative(_) => DestinationKind::Relative,
        }
    }

    pub fn normalized(&self) -> &str {
        match self {
            Destination::Absolute(url) | Destination::Relative(url) => url,
        }
    }
}

pub fn classify(raw: Option<&str>) -> Result<Destination, DestinationError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(DestinationError::MissingDestination);
    }

    // Url::parse silently drops tabs and newlines
    if raw.chars().any(|c| c.is_control()) {
        return Err(DestinationError::InvalidDestination(raw.to_string()));
    }

    if let Some(rest) = raw.strip_prefix("//") {
        return absolute(format!("https://{rest}"));
    }

    if raw.starts_with('/') {
        return Ok(Destination::Relative(raw.to_string()));
    }

    if has_scheme(raw) {
        return absolute(raw.to_string());
    }

    if looks_like_hostname(raw) {
        return absolute(format!("https://{raw}"));
    }

    Err(DestinationError::InvalidDestination(raw.to_string()))
}

fn absolute(candidate: String) -> Result<Destination, DestinationError> {
    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(Destination::Absolute(candidate))
        }
        _ => Err(DestinationError::InvalidDestination(candidate)),
    }
}

// RFC 3986 scheme followed by "://". "example.com:8080/x" is not a scheme.
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Loose hostname check for scheme-less input: the host part needs a dot,
/// hostname characters only, and no empty labels.
fn looks_like_hostname(raw: &str) -> bool {
    let host_end = raw.find(['/', '?', '#', ':']).unwrap_or(raw.len());
    let host = &raw[..host_end];

    host.contains('.')
        && host.split('.').all(|label| !label.is_empty())
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        && !raw.chars().any(char::is_whitespace)
}
