use registry::RegistryError;

/// Destination problems, the only failures a caller ever sees.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DestinationError {
    #[error("missing 'to'")]
    MissingDestination,
    #[error("invalid 'to'")]
    InvalidDestination(String),
}

/// Failures absorbed inside the pipeline.
///
/// They are logged with the key and operation involved and resolved to a
/// direct redirect without tracking.
#[derive(thiserror::Error, Debug)]
pub enum RedirectError {
    #[error("registry lookup failed for {key} ({operation}): {source}")]
    RegistryLookupFailed {
        key: String,
        operation: &'static str,
        source: RegistryError,
    },
    #[error("registry counter update failed for {key}: {source}")]
    RegistryWriteFailed { key: String, source: RegistryError },
    #[error("pixel configuration unavailable for {key}: {source}")]
    PixelConfigUnavailable { key: String, source: RegistryError },
}

/// Errors of the redirector service itself.
#[derive(thiserror::Error, Debug)]
pub enum RedirectorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] crate::config::ValidationError),
    #[error("registry setup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("upstream request failed for {0}: {1}")]
    UpstreamRequestFailed(String, String),
    #[error("upstream timeout for {0}")]
    UpstreamTimeout(String),
    #[error("failed to read response body: {0}")]
    ResponseBodyError(String),
    #[error("internal error: {0}")]
    InternalError(String),
}
