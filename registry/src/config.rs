use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

const DEFAULT_TIMEOUT_MS: u64 = 2000;
const DEFAULT_INCREMENT_WAIT_MS: u64 = 250;

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum BackendConfig {
    Http(HttpBackendConfig),
    Static { path: PathBuf },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct HttpBackendConfig {
    /// Base URL of the registry API, e.g. `https://registry.internal/v1`.
    pub url: Url,
    /// Collection holding the campaign links.
    pub database_id: String,
    pub token: Option<String>,
    /// Name of an environment variable holding the token, used when `token` is unset.
    pub token_env: Option<String>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl HttpBackendConfig {
    pub fn resolve_token(&self) -> Option<String> {
        self.token.clone().or_else(|| {
            self.token_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
        })
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub backend: BackendConfig,
    /// Upper bound for every individual registry call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long a redirect waits for the usage counter update before answering.
    #[serde(default = "default_increment_wait_ms")]
    pub increment_wait_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_increment_wait_ms() -> u64 {
    DEFAULT_INCREMENT_WAIT_MS
}
