use crate::backend::{RegistryBackend, RegistryError};
use crate::config::HttpBackendConfig;
use crate::record::{CALL_COUNT, RawRecord, SLUG};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<RawRecord>,
}

/// Registry backend talking to the campaign registry's HTTP API.
///
/// - slug lookups: `POST {url}/databases/{database_id}/query`
/// - key lookups: `GET {url}/pages/{key}`
/// - counter updates: `PATCH {url}/pages/{key}`
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: Url,
    database_id: String,
}

impl HttpRegistry {
    pub fn new(config: &HttpBackendConfig, timeout: Duration) -> Result<Self, RegistryError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = config.resolve_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RegistryError::InvalidConfig("token is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RegistryError::InvalidConfig(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RegistryError::InvalidConfig(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        if config.url.cannot_be_a_base() {
            return Err(RegistryError::InvalidConfig(format!(
                "registry url cannot be a base: {}",
                config.url
            )));
        }

        Ok(HttpRegistry {
            client,
            base_url: config.url.clone(),
            database_id: config.database_id.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // checked in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl RegistryBackend for HttpRegistry {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<RawRecord>, RegistryError> {
        let url = self.endpoint(&["databases", &self.database_id, "query"]);
        let body = json!({
            "filter": { "property": SLUG, "rich_text": { "equals": slug } },
            "page_size": 1,
        });

        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(RegistryError::UnexpectedStatus(response.status().as_u16()));
        }

        let mut query = response.json::<QueryResponse>().await?;
        if query.results.len() > 1 {
            tracing::warn!(slug, count = query.results.len(), "Slug matches several registry records, using the first");
        }
        Ok((!query.results.is_empty()).then(|| query.results.swap_remove(0)))
    }

    async fn get_record(&self, key: &str) -> Result<Option<RawRecord>, RegistryError> {
        let url = self.endpoint(&["pages", key]);
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<RawRecord>().await?)),
            status => Err(RegistryError::UnexpectedStatus(status.as_u16())),
        }
    }

    async fn write_call_count(&self, key: &str, count: u64) -> Result<(), RegistryError> {
        let url = self.endpoint(&["pages", key]);
        let body = json!({
            "properties": { CALL_COUNT: { "number": count } },
        });

        let response = self.client.patch(url).json(&body).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound(key.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(RegistryError::UnexpectedStatus(status.as_u16())),
        }
    }
}
