use crate::backend::{RegistryBackend, RegistryError};
use crate::config::{BackendConfig, Config};
use crate::http_registry::HttpRegistry;
use crate::metrics_defs::{REGISTRY_CALL_DURATION, REGISTRY_CALLS};
use crate::static_registry::StaticRegistry;
use crate::types::{CampaignLinkRecord, PixelConfig};
use shared::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Client for the campaign registry.
///
/// Every call is bounded by the configured timeout, counted and timed. Records
/// are fetched fresh on each call; nothing is cached in process. Callers decide
/// how to absorb failures.
#[derive(Clone)]
pub struct Registry {
    backend: Arc<dyn RegistryBackend>,
    timeout: Duration,
}

impl Registry {
    pub fn new(backend: Arc<dyn RegistryBackend>, timeout: Duration) -> Self {
        Registry { backend, timeout }
    }

    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let backend: Arc<dyn RegistryBackend> = match &config.backend {
            BackendConfig::Http(http) => Arc::new(HttpRegistry::new(http, timeout)?),
            BackendConfig::Static { path } => Arc::new(StaticRegistry::from_file(path)?),
        };
        tracing::info!(backend = backend.name(), timeout = ?timeout, "Registry client configured");

        Ok(Self::new(backend, timeout))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn lookup_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CampaignLinkRecord>, RegistryError> {
        let raw = self
            .call("lookup_by_slug", self.backend.find_by_slug(slug))
            .await?;
        Ok(raw.map(CampaignLinkRecord::try_from).transpose()?)
    }

    pub async fn lookup_by_page_key(
        &self,
        key: &str,
    ) -> Result<Option<CampaignLinkRecord>, RegistryError> {
        let raw = self
            .call("lookup_by_page_key", self.backend.get_record(key))
            .await?;
        Ok(raw.map(CampaignLinkRecord::try_from).transpose()?)
    }

    /// Reads the current counter and writes it back incremented by one.
    ///
    /// The read and the write are two separate registry calls, so concurrent
    /// increments of the same key may lose updates.
    pub async fn increment_call_count(&self, key: &str) -> Result<u64, RegistryError> {
        let raw = self
            .call("read_call_count", self.backend.get_record(key))
            .await?
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;

        let next = raw.call_count()?.saturating_add(1);
        self.call("write_call_count", self.backend.write_call_count(key, next))
            .await?;

        Ok(next)
    }

    pub async fn read_pixel_config(&self, key: &str) -> Result<PixelConfig, RegistryError> {
        let raw = self
            .call("read_pixel_config", self.backend.get_record(key))
            .await?
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;

        Ok(raw.pixel_config()?)
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, RegistryError>
    where
        F: Future<Output = Result<T, RegistryError>>,
    {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or(Err(RegistryError::Timeout(self.timeout)));

        let outcome = match &result {
            Ok(_) => "ok",
            Err(RegistryError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        counter!(REGISTRY_CALLS, "operation" => operation, "backend" => self.backend.name(), "outcome" => outcome)
            .increment(1);
        histogram!(REGISTRY_CALL_DURATION, "operation" => operation)
            .record(start.elapsed().as_secs_f64());

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PIXEL_ENABLED, PropertyValue, RawRecord};
    use async_trait::async_trait;

    struct SlowBackend;

    #[async_trait]
    impl RegistryBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn find_by_slug(&self, _slug: &str) -> Result<Option<RawRecord>, RegistryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn get_record(&self, key: &str) -> Result<Option<RawRecord>, RegistryError> {
            let mut raw = RawRecord::from(&CampaignLinkRecord::new(key, "slug", "/x"));
            raw.properties.insert(
                PIXEL_ENABLED.to_string(),
                PropertyValue::rich_text("yes"),
            );
            Ok(Some(raw))
        }

        async fn write_call_count(&self, _key: &str, _count: u64) -> Result<(), RegistryError> {
            Ok(())
        }
    }

    fn static_registry() -> Registry {
        let mut record = CampaignLinkRecord::new("page-1", "spring", "https://example.com");
        record.call_count = 9;
        record.pixel.enabled = true;
        record.pixel.source = Some("Meta campaign".into());

        Registry::new(
            Arc::new(StaticRegistry::from_records(vec![record])),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_lookups() {
        let registry = static_registry();

        let record = registry.lookup_by_slug("spring").await.unwrap().unwrap();
        assert_eq!(record.id, "page-1");
        assert!(registry.lookup_by_slug("autumn").await.unwrap().is_none());

        let record = registry.lookup_by_page_key("page-1").await.unwrap().unwrap();
        assert_eq!(record.slug, "spring");
        assert!(registry.lookup_by_page_key("page-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_only_goes_up() {
        let registry = static_registry();

        assert_eq!(registry.increment_call_count("page-1").await.unwrap(), 10);
        assert_eq!(registry.increment_call_count("page-1").await.unwrap(), 11);

        let record = registry.lookup_by_page_key("page-1").await.unwrap().unwrap();
        assert_eq!(record.call_count, 11);

        assert!(matches!(
            registry.increment_call_count("page-2").await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_pixel_config() {
        let registry = static_registry();
        let pixel = registry.read_pixel_config("page-1").await.unwrap();
        assert!(pixel.enabled);
        assert_eq!(pixel.source.as_deref(), Some("Meta campaign"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_an_error() {
        let registry = Registry::new(Arc::new(SlowBackend), Duration::from_millis(200));
        assert!(matches!(
            registry.lookup_by_slug("spring").await,
            Err(RegistryError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_pixel_config() {
        let registry = Registry::new(Arc::new(SlowBackend), Duration::from_millis(200));
        assert!(matches!(
            registry.read_pixel_config("page-1").await,
            Err(RegistryError::Malformed(_))
        ));
    }
}
