use async_trait::async_trait;
use registry::record::RawRecord;
use registry::static_registry::StaticRegistry;
use registry::{CampaignLinkRecord, Registry, RegistryBackend, RegistryError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory registry backend whose operations can be made to fail.
pub struct FakeBackend {
    inner: StaticRegistry,
    pub fail_find: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_write: AtomicBool,
    pub writes: AtomicUsize,
    read_delay: Duration,
    write_delay: Duration,
}

impl FakeBackend {
    pub fn new(records: Vec<CampaignLinkRecord>) -> Self {
        FakeBackend {
            inner: StaticRegistry::from_records(records),
            fail_find: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            fail_write: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            read_delay: Duration::ZERO,
            write_delay: Duration::ZERO,
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn unavailable() -> RegistryError {
    RegistryError::UnexpectedStatus(503)
}

#[async_trait]
impl RegistryBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<RawRecord>, RegistryError> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.find_by_slug(slug).await
    }

    async fn get_record(&self, key: &str) -> Result<Option<RawRecord>, RegistryError> {
        tokio::time::sleep(self.read_delay).await;
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.get_record(key).await
    }

    async fn write_call_count(&self, key: &str, count: u64) -> Result<(), RegistryError> {
        tokio::time::sleep(self.write_delay).await;
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_call_count(key, count).await
    }
}

pub fn fake_registry(backend: &Arc<FakeBackend>) -> Registry {
    Registry::new(backend.clone(), Duration::from_secs(1))
}

/// Record `abc` pointing at `https://example.com/target`, pixel disabled.
pub fn target_record() -> CampaignLinkRecord {
    CampaignLinkRecord::new("abc", "spring", "https://example.com/target")
}

/// Record `abc` with the pixel enabled for "Meta campaign".
pub fn pixel_record() -> CampaignLinkRecord {
    let mut record = target_record();
    record.pixel.enabled = true;
    record.pixel.source = Some("Meta campaign".into());
    record
}
