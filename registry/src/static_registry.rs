//! Registry backend serving campaign links from a YAML file.
//!
//! Intended for local development and tests: records are written in their
//! normalized shape and kept as property bags in memory. Counter updates live
//! only as long as the process.

use crate::backend::{RegistryBackend, RegistryError};
use crate::record::{CALL_COUNT, PropertyValue, RawRecord};
use crate::types::CampaignLinkRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

pub struct StaticRegistry {
    records: RwLock<HashMap<String, RawRecord>>,
    slug_to_key: HashMap<String, String>,
}

impl StaticRegistry {
    pub fn from_records(records: Vec<CampaignLinkRecord>) -> Self {
        let slug_to_key = records
            .iter()
            .map(|r| (r.slug.clone(), r.id.clone()))
            .collect();
        let records = records
            .iter()
            .map(|r| (r.id.clone(), RawRecord::from(r)))
            .collect();

        StaticRegistry {
            records: RwLock::new(records),
            slug_to_key,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let file = File::open(path)?;
        let records: Vec<CampaignLinkRecord> = serde_yaml::from_reader(file)?;
        tracing::info!(path = %path.display(), count = records.len(), "Loaded static registry");
        Ok(Self::from_records(records))
    }
}

#[async_trait]
impl RegistryBackend for StaticRegistry {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<RawRecord>, RegistryError> {
        let Some(key) = self.slug_to_key.get(slug) else {
            return Ok(None);
        };
        Ok(self.records.read().get(key).cloned())
    }

    async fn get_record(&self, key: &str) -> Result<Option<RawRecord>, RegistryError> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn write_call_count(&self, key: &str, count: u64) -> Result<(), RegistryError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;
        record.properties.insert(
            CALL_COUNT.to_string(),
            PropertyValue::Number {
                number: Some(count as f64),
            },
        );
        Ok(())
    }
}
