use serde::{Deserialize, Serialize};

/// UTM keys in the order they are appended to outgoing URLs.
pub const UTM_KEYS: [&str; 7] = [
    "utm_source",
    "utm_campaign",
    "utm_medium",
    "utm_content",
    "utm_term",
    "utm_offer",
    "utm_id",
];

pub fn is_utm_key(key: &str) -> bool {
    UTM_KEYS.contains(&key)
}

/// UTM defaults configured on a campaign link.
///
/// `campaign_relation` is the structured alternative to `campaign` and takes
/// precedence when both are set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtmDefaults {
    pub source: Option<String>,
    pub campaign: Option<String>,
    pub campaign_relation: Option<String>,
    pub medium: Option<String>,
    pub content: Option<String>,
    pub term: Option<String>,
    pub offer: Option<String>,
    pub id: Option<String>,
}

impl UtmDefaults {
    pub fn effective_campaign(&self) -> Option<&str> {
        self.campaign_relation
            .as_deref()
            .or(self.campaign.as_deref())
    }

    /// Returns the configured value for a `utm_*` query key.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "utm_source" => self.source.as_deref(),
            "utm_campaign" => self.effective_campaign(),
            "utm_medium" => self.medium.as_deref(),
            "utm_content" => self.content.as_deref(),
            "utm_term" => self.term.as_deref(),
            "utm_offer" => self.offer.as_deref(),
            "utm_id" => self.id.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        UTM_KEYS.iter().all(|key| self.get(key).is_none())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelConfig {
    pub enabled: bool,
    pub source: Option<String>,
    pub intent: Option<String>,
}

/// A short-link entry of the campaign registry, after normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CampaignLinkRecord {
    /// Registry key of the entry (the `pageId` of the direct endpoint).
    pub id: String,
    pub slug: String,
    pub destination_url: String,
    #[serde(default)]
    pub utm: UtmDefaults,
    #[serde(default)]
    pub pixel: PixelConfig,
    #[serde(default)]
    pub call_count: u64,
}

impl CampaignLinkRecord {
    pub fn new<I, S, D>(id: I, slug: S, destination_url: D) -> Self
    where
        I: Into<String>,
        S: Into<String>,
        D: Into<String>,
    {
        CampaignLinkRecord {
            id: id.into(),
            slug: slug.into(),
            destination_url: destination_url.into(),
            utm: UtmDefaults::default(),
            pixel: PixelConfig::default(),
            call_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_relation_wins() {
        let utm = UtmDefaults {
            campaign: Some("plain".into()),
            campaign_relation: Some("related".into()),
            ..Default::default()
        };
        assert_eq!(utm.get("utm_campaign"), Some("related"));

        let utm = UtmDefaults {
            campaign: Some("plain".into()),
            ..Default::default()
        };
        assert_eq!(utm.get("utm_campaign"), Some("plain"));
    }

    #[test]
    fn test_utm_keys() {
        assert!(is_utm_key("utm_offer"));
        assert!(!is_utm_key("ref"));
        assert!(UtmDefaults::default().is_empty());
        assert_eq!(UtmDefaults::default().get("ref"), None);
    }
}
