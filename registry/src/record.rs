//! Normalization of the registry's loosely-typed property bag.
//!
//! The registry stores each campaign link as a page whose properties are typed
//! individually (title, rich text, url, select, ...). Every shape check happens
//! here; the rest of the gateway only sees [`CampaignLinkRecord`].

use crate::types::{CampaignLinkRecord, PixelConfig, UtmDefaults};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SLUG: &str = "Slug";
pub const DESTINATION_URL: &str = "Destination URL";
pub const UTM_SOURCE: &str = "utm_source";
pub const UTM_CAMPAIGN: &str = "utm_campaign";
pub const CAMPAIGN_RELATION: &str = "Campaign";
pub const UTM_MEDIUM: &str = "utm_medium";
pub const UTM_CONTENT: &str = "utm_content";
pub const UTM_TERM: &str = "utm_term";
pub const UTM_OFFER: &str = "utm_offer";
pub const UTM_ID: &str = "utm_id";
pub const PIXEL_ENABLED: &str = "Pixel Enabled";
pub const PIXEL_SOURCE: &str = "Pixel Source";
pub const PIXEL_INTENT: &str = "Pixel Intent";
pub const CALL_COUNT: &str = "Call Count";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("required property '{0}' is missing or empty")]
    MissingField(&'static str),
    #[error("property '{field}' should be {expected}, found {found}")]
    UnexpectedType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub plain_text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title { title: Vec<TextFragment> },
    RichText { rich_text: Vec<TextFragment> },
    Url { url: Option<String> },
    Select { select: Option<SelectOption> },
    Number { number: Option<f64> },
    Checkbox { checkbox: bool },
    Relation { relation: Vec<RelationRef> },
    #[serde(other)]
    Unsupported,
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Title { .. } => "title",
            PropertyValue::RichText { .. } => "rich_text",
            PropertyValue::Url { .. } => "url",
            PropertyValue::Select { .. } => "select",
            PropertyValue::Number { .. } => "number",
            PropertyValue::Checkbox { .. } => "checkbox",
            PropertyValue::Relation { .. } => "relation",
            PropertyValue::Unsupported => "unsupported",
        }
    }

    /// Text content of the property, trimmed. Empty text counts as absent.
    pub fn text(&self) -> Option<String> {
        let text = match self {
            PropertyValue::Title { title: fragments }
            | PropertyValue::RichText {
                rich_text: fragments,
            } => fragments.iter().map(|f| f.plain_text.as_str()).collect(),
            PropertyValue::Url { url } => url.clone()?,
            PropertyValue::Select { select } => select.as_ref()?.name.clone(),
            PropertyValue::Relation { relation } => relation.first()?.name.clone()?,
            PropertyValue::Number { .. }
            | PropertyValue::Checkbox { .. }
            | PropertyValue::Unsupported => return None,
        };

        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn rich_text(value: &str) -> Self {
        PropertyValue::RichText {
            rich_text: vec![TextFragment {
                plain_text: value.to_string(),
            }],
        }
    }
}

/// A registry page as returned on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl RawRecord {
    fn text(&self, name: &str) -> Option<String> {
        self.properties.get(name).and_then(PropertyValue::text)
    }

    fn checkbox(&self, name: &'static str) -> Result<bool, RecordError> {
        match self.properties.get(name) {
            None => Ok(false),
            Some(PropertyValue::Checkbox { checkbox }) => Ok(*checkbox),
            Some(other) => Err(RecordError::UnexpectedType {
                field: name,
                expected: "checkbox",
                found: other.kind(),
            }),
        }
    }

    /// Current usage counter. Absent or negative values count as zero.
    pub fn call_count(&self) -> Result<u64, RecordError> {
        match self.properties.get(CALL_COUNT) {
            None | Some(PropertyValue::Number { number: None }) => Ok(0),
            Some(PropertyValue::Number { number: Some(n) }) => Ok(n.max(0.0).floor() as u64),
            Some(other) => Err(RecordError::UnexpectedType {
                field: CALL_COUNT,
                expected: "number",
                found: other.kind(),
            }),
        }
    }

    pub fn pixel_config(&self) -> Result<PixelConfig, RecordError> {
        Ok(PixelConfig {
            enabled: self.checkbox(PIXEL_ENABLED)?,
            source: self.text(PIXEL_SOURCE),
            intent: self.text(PIXEL_INTENT),
        })
    }

    pub fn utm_defaults(&self) -> UtmDefaults {
        UtmDefaults {
            source: self.text(UTM_SOURCE),
            campaign: self.text(UTM_CAMPAIGN),
            campaign_relation: self.text(CAMPAIGN_RELATION),
            medium: self.text(UTM_MEDIUM),
            content: self.text(UTM_CONTENT),
            term: self.text(UTM_TERM),
            offer: self.text(UTM_OFFER),
            id: self.text(UTM_ID),
        }
    }
}

impl TryFrom<RawRecord> for CampaignLinkRecord {
    type Error = RecordError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let slug = raw.text(SLUG).ok_or(RecordError::MissingField(SLUG))?;
        let destination_url = raw
            .text(DESTINATION_URL)
            .ok_or(RecordError::MissingField(DESTINATION_URL))?;

        Ok(CampaignLinkRecord {
            slug,
            destination_url,
            utm: raw.utm_defaults(),
            pixel: raw.pixel_config()?,
            call_count: raw.call_count()?,
            id: raw.id,
        })
    }
}

impl From<&CampaignLinkRecord> for RawRecord {
    fn from(record: &CampaignLinkRecord) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            SLUG.to_string(),
            PropertyValue::Title {
                title: vec![TextFragment {
                    plain_text: record.slug.clone(),
                }],
            },
        );
        properties.insert(
            DESTINATION_URL.to_string(),
            PropertyValue::Url {
                url: Some(record.destination_url.clone()),
            },
        );

        let utm = &record.utm;
        let text_fields = [
            (UTM_SOURCE, &utm.source),
            (UTM_CAMPAIGN, &utm.campaign),
            (UTM_MEDIUM, &utm.medium),
            (UTM_CONTENT, &utm.content),
            (UTM_TERM, &utm.term),
            (UTM_OFFER, &utm.offer),
            (UTM_ID, &utm.id),
            (PIXEL_SOURCE, &record.pixel.source),
            (PIXEL_INTENT, &record.pixel.intent),
        ];
        for (name, value) in text_fields {
            if let Some(value) = value {
                properties.insert(name.to_string(), PropertyValue::rich_text(value));
            }
        }

        if let Some(campaign) = &utm.campaign_relation {
            properties.insert(
                CAMPAIGN_RELATION.to_string(),
                PropertyValue::Relation {
                    relation: vec![RelationRef {
                        id: format!("{}-campaign", record.id),
                        name: Some(campaign.clone()),
                    }],
                },
            );
        }

        properties.insert(
            PIXEL_ENABLED.to_string(),
            PropertyValue::Checkbox {
                checkbox: record.pixel.enabled,
            },
        );
        properties.insert(
            CALL_COUNT.to_string(),
            PropertyValue::Number {
                number: Some(record.call_count as f64),
            },
        );

        RawRecord {
            id: record.id.clone(),
            properties,
        }
    }
}
