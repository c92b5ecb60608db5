use crate::config::BounceSettings;
use crate::errors::RedirectError;
use crate::merge::is_internal_key;
use crate::metrics_defs::ABSORBED_FAILURES;
use registry::{PixelConfig, Registry};
use shared::counter;
use tokio::task::JoinHandle;
use url::form_urlencoded;

pub const TO_PARAM: &str = "to";
pub const SOURCE_PARAM: &str = "fbSource";
pub const INTENT_PARAM: &str = "fbIntent";

fn is_bounce_key(key: &str) -> bool {
    matches!(key, TO_PARAM | SOURCE_PARAM | INTENT_PARAM)
}

/// Outcome of the pixel routing decision.
#[derive(Debug)]
pub struct PixelDecision {
    /// Query of the bounce page, in order. `None` means redirect directly.
    pub bounce_params: Option<Vec<(String, String)>>,
    /// Counter update started for the page key, if any.
    pub increment: Option<JoinHandle<()>>,
}

impl PixelDecision {
    fn direct(increment: Option<JoinHandle<()>>) -> Self {
        PixelDecision {
            bounce_params: None,
            increment,
        }
    }

    pub fn uses_bounce_page(&self) -> bool {
        self.bounce_params.is_some()
    }
}

/// Registry side of the decision, available before the destination is final.
#[derive(Debug, Default)]
pub struct PixelLookup {
    increment: Option<JoinHandle<()>>,
    /// `None` when there is no page key or the configuration is unavailable.
    pixel: Option<PixelConfig>,
}

pub struct PixelRouter {
    registry: Registry,
    bounce: BounceSettings,
}

impl PixelRouter {
    pub fn new(registry: Registry, bounce: BounceSettings) -> Self {
        PixelRouter { registry, bounce }
    }

    /// Decides between a direct redirect and the bounce page.
    pub async fn decide(
        &self,
        page_key: Option<&str>,
        target_url: &str,
        inbound: &[(String, String)],
    ) -> PixelDecision {
        let lookup = self.prepare(page_key).await;
        self.route(lookup, target_url, inbound)
    }

    /// Starts the usage counter update in the background and reads the pixel
    /// configuration of the page key. A failed read is logged and counts as
    /// tracking disabled.
    pub async fn prepare(&self, page_key: Option<&str>) -> PixelLookup {
        let Some(key) = page_key else {
            return PixelLookup::default();
        };

        let increment = Some(self.spawn_increment(key));

        let pixel = match self.registry.read_pixel_config(key).await {
            Ok(pixel) => Some(pixel),
            Err(source) => {
                let error = RedirectError::PixelConfigUnavailable {
                    key: key.to_string(),
                    source,
                };
                tracing::warn!(error = %error, "Redirecting without tracking");
                counter!(ABSORBED_FAILURES, "operation" => "read_pixel_config").increment(1);
                None
            }
        };

        PixelLookup { increment, pixel }
    }

    pub fn route(
        &self,
        lookup: PixelLookup,
        target_url: &str,
        inbound: &[(String, String)],
    ) -> PixelDecision {
        let PixelLookup { increment, pixel } = lookup;
        let Some(pixel) = pixel.filter(|pixel| pixel.enabled) else {
            return PixelDecision::direct(increment);
        };

        let mut params = vec![
            (TO_PARAM.to_string(), target_url.to_string()),
            (
                SOURCE_PARAM.to_string(),
                pixel
                    .source
                    .unwrap_or_else(|| self.bounce.default_source.clone()),
            ),
        ];
        if let Some(intent) = pixel.intent {
            params.push((INTENT_PARAM.to_string(), intent));
        }
        params.extend(
            inbound
                .iter()
                .filter(|(name, _)| !is_internal_key(name) && !is_bounce_key(name))
                .cloned(),
        );

        PixelDecision {
            bounce_params: Some(params),
            increment,
        }
    }

    pub fn bounce_url(&self, params: &[(String, String)]) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        format!("{}?{query}", self.bounce.path)
    }

    fn spawn_increment(&self, key: &str) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let key = key.to_string();

        tokio::spawn(async move {
            let result = registry.increment_call_count(&key).await;
            match result {
                Ok(count) => tracing::debug!(key, count, "Usage counter updated"),
                Err(source) => {
                    let error = RedirectError::RegistryWriteFailed { key, source };
                    tracing::warn!(error = %error, "Usage counter not updated");
                    counter!(ABSORBED_FAILURES, "operation" => "increment_call_count")
                        .increment(1);
                }
            }
        })
    }
}
