use crate::classify::{Destination, classify};
use crate::errors::DestinationError;
use crate::pixel::{INTENT_PARAM, SOURCE_PARAM, TO_PARAM};
use crate::pipeline::query_params;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BounceError {
    #[error("bounce page requested without 'to'")]
    MissingDestination,
    #[error("bounce page destination rejected: {0}")]
    InvalidDestination(String),
    #[error("tracking call failed: {0}")]
    Tracking(String),
}

/// Query of the bounce page.
#[derive(Clone, Debug, PartialEq)]
pub struct BounceParams {
    pub to: Destination,
    pub source: String,
    pub intent: Option<String>,
}

impl BounceParams {
    pub fn from_query(query: Option<&str>, default_source: &str) -> Result<Self, BounceError> {
        let mut params = query_params(query);

        let to = match classify(params.get(TO_PARAM).map(String::as_str)) {
            Ok(to) => to,
            Err(DestinationError::MissingDestination) => {
                return Err(BounceError::MissingDestination);
            }
            Err(DestinationError::InvalidDestination(raw)) => {
                return Err(BounceError::InvalidDestination(raw));
            }
        };

        Ok(BounceParams {
            to,
            source: params
                .shift_remove(SOURCE_PARAM)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default_source.to_string()),
            intent: params
                .shift_remove(INTENT_PARAM)
                .filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackingEvent {
    pub name: String,
    pub source: String,
    pub intent: Option<String>,
}

/// Client-side conversion pixel.
pub trait PixelTracker: Send + Sync {
    fn track(&self, event: &TrackingEvent) -> Result<(), BounceError>;
}

/// Client-side navigation.
pub trait Navigator: Send + Sync {
    /// Client-side routing to a site path.
    fn push(&self, path: &str);

    /// Full navigation to an absolute URL.
    fn assign(&self, url: &str);
}

/// The tracking bounce page: fires the pixel, waits, then navigates.
pub struct BouncePage {
    /// `None` when the pixel library is not loaded.
    tracker: Option<Arc<dyn PixelTracker>>,
    navigator: Arc<dyn Navigator>,
    settle: Duration,
    event_name: String,
    default_source: String,
}

impl BouncePage {
    /// `settle` should already be clamped, see `BounceSettings::settle`.
    pub fn new(
        tracker: Option<Arc<dyn PixelTracker>>,
        navigator: Arc<dyn Navigator>,
        settle: Duration,
        event_name: impl Into<String>,
        default_source: impl Into<String>,
    ) -> Self {
        BouncePage {
            tracker,
            navigator,
            settle,
            event_name: event_name.into(),
            default_source: default_source.into(),
        }
    }

    /// Runs the page for the given query.
    ///
    /// Navigation happens after the settle delay unless the returned handle is
    /// dropped first.
    pub fn mount(&self, query: Option<&str>) -> Result<BounceHandle, BounceError> {
        let params = BounceParams::from_query(query, &self.default_source).inspect_err(|e| {
            tracing::error!(error = %e, "Bounce page cannot navigate");
        })?;

        self.fire_pixel(&params);

        let navigator = self.navigator.clone();
        let settle = self.settle;
        let task = tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            match &params.to {
                Destination::Relative(path) => navigator.push(path),
                Destination::Absolute(url) => navigator.assign(url),
            }
        });

        Ok(BounceHandle { task })
    }

    fn fire_pixel(&self, params: &BounceParams) {
        let Some(tracker) = &self.tracker else {
            tracing::debug!("Pixel library not loaded, skipping tracking event");
            return;
        };

        let event = TrackingEvent {
            name: self.event_name.clone(),
            source: params.source.clone(),
            intent: params.intent.clone(),
        };
        if let Err(e) = tracker.track(&event) {
            tracing::warn!(error = %e, source = %event.source, "Tracking event not sent");
        }
    }
}

/// Pending navigation of a mounted bounce page. Dropping it cancels the navigation.
pub struct BounceHandle {
    task: JoinHandle<()>,
}

impl BounceHandle {
    pub fn unmount(self) {}

    pub fn has_navigated(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for BounceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_SETTLE;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum Navigation {
        Push(String),
        Assign(String),
    }

    #[derive(Default)]
    struct RecordingNavigator(Mutex<Vec<Navigation>>);

    impl RecordingNavigator {
        fn take(&self) -> Vec<Navigation> {
            std::mem::take(&mut self.0.lock().unwrap())
        }
    }

    impl Navigator for RecordingNavigator {
        fn push(&self, path: &str) {
            self.0.lock().unwrap().push(Navigation::Push(path.into()));
        }

        fn assign(&self, url: &str) {
            self.0.lock().unwrap().push(Navigation::Assign(url.into()));
        }
    }

    #[derive(Default)]
    struct RecordingTracker(Mutex<Vec<TrackingEvent>>);

    impl PixelTracker for RecordingTracker {
        fn track(&self, event: &TrackingEvent) -> Result<(), BounceError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingTracker;

    impl PixelTracker for FailingTracker {
        fn track(&self, _event: &TrackingEvent) -> Result<(), BounceError> {
            Err(BounceError::Tracking("fbq is not a function".into()))
        }
    }

    fn page(tracker: Option<Arc<dyn PixelTracker>>, navigator: Arc<RecordingNavigator>) -> BouncePage {
        BouncePage::new(tracker, navigator, MIN_SETTLE, "Lead", "Unknown source")
    }

    #[test]
    fn test_params() {
        let params = BounceParams::from_query(
            Some("to=https%3A%2F%2Fexample.com%2Ft%3Fa%3D1&fbSource=Meta+campaign&fbIntent=signup"),
            "Unknown source",
        )
        .unwrap();
        assert_eq!(params.to, Destination::Absolute("https://example.com/t?a=1".into()));
        assert_eq!(params.source, "Meta campaign");
        assert_eq!(params.intent.as_deref(), Some("signup"));

        let params = BounceParams::from_query(Some("to=%2Fabout"), "Unknown source").unwrap();
        assert_eq!(params.source, "Unknown source");
        assert_eq!(params.intent, None);

        assert_eq!(
            BounceParams::from_query(Some("fbSource=x"), "Unknown source"),
            Err(BounceError::MissingDestination)
        );
        assert!(matches!(
            BounceParams::from_query(Some("to=javascript%3Aalert(1)"), "Unknown source"),
            Err(BounceError::InvalidDestination(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_then_navigates_after_delay() {
        let navigator = Arc::new(RecordingNavigator::default());
        let tracker = Arc::new(RecordingTracker::default());
        let page = page(Some(tracker.clone()), navigator.clone());

        let handle = page
            .mount(Some("to=https%3A%2F%2Fexample.com%2Ft&fbSource=Meta+campaign"))
            .unwrap();

        let events = tracker.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![TrackingEvent {
                name: "Lead".into(),
                source: "Meta campaign".into(),
                intent: None,
            }]
        );

        tokio::time::sleep(MIN_SETTLE - Duration::from_millis(1)).await;
        assert!(navigator.take().is_empty(), "too early");

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            navigator.take(),
            vec![Navigation::Assign("https://example.com/t".into())]
        );
        assert!(handle.has_navigated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_relative_uses_client_routing() {
        let navigator = Arc::new(RecordingNavigator::default());
        let _handle = page(None, navigator.clone()).mount(Some("to=%2Fabout")).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(navigator.take(), vec![Navigation::Push("/about".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracking_failure_still_navigates() {
        let navigator = Arc::new(RecordingNavigator::default());
        let _handle = page(Some(Arc::new(FailingTracker)), navigator.clone())
            .mount(Some("to=example.com"))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            navigator.take(),
            vec![Navigation::Assign("https://example.com".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_navigation() {
        let navigator = Arc::new(RecordingNavigator::default());
        let handle = page(None, navigator.clone())
            .mount(Some("to=%2Fabout"))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.unmount();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(navigator.take().is_empty());
    }

    #[tokio::test]
    async fn test_missing_to_does_not_navigate() {
        let navigator = Arc::new(RecordingNavigator::default());
        let tracker = Arc::new(RecordingTracker::default());
        let result = page(Some(tracker.clone()), navigator.clone()).mount(Some("fbSource=x"));

        assert!(matches!(result, Err(BounceError::MissingDestination)));
        assert!(tracker.0.lock().unwrap().is_empty());
        assert!(navigator.take().is_empty());
    }
}
