//! Tracking bounce page.

mod page;
mod render;

pub use page::{
    BounceError, BounceHandle, BounceParams, BouncePage, Navigator, PixelTracker, TrackingEvent,
};
pub use render::render;
