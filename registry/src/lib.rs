//! Campaign registry client.
//!
//! The registry is the external store of short-link configuration: destination,
//! UTM defaults, pixel settings and a usage counter per entry. This crate
//! normalizes its records and exposes the lookups and the counter update the
//! redirect pipeline needs.

pub mod backend;
pub mod client;
pub mod config;
pub mod http_registry;
pub mod metrics_defs;
pub mod record;
pub mod static_registry;
pub mod types;

pub use backend::{RegistryBackend, RegistryError};
pub use client::Registry;
pub use types::{CampaignLinkRecord, PixelConfig, UtmDefaults};
