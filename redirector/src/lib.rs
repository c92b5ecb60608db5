//! Redirect resolution and conversion tracking.
//!
//! Short links found by the edge interceptor and explicit destinations sent to
//! the direct endpoint share one pipeline: classify the destination, merge
//! tracking parameters, decide whether the pixel bounce page is needed, and
//! bump the registry's usage counter on the side.

pub mod bounce;
pub mod classify;
pub mod config;
pub mod direct;
pub mod edge;
pub mod errors;
pub mod http;
pub mod merge;
pub mod metrics_defs;
pub mod pipeline;
pub mod pixel;
pub mod service;

#[cfg(test)]
mod testutils;

pub use errors::RedirectorError;

use registry::Registry;
use service::GatewayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;

pub async fn run(config: config::Config) -> Result<(), RedirectorError> {
    config.validate()?;

    let registry = Registry::from_config(&config.registry)?;
    let backend = registry.backend_name();
    let gateway = GatewayService::new(&config, registry)?;

    tracing::info!(
        port = config.listener.port,
        admin_port = config.admin_listener.port,
        backend,
        upstream = config.upstream.as_ref().map(|u| u.url.as_str()),
        "Starting gateway"
    );

    let gateway_task = run_http_service(&config.listener.host, config.listener.port, gateway);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, RedirectorError>::new(|| true),
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}
