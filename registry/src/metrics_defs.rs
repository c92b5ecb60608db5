//! Metrics definitions for the registry client.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REGISTRY_CALLS: MetricDef = MetricDef {
    name: "registry.calls",
    metric_type: MetricType::Counter,
    description: "Registry calls. Tagged with operation, backend and outcome (ok, error, timeout).",
};

pub const REGISTRY_CALL_DURATION: MetricDef = MetricDef {
    name: "registry.call.duration",
    metric_type: MetricType::Histogram,
    description: "Registry call duration in seconds. Tagged with operation.",
};

pub const ALL_METRICS: &[MetricDef] = &[REGISTRY_CALLS, REGISTRY_CALL_DURATION];
