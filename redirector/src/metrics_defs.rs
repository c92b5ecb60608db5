use shared::metrics_defs::{MetricDef, MetricType};

pub const REDIRECTS: MetricDef = MetricDef {
    name: "redirects",
    metric_type: MetricType::Counter,
    description: "Resolved redirects. Tagged with target (destination, bounce).",
};

pub const REDIRECT_REJECTED: MetricDef = MetricDef {
    name: "redirects.rejected",
    metric_type: MetricType::Counter,
    description: "Requests whose destination was missing or invalid. Tagged with surface and reason.",
};

pub const ABSORBED_FAILURES: MetricDef = MetricDef {
    name: "redirects.absorbed_failures",
    metric_type: MetricType::Counter,
    description: "Registry failures resolved to an untracked redirect. Tagged with operation.",
};

pub const PASS_THROUGH: MetricDef = MetricDef {
    name: "edge.pass_through",
    metric_type: MetricType::Counter,
    description: "Requests the edge interceptor handed to the upstream. Tagged with reason.",
};

pub const BOUNCE_PAGE_RENDERS: MetricDef = MetricDef {
    name: "bounce.renders",
    metric_type: MetricType::Counter,
    description: "Tracking bounce pages served",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with handler and status.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REDIRECTS,
    REDIRECT_REJECTED,
    ABSORBED_FAILURES,
    PASS_THROUGH,
    BOUNCE_PAGE_RENDERS,
    REQUEST_DURATION,
];
