//! Dispatch metrics.
//!
//! Recorded through the `metrics` facade. No exporter is bundled; install
//! any `metrics` recorder to collect them. Without one, every call here is
//! a no-op.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `apiary_dispatch_total` | Counter | `method`, `status` | Dispatched requests |
//! | `apiary_dispatch_duration_seconds` | Histogram | `method` | Dispatch latency |
//! | `apiary_auth_rejections_total` | Counter | `reason` | Requests rejected during authentication |
//! | `apiary_registry_swaps_total` | Counter | `outcome` | Registry replace attempts |

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Dispatched requests.
pub const DISPATCH_TOTAL: &str = "apiary_dispatch_total";
/// Dispatch latency.
pub const DISPATCH_DURATION_SECONDS: &str = "apiary_dispatch_duration_seconds";
/// Authentication rejections.
pub const AUTH_REJECTIONS_TOTAL: &str = "apiary_auth_rejections_total";
/// Registry replace attempts.
pub const REGISTRY_SWAPS_TOTAL: &str = "apiary_registry_swaps_total";

/// Registers descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(DISPATCH_TOTAL, "Requests dispatched to a service method");
    describe_histogram!(
        DISPATCH_DURATION_SECONDS,
        "Time from route match to response, in seconds"
    );
    describe_counter!(
        AUTH_REJECTIONS_TOTAL,
        "Requests rejected by peer or user authentication"
    );
    describe_counter!(REGISTRY_SWAPS_TOTAL, "Service registry replace attempts");
}

/// Records one dispatched request.
///
/// * `method` - Canonical method name
/// * `status` - Response status code
/// * `duration` - Time spent dispatching
pub fn record_dispatch(method: &str, status: u16, duration: Duration) {
    counter!(
        DISPATCH_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(DISPATCH_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Records an authentication rejection (`peer`, `required`, `timeout`, ...).
pub fn record_auth_rejection(reason: &str) {
    counter!(AUTH_REJECTIONS_TOTAL, "reason" => reason.to_string()).increment(1);
}

/// Records a registry replace attempt.
pub fn record_registry_swap(applied: bool) {
    let outcome = if applied { "applied" } else { "stale" };
    counter!(REGISTRY_SWAPS_TOTAL, "outcome" => outcome).increment(1);
}
