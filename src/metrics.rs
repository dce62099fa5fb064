use ::metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Once;
use std::time::Duration;
use tracing::warn;

pub const REQUESTS_TOTAL: &str = "render_requests_total";
pub const REQUEST_DURATION: &str = "render_duration_seconds";
pub const SESSION_LAUNCHES_TOTAL: &str = "render_session_launches_total";
pub const CONTEXTS_OPENED_TOTAL: &str = "render_contexts_opened_total";
pub const CONTEXTS_CLOSED_TOTAL: &str = "render_contexts_closed_total";
pub const CONTEXTS_ACTIVE: &str = "render_contexts_active";
pub const STABILIZE_SKIPPED_TOTAL: &str = "render_stabilize_skipped_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the Prometheus recorder as the global metrics sink
///
/// Returns `None` if another recorder was installed first; metrics are then
/// still recorded there, only `/metrics` stays unavailable.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            Some(handle)
        }
        Err(e) => {
            warn!("Prometheus recorder not installed: {}", e);
            None
        }
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(REQUESTS_TOTAL, Unit::Count, "Render requests by outcome.");
        describe_histogram!(
            REQUEST_DURATION,
            Unit::Seconds,
            "End-to-end render time per request."
        );
        describe_counter!(
            SESSION_LAUNCHES_TOTAL,
            Unit::Count,
            "Browser processes started."
        );
        describe_counter!(
            CONTEXTS_OPENED_TOTAL,
            Unit::Count,
            "Rendering contexts opened."
        );
        describe_counter!(
            CONTEXTS_CLOSED_TOTAL,
            Unit::Count,
            "Rendering contexts released."
        );
        describe_gauge!(
            CONTEXTS_ACTIVE,
            Unit::Count,
            "Rendering contexts currently open."
        );
        describe_counter!(
            STABILIZE_SKIPPED_TOTAL,
            Unit::Count,
            "Network idle waits that gave up before the page settled."
        );
    });
}

pub fn record_request(outcome: &'static str, duration: Duration) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(REQUEST_DURATION).record(duration.as_secs_f64());
}

pub fn record_session_launch() {
    counter!(SESSION_LAUNCHES_TOTAL).increment(1);
}

pub fn record_context_opened(active: usize) {
    counter!(CONTEXTS_OPENED_TOTAL).increment(1);
    gauge!(CONTEXTS_ACTIVE).set(active as f64);
}

pub fn record_context_closed(active: usize) {
    counter!(CONTEXTS_CLOSED_TOTAL).increment(1);
    gauge!(CONTEXTS_ACTIVE).set(active as f64);
}

pub fn record_stabilize_skipped() {
    counter!(STABILIZE_SKIPPED_TOTAL).increment(1);
}
