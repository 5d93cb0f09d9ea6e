//! Prometheus-backed metrics for the API.
//!
//! The recorder is installed once and a handle is kept for in-process
//! rendering so the `/metrics` route can serve scrapes without a separate
//! HTTP listener.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::warn;

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    });
}

/// Render the current metric values in Prometheus exposition format.
pub fn render_metrics() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

pub fn request(resource: &'static str, method: &'static str) {
    ::metrics::counter!("aaps_api_requests_total", "resource" => resource, "method" => method)
        .increment(1);
}

pub fn upsert_outcome(resource: &'static str, outcome: &'static str) {
    ::metrics::counter!("aaps_api_upsert_outcomes_total", "resource" => resource, "outcome" => outcome)
        .increment(1);
}

pub fn auth_rejected() {
    ::metrics::counter!("aaps_api_auth_rejected_total").increment(1);
}
