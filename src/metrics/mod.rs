//! Pool metrics.
//!
//! Counters and gauges go through the `metrics` facade; the Prometheus
//! recorder is installed once per process and rendered by the `/metrics`
//! route. Without the `metrics` feature every call is a no-op.

#[cfg(feature = "metrics")]
use ::metrics::{counter, gauge};
#[cfg(feature = "metrics")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")]
use once_cell::sync::OnceCell;
#[cfg(feature = "metrics")]
use tracing::warn;

#[cfg(feature = "metrics")]
static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the Prometheus recorder if it is not installed yet.
pub fn init() {
    #[cfg(feature = "metrics")]
    {
        let result = PROMETHEUS.get_or_try_init(|| PrometheusBuilder::new().install_recorder());
        if let Err(e) = result {
            warn!(error = %e, "Failed to install Prometheus recorder; metrics disabled");
        }
    }
}

/// Prometheus text exposition of all recorded metrics.
pub fn render() -> Option<String> {
    #[cfg(feature = "metrics")]
    {
        PROMETHEUS.get().map(PrometheusHandle::render)
    }
    #[cfg(not(feature = "metrics"))]
    {
        None
    }
}

pub fn record_acquire(result: &'static str) {
    #[cfg(feature = "metrics")]
    counter!("keypool_acquire_total", "result" => result).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = result;
}

pub fn record_report(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!("keypool_reports_total", "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

pub fn record_probe(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!("keypool_probes_total", "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

pub fn set_pool_size(total: usize, eligible: usize) {
    #[cfg(feature = "metrics")]
    {
        gauge!("keypool_credentials_total").set(total as f64);
        gauge!("keypool_credentials_eligible").set(eligible as f64);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (total, eligible);
}
