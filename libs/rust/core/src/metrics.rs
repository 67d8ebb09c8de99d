//! Prometheus counters for configuration and verification traffic.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};
use tracing::warn;

struct TrainerMetrics {
    configure_total: IntCounterVec,
    verify_total: IntCounterVec,
    store_errors_total: IntCounterVec,
}

impl TrainerMetrics {
    fn register() -> prometheus::Result<Self> {
        let configure_total = counter_vec("trainer_configure_total", "Configuration requests by outcome", "outcome")?;
        let verify_total = counter_vec("trainer_verify_total", "Payload verifications by outcome", "outcome")?;
        let store_errors_total =
            counter_vec("trainer_store_errors_total", "Configuration store failures by operation", "operation")?;
        Ok(Self { configure_total, verify_total, store_errors_total })
    }
}

fn counter_vec(name: &str, help: &str, label: &str) -> prometheus::Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), &[label])?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

static METRICS: Lazy<Option<TrainerMetrics>> = Lazy::new(|| match TrainerMetrics::register() {
    Ok(metrics) => Some(metrics),
    Err(e) => {
        warn!(error = %e, "metrics_registration_failed");
        None
    }
});

/// `outcome` is `ok` or `failed`.
pub fn record_configure(outcome: &str) {
    if let Some(m) = METRICS.as_ref() {
        m.configure_total.with_label_values(&[outcome]).inc();
    }
}

/// `outcome` is `ok` or a verification error kind.
pub fn record_verification(outcome: &str) {
    if let Some(m) = METRICS.as_ref() {
        m.verify_total.with_label_values(&[outcome]).inc();
    }
}

pub fn record_store_error(operation: &str) {
    if let Some(m) = METRICS.as_ref() {
        m.store_errors_total.with_label_values(&[operation]).inc();
    }
}

/// Encode the default registry in the Prometheus text format.
pub fn render_metrics() -> anyhow::Result<String> {
    Lazy::force(&METRICS);
    let families = prometheus::default_registry().gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
