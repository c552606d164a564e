//! Prometheus metrics for the staker dashboard.
//!
//! The [`DashboardMetrics`] struct owns a dedicated [`Registry`] that the
//! HTTP `/metrics` endpoint encodes into the Prometheus text exposition
//! format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::DashboardError;

/// Central collection of all dashboard-level Prometheus metrics.
pub struct DashboardMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Sources ─────────────────────────────────────────────────────────
    /// Successful source reads, labelled by source kind.
    pub source_reads: IntCounterVec,
    /// Failed source reads, labelled by source kind.
    pub source_failures: IntCounterVec,
    /// Values dropped because a newer block had already been applied.
    pub stale_drops: IntCounter,

    // ── Transactions ────────────────────────────────────────────────────
    /// Transactions handed to the signer, labelled by action.
    pub tx_submitted: IntCounterVec,
    /// Requests declined because the action was not eligible.
    pub tx_not_eligible: IntCounter,
    pub tx_mined: IntCounter,
    pub tx_failed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Funding progress, 0 to 100.
    pub progress_percent: IntGauge,
    /// Local countdown estimate of the seconds left.
    pub seconds_left: IntGauge,
}

impl DashboardMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, DashboardError> {
        let registry = Registry::new();

        let source_reads = register_int_counter_vec_with_registry!(
            Opts::new("staker_source_reads_total", "Successful chain source reads"),
            &["source"],
            registry
        )?;
        let source_failures = register_int_counter_vec_with_registry!(
            Opts::new("staker_source_failures_total", "Failed chain source reads"),
            &["source"],
            registry
        )?;
        let stale_drops = register_int_counter_with_registry!(
            Opts::new(
                "staker_stale_values_dropped_total",
                "Values older than the last applied block"
            ),
            registry
        )?;

        let tx_submitted = register_int_counter_vec_with_registry!(
            Opts::new("staker_tx_submitted_total", "Transactions submitted"),
            &["action"],
            registry
        )?;
        let tx_not_eligible = register_int_counter_with_registry!(
            Opts::new(
                "staker_tx_not_eligible_total",
                "Requests declined as not eligible"
            ),
            registry
        )?;
        let tx_mined = register_int_counter_with_registry!(
            Opts::new("staker_tx_mined_total", "Transactions mined successfully"),
            registry
        )?;
        let tx_failed = register_int_counter_with_registry!(
            Opts::new("staker_tx_failed_total", "Transactions that failed or reverted"),
            registry
        )?;

        let progress_percent = register_int_gauge_with_registry!(
            Opts::new("staker_progress_percent", "Funding progress towards the goal"),
            registry
        )?;
        let seconds_left = register_int_gauge_with_registry!(
            Opts::new("staker_seconds_left", "Local estimate of seconds until the deadline"),
            registry
        )?;

        Ok(Self {
            registry,
            source_reads,
            source_failures,
            stale_drops,
            tx_submitted,
            tx_not_eligible,
            tx_mined,
            tx_failed,
            progress_percent,
            seconds_left,
        })
    }

    /// Encode every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, DashboardError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let metrics = DashboardMetrics::new().unwrap();
        metrics.source_reads.with_label_values(&["total_staked"]).inc();
        metrics.progress_percent.set(40);
        let text = metrics.encode().unwrap();
        assert!(text.contains("staker_source_reads_total{source=\"total_staked\"} 1"));
        assert!(text.contains("staker_progress_percent 40"));
    }
}
