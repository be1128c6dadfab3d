//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `exchange_operations_total{operation}` - Successful operations by kind
//! - `exchange_rejections_total{operation}` - Rejected operations by kind
//! - `exchange_failures_total{operation}` - Operations failed by the host (storage, overflow)
//! - `exchange_protocol_revenue_wei` - Claimable revenue
//! - `exchange_reserve_wei` - Currency held by the engine
//! - `exchange_total_supply_units` - Units outstanding

use crate::engine::EngineState;
use prometheus::{Gauge, IntCounterVec, IntGauge, Opts, Registry};

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful operations
    pub operations_total: IntCounterVec,

    /// Rejected operations
    pub rejections_total: IntCounterVec,

    /// Operations that failed for reasons other than a rejection
    pub failures_total: IntCounterVec,

    /// Claimable revenue (wei; float gauge since wei exceeds i64)
    pub protocol_revenue: Gauge,

    /// Held currency (wei)
    pub reserve: Gauge,

    /// Units outstanding
    pub total_supply: IntGauge,

    registry: Registry,
}

impl Metrics {
    /// Create new metrics collector on its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("exchange_operations_total", "Successful exchange operations"),
            &["operation"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("exchange_rejections_total", "Rejected exchange operations"),
            &["operation"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new("exchange_failures_total", "Failed exchange operations"),
            &["operation"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let protocol_revenue = Gauge::new(
            "exchange_protocol_revenue_wei",
            "Protocol revenue claimable by the owner",
        )?;
        registry.register(Box::new(protocol_revenue.clone()))?;

        let reserve = Gauge::new("exchange_reserve_wei", "Currency held by the engine")?;
        registry.register(Box::new(reserve.clone()))?;

        let total_supply = IntGauge::new("exchange_total_supply_units", "Units outstanding")?;
        registry.register(Box::new(total_supply.clone()))?;

        Ok(Self {
            operations_total,
            rejections_total,
            failures_total,
            protocol_revenue,
            reserve,
            total_supply,
            registry,
        })
    }

    /// Record a successful operation
    pub fn record_success(&self, operation: &str) {
        self.operations_total.with_label_values(&[operation]).inc();
    }

    /// Record a rejected operation
    pub fn record_rejection(&self, operation: &str) {
        self.rejections_total.with_label_values(&[operation]).inc();
    }

    /// Record an operation that failed without being a rejection
    pub fn record_failure(&self, operation: &str) {
        self.failures_total.with_label_values(&[operation]).inc();
    }

    /// Refresh gauges from an engine snapshot
    pub fn observe_state(&self, state: &EngineState) {
        self.protocol_revenue.set(state.revenue.total().as_u128() as f64);
        self.reserve.set(state.reserve.as_u128() as f64);
        self.total_supply
            .set(i64::try_from(state.ledger.total_supply()).unwrap_or(i64::MAX));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("total_supply", &self.total_supply.get())
            .field("reserve", &self.reserve.get())
            .finish_non_exhaustive()
    }
}
