//! Prometheus metrics for Cadence nodes.
//!
//! All metrics follow the naming convention: `cadence_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ROUTER METRICS
    // =========================================================================

    /// Callbacks dispatched, by kind
    pub static ref CALLBACKS_DISPATCHED: CounterVec = CounterVec::new(
        Opts::new("cadence_router_callbacks_total", "Callbacks dispatched by the router"),
        &["kind"]
    ).expect("metric creation failed");

    /// Time spent in one dispatch, all modules included
    pub static ref CALLBACK_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "cadence_router_callback_duration_seconds",
            "Time spent dispatching a callback"
        ).buckets(exponential_buckets(0.00005, 2.0, 16).expect("valid buckets")),
        &["kind"]
    ).expect("metric creation failed");

    /// Handler errors, by module and callback kind
    pub static ref MODULE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("cadence_module_errors_total", "Errors returned by module handlers"),
        &["module", "kind"]
    ).expect("metric creation failed");

    // =========================================================================
    // CHAIN METRICS
    // =========================================================================

    /// Blocks finalized and committed
    pub static ref BLOCKS_FINALIZED: Counter = Counter::new(
        "cadence_chain_blocks_finalized_total",
        "Total number of blocks finalized"
    ).expect("metric creation failed");

    /// Last committed height
    pub static ref CHAIN_HEIGHT: Gauge = Gauge::new(
        "cadence_chain_height",
        "Height of the last committed block"
    ).expect("metric creation failed");

    // =========================================================================
    // MEMPOOL METRICS
    // =========================================================================

    /// Transactions rejected by CheckTx
    pub static ref TXS_REJECTED: Counter = Counter::new(
        "cadence_mempool_txs_rejected_total",
        "Transactions rejected by CheckTx"
    ).expect("metric creation failed");

    /// Pending transactions
    pub static ref MEMPOOL_SIZE: Gauge = Gauge::new(
        "cadence_mempool_txs_pending",
        "Transactions waiting for inclusion"
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CALLBACKS_DISPATCHED.clone()),
        Box::new(CALLBACK_DURATION.clone()),
        Box::new(MODULE_ERRORS.clone()),
        Box::new(BLOCKS_FINALIZED.clone()),
        Box::new(CHAIN_HEIGHT.clone()),
        Box::new(TXS_REJECTED.clone()),
        Box::new(MEMPOOL_SIZE.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render every registered metric in the Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
