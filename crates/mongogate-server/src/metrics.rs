use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mongogate_requests_total",
        "Requests by operation and status",
        &["op", "status"]
    )
    .unwrap()
});

pub static STORE_OP_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "mongogate_store_op_seconds",
        "Store round trip including connect and close",
        &["op"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

pub static STORE_SESSIONS_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("mongogate_store_sessions_open", "Store sessions currently open").unwrap()
});

pub static AUTH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("mongogate_auth_failures_total", "Rejected credentials").unwrap()
});
