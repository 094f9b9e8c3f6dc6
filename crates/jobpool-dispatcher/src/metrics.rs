//! Dispatcher instruments. Every function compiles to a no-op without the
//! `metrics` feature.

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(feature = "metrics")]
static JOBS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOB_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOB_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static POOL_WAIT_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
pub fn init(meter: &Meter) {
    let _ = JOBS.set(
        meter
            .u64_counter("jobs")
            .with_description("Jobs completed successfully")
            .build(),
    );

    let _ = JOB_ERRORS.set(
        meter
            .u64_counter("job_errors")
            .with_description("Jobs that failed validation, acquisition, or the remote call")
            .build(),
    );

    let _ = JOB_DURATION_MS.set(
        meter
            .f64_histogram("job_duration")
            .with_unit("ms")
            .with_description("End-to-end dispatch latency, successful or not")
            .build(),
    );

    let _ = POOL_WAIT_MS.set(
        meter
            .f64_histogram("pool_wait")
            .with_unit("ms")
            .with_description("Time spent waiting for a pooled connection")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_jobs() {
    if let Some(counter) = JOBS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs() {}

#[cfg(feature = "metrics")]
pub fn increment_job_errors() {
    if let Some(counter) = JOB_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_job_errors() {}

#[cfg(feature = "metrics")]
pub fn record_job_duration(duration_ms: f64) {
    if let Some(histogram) = JOB_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_job_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn record_pool_wait(duration_ms: f64) {
    if let Some(histogram) = POOL_WAIT_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_pool_wait(_duration_ms: f64) {}
