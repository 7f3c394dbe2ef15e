// Prometheus metrics for the bugdrill executor

use bugdrill_common::{Classification, GradingReport};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Sandbox runs by how they ended, grading runs included
    pub static ref SANDBOX_RUNS: CounterVec = CounterVec::new(
        Opts::new("bugdrill_sandbox_runs_total", "Total sandbox runs"),
        &["classification"]
    )
    .expect("metric can be created");

    // Sandbox wall-clock time (in milliseconds)
    pub static ref SANDBOX_RUN_TIME: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "bugdrill_sandbox_run_time_ms",
            "Sandbox run time in milliseconds"
        )
        .buckets(vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0])
    )
    .expect("metric can be created");

    // Gradings by overall outcome
    pub static ref GRADINGS: CounterVec = CounterVec::new(
        Opts::new("bugdrill_gradings_total", "Total grading requests completed"),
        &["outcome"]
    )
    .expect("metric can be created");

    // Individual test verdicts
    pub static ref VERDICTS: CounterVec = CounterVec::new(
        Opts::new("bugdrill_verdicts_total", "Total test case verdicts"),
        &["result"]
    )
    .expect("metric can be created");

    // API request counter
    pub static ref API_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("bugdrill_api_requests_total", "Total API requests"),
        &["endpoint", "status"]
    )
    .expect("metric can be created");

    // Requests refused before any sandbox work
    pub static ref REQUESTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("bugdrill_requests_rejected_total", "Total requests rejected"),
        &["reason"]
    )
    .expect("metric can be created");
}

/// Initialize metrics registry
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(SANDBOX_RUNS.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(SANDBOX_RUN_TIME.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(GRADINGS.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(VERDICTS.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(API_REQUESTS.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(REQUESTS_REJECTED.clone()))
        .expect("collector can be registered");
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::Ok => "ok",
        Classification::NonZeroExit => "non_zero_exit",
        Classification::TimedOut => "timed_out",
        Classification::LaunchFailure => "launch_failure",
    }
}

/// Record one finished sandbox run
pub fn record_sandbox_run(classification: Classification, elapsed_ms: u64) {
    SANDBOX_RUNS
        .with_label_values(&[classification_label(classification)])
        .inc();
    SANDBOX_RUN_TIME.observe(elapsed_ms as f64);
}

/// Record a finished grading and its verdicts
pub fn record_grading(report: &GradingReport) {
    let outcome = if report.overall_correct { "correct" } else { "incorrect" };
    GRADINGS.with_label_values(&[outcome]).inc();

    for verdict in &report.verdicts {
        let result = if verdict.passed { "passed" } else { "failed" };
        VERDICTS.with_label_values(&[result]).inc();
    }
}

/// Record API request outcome
pub fn record_request(endpoint: &str, status: u16) {
    API_REQUESTS
        .with_label_values(&[endpoint, &status.to_string()])
        .inc();
}

/// Record request rejection
pub fn record_rejected(reason: &str) {
    REQUESTS_REJECTED.with_label_values(&[reason]).inc();
}
