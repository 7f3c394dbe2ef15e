mod handlers;
mod metered;
mod metrics;
mod routes;

use anyhow::Context;
use axum::Router;
use metered::MeteredGateway;
use bugdrill_common::{Config, LogFormat};
use bugdrill_engine::{
    DockerRunner, ExecutionGateway, GatewayPolicy, GradeOptions, LocalGateway, SandboxLimits,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub gateway: Arc<dyn ExecutionGateway>,
    pub grade_options: GradeOptions,
    pub start_time: Arc<Instant>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(config.log_format);

    info!("bugdrill executor booting...");

    metrics::init_metrics();
    info!("Metrics registry initialized");

    let limits = SandboxLimits::from(&config);
    let runner = DockerRunner::connect(limits.clone()).context("Failed to set up Docker runner")?;
    let gateway = LocalGateway::new(runner, GatewayPolicy::from(&config));

    info!(
        image = %limits.image,
        memory_bytes = limits.memory_bytes,
        nano_cpus = limits.nano_cpus,
        max_concurrent_sandboxes = config.max_concurrent_sandboxes,
        default_timeout_secs = config.default_timeout_secs,
        "Sandbox configured"
    );

    let state = Arc::new(AppState {
        gateway: Arc::new(MeteredGateway::new(gateway)),
        grade_options: GradeOptions {
            binding: config.harness_binding,
            parallel_cases: config.parallel_cases,
        },
        start_time: Arc::new(Instant::now()),
    });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Executor shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, draining in-flight requests...");
}
