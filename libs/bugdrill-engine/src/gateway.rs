/// Execution Gateway
///
/// Validates a run request, applies the default timeout and hands the
/// source to a sandbox runner. Stateless per request apart from the
/// admission semaphore, so independent requests may call it concurrently.

use crate::sandbox::SandboxRunner;
use async_trait::async_trait;
use bugdrill_common::{Config, EngineError, ExecutionRequest, ExecutionResult, Language};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;

#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError>;
}

#[async_trait]
impl<G: ExecutionGateway + ?Sized> ExecutionGateway for Arc<G> {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError> {
        (**self).execute(request).await
    }
}

/// Request policy enforced before any sandbox is launched
#[derive(Debug, Clone)]
pub struct GatewayPolicy {
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub max_source_bytes: usize,
    /// Cap on the generated driver, which grows with test-case inputs
    pub max_harness_bytes: usize,
    pub max_concurrent_sandboxes: usize,
}

impl Default for GatewayPolicy {
    fn default() -> Self {
        Self {
            default_timeout_secs: 10,
            max_timeout_secs: 30,
            max_source_bytes: 64 * 1024,
            max_harness_bytes: 8 * 1024 * 1024,
            max_concurrent_sandboxes: 8,
        }
    }
}

impl From<&Config> for GatewayPolicy {
    fn from(config: &Config) -> Self {
        Self {
            default_timeout_secs: config.default_timeout_secs,
            max_timeout_secs: config.max_timeout_secs,
            max_source_bytes: config.max_source_bytes,
            max_harness_bytes: config.max_harness_bytes,
            max_concurrent_sandboxes: config.max_concurrent_sandboxes,
        }
    }
}

impl GatewayPolicy {
    /// Check a request and resolve its effective timeout
    pub fn validate(&self, request: &ExecutionRequest) -> Result<(Language, Duration), EngineError> {
        let language = Language::from_tag(&request.language)?;

        if request.source.trim().is_empty() {
            return Err(EngineError::Validation("code must not be empty".to_string()));
        }

        if request.source.len() > self.max_source_bytes {
            return Err(EngineError::Validation(format!(
                "code is {} bytes, limit is {}",
                request.source.len(),
                self.max_source_bytes
            )));
        }

        if let Some(harness) = &request.harness {
            if harness.len() > self.max_harness_bytes {
                return Err(EngineError::Validation(format!(
                    "harness is {} bytes, limit is {}",
                    harness.len(),
                    self.max_harness_bytes
                )));
            }
        }

        let timeout_secs = match request.timeout_seconds {
            Some(0) => {
                return Err(EngineError::Validation(
                    "timeout_sec must be greater than zero".to_string(),
                ))
            }
            Some(secs) => secs.min(self.max_timeout_secs),
            None => self.default_timeout_secs,
        };

        Ok((language, Duration::from_secs(timeout_secs)))
    }
}

/// Gateway that runs sandboxes in-process
pub struct LocalGateway<R> {
    runner: R,
    policy: GatewayPolicy,
    permits: Arc<Semaphore>,
}

impl<R: SandboxRunner> LocalGateway<R> {
    pub fn new(runner: R, policy: GatewayPolicy) -> Self {
        let permits = Arc::new(Semaphore::new(policy.max_concurrent_sandboxes.max(1)));
        Self {
            runner,
            policy,
            permits,
        }
    }
}

#[async_trait]
impl<R: SandboxRunner> ExecutionGateway for LocalGateway<R> {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError> {
        let (language, timeout) = self.policy.validate(request)?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EngineError::Launch("sandbox admission closed".to_string()))?;

        let result = self.runner.run(&request.script(), timeout).await?;

        info!(
            language = %language,
            classification = ?result.classification,
            exit_code = result.exit_code,
            execution_time_ms = result.elapsed_ms,
            timeout_secs = timeout.as_secs(),
            "Sandbox run finished"
        );

        Ok(result)
    }
}
