// Gateway wrapper that feeds every sandbox run into the metrics registry

use async_trait::async_trait;
use bugdrill_common::{EngineError, ExecutionRequest, ExecutionResult};
use bugdrill_engine::ExecutionGateway;

use crate::metrics;

/// Counts each run that reached a sandbox, whichever endpoint issued it
pub struct MeteredGateway<G> {
    inner: G,
}

impl<G> MeteredGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: ExecutionGateway> ExecutionGateway for MeteredGateway<G> {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError> {
        let result = self.inner.execute(request).await?;
        metrics::record_sandbox_run(result.classification, result.elapsed_ms);
        Ok(result)
    }
}
