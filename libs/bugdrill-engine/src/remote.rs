use crate::gateway::ExecutionGateway;
use async_trait::async_trait;
use bugdrill_common::{EngineError, ExecutionRequest, ExecutionResult};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Run budget assumed when a request leaves its timeout to the server
pub const DEFAULT_RUN_BUDGET: Duration = Duration::from_secs(30);

/// Gateway backed by an executor service reached over HTTP
///
/// Each call waits for the run's own deadline plus `headroom`, which
/// covers container setup, kill and removal on the server.
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    base_url: String,
    client: reqwest::Client,
    headroom: Duration,
    run_budget: Duration,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl RemoteGateway {
    pub fn new(base_url: &str, headroom: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(headroom)
            .build()
            .map_err(|e| EngineError::Launch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            headroom,
            run_budget: DEFAULT_RUN_BUDGET,
        })
    }

    /// Longest run the server may choose when the request names no timeout
    pub fn with_run_budget(mut self, run_budget: Duration) -> Self {
        self.run_budget = run_budget;
        self
    }

    fn request_timeout(&self, request: &ExecutionRequest) -> Duration {
        let run = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.run_budget);
        run + self.headroom
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Liveness of the remote executor itself
    pub async fn health(&self) -> Result<(), EngineError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.headroom)
            .send()
            .await
            .map_err(|e| EngineError::Launch(format!("failed to reach executor: {}", e)))?;

        if response.status() != StatusCode::OK {
            return Err(EngineError::Launch(format!(
                "executor service unhealthy: {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ExecutionGateway for RemoteGateway {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError> {
        let response = self
            .client
            .post(format!("{}/execute", self.base_url))
            .timeout(self.request_timeout(request))
            .json(request)
            .send()
            .await
            .map_err(|e| EngineError::Launch(format!("failed to call executor: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Launch(format!("failed to read response: {}", e)))?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| EngineError::Launch(format!("failed to decode response: {}", e)));
        }

        Err(error_for_status(status, &body))
    }
}

fn error_for_status(status: StatusCode, body: &str) -> EngineError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("executor returned {}", status.as_u16()));

    if status.is_client_error() {
        EngineError::Validation(message)
    } else {
        EngineError::Launch(message)
    }
}
