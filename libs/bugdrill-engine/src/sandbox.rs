/// Sandbox Runner - Abstraction for Isolated Execution
///
/// **Core Responsibility:**
/// Run one source blob in a fresh, disposable, resource-capped boundary
/// and report what happened.
///
/// **Critical Architectural Boundary:**
/// - Runner knows HOW to isolate (Docker today)
/// - Runner does NOT know about test cases or grading
/// - Runner returns raw streams, exit status and timing
///
/// Launch problems are the only `Err`; non-zero exits and timeouts are
/// ordinary results.

use async_trait::async_trait;
use bugdrill_common::{Config, EngineError, ExecutionResult};
use std::time::Duration;

/// Runner contract
///
/// Any implementation must guarantee:
/// 1. No network, capped memory and CPU, no privilege escalation
/// 2. The process is killed once `timeout` elapses and the result is the
///    timeout sentinel
/// 3. The isolation boundary is released on every path
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, source: &str, timeout: Duration) -> Result<ExecutionResult, EngineError>;
}

/// Resource ceilings applied to every sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxLimits {
    pub image: String,
    pub memory_bytes: i64,
    pub nano_cpus: i64,
    pub pids_limit: i64,
    pub max_output_bytes: usize,
    pub keep_partial_stderr: bool,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            image: "python:3.11-alpine".to_string(),
            memory_bytes: 128 * 1024 * 1024,
            nano_cpus: 500_000_000,
            pids_limit: 64,
            max_output_bytes: 4 * 1024 * 1024,
            keep_partial_stderr: false,
        }
    }
}

impl From<&Config> for SandboxLimits {
    fn from(config: &Config) -> Self {
        Self {
            image: config.sandbox_image.clone(),
            memory_bytes: (config.memory_limit_mb as i64) * 1024 * 1024,
            nano_cpus: (config.cpu_limit * 1_000_000_000.0) as i64,
            pids_limit: config.pids_limit,
            max_output_bytes: config.max_output_bytes,
            keep_partial_stderr: config.keep_partial_stderr,
        }
    }
}

pub(crate) const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Byte sink that stops growing at a fixed cap
#[derive(Debug)]
pub(crate) struct CappedBuffer {
    bytes: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl CappedBuffer {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
            truncated: false,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub(crate) fn into_string(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}
