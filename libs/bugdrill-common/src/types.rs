use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

use crate::error::EngineError;

/// Strongly-typed language enum
/// One scripting language is supported; the wire carries it as a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
}

impl Language {
    /// Resolve a wire tag. Matching is exact: `"Python"` is rejected.
    pub fn from_tag(tag: &str) -> Result<Language, EngineError> {
        match tag {
            "python" => Ok(Language::Python),
            other => Err(EngineError::UnsupportedLanguage(other.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Run Request (Immutable)
///
/// Wire shape accepted by the gateway. The language stays a raw tag so
/// that rejection of unknown languages happens in one place.
///
/// `source` is the submitted code. `harness` is the generated driver
/// appended after it for a test-case run; the two are size-checked
/// separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    #[serde(rename = "code")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harness: Option<String>,
    pub language: String,
    #[serde(rename = "timeout_sec", default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl ExecutionRequest {
    pub fn python(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            harness: None,
            language: Language::Python.tag().to_string(),
            timeout_seconds: None,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: Option<u64>) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_harness(mut self, harness: impl Into<String>) -> Self {
        self.harness = Some(harness.into());
        self
    }

    /// The program the sandbox actually runs
    pub fn script(&self) -> Cow<'_, str> {
        match &self.harness {
            Some(harness) => Cow::Owned(append_harness(&self.source, harness)),
            None => Cow::Borrowed(&self.source),
        }
    }
}

/// User source, a blank line, then the driver
pub fn append_harness(source: &str, harness: &str) -> String {
    format!("{}\n\n{}\n", source.trim_end(), harness)
}

/// How a sandbox run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Ok,
    NonZeroExit,
    TimedOut,
    LaunchFailure,
}

/// Exit code reported for every timed-out run
pub const TIMEOUT_EXIT_CODE: i64 = 124;

/// Stderr text reported for every timed-out run
pub const TIMEOUT_MESSAGE: &str = "Execution timeout exceeded";

/// Execution Output
/// Produced once per sandbox run, never mutated afterwards
///
/// ## Invariants:
/// - `succeeded` iff `exit_code == 0` and the run did not time out
/// - `classification == TimedOut` implies `exit_code == 124` and stderr
///   carries the timeout message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "success")]
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    #[serde(rename = "execution_time_ms")]
    pub elapsed_ms: u64,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Build a result for a process that exited on its own
    pub fn exited(stdout: String, stderr: String, exit_code: i64, elapsed_ms: u64) -> Self {
        let classification = if exit_code == 0 {
            Classification::Ok
        } else {
            Classification::NonZeroExit
        };

        Self {
            succeeded: exit_code == 0,
            stdout,
            stderr,
            exit_code,
            elapsed_ms,
            classification,
            error: None,
        }
    }

    /// Build the sentinel result for a run killed at its deadline.
    /// Whatever the process wrote to stderr is dropped unless
    /// `partial_stderr` is supplied.
    pub fn timed_out(stdout: String, partial_stderr: Option<&str>, elapsed_ms: u64) -> Self {
        let stderr = match partial_stderr.map(str::trim_end) {
            Some(partial) if !partial.is_empty() => format!("{}\n{}", partial, TIMEOUT_MESSAGE),
            _ => TIMEOUT_MESSAGE.to_string(),
        };

        Self {
            succeeded: false,
            stdout,
            stderr,
            exit_code: TIMEOUT_EXIT_CODE,
            elapsed_ms,
            classification: Classification::TimedOut,
            error: Some("Timeout".to_string()),
        }
    }
}

/// Test Case Definition (Immutable Input)
/// Sourced from the snippet catalog; the engine only reads it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "input")]
    pub inputs: Map<String, Value>,
    pub expected: Value,
}

/// Grade Request
/// Inbound shape of the execute/grade operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(rename = "timeout_sec", default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl GradeRequest {
    /// The unmodified-source run every grading starts with
    pub fn baseline(&self) -> ExecutionRequest {
        ExecutionRequest {
            source: self.code.clone(),
            harness: None,
            language: self.language.clone(),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

/// Per-Test Verdict
/// `index` is positional and 1-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestVerdict {
    #[serde(rename = "test_case")]
    pub index: usize,
    pub input: Value,
    pub expected: Value,
    pub actual: Value,
    pub passed: bool,
    #[serde(rename = "execution_time_ms")]
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Completed,
}

/// Grading Report
///
/// ## Invariants:
/// - `verdicts.len()` equals the number of supplied test cases, in order
/// - `overall_correct` iff the baseline run succeeded and every verdict passed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    pub execution_id: String,
    pub status: ReportStatus,
    #[serde(rename = "is_correct")]
    pub overall_correct: bool,
    #[serde(rename = "test_results")]
    pub verdicts: Vec<TestVerdict>,
    #[serde(rename = "total_time_ms")]
    pub total_elapsed_ms: u64,
    pub stdout: String,
    pub stderr: String,
}

/// Fresh opaque id for a grading report
pub fn new_execution_id() -> String {
    format!("exec_{}", Uuid::new_v4().simple())
}
