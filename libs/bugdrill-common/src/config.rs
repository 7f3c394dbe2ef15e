use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// How harness arguments are matched to the target function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrategy {
    /// Fixed parameter-name vocabulary in priority order
    #[default]
    Known,
    /// Bind against the parameter list parsed from the definition
    Declared,
}

impl FromStr for BindingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "known" => Ok(BindingStrategy::Known),
            "declared" => Ok(BindingStrategy::Declared),
            other => Err(format!("unknown binding strategy '{}' (expected known|declared)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub sandbox_image: String,
    pub memory_limit_mb: u64,
    pub cpu_limit: f64,
    pub pids_limit: i64,
    pub max_output_bytes: usize,
    pub max_source_bytes: usize,
    pub max_harness_bytes: usize,
    pub max_concurrent_sandboxes: usize,
    pub keep_partial_stderr: bool,
    pub harness_binding: BindingStrategy,
    pub parallel_cases: bool,
    pub executor_url: Option<String>,
    /// Wait past a remote run's own deadline before giving up on the executor
    pub client_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparsable values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        }

        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;

        Self {
            port: parsed(lookup, "PORT", 8081),
            default_timeout_secs: parsed(lookup, "DEFAULT_TIMEOUT_SECS", 10),
            max_timeout_secs: parsed(lookup, "MAX_TIMEOUT_SECS", 30),
            sandbox_image: lookup("SANDBOX_IMAGE")
                .unwrap_or_else(|| "python:3.11-alpine".to_string()),
            memory_limit_mb: parsed(lookup, "SANDBOX_MEMORY_MB", 128),
            cpu_limit: parsed(lookup, "SANDBOX_CPUS", 0.5),
            pids_limit: parsed(lookup, "SANDBOX_PIDS_LIMIT", 64),
            max_output_bytes: parsed(lookup, "MAX_OUTPUT_BYTES", 4 * 1024 * 1024),
            max_source_bytes: parsed(lookup, "MAX_SOURCE_BYTES", 64 * 1024),
            max_harness_bytes: parsed(lookup, "MAX_HARNESS_BYTES", 8 * 1024 * 1024),
            max_concurrent_sandboxes: parsed(lookup, "MAX_CONCURRENT_SANDBOXES", 8usize).max(1),
            keep_partial_stderr: parsed(lookup, "KEEP_PARTIAL_STDERR", false),
            harness_binding: parsed(lookup, "HARNESS_BINDING", BindingStrategy::Known),
            parallel_cases: parsed(lookup, "PARALLEL_CASES", false),
            executor_url: lookup("EXECUTOR_URL").filter(|url| !url.trim().is_empty()),
            client_timeout_secs: parsed(lookup, "EXECUTOR_CLIENT_TIMEOUT_SECS", 30),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
