pub mod types;
pub mod error;
pub mod config;

// Re-export commonly used types for convenience
pub use config::{BindingStrategy, Config, LogFormat};
pub use error::EngineError;
pub use types::{
    Classification, ExecutionRequest, ExecutionResult, GradeRequest, GradingReport, Language,
    TestCase, TestVerdict,
};
