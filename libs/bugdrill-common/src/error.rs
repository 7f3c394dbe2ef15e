use thiserror::Error;

/// Failures that abort a whole execute/grade request.
///
/// Timeouts and non-zero exits are not errors; they come back as a
/// normal [`ExecutionResult`](crate::types::ExecutionResult).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unsupported language '{0}': only python is supported")]
    UnsupportedLanguage(String),

    #[error("invalid request: {0}")]
    Validation(String),

    /// The isolation runtime could not start the process
    #[error("sandbox launch failed: {0}")]
    Launch(String),
}

impl EngineError {
    /// Caller mistakes, rejected before any sandbox work
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedLanguage(_) | EngineError::Validation(_)
        )
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_split() {
        assert!(EngineError::UnsupportedLanguage("ruby".into()).is_client_error());
        assert!(EngineError::Validation("empty".into()).is_client_error());
        assert!(!EngineError::Launch("daemon down".into()).is_client_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            EngineError::UnsupportedLanguage("ruby".into()).to_string(),
            "unsupported language 'ruby': only python is supported"
        );
        assert_eq!(
            EngineError::Launch("no such image".into()).to_string(),
            "sandbox launch failed: no such image"
        );
    }
}
