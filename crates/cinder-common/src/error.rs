use thiserror::Error;

/// Failures that abort the compilation of a unit.
///
/// Ordinary source errors are never reported through this type; they are
/// diagnostics in the [`Log`](crate::diagnostic::Log). A `CompileError` means
/// the phase could not continue at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A prior phase's contract was violated or the core has a bug.
    #[error("internal compiler error: {0}")]
    Internal(String),

    /// An external class could not be loaded and the failure could not be
    /// attached to a source position.
    #[error("class file for {class} not found: {reason}")]
    CompletionFailure { class: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CompileError {
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            CompileError::internal("unexpected tree").to_string(),
            "internal compiler error: unexpected tree"
        );
        let err = CompileError::CompletionFailure {
            class: "java.util.List".into(),
            reason: "missing".into(),
        };
        assert_eq!(err.to_string(), "class file for java.util.List not found: missing");
    }
}
