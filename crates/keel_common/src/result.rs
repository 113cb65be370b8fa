//! Internal error type for violated engine invariants.

/// Result type for operations that can only fail through an engine bug.
pub type KeelResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in keel, not a problem with the project.
///
/// Raised when an invariant the engine maintains for itself does not hold,
/// for example an edge pointing at a node that was never allocated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the violated invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("edge target 7 out of bounds");
        assert_eq!(format!("{err}"), "internal error: edge target 7 out of bounds");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }

    #[test]
    fn err_path() {
        let r: KeelResult<i32> = Err(InternalError::new("test error"));
        assert_eq!(r.unwrap_err().message, "test error");
    }
}
