//! Crate-wide error type.
//!
//! Every fallible operation returns [`HeError`]; there is no local recovery.
//! Backend failures are wrapped verbatim so callers can see the backend's
//! own error code.

use crate::backend::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeError {
    /// Operand was not produced by encryption.
    #[error("{op}: ciphertext is not initialized")]
    Uninitialized { op: &'static str },

    /// Dimension or encoding-unit mismatch.
    #[error("{op}: {message}")]
    Shape { op: &'static str, message: String },

    /// Operands at different levels, or a level move that the modulus
    /// chain cannot satisfy.
    #[error("{op}: {message}")]
    LevelMismatch { op: &'static str, message: String },

    /// Binary-operation operands at different scales. Scales are compared
    /// exactly; callers align them through rescaling, never implicitly.
    #[error("{op}: operand scales differ ({lhs} vs {rhs})")]
    ScaleMismatch {
        op: &'static str,
        lhs: f64,
        rhs: f64,
    },

    /// A request outside the supported parameter space.
    #[error("invalid parameter: {message}")]
    Parameter { message: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Raised only by the debug evaluator when its homomorphic and
    /// plaintext projections diverge.
    #[error("{op}: {detail}")]
    DebugInconsistency { op: String, detail: String },
}

impl HeError {
    pub(crate) fn shape(op: &'static str, message: impl Into<String>) -> Self {
        HeError::Shape {
            op,
            message: message.into(),
        }
    }

    pub(crate) fn level(op: &'static str, message: impl Into<String>) -> Self {
        HeError::LevelMismatch {
            op,
            message: message.into(),
        }
    }

    pub(crate) fn parameter(message: impl Into<String>) -> Self {
        HeError::Parameter {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation() {
        let err = HeError::shape("add", "operands do not match");
        assert_eq!(err.to_string(), "add: operands do not match");

        let err = HeError::ScaleMismatch {
            op: "multiply",
            lhs: 2.0,
            rhs: 4.0,
        };
        assert_eq!(err.to_string(), "multiply: operand scales differ (2 vs 4)");
    }

    #[test]
    fn backend_errors_pass_through_verbatim() {
        let backend = BackendError::new("degree_overflow", "relinearize first");
        let err: HeError = backend.clone().into();
        assert_eq!(err.to_string(), backend.to_string());
    }
}
