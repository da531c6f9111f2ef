//! Error type shared by dispatch, compilation, execution, and artifact handling.

use std::io;

use thiserror::Error;

use crate::backend::spec::ProgramSerdeError;

pub type OnnxResult<T> = Result<T, OnnxError>;

/// Coarse classification of [`OnnxError`] used by callers that only branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Dispatch,
    UnsupportedFeature,
    Arity,
    SignatureMismatch,
    InvalidArgument,
    Serialization,
    Io,
}

#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("invalid handler configuration for '{op}': {reason}")]
    Configuration { op: String, reason: String },
    #[error("unknown operator '{op}'")]
    UnknownOperator { op: String },
    #[error("operator '{op}' has no implementation for opset version {requested} (available: {available:?})")]
    UnsupportedVersion {
        op: String,
        requested: u32,
        available: Vec<u32>,
    },
    #[error("operator '{op}' does not support {feature}")]
    UnsupportedFeature { op: String, feature: String },
    #[error("operator '{op}' expects {expected} inputs, got {actual}")]
    Arity {
        op: String,
        expected: String,
        actual: usize,
    },
    #[error("signature mismatch calling '{function}': {detail}")]
    SignatureMismatch { function: String, detail: String },
    #[error("invalid argument for '{op}': {reason}")]
    InvalidArgument { op: String, reason: String },
    #[error(transparent)]
    Serialization(#[from] ProgramSerdeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl OnnxError {
    pub fn configuration(op: impl Into<String>, reason: impl Into<String>) -> Self {
        OnnxError::Configuration {
            op: op.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported_feature(op: impl Into<String>, feature: impl Into<String>) -> Self {
        OnnxError::UnsupportedFeature {
            op: op.into(),
            feature: feature.into(),
        }
    }

    pub fn invalid_argument(op: impl Into<String>, reason: impl Into<String>) -> Self {
        OnnxError::InvalidArgument {
            op: op.into(),
            reason: reason.into(),
        }
    }

    pub fn signature_mismatch(function: impl Into<String>, detail: impl Into<String>) -> Self {
        OnnxError::SignatureMismatch {
            function: function.into(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OnnxError::Configuration { .. } => ErrorKind::Configuration,
            OnnxError::UnknownOperator { .. } | OnnxError::UnsupportedVersion { .. } => {
                ErrorKind::Dispatch
            }
            OnnxError::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            OnnxError::Arity { .. } => ErrorKind::Arity,
            OnnxError::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            OnnxError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            OnnxError::Serialization(_) => ErrorKind::Serialization,
            OnnxError::Io(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_version_message_names_operator_and_version() {
        let err = OnnxError::UnsupportedVersion {
            op: "Resize".into(),
            requested: 9,
            available: vec![10, 11],
        };
        let message = err.to_string();
        assert!(message.contains("Resize"));
        assert!(message.contains('9'));
        assert_eq!(err.kind(), ErrorKind::Dispatch);
    }

    #[test]
    fn unsupported_feature_names_the_feature() {
        let err = OnnxError::unsupported_feature("Resize", "roi");
        assert!(err.to_string().contains("roi"));
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }
}
