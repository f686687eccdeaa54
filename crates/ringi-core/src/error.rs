//! Errors raised while decoding condition trees and attribute paths.
//!
//! Evaluation itself never fails: these errors only surface when a
//! configuration record is turned into typed values.

use thiserror::Error;

/// Errors that can occur when decoding a condition tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// The operator string is not one of the supported operators.
    #[error("unknown condition operator `{0}`")]
    UnknownOperator(String),

    /// The attribute path is malformed or uses an unknown namespace.
    #[error("invalid attribute path `{path}`: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A leaf operator was given without a `field`.
    #[error("leaf operator `{operator}` requires a `field`")]
    MissingField {
        /// The leaf operator.
        operator: String,
    },

    /// A comparison operator was given without a `value`.
    #[error("leaf operator `{operator}` requires a `value`")]
    MissingValue {
        /// The leaf operator.
        operator: String,
    },

    /// A group operator was given without `rules`.
    #[error("group operator `{operator}` requires `rules`")]
    MissingRules {
        /// The group operator.
        operator: String,
    },

    /// A `not` group must have exactly one child.
    #[error("`not` requires exactly one rule, found {found}")]
    NotArity {
        /// How many rules were supplied.
        found: usize,
    },

    /// The tree exceeds the maximum nesting depth.
    #[error("condition tree exceeds maximum depth of {max}")]
    TooDeep {
        /// The depth limit.
        max: usize,
    },
}

/// Result type for condition decoding.
pub type ConditionResult<T> = Result<T, ConditionError>;
