// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error type for variable resolution and rule evaluation.
///
/// Variants are raised deep in segment resolution or condition evaluation
/// and travel up wrapped in [`anyhow::Error`] chains, so callers can either
/// display the full causal chain or downcast to inspect the leaf.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A context was asked to resolve before a submission was supplied.
    #[error("resolution context requires a submission")]
    MissingSubmission,
    /// A context was asked to resolve with an empty request-header map.
    #[error("resolution context requires a map of request headers")]
    MissingHeaders,
    /// A path segment landed on a value whose shape cannot be walked.
    #[error("'{path}' resolved to {actual}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: String,
    },
    /// A dereference URI does not point at a policy or a repository.
    #[error("expected a policy or repository reference, got '{0}'")]
    UnrecognizedEntityType(String),
    /// A source string could not be parsed into an object reference.
    #[error("unable to parse '{0}': {1}")]
    ParseError(String, String),
    /// A condition names a combinator that is not registered.
    #[error("unknown condition '{0}'")]
    UnknownCondition(String),
    /// A condition operand resolved to several values where one was needed.
    #[error("'{0}' is multi-valued, expected a single value")]
    MultiValuedWhereScalarExpected(String),
    /// A combinator was given operands of the wrong shape or arity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
