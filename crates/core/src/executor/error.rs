//! Error types for the executor module.

use thiserror::Error;

/// Errors from a stage executor invocation.
///
/// The coordinator treats every variant as a failed attempt and applies the
/// stage retry policy; the executor never crashes the pipeline.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor did not answer within the configured timeout.
    #[error("stage executor timed out")]
    Timeout,

    /// The executor endpoint could not be reached.
    #[error("stage executor unreachable: {0}")]
    ConnectionFailed(String),

    /// The executor answered with a failure status.
    #[error("stage executor error: {0}")]
    Api(String),

    /// The executor answered with a payload that does not match the contract.
    #[error("invalid stage executor response: {0}")]
    InvalidResponse(String),
}
