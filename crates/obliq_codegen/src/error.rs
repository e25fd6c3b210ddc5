//! Errors that can occur while emitting a C99 library from a flattened model.

use obliq_common::InternalError;

/// Errors produced by [`crate::generate`].
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// The model's main sheet has no blocks to emit.
    #[error("model has no blocks to emit")]
    EmptyModel,

    /// A bug surfaced while walking a flattened model that a validated model
    /// should never trigger.
    #[error(transparent)]
    Internal(#[from] InternalError),
}
