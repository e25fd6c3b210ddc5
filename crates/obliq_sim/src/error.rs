//! Simulation error types for the fixed-step block-diagram engine.

use obliq_common::InternalError;

/// Errors that can occur while setting up or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// `simulation_time_step` is not a finite positive number.
    #[error("simulation_time_step must be positive, got {0}")]
    NonPositiveTimeStep(f64),

    /// `simulation_duration` is negative.
    #[error("simulation_duration must be non-negative, got {0}")]
    NegativeDuration(f64),

    /// The model's main sheet has no blocks to simulate.
    #[error("model has no blocks to simulate")]
    EmptyModel,

    /// A bug surfaced while stepping a block that a validated, flattened
    /// model should never trigger (malformed wiring is `obliq_validate`'s
    /// job, not this crate's).
    #[error(transparent)]
    Internal(#[from] InternalError),
}
