//! Fixed-step simulation of a flattened block-diagram model.
//!
//! Each step runs an algebraic pass in topological order, then integrates
//! every stateful `transfer_function`'s continuous state with classical
//! RK4, re-running the algebraic pass at each of the four stages so
//! coupled integrators see each other's intermediate values. See
//! [`schedule`] for how the topological order is built and algebraic loops
//! are detected, and [`kernel`] for the step loop itself.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod kernel;
pub mod log;
pub mod schedule;

pub use config::{ExternalInputs, InputSeries, SimConfig};
pub use error::SimError;
pub use kernel::{zero_value, SimKernel, SimResult};
pub use log::{Phase, PhaseExecutionLogEntry};

use obliq_flatten::FlattenedModel;

/// Runs `flattened` to completion under `config` and returns its result.
pub fn simulate(flattened: &FlattenedModel, config: SimConfig) -> Result<SimResult, SimError> {
    let mut kernel = SimKernel::new(flattened, config)?;
    kernel.run()?;
    Ok(kernel.finish())
}
