//! Parsing and validation of `obliq.toml` engine settings.
//!
//! This crate reads the optional settings file and produces a strongly-typed
//! [`EngineSettings`] carrying fixed-step simulation defaults, RK4 divergence
//! guards, and the validator's warnings-as-errors policy. It is the only
//! ambient configuration surface the engine has — there is no project
//! manifest, target, or dependency concept here.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_settings, load_settings_from_str};
pub use types::*;
