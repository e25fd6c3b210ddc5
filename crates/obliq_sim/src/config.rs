//! Run configuration and the external `input_port` feed.

use std::collections::HashMap;

use obliq_blocks::Value;
use obliq_common::Ident;

/// A single `input_port`'s value as a function of simulation time.
pub enum InputSeries {
    /// The same value for the whole run.
    Constant(Value),
    /// A time-varying signal, sampled once per step.
    TimeVarying(Box<dyn Fn(f64) -> Value>),
}

impl InputSeries {
    /// Samples this series at `time`.
    pub fn sample(&self, time: f64) -> Value {
        match self {
            InputSeries::Constant(v) => v.clone(),
            InputSeries::TimeVarying(f) => f(time),
        }
    }
}

/// External inputs for every `input_port` block, keyed by its declared port
/// name. A model with no `input_port` blocks needs an empty set.
#[derive(Default)]
pub struct ExternalInputs(HashMap<Ident, InputSeries>);

impl ExternalInputs {
    /// An empty input set.
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Registers the series driving the `input_port` named `name`.
    pub fn set(&mut self, name: Ident, series: InputSeries) -> &mut Self {
        self.0.insert(name, series);
        self
    }

    /// Samples the series registered for `name` at `time`, or `0.0` if no
    /// series was registered for it.
    pub fn sample(&self, name: Ident, time: f64) -> Value {
        self.0.get(&name).map(|s| s.sample(time)).unwrap_or(Value::Scalar(0.0))
    }
}

/// Configuration for a simulation run.
///
/// `time_step`/`duration` override the model's own
/// [`obliq_ir::GlobalSettings`] when set, for tests that want a shorter run
/// than the model declares.
#[derive(Default)]
pub struct SimConfig {
    /// Overrides `model.global_settings.simulation_time_step` when set.
    pub time_step: Option<f64>,
    /// Overrides `model.global_settings.simulation_duration` when set.
    pub duration: Option<f64>,
    /// Values for every `input_port` block the model declares.
    pub inputs: ExternalInputs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_input_samples_as_zero() {
        let inputs = ExternalInputs::new();
        assert_eq!(inputs.sample(Ident::from_raw(0), 1.0), Value::Scalar(0.0));
    }

    #[test]
    fn constant_series_ignores_time() {
        let mut inputs = ExternalInputs::new();
        let name = Ident::from_raw(3);
        inputs.set(name, InputSeries::Constant(Value::Scalar(2.5)));
        assert_eq!(inputs.sample(name, 0.0), Value::Scalar(2.5));
        assert_eq!(inputs.sample(name, 99.0), Value::Scalar(2.5));
    }

    #[test]
    fn time_varying_series_samples_the_closure() {
        let mut inputs = ExternalInputs::new();
        let name = Ident::from_raw(5);
        inputs.set(name, InputSeries::TimeVarying(Box::new(|t| Value::Scalar(t * 2.0))));
        assert_eq!(inputs.sample(name, 3.0), Value::Scalar(6.0));
    }

    #[test]
    fn sim_config_default_overrides_nothing() {
        let config = SimConfig::default();
        assert!(config.time_step.is_none());
        assert!(config.duration.is_none());
    }
}
