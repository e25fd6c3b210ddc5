//! Engine settings types deserialized from `obliq.toml`.

use serde::Deserialize;

/// Top-level engine settings parsed from `obliq.toml`.
///
/// Every section has sane defaults, so an empty or absent file is valid:
/// the engine runs with the settings a bare-bones model would need.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EngineSettings {
    /// Fixed-step simulation defaults, overridable per model by `globalSettings`.
    #[serde(default)]
    pub simulation: SimulationDefaults,
    /// Guards applied during the RK4 integration phase.
    #[serde(default)]
    pub integration: IntegrationGuards,
    /// Policy controlling how the validator and simulator treat soft issues.
    #[serde(default)]
    pub validation: ValidationPolicy,
}

/// Default fixed-step parameters used when a model's `globalSettings` omits them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationDefaults {
    /// Default `dt` in seconds.
    pub default_time_step: f64,
    /// Default run duration in seconds.
    pub default_duration: f64,
}

impl Default for SimulationDefaults {
    fn default() -> Self {
        Self {
            default_time_step: 0.01,
            default_duration: 10.0,
        }
    }
}

/// Guards the integration phase uses to detect a diverging continuous state.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntegrationGuards {
    /// A derivative whose magnitude exceeds this value aborts the RK4 stage
    /// and rolls back the step, per the simulation engine's divergence check.
    pub max_derivative_magnitude: f64,
}

impl Default for IntegrationGuards {
    fn default() -> Self {
        Self {
            max_derivative_magnitude: 1.0e10,
        }
    }
}

/// Controls how validation warnings are treated by callers that want strict runs.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationPolicy {
    /// When set, any validation warning (e.g. an unmatched sheet-label
    /// source, a literal-zero division in an `evaluate` expression) is
    /// escalated to a hard validation failure.
    pub treat_warnings_as_errors: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_settings_from_str;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = load_settings_from_str("").unwrap();
        assert_eq!(settings.simulation.default_time_step, 0.01);
        assert_eq!(settings.simulation.default_duration, 10.0);
        assert_eq!(settings.integration.max_derivative_magnitude, 1.0e10);
        assert!(!settings.validation.treat_warnings_as_errors);
    }

    #[test]
    fn partial_override() {
        let toml = r#"
[simulation]
default_time_step = 0.001
"#;
        let settings = load_settings_from_str(toml).unwrap();
        assert_eq!(settings.simulation.default_time_step, 0.001);
        assert_eq!(settings.simulation.default_duration, 10.0);
    }

    #[test]
    fn validation_policy_toggle() {
        let toml = r#"
[validation]
treat_warnings_as_errors = true
"#;
        let settings = load_settings_from_str(toml).unwrap();
        assert!(settings.validation.treat_warnings_as_errors);
    }
}
