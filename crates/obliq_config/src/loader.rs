//! Engine settings file loading and validation.

use crate::error::ConfigError;
use crate::types::EngineSettings;
use std::path::Path;

/// Loads and validates `obliq.toml` engine settings from a project directory.
///
/// A missing file is not an error at this level — callers that want defaults
/// when no file exists should check [`Path::exists`] first and fall back to
/// [`EngineSettings::default`].
pub fn load_settings(project_dir: &Path) -> Result<EngineSettings, ConfigError> {
    let settings_path = project_dir.join("obliq.toml");
    let content = std::fs::read_to_string(&settings_path)?;
    load_settings_from_str(&content)
}

/// Parses and validates engine settings from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_settings_from_str(content: &str) -> Result<EngineSettings, ConfigError> {
    let settings: EngineSettings =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Validates that settings values are physically sensible.
fn validate_settings(settings: &EngineSettings) -> Result<(), ConfigError> {
    if settings.simulation.default_time_step <= 0.0 {
        return Err(ConfigError::ValidationError(
            "simulation.default_time_step must be positive".to_string(),
        ));
    }
    if settings.simulation.default_duration <= 0.0 {
        return Err(ConfigError::ValidationError(
            "simulation.default_duration must be positive".to_string(),
        ));
    }
    if settings.integration.max_derivative_magnitude <= 0.0 {
        return Err(ConfigError::ValidationError(
            "integration.max_derivative_magnitude must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_settings() {
        let settings = load_settings_from_str("").unwrap();
        assert_eq!(settings.simulation.default_time_step, 0.01);
    }

    #[test]
    fn parse_full_settings() {
        let toml = r#"
[simulation]
default_time_step = 0.005
default_duration = 2.0

[integration]
max_derivative_magnitude = 1.0e8

[validation]
treat_warnings_as_errors = true
"#;
        let settings = load_settings_from_str(toml).unwrap();
        assert_eq!(settings.simulation.default_time_step, 0.005);
        assert_eq!(settings.simulation.default_duration, 2.0);
        assert_eq!(settings.integration.max_derivative_magnitude, 1.0e8);
        assert!(settings.validation.treat_warnings_as_errors);
    }

    #[test]
    fn zero_time_step_errors() {
        let toml = r#"
[simulation]
default_time_step = 0.0
"#;
        let err = load_settings_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn negative_duration_errors() {
        let toml = r#"
[simulation]
default_duration = -1.0
"#;
        let err = load_settings_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let toml = "this is not valid toml {{{}}}";
        let err = load_settings_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_settings(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
