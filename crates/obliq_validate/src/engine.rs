//! Validation engine that runs every built-in rule over a model.

use obliq_config::ValidationPolicy;
use obliq_diagnostics::{DiagnosticSink, Severity};
use obliq_ir::Model;

use crate::rules::register_builtin_rules;
use crate::ValidationRule;

/// Runs the full set of structural, type, and sheet-label rules over a model.
///
/// Rules are registered at construction time and run over every sheet. When
/// `policy.treat_warnings_as_errors` is set, every warning-severity
/// diagnostic any rule emits is promoted to an error before reaching the
/// caller's sink.
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
    policy: ValidationPolicy,
}

impl ValidationEngine {
    /// Creates a new engine with all builtin rules registered, governed by `policy`.
    pub fn new(policy: ValidationPolicy) -> Self {
        let mut engine = Self { rules: Vec::new(), policy };
        register_builtin_rules(&mut engine);
        engine
    }

    /// Creates a new engine with default policy (warnings stay warnings).
    pub fn with_defaults() -> Self {
        Self::new(ValidationPolicy::default())
    }

    /// Registers an additional rule with the engine.
    pub fn register(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// Returns the number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns the names of all registered rules.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Runs every registered rule over every sheet in `model`.
    pub fn run(&self, model: &Model, sink: &DiagnosticSink) {
        for (_sheet_id, sheet) in model.sheets.iter() {
            for rule in &self.rules {
                let temp_sink = DiagnosticSink::new();
                rule.check_sheet(sheet, model, &temp_sink);

                for mut diag in temp_sink.take_all() {
                    if self.policy.treat_warnings_as_errors && diag.severity == Severity::Warning {
                        diag.severity = Severity::Error;
                    }
                    sink.emit(diag);
                }
            }
        }
    }
}
