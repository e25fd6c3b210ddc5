//! T204: bool required — a subsystem's enable input received a non-`bool` signal.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{BaseType, BlockKind, Model, Sheet, SignalType};

use crate::helpers::input_type;
use crate::ValidationRule;

/// Checks that a subsystem's enable port (index `-1`), when present, only
/// ever receives a `bool` scalar.
pub struct BoolRequired;

impl ValidationRule for BoolRequired {
    fn code(&self) -> DiagnosticCode {
        codes::BOOL_REQUIRED
    }

    fn name(&self) -> &str {
        "bool-required"
    }

    fn description(&self) -> &str {
        "a subsystem's enable input received a non-bool signal"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        for (_id, block) in sheet.blocks.iter() {
            let BlockKind::Subsystem(params) = &block.kind else { continue };
            if !params.show_enable_input {
                continue;
            }
            let Some(ty) = input_type(model, sheet, block.id, -1) else { continue };
            if ty != (SignalType::Scalar { base: BaseType::Bool }) {
                sink.emit(
                    Diagnostic::error(self.code(), "enable input must be a scalar bool", block.span)
                        .with_label(Label::primary(block.span, "enable port expects bool")),
                );
            }
        }
    }
}
