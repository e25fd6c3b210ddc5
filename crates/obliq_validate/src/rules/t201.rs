//! T201: type mismatch — a wire's source and target expect incompatible base types.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{Model, Sheet};

use crate::helpers::{input_type, output_type};
use crate::ValidationRule;

/// Checks that every wire's source and target ports carry the same base type.
///
/// Dimension compatibility (vector/matrix shapes) is [`crate::rules::t202`]'s
/// concern; this rule only compares [`obliq_ir::BaseType`].
pub struct TypeMismatch;

impl ValidationRule for TypeMismatch {
    fn code(&self) -> DiagnosticCode {
        codes::TYPE_MISMATCH
    }

    fn name(&self) -> &str {
        "type-mismatch"
    }

    fn description(&self) -> &str {
        "a wire connects ports with incompatible base types"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        for wire in &sheet.wires {
            let Some(source_block) = sheet.block(wire.source_port.block) else { continue };
            let Some(src_ty) = output_type(model, sheet, source_block) else { continue };
            let Some(tgt_ty) = input_type(model, sheet, wire.target_port.block, wire.target_port.index) else {
                continue;
            };
            if src_ty.base() != tgt_ty.base() {
                let Some(target_block) = sheet.block(wire.target_port.block) else { continue };
                sink.emit(
                    Diagnostic::error(
                        self.code(),
                        format!("cannot connect {:?} output to {:?} input", src_ty.base(), tgt_ty.base()),
                        target_block.span,
                    )
                    .with_label(Label::primary(target_block.span, "incompatible base type")),
                );
            }
        }
    }
}
