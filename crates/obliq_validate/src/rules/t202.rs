//! T202: dimension mismatch — incompatible vector/matrix shapes at a block's inputs.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{BlockKind, Model, Sheet};

use crate::helpers::{input_type, shape_matrix_multiply};
use crate::ValidationRule;

/// Checks shape-sensitive blocks: `matrix_multiply`'s two inputs must satisfy
/// §4.3's shape table, and `sum`/`multiply`/`if` require their inputs to
/// share the exact same [`obliq_ir::SignalType`] shape (not just base type).
pub struct DimensionMismatch;

impl ValidationRule for DimensionMismatch {
    fn code(&self) -> DiagnosticCode {
        codes::DIMENSION_MISMATCH
    }

    fn name(&self) -> &str {
        "dimension-mismatch"
    }

    fn description(&self) -> &str {
        "a block's inputs have incompatible vector/matrix shapes"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        for (_id, block) in sheet.blocks.iter() {
            match &block.kind {
                BlockKind::MatrixMultiply => {
                    let a = input_type(model, sheet, block.id, 0);
                    let b = input_type(model, sheet, block.id, 1);
                    if let (Some(a), Some(b)) = (a, b) {
                        if shape_matrix_multiply(&a, &b).is_none() {
                            self.flag(block.span, sink);
                        }
                    }
                }
                BlockKind::Sum(_) | BlockKind::Multiply(_) | BlockKind::If => {
                    let counts = obliq_ir::port_counts(&block.kind);
                    let mut shape = None;
                    for i in 0..counts.inputs as i32 {
                        if let BlockKind::If = &block.kind {
                            // ports 0 and 1 carry the selected value; port 2 is the scalar control.
                            if i == 2 {
                                continue;
                            }
                        }
                        let Some(ty) = input_type(model, sheet, block.id, i) else { continue };
                        match &shape {
                            None => shape = Some(ty),
                            Some(prev) if prev.is_array() != ty.is_array() || prev.is_matrix() != ty.is_matrix() => {
                                self.flag(block.span, sink);
                                break;
                            }
                            Some(prev) if prev != &ty && (prev.is_array() || prev.is_matrix()) => {
                                self.flag(block.span, sink);
                                break;
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl DimensionMismatch {
    fn flag(&self, span: obliq_source::Span, sink: &DiagnosticSink) {
        sink.emit(
            Diagnostic::error(self.code(), "inputs have incompatible shapes", span)
                .with_label(Label::primary(span, "shape mismatch between inputs")),
        );
    }
}
