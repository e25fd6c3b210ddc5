//! S107: unknown subsystem port — an interior port block names a port the
//! owning subsystem never declared.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{BlockKind, Model, Sheet};

use crate::ValidationRule;

/// Checks that every `input_port`/`output_port` block inside a subsystem's
/// sheets names a port the subsystem actually declares.
pub struct UnknownSubsystemPort;

impl ValidationRule for UnknownSubsystemPort {
    fn code(&self) -> DiagnosticCode {
        codes::UNKNOWN_SUBSYSTEM_PORT
    }

    fn name(&self) -> &str {
        "unknown-subsystem-port"
    }

    fn description(&self) -> &str {
        "an interior port block names a port its subsystem did not declare"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        for (_id, block) in sheet.blocks.iter() {
            let BlockKind::Subsystem(params) = &block.kind else { continue };
            for sheet_id in &params.sheets {
                let Some(inner) = model.sheet(*sheet_id) else { continue };
                for (_inner_id, inner_block) in inner.blocks.iter() {
                    let name = match &inner_block.kind {
                        BlockKind::InputPort(p) => Some((p.port_name, &params.input_ports)),
                        BlockKind::OutputPort(p) => Some((p.port_name, &params.output_ports)),
                        _ => None,
                    };
                    let Some((port_name, declared)) = name else { continue };
                    if !declared.contains(&port_name) {
                        sink.emit(
                            Diagnostic::error(
                                self.code(),
                                "port block names a port its subsystem did not declare",
                                inner_block.span,
                            )
                            .with_label(Label::primary(inner_block.span, "not among the subsystem's declared ports")),
                        );
                    }
                }
            }
        }
    }
}
