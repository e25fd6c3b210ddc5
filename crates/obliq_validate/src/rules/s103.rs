//! S103: duplicate connection — the same (source, target) port pair wired twice.

use std::collections::HashSet;

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{Model, PortAddr, Sheet};

use crate::ValidationRule;

/// Rejects two wires that connect the exact same source port to the exact
/// same target port. This is distinct from [`crate::rules::s102`]'s check,
/// which flags any two wires sharing a target regardless of source.
pub struct DuplicateConnection;

impl ValidationRule for DuplicateConnection {
    fn code(&self) -> DiagnosticCode {
        codes::DUPLICATE_CONNECTION
    }

    fn name(&self) -> &str {
        "duplicate-connection"
    }

    fn description(&self) -> &str {
        "the same source and target ports are wired together more than once"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, _model: &Model, sink: &DiagnosticSink) {
        let mut seen: HashSet<(PortAddr, PortAddr)> = HashSet::new();
        for wire in &sheet.wires {
            let pair = (wire.source_port, wire.target_port);
            if !seen.insert(pair) {
                let Some(block) = sheet.block(wire.target_port.block) else { continue };
                sink.emit(
                    Diagnostic::error(self.code(), "duplicate wire between the same two ports", block.span)
                        .with_label(Label::primary(block.span, "already wired from this source")),
                );
            }
        }
    }
}
