//! S102: port already connected — more than one wire terminates at the same input.

use std::collections::HashMap;

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{Model, PortAddr, Sheet};

use crate::ValidationRule;

/// Enforces that each input (or enable) port receives at most one wire.
pub struct PortAlreadyConnected;

impl ValidationRule for PortAlreadyConnected {
    fn code(&self) -> DiagnosticCode {
        codes::PORT_ALREADY_CONNECTED
    }

    fn name(&self) -> &str {
        "port-already-connected"
    }

    fn description(&self) -> &str {
        "an input port is the target of more than one wire"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, _model: &Model, sink: &DiagnosticSink) {
        let mut seen: HashMap<PortAddr, usize> = HashMap::new();
        for wire in &sheet.wires {
            *seen.entry(wire.target_port).or_insert(0) += 1;
        }
        for (port, count) in seen {
            if count <= 1 {
                continue;
            }
            let Some(block) = sheet.block(port.block) else { continue };
            sink.emit(
                Diagnostic::error(
                    self.code(),
                    format!("input port {} has {} incoming wires", port.index, count),
                    block.span,
                )
                .with_label(Label::primary(block.span, "conflicting wires target this port")),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_common::Ident;
    use obliq_ir::{Arena, ArenaId, Block, BlockId, BlockKind, Position, Wire, WireId};
    use obliq_source::Span;

    fn mk_model_with(wires: Vec<Wire>) -> (Sheet, Model) {
        let mut blocks = Arena::new();
        for i in 0..3 {
            blocks.alloc(Block {
                id: BlockId::from_raw(i),
                kind: BlockKind::Uminus,
                name: Ident::from_raw(i),
                position: Position { x: 0.0, y: 0.0 },
                span: Span::DUMMY,
            });
        }
        let sheet = Sheet {
            id: obliq_ir::SheetId::from_raw(0),
            name: Ident::from_raw(0),
            blocks,
            wires,
            extents: Default::default(),
        };
        let mut sheets = Arena::new();
        sheets.alloc(sheet.clone());
        let model = Model {
            version: "1".to_string(),
            name: Ident::from_raw(0),
            sheets,
            main_sheet: sheet.id,
            global_settings: Default::default(),
        };
        (sheet, model)
    }

    #[test]
    fn flags_double_connected_input() {
        let (sheet, model) = mk_model_with(vec![
            Wire {
                id: WireId::from_raw(0),
                source_port: PortAddr::new(BlockId::from_raw(1), 0),
                target_port: PortAddr::new(BlockId::from_raw(0), 0),
            },
            Wire {
                id: WireId::from_raw(1),
                source_port: PortAddr::new(BlockId::from_raw(2), 0),
                target_port: PortAddr::new(BlockId::from_raw(0), 0),
            },
        ]);
        let sink = DiagnosticSink::new();
        PortAlreadyConnected.check_sheet(&sheet, &model, &sink);
        assert_eq!(sink.take_all().len(), 1);
    }

    #[test]
    fn single_wire_per_port_passes() {
        let (sheet, model) = mk_model_with(vec![Wire {
            id: WireId::from_raw(0),
            source_port: PortAddr::new(BlockId::from_raw(1), 0),
            target_port: PortAddr::new(BlockId::from_raw(0), 0),
        }]);
        let sink = DiagnosticSink::new();
        PortAlreadyConnected.check_sheet(&sheet, &model, &sink);
        assert!(sink.take_all().is_empty());
    }
}
