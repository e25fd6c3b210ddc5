//! S101: self-connection — a wire whose source and target are the same block.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{Model, Sheet};

use crate::ValidationRule;

/// Rejects wires that feed a block's output back into one of its own inputs.
pub struct SelfConnection;

impl ValidationRule for SelfConnection {
    fn code(&self) -> DiagnosticCode {
        codes::SELF_CONNECTION
    }

    fn name(&self) -> &str {
        "self-connection"
    }

    fn description(&self) -> &str {
        "wire connects a block's output to one of its own inputs"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, _model: &Model, sink: &DiagnosticSink) {
        for wire in &sheet.wires {
            if wire.source_port.block == wire.target_port.block {
                let Some(block) = sheet.block(wire.source_port.block) else {
                    continue;
                };
                sink.emit(
                    Diagnostic::error(self.code(), "block output wired back into its own input", block.span)
                        .with_label(Label::primary(block.span, "output and input both belong to this block")),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_common::Ident;
    use obliq_ir::{Arena, ArenaId, Block, BlockId, BlockKind, PortAddr, Position, Wire, WireId};
    use obliq_source::Span;

    fn mk_sheet() -> (Sheet, BlockId) {
        let mut blocks = Arena::new();
        let id = blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::Uminus,
            name: Ident::from_raw(0),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
        let sheet = Sheet {
            id: obliq_ir::SheetId::from_raw(0),
            name: Ident::from_raw(0),
            blocks,
            wires: Vec::new(),
            extents: Default::default(),
        };
        (sheet, id)
    }

    fn mk_model(sheet: &Sheet) -> Model {
        let mut sheets = Arena::new();
        sheets.alloc(sheet.clone());
        Model {
            version: "1".to_string(),
            name: Ident::from_raw(0),
            sheets,
            main_sheet: sheet.id,
            global_settings: Default::default(),
        }
    }

    #[test]
    fn flags_self_connection() {
        let (mut sheet, id) = mk_sheet();
        sheet.wires.push(Wire {
            id: WireId::from_raw(0),
            source_port: PortAddr::new(id, 0),
            target_port: PortAddr::new(id, 0),
        });
        let sink = DiagnosticSink::new();
        let model = mk_model(&sheet);
        SelfConnection.check_sheet(&sheet, &model, &sink);
        assert_eq!(sink.take_all().len(), 1);
    }

    #[test]
    fn distinct_blocks_pass() {
        let (mut sheet, id) = mk_sheet();
        let other = sheet.blocks.alloc(Block {
            id: BlockId::from_raw(1),
            kind: BlockKind::Uminus,
            name: Ident::from_raw(1),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
        sheet.wires.push(Wire {
            id: WireId::from_raw(0),
            source_port: PortAddr::new(id, 0),
            target_port: PortAddr::new(other, 0),
        });
        let sink = DiagnosticSink::new();
        let model = mk_model(&sheet);
        SelfConnection.check_sheet(&sheet, &model, &sink);
        assert!(sink.take_all().is_empty());
    }
}
