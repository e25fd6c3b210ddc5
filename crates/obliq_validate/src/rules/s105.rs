//! S105: port index out of range — a wire addresses a port index a block doesn't have.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{port_counts, Model, PortAddr, Sheet};

use crate::ValidationRule;

/// Checks every wire endpoint against the block's declared port counts.
pub struct PortIndexOutOfRange;

impl PortIndexOutOfRange {
    fn check_port(&self, sheet: &Sheet, port: PortAddr, is_target: bool, sink: &DiagnosticSink) {
        let Some(block) = sheet.block(port.block) else { return };
        let counts = port_counts(&block.kind);

        if is_target && port.index == -1 {
            // Enable port; legality of `-1` itself is a subsystem concern, not an index bound.
            return;
        }

        let in_range = if is_target {
            (port.index as u32) < counts.inputs
        } else {
            (port.index as u32) < counts.outputs
        };

        if port.index < 0 || !in_range {
            sink.emit(
                Diagnostic::error(
                    self.code(),
                    format!("port index {} is out of range for this block", port.index),
                    block.span,
                )
                .with_label(Label::primary(block.span, "index out of range")),
            );
        }
    }
}

impl ValidationRule for PortIndexOutOfRange {
    fn code(&self) -> DiagnosticCode {
        codes::PORT_INDEX_OUT_OF_RANGE
    }

    fn name(&self) -> &str {
        "port-index-out-of-range"
    }

    fn description(&self) -> &str {
        "a wire addresses a port index that does not exist on the block"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, _model: &Model, sink: &DiagnosticSink) {
        for wire in &sheet.wires {
            self.check_port(sheet, wire.source_port, false, sink);
            self.check_port(sheet, wire.target_port, true, sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_common::Ident;
    use obliq_ir::{Arena, ArenaId, BaseType, Block, BlockId, BlockKind, Position, ScaleParams, SignalType, Wire, WireId};
    use obliq_source::Span;

    fn mk_model_with(wires: Vec<Wire>) -> (Sheet, Model) {
        let mut blocks = Arena::new();
        blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::Source(obliq_ir::SourceParams {
                output_type: SignalType::Scalar { base: BaseType::Double },
                variant: obliq_ir::SourceVariant::Constant { value: 1.0 },
            }),
            name: Ident::from_raw(0),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
        blocks.alloc(Block {
            id: BlockId::from_raw(1),
            kind: BlockKind::Scale(ScaleParams { gain: 2.0 }),
            name: Ident::from_raw(1),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
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
    fn flags_out_of_range_input() {
        let (sheet, model) = mk_model_with(vec![Wire {
            id: WireId::from_raw(0),
            source_port: PortAddr::new(BlockId::from_raw(0), 0),
            target_port: PortAddr::new(BlockId::from_raw(1), 3),
        }]);
        let sink = DiagnosticSink::new();
        PortIndexOutOfRange.check_sheet(&sheet, &model, &sink);
        assert_eq!(sink.take_all().len(), 1);
    }

    #[test]
    fn in_range_passes() {
        let (sheet, model) = mk_model_with(vec![Wire {
            id: WireId::from_raw(0),
            source_port: PortAddr::new(BlockId::from_raw(0), 0),
            target_port: PortAddr::new(BlockId::from_raw(1), 0),
        }]);
        let sink = DiagnosticSink::new();
        PortIndexOutOfRange.check_sheet(&sheet, &model, &sink);
        assert!(sink.take_all().is_empty());
    }
}
