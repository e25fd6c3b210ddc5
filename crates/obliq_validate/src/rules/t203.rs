//! T203: scalar required — a block that only operates on scalars received a
//! vector or matrix input.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{BlockKind, Model, Sheet};

use crate::helpers::input_type;
use crate::ValidationRule;

/// Checks blocks whose semantics are only defined over scalar inputs:
/// `trig`, `evaluate`, `lookup_1d`/`lookup_2d`, `condition`, `mag`'s shape is
/// checked elsewhere (it *requires* a vector, the inverse rule), and the
/// `if` block's control input (port 2).
pub struct ScalarRequired;

impl ScalarRequired {
    fn requires_scalar_input(kind: &BlockKind, index: i32) -> bool {
        match kind {
            BlockKind::Trig(_) | BlockKind::Evaluate(_) | BlockKind::Condition(_) => true,
            BlockKind::Lookup1d(_) => index == 0,
            BlockKind::Lookup2d(_) => index == 0 || index == 1,
            BlockKind::If => index == 2,
            _ => false,
        }
    }
}

impl ValidationRule for ScalarRequired {
    fn code(&self) -> DiagnosticCode {
        codes::SCALAR_REQUIRED
    }

    fn name(&self) -> &str {
        "scalar-required"
    }

    fn description(&self) -> &str {
        "a block that only accepts scalar inputs received a vector or matrix"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        for (_id, block) in sheet.blocks.iter() {
            let counts = obliq_ir::port_counts(&block.kind);
            for index in 0..counts.inputs as i32 {
                if !Self::requires_scalar_input(&block.kind, index) {
                    continue;
                }
                let Some(ty) = input_type(model, sheet, block.id, index) else { continue };
                if !matches!(ty, obliq_ir::SignalType::Scalar { .. }) {
                    sink.emit(
                        Diagnostic::error(self.code(), "expected a scalar input", block.span)
                            .with_label(Label::primary(block.span, "this input must be scalar")),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_common::Ident;
    use obliq_ir::{
        Arena, ArenaId, BaseType, Block, BlockId, PortAddr, Position, SignalType, SourceParams,
        SourceVariant, TrigOp, TrigParams, Wire, WireId,
    };
    use obliq_source::Span;

    fn mk_model(source_ty: SignalType) -> (Sheet, Model) {
        let mut blocks = Arena::new();
        blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::Source(SourceParams { output_type: source_ty, variant: SourceVariant::Constant { value: 1.0 } }),
            name: Ident::from_raw(0),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
        blocks.alloc(Block {
            id: BlockId::from_raw(1),
            kind: BlockKind::Trig(TrigParams { op: TrigOp::Sin }),
            name: Ident::from_raw(1),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
        let sheet = Sheet {
            id: obliq_ir::SheetId::from_raw(0),
            name: Ident::from_raw(0),
            blocks,
            wires: vec![Wire {
                id: WireId::from_raw(0),
                source_port: PortAddr::new(BlockId::from_raw(0), 0),
                target_port: PortAddr::new(BlockId::from_raw(1), 0),
            }],
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
    fn flags_vector_into_trig() {
        let (sheet, model) = mk_model(SignalType::Vector { base: BaseType::Double, size: 3 });
        let sink = DiagnosticSink::new();
        ScalarRequired.check_sheet(&sheet, &model, &sink);
        assert_eq!(sink.take_all().len(), 1);
    }

    #[test]
    fn scalar_into_trig_passes() {
        let (sheet, model) = mk_model(SignalType::Scalar { base: BaseType::Double });
        let sink = DiagnosticSink::new();
        ScalarRequired.check_sheet(&sheet, &model, &sink);
        assert!(sink.take_all().is_empty());
    }
}
