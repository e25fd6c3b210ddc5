//! S106: missing sheet — a subsystem references a sheet id that does not exist.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{BlockKind, Model, Sheet};

use crate::ValidationRule;

/// Checks that every sheet id a subsystem owns actually exists in the model.
pub struct MissingSheet;

impl ValidationRule for MissingSheet {
    fn code(&self) -> DiagnosticCode {
        codes::MISSING_SHEET
    }

    fn name(&self) -> &str {
        "missing-sheet"
    }

    fn description(&self) -> &str {
        "subsystem references a sheet that does not exist in the model"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        for (_id, block) in sheet.blocks.iter() {
            let BlockKind::Subsystem(params) = &block.kind else { continue };
            for sheet_id in &params.sheets {
                if model.sheet(*sheet_id).is_none() {
                    sink.emit(
                        Diagnostic::error(self.code(), "subsystem references a nonexistent sheet", block.span)
                            .with_label(Label::primary(block.span, "sheet id not found in model")),
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
    use obliq_ir::{Arena, ArenaId, Block, BlockId, Position, SheetId, SubsystemParams};
    use obliq_source::Span;

    fn mk_model(subsystem_sheets: Vec<SheetId>) -> (Sheet, Model) {
        let mut blocks = Arena::new();
        blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::Subsystem(SubsystemParams {
                sheets: subsystem_sheets,
                input_ports: Vec::new(),
                output_ports: Vec::new(),
                show_enable_input: false,
            }),
            name: Ident::from_raw(0),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
        let sheet = Sheet {
            id: SheetId::from_raw(0),
            name: Ident::from_raw(0),
            blocks,
            wires: Vec::new(),
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
    fn flags_nonexistent_sheet() {
        let (sheet, model) = mk_model(vec![SheetId::from_raw(99)]);
        let sink = DiagnosticSink::new();
        MissingSheet.check_sheet(&sheet, &model, &sink);
        assert_eq!(sink.take_all().len(), 1);
    }

    #[test]
    fn existing_sheet_passes() {
        let (sheet, model) = mk_model(vec![SheetId::from_raw(0)]);
        let sink = DiagnosticSink::new();
        MissingSheet.check_sheet(&sheet, &model, &sink);
        assert!(sink.take_all().is_empty());
    }
}
