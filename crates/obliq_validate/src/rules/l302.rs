//! L302: sheet-label unmatched — a source has no matching sink in its scope.

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{BlockKind, Model, Sheet};

use crate::helpers::sibling_scope;
use crate::ValidationRule;

/// Checks that every `sheet_label_source` has a matching `sheet_label_sink`
/// (same `signal_name`) somewhere in its scope.
pub struct SheetLabelUnmatched;

impl ValidationRule for SheetLabelUnmatched {
    fn code(&self) -> DiagnosticCode {
        codes::SHEET_LABEL_UNMATCHED
    }

    fn name(&self) -> &str {
        "sheet-label-unmatched"
    }

    fn description(&self) -> &str {
        "a sheet-label source has no matching sink in its scope"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        let scope = sibling_scope(model, sheet.id);

        for (_id, block) in sheet.blocks.iter() {
            let BlockKind::SheetLabelSource(p) = &block.kind else { continue };
            let matched = scope.iter().any(|&sheet_id| {
                model.sheet(sheet_id).is_some_and(|s| {
                    s.blocks.values().any(|b| {
                        matches!(&b.kind, BlockKind::SheetLabelSink(sink_p) if sink_p.signal_name == p.signal_name)
                    })
                })
            });
            if !matched {
                sink.emit(
                    Diagnostic::error(self.code(), "sheet-label source has no matching sink in scope", block.span)
                        .with_label(Label::primary(block.span, "no sink with this name in scope")),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_common::Ident;
    use obliq_ir::{Arena, ArenaId, Block, BlockId, Position, SheetLabelParams};
    use obliq_source::Span;

    fn mk_model(source_name: Ident, sink_name: Option<Ident>) -> (Sheet, Model) {
        let mut blocks = Arena::new();
        blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::SheetLabelSource(SheetLabelParams { signal_name: source_name }),
            name: Ident::from_raw(0),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        });
        if let Some(name) = sink_name {
            blocks.alloc(Block {
                id: BlockId::from_raw(1),
                kind: BlockKind::SheetLabelSink(SheetLabelParams { signal_name: name }),
                name: Ident::from_raw(1),
                position: Position { x: 0.0, y: 0.0 },
                span: Span::DUMMY,
            });
        }
        let sheet = Sheet {
            id: obliq_ir::SheetId::from_raw(0),
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
    fn flags_unmatched_source() {
        let (sheet, model) = mk_model(Ident::from_raw(5), None);
        let sink = DiagnosticSink::new();
        SheetLabelUnmatched.check_sheet(&sheet, &model, &sink);
        assert_eq!(sink.take_all().len(), 1);
    }

    #[test]
    fn matched_source_passes() {
        let (sheet, model) = mk_model(Ident::from_raw(5), Some(Ident::from_raw(5)));
        let sink = DiagnosticSink::new();
        SheetLabelUnmatched.check_sheet(&sheet, &model, &sink);
        assert!(sink.take_all().is_empty());
    }
}
