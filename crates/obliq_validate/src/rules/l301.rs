//! L301: duplicate sheet-label sink — two sinks share a `signal_name` within
//! the same scope.

use std::collections::HashMap;

use obliq_diagnostics::{codes, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use obliq_ir::{ArenaId, BlockKind, Model, Sheet};

use crate::helpers::sibling_scope;
use crate::ValidationRule;

/// Rejects two `sheet_label_sink` blocks in the same scope sharing a name.
///
/// Runs once per sheet but reasons over the whole scope, so a sink is only
/// reported from the sheet it lives on (the lowest-id sheet among
/// duplicates) to avoid reporting the same conflict twice.
pub struct DuplicateSheetLabelSink;

impl ValidationRule for DuplicateSheetLabelSink {
    fn code(&self) -> DiagnosticCode {
        codes::DUPLICATE_SHEET_LABEL_SINK
    }

    fn name(&self) -> &str {
        "duplicate-sheet-label-sink"
    }

    fn description(&self) -> &str {
        "two sheet-label sinks in the same scope share a signal name"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, sheet: &Sheet, model: &Model, sink: &DiagnosticSink) {
        let scope = sibling_scope(model, sheet.id);
        // Only the scope's first sheet (by id) drives the check, so the
        // conflict is reported exactly once rather than once per sibling.
        if scope.iter().min_by_key(|s| s.as_raw()) != Some(&sheet.id) {
            return;
        }

        let mut seen: HashMap<obliq_common::Ident, obliq_source::Span> = HashMap::new();
        for &sheet_id in &scope {
            let Some(s) = model.sheet(sheet_id) else { continue };
            for (_id, block) in s.blocks.iter() {
                let BlockKind::SheetLabelSink(p) = &block.kind else { continue };
                if let Some(_first_span) = seen.get(&p.signal_name) {
                    sink.emit(
                        Diagnostic::error(self.code(), "duplicate sheet-label sink name in scope", block.span)
                            .with_label(Label::primary(block.span, "another sink in this scope already uses this name")),
                    );
                } else {
                    seen.insert(p.signal_name, block.span);
                }
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

    fn mk_model(names: Vec<Ident>) -> (Sheet, Model) {
        let mut blocks = Arena::new();
        for (i, name) in names.into_iter().enumerate() {
            blocks.alloc(Block {
                id: BlockId::from_raw(i as u32),
                kind: BlockKind::SheetLabelSink(SheetLabelParams { signal_name: name }),
                name: Ident::from_raw(i as u32),
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
    fn flags_duplicate_names() {
        let (sheet, model) = mk_model(vec![Ident::from_raw(10), Ident::from_raw(10)]);
        let sink = DiagnosticSink::new();
        DuplicateSheetLabelSink.check_sheet(&sheet, &model, &sink);
        assert_eq!(sink.take_all().len(), 1);
    }

    #[test]
    fn distinct_names_pass() {
        let (sheet, model) = mk_model(vec![Ident::from_raw(10), Ident::from_raw(11)]);
        let sink = DiagnosticSink::new();
        DuplicateSheetLabelSink.check_sheet(&sheet, &model, &sink);
        assert!(sink.take_all().is_empty());
    }
}
