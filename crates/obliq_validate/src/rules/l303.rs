//! L303: empty sheet-label name.
//!
//! A sheet-label's `signal_name` is interned to an [`obliq_common::Ident`]
//! before a [`Model`] exists, and a [`Model`] does not carry the interner
//! needed to resolve it back to text. Emptiness is therefore checked at the
//! external-format boundary, while the string is still in hand, not here.
//! This rule is registered so the diagnostic code appears in the
//! validation result's rule catalog.

use obliq_diagnostics::{codes, DiagnosticCode, DiagnosticSink, Severity};
use obliq_ir::{Model, Sheet};

use crate::ValidationRule;

/// A placeholder for the deserialization-time "empty sheet-label name" check.
pub struct EmptySheetLabelName;

impl ValidationRule for EmptySheetLabelName {
    fn code(&self) -> DiagnosticCode {
        codes::EMPTY_SHEET_LABEL_NAME
    }

    fn name(&self) -> &str {
        "empty-sheet-label-name"
    }

    fn description(&self) -> &str {
        "a sheet-label sink or source has an empty signal name"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check_sheet(&self, _sheet: &Sheet, _model: &Model, _sink: &DiagnosticSink) {}
}
