//! S104: unknown block type.
//!
//! Block kinds are a closed Rust enum ([`obliq_ir::BlockKind`]); an unknown
//! `type` string can only arise while deserializing the external model
//! format, before a [`Model`] exists. This rule is registered so the
//! diagnostic code still appears in the validation result's rule catalog,
//! but it has nothing to check once a [`Model`] has been built.

use obliq_diagnostics::{codes, DiagnosticCode, DiagnosticSink, Severity};
use obliq_ir::{Model, Sheet};

use crate::ValidationRule;

/// A placeholder for the deserialization-time "unknown block type" check.
pub struct UnknownBlockType;

impl ValidationRule for UnknownBlockType {
    fn code(&self) -> DiagnosticCode {
        codes::UNKNOWN_BLOCK_TYPE
    }

    fn name(&self) -> &str {
        "unknown-block-type"
    }

    fn description(&self) -> &str {
        "model references a block type that does not exist"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check_sheet(&self, _sheet: &Sheet, _model: &Model, _sink: &DiagnosticSink) {}
}
