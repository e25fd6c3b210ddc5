//! Diagnostic codes: a broad category plus the machine-readable slug external
//! callers match on (§6/§7 of the design — `SELF_CONNECTION`, `TYPE_MISMATCH`, …).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The broad category a diagnostic falls into.
///
/// Categories group diagnostics for engine-settings policy (e.g. "promote all
/// `SheetLabel` warnings to errors") without depending on the exact slug.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Wire/connection legality: self-connection, duplicate wires, unknown blocks.
    Structural,
    /// Signal-type propagation and per-block dimensional rules.
    Type,
    /// Sheet-label sink/source matching within a scope.
    SheetLabel,
    /// The §4.2 expression tokenizer/parser/validator.
    Expression,
    /// Failures detected while running the simulator or the code emitter.
    Runtime,
}

impl Category {
    /// Returns the single-character prefix used in the short display form.
    pub fn prefix(self) -> char {
        match self {
            Category::Structural => 'S',
            Category::Type => 'T',
            Category::SheetLabel => 'L',
            Category::Expression => 'X',
            Category::Runtime => 'R',
        }
    }
}

/// A structured diagnostic code: a [`Category`] plus the canonical slug.
///
/// `Display` renders the slug itself (e.g. `SELF_CONNECTION`), since that is
/// the machine-readable `code` field external callers see in §6's
/// `ValidationResult`. [`DiagnosticCode::short`] renders the terminal-style
/// `S101` form used by [`TerminalRenderer`](crate::TerminalRenderer) headers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// Stable numeric id within the category, used only for the short form.
    pub number: u16,
    /// The canonical machine-readable slug, e.g. `"SELF_CONNECTION"`.
    pub slug: &'static str,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16, slug: &'static str) -> Self {
        Self {
            category,
            number,
            slug,
        }
    }

    /// Renders the short `<prefix><number>` form, e.g. `S101`.
    pub fn short(&self) -> String {
        format!("{}{:03}", self.category.prefix(), self.number)
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug)
    }
}

/// The canonical diagnostic codes named in §7 of the design.
pub mod codes {
    use super::{Category, DiagnosticCode};

    /// A wire connects a block's output to one of its own inputs.
    pub const SELF_CONNECTION: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 101, "SELF_CONNECTION");
    /// A second wire targets a port that already has an incoming wire.
    pub const PORT_ALREADY_CONNECTED: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 102, "PORT_ALREADY_CONNECTED");
    /// Two wires carry identical `(source, target)` endpoints.
    pub const DUPLICATE_CONNECTION: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 103, "DUPLICATE_CONNECTION");
    /// A block references a kind not present in the block registry.
    pub const UNKNOWN_BLOCK_TYPE: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 104, "UNKNOWN_BLOCK_TYPE");
    /// A port index is out of range for the owning block's current parameters.
    pub const PORT_INDEX_OUT_OF_RANGE: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 105, "PORT_INDEX_OUT_OF_RANGE");
    /// A subsystem or connection references a sheet id that does not exist.
    pub const MISSING_SHEET: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 106, "MISSING_SHEET");
    /// A connection references a named subsystem port that is not declared.
    pub const UNKNOWN_SUBSYSTEM_PORT: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 107, "UNKNOWN_SUBSYSTEM_PORT");
    /// A catch-all structural failure that does not have a more specific code.
    pub const VALIDATION_FAILED: DiagnosticCode =
        DiagnosticCode::new(Category::Structural, 199, "VALIDATION_FAILED");

    /// Two connected ports carry incompatible base types.
    pub const TYPE_MISMATCH: DiagnosticCode =
        DiagnosticCode::new(Category::Type, 201, "TYPE_MISMATCH");
    /// A block received an input whose array/matrix shape it cannot accept.
    pub const DIMENSION_MISMATCH: DiagnosticCode =
        DiagnosticCode::new(Category::Type, 202, "DIMENSION_MISMATCH");
    /// A non-scalar signal reached a port that requires a scalar.
    pub const SCALAR_REQUIRED: DiagnosticCode =
        DiagnosticCode::new(Category::Type, 203, "SCALAR_REQUIRED");
    /// A `bool`-only port (e.g. an enable input) received a non-`bool` signal.
    pub const BOOL_REQUIRED: DiagnosticCode =
        DiagnosticCode::new(Category::Type, 204, "BOOL_REQUIRED");

    /// A `sheet_label_sink` name repeats within the same scope.
    pub const DUPLICATE_SHEET_LABEL_SINK: DiagnosticCode =
        DiagnosticCode::new(Category::SheetLabel, 301, "DUPLICATE_SHEET_LABEL_SINK");
    /// A `sheet_label_source` has no matching sink in its scope.
    pub const SHEET_LABEL_UNMATCHED: DiagnosticCode =
        DiagnosticCode::new(Category::SheetLabel, 302, "SHEET_LABEL_UNMATCHED");
    /// A sheet label carries an empty `signal_name` (warning-level).
    pub const EMPTY_SHEET_LABEL_NAME: DiagnosticCode =
        DiagnosticCode::new(Category::SheetLabel, 303, "EMPTY_SHEET_LABEL_NAME");

    /// An expression calls a name outside the closed math-function catalog.
    pub const UNKNOWN_FUNCTION: DiagnosticCode =
        DiagnosticCode::new(Category::Expression, 401, "UNKNOWN_FUNCTION");
    /// A function call in an expression has the wrong number of arguments.
    pub const WRONG_ARITY: DiagnosticCode =
        DiagnosticCode::new(Category::Expression, 402, "WRONG_ARITY");
    /// An `in(k)` index is negative or `>=` the block's configured input count.
    pub const IN_INDEX_OUT_OF_RANGE: DiagnosticCode =
        DiagnosticCode::new(Category::Expression, 403, "IN_INDEX_OUT_OF_RANGE");
    /// A bare identifier appears where only `in(k)` or a function call is legal.
    pub const BARE_IDENTIFIER: DiagnosticCode =
        DiagnosticCode::new(Category::Expression, 404, "BARE_IDENTIFIER");
    /// `++`/`--` appear in an expression.
    pub const INCREMENT_DECREMENT_REJECTED: DiagnosticCode =
        DiagnosticCode::new(Category::Expression, 405, "INCREMENT_DECREMENT_REJECTED");
    /// A division or modulo has a literal-zero denominator (warning-level).
    pub const LITERAL_DIVISION_BY_ZERO: DiagnosticCode =
        DiagnosticCode::new(Category::Expression, 406, "LITERAL_DIVISION_BY_ZERO");
    /// A token could not be lexed, or the grammar was violated, inside an expression.
    pub const EXPRESSION_SYNTAX_ERROR: DiagnosticCode =
        DiagnosticCode::new(Category::Expression, 407, "EXPRESSION_SYNTAX_ERROR");

    /// A division or modulo by zero occurred while evaluating a model at run time.
    pub const ARITHMETIC_ERROR: DiagnosticCode =
        DiagnosticCode::new(Category::Runtime, 501, "ARITHMETIC_ERROR");
    /// An RK4 stage produced a non-finite or excessively large derivative.
    pub const NON_FINITE_DERIVATIVE: DiagnosticCode =
        DiagnosticCode::new(Category::Runtime, 502, "NON_FINITE_DERIVATIVE");
    /// A feedback cycle was detected that does not pass through an integrator.
    pub const ALGEBRAIC_LOOP: DiagnosticCode =
        DiagnosticCode::new(Category::Runtime, 503, "ALGEBRAIC_LOOP");
}

#[cfg(test)]
mod tests {
    use super::codes::*;
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Structural.prefix(), 'S');
        assert_eq!(Category::Type.prefix(), 'T');
        assert_eq!(Category::SheetLabel.prefix(), 'L');
        assert_eq!(Category::Expression.prefix(), 'X');
        assert_eq!(Category::Runtime.prefix(), 'R');
    }

    #[test]
    fn display_is_the_slug() {
        assert_eq!(format!("{SELF_CONNECTION}"), "SELF_CONNECTION");
        assert_eq!(format!("{DIMENSION_MISMATCH}"), "DIMENSION_MISMATCH");
    }

    #[test]
    fn short_form() {
        assert_eq!(SELF_CONNECTION.short(), "S101");
        assert_eq!(TYPE_MISMATCH.short(), "T201");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&SELF_CONNECTION).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(SELF_CONNECTION, back);
    }
}
