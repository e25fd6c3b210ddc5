//! Semantic validation of a parsed expression.
//!
//! Walks the AST produced by [`crate::parser::ExprParser`] and checks the
//! rules the grammar alone cannot enforce: that every name is either `in(k)`
//! or one of the closed math functions, that `in(k)` indices are literal and
//! in range, and that arities match. Also collects the bookkeeping
//! `evaluate`/`condition` blocks need at code-generation time.

use crate::ast::{BinaryOp, Expr};
use obliq_diagnostics::{codes, Diagnostic, DiagnosticSink, Severity};
use std::collections::BTreeSet;

/// The result of validating a single expression.
#[derive(Clone, Debug)]
pub struct ValidationReport {
    /// `true` if no error-severity diagnostics were produced.
    pub valid: bool,
    /// Error-severity diagnostics.
    pub errors: Vec<Diagnostic>,
    /// Warning-severity diagnostics.
    pub warnings: Vec<Diagnostic>,
    /// The set of `in(k)` indices referenced by the expression.
    pub used_inputs: BTreeSet<usize>,
    /// `true` if any floating-point literal appears in the expression.
    pub has_float_ops: bool,
    /// `true` if any math function (not `in`) is called.
    pub uses_math: bool,
}

/// One-argument math functions.
const UNARY_MATH: &[&str] = &[
    "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "ceil", "floor", "trunc", "round",
    "lround", "log", "log2", "log10", "abs", "labs", "fabs", "signbit",
];

/// Two-argument math functions.
const BINARY_MATH: &[&str] = &["atan2", "fmax", "fmin", "pow"];

fn math_arity(name: &str) -> Option<usize> {
    if UNARY_MATH.contains(&name) {
        Some(1)
    } else if BINARY_MATH.contains(&name) {
        Some(2)
    } else {
        None
    }
}

/// Validates `expr` (whose literal text lives in `source`) against a block
/// configured with `input_count` inputs. Diagnostics are both returned in the
/// report and forwarded to `sink`.
pub fn validate(expr: &Expr, source: &str, input_count: usize, sink: &DiagnosticSink) -> ValidationReport {
    let local = DiagnosticSink::new();
    let mut ctx = Ctx { source, input_count, used_inputs: BTreeSet::new(), has_float_ops: false, uses_math: false, sink: &local };
    ctx.walk(expr);

    let diags = local.take_all();
    for diag in &diags {
        sink.emit(diag.clone());
    }

    let errors: Vec<Diagnostic> = diags.iter().cloned().filter(|d| d.severity == Severity::Error).collect();
    let warnings: Vec<Diagnostic> = diags.iter().cloned().filter(|d| d.severity == Severity::Warning).collect();

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        used_inputs: ctx.used_inputs,
        has_float_ops: ctx.has_float_ops,
        uses_math: ctx.uses_math,
    }
}

struct Ctx<'a> {
    source: &'a str,
    input_count: usize,
    used_inputs: BTreeSet<usize>,
    has_float_ops: bool,
    uses_math: bool,
    sink: &'a DiagnosticSink,
}

/// Parses the text of an integer literal, stripping any `l/L/u/U` suffix and
/// handling `0x…` hex, `0…` octal, and decimal forms.
fn parse_int_literal(text: &str) -> Option<i64> {
    let trimmed = text.trim_end_matches(['l', 'L', 'u', 'U']);
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        i64::from_str_radix(&trimmed[1..], 8).ok()
    } else {
        trimmed.parse::<i64>().ok()
    }
}

/// Parses the text of a float literal, stripping any `f/F/l/L` suffix.
fn parse_float_literal(text: &str) -> Option<f64> {
    text.trim_end_matches(['f', 'F', 'l', 'L']).parse::<f64>().ok()
}

impl Ctx<'_> {
    fn text(&self, expr: &Expr) -> &str {
        let span = expr.span();
        &self.source[span.start as usize..span.end as usize]
    }

    fn literal_value(&self, expr: &Expr) -> Option<f64> {
        match expr {
            Expr::Literal { is_float: false, .. } => parse_int_literal(self.text(expr)).map(|v| v as f64),
            Expr::Literal { is_float: true, .. } => parse_float_literal(self.text(expr)),
            Expr::Paren { inner, .. } => self.literal_value(inner),
            Expr::Unary { op: crate::ast::UnaryOp::Minus, operand, .. } => self.literal_value(operand).map(|v| -v),
            Expr::Unary { op: crate::ast::UnaryOp::Plus, operand, .. } => self.literal_value(operand),
            _ => None,
        }
    }

    fn walk(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { is_float, .. } => {
                if *is_float {
                    self.has_float_ops = true;
                }
            }
            Expr::Call { name, args, span } => {
                if name == "in" {
                    self.check_in_call(args, *span);
                } else if let Some(expected) = math_arity(name) {
                    self.uses_math = true;
                    if args.len() != expected {
                        self.sink.emit(Diagnostic::error(
                            codes::WRONG_ARITY,
                            format!("'{name}' expects {expected} argument(s), found {}", args.len()),
                            *span,
                        ));
                    }
                    if matches!(name.as_str(), "sqrt" | "log" | "log2" | "log10") {
                        if let Some(arg) = args.first() {
                            if let Some(v) = self.literal_value(arg) {
                                if v <= 0.0 {
                                    self.sink.emit(Diagnostic::warning(
                                        codes::ARITHMETIC_ERROR,
                                        format!("'{name}' called with non-positive literal argument {v}"),
                                        arg.span(),
                                    ));
                                }
                            }
                        }
                    }
                } else {
                    self.sink.emit(Diagnostic::error(
                        codes::UNKNOWN_FUNCTION,
                        format!("'{name}' is not a recognized function"),
                        *span,
                    ));
                }
                for arg in args {
                    self.walk(arg);
                }
            }
            Expr::BareIdent { name, span } => {
                self.sink.emit(Diagnostic::error(
                    codes::BARE_IDENTIFIER,
                    format!("bare identifier '{name}' is not allowed; did you mean in(k) or a function call?"),
                    *span,
                ));
            }
            Expr::Unary { operand, .. } => self.walk(operand),
            Expr::Binary { left, op, right, span } => {
                self.walk(left);
                self.walk(right);
                self.check_binary(*op, left, right, *span);
            }
            Expr::Ternary { condition, then_expr, else_expr, .. } => {
                self.walk(condition);
                self.walk(then_expr);
                self.walk(else_expr);
            }
            Expr::Paren { inner, .. } => self.walk(inner),
            Expr::IncDec { span } => {
                self.sink.emit(Diagnostic::error(
                    codes::INCREMENT_DECREMENT_REJECTED,
                    "'++'/'--' are not part of the expression language".to_string(),
                    *span,
                ));
            }
            Expr::Error(_) => {}
        }
    }

    fn check_in_call(&mut self, args: &[Expr], span: obliq_source::Span) {
        if args.len() != 1 {
            self.sink.emit(Diagnostic::error(
                codes::WRONG_ARITY,
                format!("'in' expects exactly 1 argument, found {}", args.len()),
                span,
            ));
            return;
        }

        let arg = &args[0];
        match arg {
            Expr::Literal { is_float: false, .. } => {
                let Some(index) = parse_int_literal(self.text(arg)) else {
                    self.sink.emit(Diagnostic::error(
                        codes::IN_INDEX_OUT_OF_RANGE,
                        "'in' index could not be parsed as an integer literal".to_string(),
                        arg.span(),
                    ));
                    return;
                };
                if index < 0 || index as usize >= self.input_count {
                    self.sink.emit(Diagnostic::error(
                        codes::IN_INDEX_OUT_OF_RANGE,
                        format!("in({index}) is out of range for {} input(s)", self.input_count),
                        arg.span(),
                    ));
                } else {
                    self.used_inputs.insert(index as usize);
                }
            }
            _ => {
                self.sink.emit(Diagnostic::error(
                    codes::IN_INDEX_OUT_OF_RANGE,
                    "'in' requires a non-negative integer literal argument".to_string(),
                    arg.span(),
                ));
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: obliq_source::Span) {
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) {
            if let Some(v) = self.literal_value(right) {
                if v == 0.0 {
                    self.sink.emit(Diagnostic::warning(
                        codes::LITERAL_DIVISION_BY_ZERO,
                        "division or modulo by a literal zero".to_string(),
                        right.span(),
                    ));
                }
            }
        }

        let is_bitwise = matches!(
            op,
            BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::BitAnd | BinaryOp::Shl | BinaryOp::Shr
        );
        if is_bitwise && (matches!(left, Expr::Literal { is_float: true, .. }) || matches!(right, Expr::Literal { is_float: true, .. })) {
            self.sink.emit(Diagnostic::warning(
                codes::EXPRESSION_SYNTAX_ERROR,
                "bitwise operator applied to a floating-point literal; operands truncate to integers".to_string(),
                span,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::ExprParser;
    use obliq_source::FileId;

    fn validate_str(source: &str, input_count: usize) -> ValidationReport {
        let sink = DiagnosticSink::new();
        let file = FileId::from_raw(0);
        let tokens = lex(source, file, &sink);
        let mut parser = ExprParser::new(tokens, source, &sink);
        let expr = parser.parse();
        validate(&expr, source, input_count, &sink)
    }

    #[test]
    fn accepts_in_and_math() {
        let report = validate_str("sqrt(in(0)*in(0) + in(1)*in(1))", 2);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.uses_math);
        assert_eq!(report.used_inputs, [0, 1].into_iter().collect());
    }

    #[test]
    fn rejects_bare_identifier() {
        let report = validate_str("foo + 1", 1);
        assert!(!report.valid);
        assert_eq!(report.errors[0].code, codes::BARE_IDENTIFIER);
    }

    #[test]
    fn rejects_unknown_function() {
        let report = validate_str("frobnicate(in(0))", 1);
        assert!(!report.valid);
        assert_eq!(report.errors[0].code, codes::UNKNOWN_FUNCTION);
    }

    #[test]
    fn rejects_out_of_range_input_index() {
        let report = validate_str("in(5)", 2);
        assert!(!report.valid);
        assert_eq!(report.errors[0].code, codes::IN_INDEX_OUT_OF_RANGE);
    }

    #[test]
    fn rejects_wrong_arity() {
        let report = validate_str("pow(in(0))", 1);
        assert!(!report.valid);
        assert_eq!(report.errors[0].code, codes::WRONG_ARITY);
    }

    #[test]
    fn rejects_increment_decrement() {
        let report = validate_str("in(0)++", 1);
        assert!(!report.valid);
        assert_eq!(report.errors[0].code, codes::INCREMENT_DECREMENT_REJECTED);
    }

    #[test]
    fn warns_on_literal_zero_division() {
        let report = validate_str("in(0) / 0", 1);
        assert!(report.valid);
        assert_eq!(report.warnings[0].code, codes::LITERAL_DIVISION_BY_ZERO);
    }

    #[test]
    fn warns_on_sqrt_of_nonpositive_literal() {
        let report = validate_str("sqrt(-1)", 0);
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.code == codes::ARITHMETIC_ERROR));
    }

    #[test]
    fn warns_on_bitwise_with_float_literal() {
        let report = validate_str("in(0) & 1.5", 1);
        assert!(report.valid);
        assert!(!report.warnings.is_empty());
        assert!(report.has_float_ops);
    }
}
