//! Emission of a validated expression as C99 source text.
//!
//! The generated text is a single expression, meant to be dropped into a
//! block's generated step function (`return <emitted>;`). Callers supply the
//! sanitized C identifier each `in(k)` should become — this crate has no
//! opinion on naming conventions outside the expression language itself.

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// The result of emitting an expression as C source.
#[derive(Clone, Debug)]
pub struct EmittedExpr {
    /// The generated C expression text.
    pub source: String,
    /// `true` if the expression calls any function declared in `<math.h>`.
    pub needs_math: bool,
}

/// Emits `expr` (whose literal text lives in `source`) as C source, resolving
/// each `in(k)` reference through `input_name(k)`.
pub fn emit(expr: &Expr, source: &str, input_name: impl Fn(usize) -> String) -> EmittedExpr {
    let mut ctx = Ctx { source, input_name: &input_name, needs_math: false };
    let text = ctx.emit_expr(expr);
    EmittedExpr { source: text, needs_math: ctx.needs_math }
}

struct Ctx<'a> {
    source: &'a str,
    input_name: &'a dyn Fn(usize) -> String,
    needs_math: bool,
}

const MATH_FUNCTIONS: &[&str] = &[
    "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "ceil", "floor", "trunc",
    "round", "lround", "log", "log2", "log10", "fabs", "fmax", "fmin", "pow",
];

impl Ctx<'_> {
    fn text(&self, expr: &Expr) -> &str {
        let span = expr.span();
        &self.source[span.start as usize..span.end as usize]
    }

    fn emit_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal { is_float: false, .. } => self.text(expr).to_string(),
            Expr::Literal { is_float: true, .. } => literalize_float(self.text(expr)),
            Expr::Call { name, args, .. } if name == "in" => {
                let index = parse_in_index(self.text(&args[0]));
                (self.input_name)(index)
            }
            Expr::Call { name, args, .. } => self.emit_call(name, args),
            Expr::BareIdent { name, .. } => name.clone(),
            Expr::Unary { op, operand, .. } => {
                let inner = self.emit_expr(operand);
                format!("{}{}", unary_symbol(*op), inner)
            }
            Expr::Binary { left, op, right, .. } => {
                let l = self.emit_expr(left);
                let r = self.emit_expr(right);
                format!("{} {} {}", l, binary_symbol(*op), r)
            }
            Expr::Ternary { condition, then_expr, else_expr, .. } => {
                let c = self.emit_expr(condition);
                let t = self.emit_expr(then_expr);
                let e = self.emit_expr(else_expr);
                format!("({c} ? {t} : {e})")
            }
            Expr::Paren { inner, .. } => format!("({})", self.emit_expr(inner)),
            Expr::IncDec { .. } | Expr::Error(_) => "0".to_string(),
        }
    }

    fn emit_call(&mut self, name: &str, args: &[Expr]) -> String {
        if MATH_FUNCTIONS.contains(&name) {
            self.needs_math = true;
        }
        let rendered: Vec<String> = args.iter().map(|a| self.emit_expr(a)).collect();
        match name {
            "signbit" => {
                self.needs_math = true;
                format!("(signbit({}) ? 1 : 0)", rendered[0])
            }
            "abs" => format!("abs((int)({}))", rendered[0]),
            "labs" => format!("labs((long)({}))", rendered[0]),
            _ => format!("{}({})", name, rendered.join(", ")),
        }
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Plus => "+",
        UnaryOp::Minus => "-",
        UnaryOp::LogNot => "!",
        UnaryOp::BitNot => "~",
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::LogOr => "||",
        BinaryOp::LogAnd => "&&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::BitAnd => "&",
        BinaryOp::Eq => "==",
        BinaryOp::Neq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
    }
}

/// Appends `.0` to a float literal's text if it has no decimal point (e.g. `1e3` → `1e3` stays,
/// but a plain `1` reaching here as a float literal via `1.` would already carry a dot).
fn literalize_float(text: &str) -> String {
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text.to_string()
    } else {
        format!("{text}.0")
    }
}

fn parse_in_index(text: &str) -> usize {
    let trimmed = text.trim_end_matches(['l', 'L', 'u', 'U']);
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).unwrap_or(0)
    } else {
        trimmed.parse::<usize>().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::ExprParser;
    use obliq_diagnostics::DiagnosticSink;
    use obliq_source::FileId;

    fn emit_str(source: &str) -> EmittedExpr {
        let sink = DiagnosticSink::new();
        let tokens = lex(source, FileId::from_raw(0), &sink);
        let mut parser = ExprParser::new(tokens, source, &sink);
        let expr = parser.parse();
        emit(&expr, source, |k| format!("in{k}"))
    }

    #[test]
    fn emits_input_reference() {
        let out = emit_str("in(0) + in(1)");
        assert_eq!(out.source, "in0 + in1");
        assert!(!out.needs_math);
    }

    #[test]
    fn flags_needs_math() {
        let out = emit_str("sqrt(in(0))");
        assert!(out.needs_math);
        assert_eq!(out.source, "sqrt(in0)");
    }

    #[test]
    fn signbit_becomes_ternary() {
        let out = emit_str("signbit(in(0))");
        assert_eq!(out.source, "(signbit(in0) ? 1 : 0)");
    }

    #[test]
    fn abs_casts_to_int() {
        let out = emit_str("abs(in(0))");
        assert_eq!(out.source, "abs((int)(in0))");
    }

    #[test]
    fn labs_casts_to_long() {
        let out = emit_str("labs(in(0))");
        assert_eq!(out.source, "labs((long)(in0))");
    }

    #[test]
    fn bare_float_literal_gets_dot_zero_suffix() {
        // "1e3" is a float literal (exponent) with no '.', still left untouched
        // because it is unambiguous C syntax; a literal like "1" is always an
        // IntLiteral in our lexer, so the dot-append path is exercised through
        // `literalize_float` directly here.
        assert_eq!(literalize_float("1"), "1.0");
        assert_eq!(literalize_float("1.5"), "1.5");
        assert_eq!(literalize_float("1e3"), "1e3");
    }

    #[test]
    fn ternary_emits_parenthesized() {
        let out = emit_str("in(0) > 0 ? 1 : 0");
        assert_eq!(out.source, "(in0 > 0 ? 1 : 0)");
    }
}
