//! Evaluation of a validated expression against concrete input values.
//!
//! Callers are expected to have already run [`crate::validator::validate`]
//! and rejected anything with errors; `evaluate` still defends against the
//! one failure mode validation cannot rule out ahead of time — a zero
//! denominator that only appears at run time.

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// Absolute tolerance used for `==`/`!=` comparisons, matching C's `DBL_EPSILON`.
const EPSILON: f64 = f64::EPSILON;

/// A failure encountered while evaluating an expression at run time.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// A division or modulo operation had a zero denominator.
    #[error("division or modulo by zero")]
    ArithmeticError,
    /// An `in(k)` index exceeded the supplied input vector (should have been
    /// caught by validation; defended here for robustness).
    #[error("input index {0} out of range for {1} input(s)")]
    InputIndexOutOfRange(usize, usize),
    /// A call site's argument count did not match what evaluation expects
    /// (should have been caught by validation).
    #[error("'{0}' called with {1} argument(s)")]
    WrongArity(String, usize),
    /// A function name is not recognized (should have been caught by validation).
    #[error("unrecognized function '{0}'")]
    UnknownFunction(String),
    /// A bare identifier or `++`/`--` reached evaluation (should have been
    /// caught by validation).
    #[error("expression contains a construct that is not evaluable")]
    NotEvaluable,
}

/// Evaluates `expr` (whose literal text lives in `source`) against `inputs`.
pub fn evaluate(expr: &Expr, source: &str, inputs: &[f64]) -> Result<f64, EvalError> {
    match expr {
        Expr::Literal { is_float: false, span } => {
            let text = &source[span.start as usize..span.end as usize];
            Ok(parse_int_literal(text) as f64)
        }
        Expr::Literal { is_float: true, span } => {
            let text = &source[span.start as usize..span.end as usize];
            Ok(parse_float_literal(text))
        }
        Expr::Call { name, args, .. } if name == "in" => {
            let index = match &args[0] {
                Expr::Literal { is_float: false, span } => {
                    let text = &source[span.start as usize..span.end as usize];
                    parse_int_literal(text) as usize
                }
                _ => return Err(EvalError::NotEvaluable),
            };
            inputs.get(index).copied().ok_or(EvalError::InputIndexOutOfRange(index, inputs.len()))
        }
        Expr::Call { name, args, .. } => {
            let values: Result<Vec<f64>, EvalError> = args.iter().map(|a| evaluate(a, source, inputs)).collect();
            let values = values?;
            eval_math(name, &values)
        }
        Expr::BareIdent { .. } | Expr::IncDec { .. } | Expr::Error(_) => Err(EvalError::NotEvaluable),
        Expr::Unary { op, operand, .. } => {
            let v = evaluate(operand, source, inputs)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
                UnaryOp::LogNot => bool_to_f64(v == 0.0),
                UnaryOp::BitNot => !(v as i64) as f64,
            })
        }
        Expr::Binary { left, op, right, .. } => eval_binary(*op, left, right, source, inputs),
        Expr::Ternary { condition, then_expr, else_expr, .. } => {
            let c = evaluate(condition, source, inputs)?;
            if c != 0.0 {
                evaluate(then_expr, source, inputs)
            } else {
                evaluate(else_expr, source, inputs)
            }
        }
        Expr::Paren { inner, .. } => evaluate(inner, source, inputs),
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, source: &str, inputs: &[f64]) -> Result<f64, EvalError> {
    let l = evaluate(left, source, inputs)?;
    if matches!(op, BinaryOp::LogAnd) && l == 0.0 {
        return Ok(0.0);
    }
    if matches!(op, BinaryOp::LogOr) && l != 0.0 {
        return Ok(1.0);
    }
    let r = evaluate(right, source, inputs)?;

    Ok(match op {
        BinaryOp::LogOr => bool_to_f64(l != 0.0 || r != 0.0),
        BinaryOp::LogAnd => bool_to_f64(l != 0.0 && r != 0.0),
        BinaryOp::BitOr => ((l as i64) | (r as i64)) as f64,
        BinaryOp::BitXor => ((l as i64) ^ (r as i64)) as f64,
        BinaryOp::BitAnd => ((l as i64) & (r as i64)) as f64,
        BinaryOp::Eq => bool_to_f64((l - r).abs() <= EPSILON),
        BinaryOp::Neq => bool_to_f64((l - r).abs() > EPSILON),
        BinaryOp::Lt => bool_to_f64(l < r),
        BinaryOp::Gt => bool_to_f64(l > r),
        BinaryOp::Le => bool_to_f64(l <= r),
        BinaryOp::Ge => bool_to_f64(l >= r),
        BinaryOp::Shl => ((l as i64) << (r as i64)) as f64,
        BinaryOp::Shr => ((l as i64) >> (r as i64)) as f64,
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return Err(EvalError::ArithmeticError);
            }
            l / r
        }
        BinaryOp::Mod => {
            let ri = r as i64;
            if ri == 0 {
                return Err(EvalError::ArithmeticError);
            }
            ((l as i64) % ri) as f64
        }
    })
}

fn eval_math(name: &str, args: &[f64]) -> Result<f64, EvalError> {
    Ok(match (name, args) {
        ("sqrt", [x]) => x.sqrt(),
        ("sin", [x]) => x.sin(),
        ("cos", [x]) => x.cos(),
        ("tan", [x]) => x.tan(),
        ("asin", [x]) => x.asin(),
        ("acos", [x]) => x.acos(),
        ("atan", [x]) => x.atan(),
        ("atan2", [y, x]) => y.atan2(*x),
        ("ceil", [x]) => x.ceil(),
        ("floor", [x]) => x.floor(),
        ("trunc", [x]) => x.trunc(),
        ("round", [x]) => x.round(),
        ("lround", [x]) => x.round(),
        ("log", [x]) => x.ln(),
        ("log2", [x]) => x.log2(),
        ("log10", [x]) => x.log10(),
        ("abs", [x]) => (*x as i64).unsigned_abs() as f64,
        ("labs", [x]) => (*x as i64).unsigned_abs() as f64,
        ("fabs", [x]) => x.abs(),
        ("fmax", [a, b]) => a.max(*b),
        ("fmin", [a, b]) => a.min(*b),
        ("pow", [a, b]) => a.powf(*b),
        ("signbit", [x]) => bool_to_f64(x.is_sign_negative()),
        (name, args) => return Err(EvalError::WrongArity(name.to_string(), args.len())),
    })
}

fn parse_int_literal(text: &str) -> i64 {
    let trimmed = text.trim_end_matches(['l', 'L', 'u', 'U']);
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).unwrap_or(0)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        i64::from_str_radix(&trimmed[1..], 8).unwrap_or(0)
    } else {
        trimmed.parse::<i64>().unwrap_or(0)
    }
}

fn parse_float_literal(text: &str) -> f64 {
    text.trim_end_matches(['f', 'F', 'l', 'L']).parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::ExprParser;
    use obliq_diagnostics::DiagnosticSink;
    use obliq_source::FileId;

    fn eval_str(source: &str, inputs: &[f64]) -> Result<f64, EvalError> {
        let sink = DiagnosticSink::new();
        let tokens = lex(source, FileId::from_raw(0), &sink);
        let mut parser = ExprParser::new(tokens, source, &sink);
        let expr = parser.parse();
        evaluate(&expr, source, inputs)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval_str("2 + 3 * 4", &[]).unwrap(), 14.0);
    }

    #[test]
    fn reads_input() {
        assert_eq!(eval_str("in(0) + in(1)", &[1.5, 2.5]).unwrap(), 4.0);
    }

    #[test]
    fn division_by_zero_errors() {
        assert!(matches!(eval_str("1 / 0", &[]), Err(EvalError::ArithmeticError)));
    }

    #[test]
    fn modulo_by_zero_errors() {
        assert!(matches!(eval_str("5 % 0", &[]), Err(EvalError::ArithmeticError)));
    }

    #[test]
    fn bitwise_truncates_floats() {
        assert_eq!(eval_str("5 & 3", &[]).unwrap(), 1.0);
    }

    #[test]
    fn equality_uses_epsilon_tolerance() {
        assert_eq!(eval_str("1.0 == 1.0", &[]).unwrap(), 1.0);
    }

    #[test]
    fn ternary_selects_branch() {
        assert_eq!(eval_str("in(0) > 0 ? 1 : -1", &[5.0]).unwrap(), 1.0);
        assert_eq!(eval_str("in(0) > 0 ? 1 : -1", &[-5.0]).unwrap(), -1.0);
    }

    #[test]
    fn math_function_dispatch() {
        assert_eq!(eval_str("sqrt(9.0)", &[]).unwrap(), 3.0);
        assert_eq!(eval_str("atan2(0.0, 1.0)", &[]).unwrap(), 0.0);
    }

    #[test]
    fn short_circuit_logical_and() {
        // division by zero in the right operand must not be reached.
        assert_eq!(eval_str("0 && (1 / 0)", &[]).unwrap(), 0.0);
    }

    #[test]
    fn short_circuit_logical_or() {
        assert_eq!(eval_str("1 || (1 / 0)", &[]).unwrap(), 1.0);
    }
}
