//! Abstract syntax tree for the expression language.
//!
//! The AST produced by [`crate::parser`] is never mutated or re-parsed: the
//! validator, evaluator, and emitter are three independent consumers of the
//! same tree.

use obliq_source::Span;
use serde::{Deserialize, Serialize};

/// A binary operator, ordered low-to-high by the precedence table in §4.2.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `||`
    LogOr,
    /// `&&`
    LogAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

/// A unary prefix operator.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `!`
    LogNot,
    /// `~`
    BitNot,
}

/// A parsed expression node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Expr {
    /// A numeric literal, either integer or floating-point; the exact text
    /// (and thus its value) is recovered from `span` against the source.
    Literal {
        /// `true` if the literal contains a `.` or exponent (a C `double`
        /// constant); `false` for an integer constant.
        is_float: bool,
        /// Source span of the literal text.
        span: Span,
    },
    /// A call to a name: either the pseudo-function `in(k)` or one of the
    /// closed set of allowed math functions. Which it is, and whether it is
    /// well-formed, is determined by the validator — not the parser.
    Call {
        /// The function name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
        /// Source span of the whole call.
        span: Span,
    },
    /// A bare identifier that is not `in` and not a recognized function name.
    /// Always a validation error; retained in the AST so the validator can
    /// point at it.
    BareIdent {
        /// The identifier text.
        name: String,
        /// Source span of the identifier.
        span: Span,
    },
    /// A unary prefix expression.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
        /// Source span of the whole expression.
        span: Span,
    },
    /// A binary infix expression.
    Binary {
        /// The left operand.
        left: Box<Expr>,
        /// The operator.
        op: BinaryOp,
        /// The right operand.
        right: Box<Expr>,
        /// Source span of the whole expression.
        span: Span,
    },
    /// A right-associative ternary `cond ? then : else`.
    Ternary {
        /// The condition.
        condition: Box<Expr>,
        /// The value when `condition` is non-zero.
        then_expr: Box<Expr>,
        /// The value when `condition` is zero.
        else_expr: Box<Expr>,
        /// Source span of the whole expression.
        span: Span,
    },
    /// A parenthesized sub-expression, preserved so the emitter can avoid
    /// re-deriving grouping from precedence alone.
    Paren {
        /// The inner expression.
        inner: Box<Expr>,
        /// Source span including the parentheses.
        span: Span,
    },
    /// A `++`/`--` expression; always rejected by the validator, retained
    /// only for diagnostic pointing.
    IncDec {
        /// Source span of the operator.
        span: Span,
    },
    /// A node produced after a parse error; carries no further meaning.
    Error(Span),
}

impl Expr {
    /// The source span covering this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Call { span, .. }
            | Expr::BareIdent { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Paren { span, .. }
            | Expr::IncDec { span }
            | Expr::Error(span) => *span,
        }
    }
}
