//! Pratt parser for the expression language.
//!
//! Implements operator-precedence parsing following §4.2's table:
//!
//! | BP (L,R) | Operators |
//! |----------|-----------|
//! | (1,2)   | `||` |
//! | (3,4)   | `&&` |
//! | (5,6)   | `|` |
//! | (7,8)   | `^` |
//! | (9,10)  | `&` |
//! | (11,12) | `==` `!=` |
//! | (13,14) | `<` `>` `<=` `>=` |
//! | (15,16) | `<<` `>>` |
//! | (17,18) | `+` `-` |
//! | (19,20) | `*` `/` `%` |
//! | prefix 21 | `+` `-` `!` `~` |
//!
//! Ternary `?:` is handled as a special case at `min_bp == 0` (right-associative).

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::token::{ExprToken, Token};
use obliq_diagnostics::{codes, Diagnostic, DiagnosticSink};
use obliq_source::Span;

/// Binding power for binary operators. Returns `(left_bp, right_bp)`.
fn infix_binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::LogOr => (1, 2),
        BinaryOp::LogAnd => (3, 4),
        BinaryOp::BitOr => (5, 6),
        BinaryOp::BitXor => (7, 8),
        BinaryOp::BitAnd => (9, 10),
        BinaryOp::Eq | BinaryOp::Neq => (11, 12),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => (13, 14),
        BinaryOp::Shl | BinaryOp::Shr => (15, 16),
        BinaryOp::Add | BinaryOp::Sub => (17, 18),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => (19, 20),
    }
}

/// A recursive-descent/Pratt parser over a token stream produced by [`crate::lexer::lex`].
pub struct ExprParser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    sink: &'src DiagnosticSink,
}

impl<'src> ExprParser<'src> {
    /// Creates a parser over `tokens` lexed from `source`. Parse errors are
    /// emitted to `sink`.
    pub fn new(tokens: Vec<Token>, source: &'src str, sink: &'src DiagnosticSink) -> Self {
        Self { tokens, pos: 0, source, sink }
    }

    /// Parses a single expression, consuming the entire token stream up to EOF.
    pub fn parse(&mut self) -> Expr {
        let expr = self.parse_expr_bp(0);
        if !self.at_eof() {
            let span = self.current_span();
            self.error("trailing input after expression", span);
        }
        expr
    }

    fn current(&self) -> ExprToken {
        self.tokens[self.pos].kind
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn current_text(&self) -> &'src str {
        let span = self.current_span();
        &self.source[span.start as usize..span.end as usize]
    }

    fn at(&self, kind: ExprToken) -> bool {
        self.current() == kind
    }

    fn at_eof(&self) -> bool {
        self.current() == ExprToken::Eof
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: ExprToken) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: ExprToken) {
        if !self.eat(kind) {
            let span = self.current_span();
            self.error(&format!("expected {kind:?}"), span);
        }
    }

    fn error(&self, message: &str, span: Span) {
        self.sink.emit(Diagnostic::error(codes::EXPRESSION_SYNTAX_ERROR, message.to_string(), span));
    }

    fn current_as_binary_op(&self) -> Option<BinaryOp> {
        Some(match self.current() {
            ExprToken::PipePipe => BinaryOp::LogOr,
            ExprToken::AmpAmp => BinaryOp::LogAnd,
            ExprToken::Pipe => BinaryOp::BitOr,
            ExprToken::Caret => BinaryOp::BitXor,
            ExprToken::Amp => BinaryOp::BitAnd,
            ExprToken::EqEq => BinaryOp::Eq,
            ExprToken::BangEq => BinaryOp::Neq,
            ExprToken::Lt => BinaryOp::Lt,
            ExprToken::Gt => BinaryOp::Gt,
            ExprToken::LtEq => BinaryOp::Le,
            ExprToken::GtEq => BinaryOp::Ge,
            ExprToken::ShiftLeft => BinaryOp::Shl,
            ExprToken::ShiftRight => BinaryOp::Shr,
            ExprToken::Plus => BinaryOp::Add,
            ExprToken::Minus => BinaryOp::Sub,
            ExprToken::Star => BinaryOp::Mul,
            ExprToken::Slash => BinaryOp::Div,
            ExprToken::Percent => BinaryOp::Mod,
            _ => return None,
        })
    }

    fn current_as_unary_op(&self) -> Option<UnaryOp> {
        Some(match self.current() {
            ExprToken::Plus => UnaryOp::Plus,
            ExprToken::Minus => UnaryOp::Minus,
            ExprToken::Bang => UnaryOp::LogNot,
            ExprToken::Tilde => UnaryOp::BitNot,
            _ => return None,
        })
    }

    /// Parses an expression with minimum binding power `min_bp`.
    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.parse_prefix_expr();

        loop {
            if self.at_eof() {
                break;
            }

            if self.at(ExprToken::Question) && min_bp == 0 {
                let op_span = self.current_span();
                self.advance();
                let then_expr = self.parse_expr_bp(0);
                self.expect(ExprToken::Colon);
                let else_expr = self.parse_expr_bp(0);
                let span = lhs.span().merge(else_expr.span()).merge(op_span);
                lhs = Expr::Ternary {
                    condition: Box::new(lhs),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                    span,
                };
                continue;
            }

            let op = match self.current_as_binary_op() {
                Some(op) => op,
                None => break,
            };

            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }

            self.advance();
            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { left: Box::new(lhs), op, right: Box::new(rhs), span };
        }

        lhs
    }

    fn parse_prefix_expr(&mut self) -> Expr {
        let start = self.current_span();

        if matches!(self.current(), ExprToken::PlusPlus | ExprToken::MinusMinus) {
            self.advance();
            // Still consume an operand so the rest of the expression parses.
            self.parse_expr_bp(21);
            return Expr::IncDec { span: start };
        }

        if let Some(op) = self.current_as_unary_op() {
            self.advance();
            let operand = self.parse_expr_bp(21);
            let span = start.merge(operand.span());
            return Expr::Unary { op, operand: Box::new(operand), span };
        }

        match self.current() {
            ExprToken::IntLiteral => {
                let span = self.current_span();
                self.advance();
                Expr::Literal { is_float: false, span }
            }
            ExprToken::FloatLiteral => {
                let span = self.current_span();
                self.advance();
                Expr::Literal { is_float: true, span }
            }
            ExprToken::LeftParen => {
                self.advance();
                let inner = self.parse_expr_bp(0);
                self.expect(ExprToken::RightParen);
                let span = start.merge(self.prev_span());
                Expr::Paren { inner: Box::new(inner), span }
            }
            ExprToken::Identifier => {
                let name = self.current_text().to_string();
                self.advance();
                if self.at(ExprToken::LeftParen) {
                    let args = self.parse_call_args();
                    let span = start.merge(self.prev_span());
                    Expr::Call { name, args, span }
                } else {
                    Expr::BareIdent { name, span: start }
                }
            }
            _ => {
                let span = self.current_span();
                self.error("expected expression", span);
                self.advance();
                Expr::Error(span)
            }
        }
    }

    fn parse_call_args(&mut self) -> Vec<Expr> {
        self.expect(ExprToken::LeftParen);
        let mut args = Vec::new();
        if !self.at(ExprToken::RightParen) {
            args.push(self.parse_expr_bp(0));
            while self.eat(ExprToken::Comma) {
                args.push(self.parse_expr_bp(0));
            }
        }
        self.expect(ExprToken::RightParen);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use obliq_source::FileId;

    fn parse_str(source: &str) -> Expr {
        let sink = DiagnosticSink::new();
        let file = FileId::from_raw(0);
        let tokens = lex(source, file, &sink);
        let mut parser = ExprParser::new(tokens, source, &sink);
        let expr = parser.parse();
        assert!(!sink.has_errors(), "unexpected errors: {:?}", sink.diagnostics());
        expr
    }

    #[test]
    fn integer_literal() {
        assert!(matches!(parse_str("42"), Expr::Literal { is_float: false, .. }));
    }

    #[test]
    fn float_literal() {
        assert!(matches!(parse_str("1.5"), Expr::Literal { is_float: true, .. }));
    }

    #[test]
    fn precedence_add_mul() {
        match parse_str("1 + 2 * 3") {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected add at top, got {other:?}"),
        }
    }

    #[test]
    fn precedence_logical_vs_comparison() {
        match parse_str("in(0) == 1 && in(1) == 2") {
            Expr::Binary { op: BinaryOp::LogAnd, left, right, .. } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Eq, .. }));
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Eq, .. }));
            }
            other => panic!("expected logical and at top, got {other:?}"),
        }
    }

    #[test]
    fn ternary_right_associative() {
        match parse_str("1 ? 2 : 3 ? 4 : 5") {
            Expr::Ternary { else_expr, .. } => {
                assert!(matches!(*else_expr, Expr::Ternary { .. }));
            }
            other => panic!("expected ternary at top, got {other:?}"),
        }
    }

    #[test]
    fn unary_minus() {
        assert!(matches!(parse_str("-in(0)"), Expr::Unary { op: UnaryOp::Minus, .. }));
    }

    #[test]
    fn function_call_with_args() {
        match parse_str("atan2(in(0), in(1))") {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, "atan2");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn bare_identifier_parses_but_flagged_later() {
        assert!(matches!(parse_str("foo"), Expr::BareIdent { .. }));
    }

    #[test]
    fn increment_parses_as_incdec_node() {
        assert!(matches!(parse_str("in(0)++"), Expr::IncDec { .. }));
    }

    #[test]
    fn parenthesized_expression_preserved() {
        assert!(matches!(parse_str("(1 + 2)"), Expr::Paren { .. }));
    }

    #[test]
    fn complex_expression_matches_precedence() {
        // sqrt(in(0)*in(0) + in(1)*in(1))
        match parse_str("sqrt(in(0)*in(0) + in(1)*in(1))") {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, "sqrt");
                assert_eq!(args.len(), 1);
                assert!(matches!(&args[0], Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("expected sqrt call, got {other:?}"),
        }
    }
}
