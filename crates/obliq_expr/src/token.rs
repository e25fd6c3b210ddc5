//! Token types for the expression-language lexer.

use obliq_source::Span;
use serde::{Deserialize, Serialize};

/// A token kind for the C99 expression subset accepted by `evaluate` and
/// `condition` blocks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ExprToken {
    /// An integer literal (decimal, `0x…` hex, or `0…` octal), with an
    /// optional `l/L/u/U` suffix consumed as part of the token text.
    IntLiteral,
    /// A floating-point literal, with an optional `f/F/l/L` suffix.
    FloatLiteral,
    /// An identifier: a function name, or a bare name that is always an error.
    Identifier,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `||`
    PipePipe,
    /// `&&`
    AmpAmp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `&`
    Amp,
    /// `==`
    EqEq,
    /// `!=`
    BangEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `~`
    Tilde,
    /// `++`; always rejected by the parser.
    PlusPlus,
    /// `--`; always rejected by the parser.
    MinusMinus,
    /// End of input.
    Eof,
    /// A malformed token the lexer could not classify.
    Error,
}

/// A lexed token: its kind paired with the source span of its text.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Token {
    /// The token kind.
    pub kind: ExprToken,
    /// The source span covering the token's text.
    pub span: Span,
}
