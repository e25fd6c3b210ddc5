//! Lexical analyzer for the expression-language subset.
//!
//! Converts source text into a sequence of [`Token`]s: integer and float
//! literals (with `0x…` hex and `0…` octal forms, and `f/F/l/L/u/U`
//! suffixes), identifiers, and punctuation. Whitespace is skipped; unknown
//! bytes produce an [`ExprToken::Error`] token and a diagnostic.

use crate::token::{ExprToken, Token};
use obliq_diagnostics::{codes, Diagnostic, DiagnosticSink};
use obliq_source::{FileId, Span};

/// Lexes `source` (registered under `file`) into a token stream, reporting
/// malformed tokens to `sink`. The returned vector always ends with
/// [`ExprToken::Eof`].
pub fn lex(source: &str, file: FileId, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer { source: source.as_bytes(), pos: 0, file, sink };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    sink: &'a DiagnosticSink,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.source.len() {
                tokens.push(Token { kind: ExprToken::Eof, span: self.span_from(self.pos) });
                break;
            }
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.source[self.pos];
        self.pos += 1;
        b
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.source.len() && self.peek().is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.advance();

        macro_rules! tok {
            ($kind:expr) => {
                Token { kind: $kind, span: self.span_from(start) }
            };
        }

        match b {
            b'(' => tok!(ExprToken::LeftParen),
            b')' => tok!(ExprToken::RightParen),
            b',' => tok!(ExprToken::Comma),
            b'?' => tok!(ExprToken::Question),
            b':' => tok!(ExprToken::Colon),
            b'~' => tok!(ExprToken::Tilde),
            b'+' => {
                if self.peek() == b'+' {
                    self.advance();
                    tok!(ExprToken::PlusPlus)
                } else {
                    tok!(ExprToken::Plus)
                }
            }
            b'-' => {
                if self.peek() == b'-' {
                    self.advance();
                    tok!(ExprToken::MinusMinus)
                } else {
                    tok!(ExprToken::Minus)
                }
            }
            b'*' => tok!(ExprToken::Star),
            b'/' => tok!(ExprToken::Slash),
            b'%' => tok!(ExprToken::Percent),
            b'|' => {
                if self.peek() == b'|' {
                    self.advance();
                    tok!(ExprToken::PipePipe)
                } else {
                    tok!(ExprToken::Pipe)
                }
            }
            b'&' => {
                if self.peek() == b'&' {
                    self.advance();
                    tok!(ExprToken::AmpAmp)
                } else {
                    tok!(ExprToken::Amp)
                }
            }
            b'^' => tok!(ExprToken::Caret),
            b'!' => {
                if self.peek() == b'=' {
                    self.advance();
                    tok!(ExprToken::BangEq)
                } else {
                    tok!(ExprToken::Bang)
                }
            }
            b'=' => {
                if self.peek() == b'=' {
                    self.advance();
                    tok!(ExprToken::EqEq)
                } else {
                    let span = self.span_from(start);
                    self.error("unexpected '=': assignment is not part of the expression language", span);
                    tok!(ExprToken::Error)
                }
            }
            b'<' => {
                if self.peek() == b'=' {
                    self.advance();
                    tok!(ExprToken::LtEq)
                } else if self.peek() == b'<' {
                    self.advance();
                    tok!(ExprToken::ShiftLeft)
                } else {
                    tok!(ExprToken::Lt)
                }
            }
            b'>' => {
                if self.peek() == b'=' {
                    self.advance();
                    tok!(ExprToken::GtEq)
                } else if self.peek() == b'>' {
                    self.advance();
                    tok!(ExprToken::ShiftRight)
                } else {
                    tok!(ExprToken::Gt)
                }
            }
            b'0'..=b'9' => self.lex_number(start),
            b'.' if self.peek().is_ascii_digit() => self.lex_number(start),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.lex_identifier(start),
            _ => {
                let span = self.span_from(start);
                self.error(&format!("unexpected character {:?}", b as char), span);
                tok!(ExprToken::Error)
            }
        }
    }

    fn lex_identifier(&mut self, start: usize) -> Token {
        while matches!(self.peek(), b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_') {
            self.advance();
        }
        Token { kind: ExprToken::Identifier, span: self.span_from(start) }
    }

    fn lex_number(&mut self, start: usize) -> Token {
        let mut is_float = false;

        if self.source[start] == b'0' && matches!(self.peek(), b'x' | b'X') {
            self.advance();
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
        } else {
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            if self.peek() == b'.' {
                is_float = true;
                self.advance();
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
            if matches!(self.peek(), b'e' | b'E') {
                let save = self.pos;
                self.advance();
                if matches!(self.peek(), b'+' | b'-') {
                    self.advance();
                }
                if self.peek().is_ascii_digit() {
                    is_float = true;
                    while self.peek().is_ascii_digit() {
                        self.advance();
                    }
                } else {
                    self.pos = save;
                }
            }
        }

        if is_float {
            while matches!(self.peek(), b'f' | b'F' | b'l' | b'L') {
                self.advance();
            }
            Token { kind: ExprToken::FloatLiteral, span: self.span_from(start) }
        } else {
            while matches!(self.peek(), b'l' | b'L' | b'u' | b'U') {
                self.advance();
            }
            Token { kind: ExprToken::IntLiteral, span: self.span_from(start) }
        }
    }

    fn error(&self, message: &str, span: Span) {
        self.sink.emit(Diagnostic::error(codes::EXPRESSION_SYNTAX_ERROR, message, span));
    }
}
