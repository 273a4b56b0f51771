//! Lexical analysis for Milan
//!
//! Converts source text into a stream of tokens. The translator only sees the
//! stream through the [`TokenSource`] trait: one current token, its line, and
//! an explicit `advance`.

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Arithmetic, Comparison, Token, TokenKind};

/// One-token lookahead over a token sequence
pub trait TokenSource {
    /// The current token
    fn token(&self) -> &TokenKind;

    /// Source line of the current token
    fn line(&self) -> usize;

    /// Moves to the next token; stays on `Eof` once it is reached
    fn advance(&mut self);
}

/// [`TokenSource`] over an already scanned token vector
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    current: usize,
}

impl TokenStream {
    /// Wraps scanned tokens, appending an `Eof` token if the sequence lacks one
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let line = tokens.last().map(|t| t.line).unwrap_or(1);
            tokens.push(Token::new(TokenKind::Eof, String::new(), line, 1));
        }
        TokenStream { tokens, current: 0 }
    }

    /// Scans `source` and wraps the result
    pub fn from_source(source: &str) -> Self {
        Self::new(Scanner::new(source).scan_tokens())
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }
}

impl TokenSource for TokenStream {
    fn token(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn advance(&mut self) {
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
    }
}
