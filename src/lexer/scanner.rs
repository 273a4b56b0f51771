use std::collections::HashMap;

use super::token::{Arithmetic, Comparison, Token, TokenKind};

lazy_static::lazy_static! {
    /// Reserved words, matched case-insensitively
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("begin", TokenKind::Begin);
        m.insert("end", TokenKind::End);
        m.insert("if", TokenKind::If);
        m.insert("then", TokenKind::Then);
        m.insert("else", TokenKind::Else);
        m.insert("fi", TokenKind::Fi);
        m.insert("while", TokenKind::While);
        m.insert("do", TokenKind::Do);
        m.insert("od", TokenKind::Od);
        m.insert("write", TokenKind::Write);
        m.insert("read", TokenKind::Read);
        m.insert("function", TokenKind::Function);
        m
    };
}

/// Scanner for Milan source text
///
/// Scanning never fails: anything that is not a valid token is emitted as
/// [`TokenKind::Illegal`] so the translator can report it with a line number
/// and keep going.
pub struct Scanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Line on which the current token started
    start_line: usize,
    /// Column at which the current token started
    start_column: usize,
}

impl Scanner {
    /// Creates a new scanner from source code
    pub fn new(source: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens from source code; the last token is always `Eof`
    pub fn scan_tokens(&mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        std::mem::take(&mut self.tokens)
    }

    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            ';' => self.add_token(TokenKind::Semicolon),
            '&' => self.add_token(TokenKind::Ref),

            '+' => self.add_token(TokenKind::AddOp(Arithmetic::Plus)),
            '-' => self.add_token(TokenKind::AddOp(Arithmetic::Minus)),
            '*' => self.add_token(TokenKind::MulOp(Arithmetic::Multiply)),
            '/' => {
                if self.match_char('*') {
                    self.skip_block_comment();
                } else {
                    self.add_token(TokenKind::MulOp(Arithmetic::Divide));
                }
            }

            ':' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Assign);
                } else {
                    self.add_token(TokenKind::Illegal(":".to_string()));
                }
            }
            '=' => self.add_token(TokenKind::Cmp(Comparison::Eq)),
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Cmp(Comparison::Ne));
                } else {
                    self.add_token(TokenKind::Illegal("!".to_string()));
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Cmp(Comparison::Le));
                } else {
                    self.add_token(TokenKind::Cmp(Comparison::Lt));
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Cmp(Comparison::Ge));
                } else {
                    self.add_token(TokenKind::Cmp(Comparison::Gt));
                }
            }

            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier_or_keyword(),

            other => self.add_token(TokenKind::Illegal(other.to_string())),
        }
    }

    fn skip_block_comment(&mut self) {
        loop {
            if self.is_at_end() {
                self.add_token(TokenKind::Illegal("/*".to_string()));
                return;
            }
            let c = self.advance();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else if c == '*' && self.match_char('/') {
                return;
            }
        }
    }

    fn scan_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        match text.parse::<i64>() {
            Ok(value) => self.add_token(TokenKind::Number(value)),
            Err(_) => self.add_token(TokenKind::Illegal(text)),
        }
    }

    fn scan_identifier_or_keyword(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = match KEYWORDS.get(text.to_ascii_lowercase().as_str()) {
            Some(keyword) => keyword.clone(),
            None => TokenKind::Identifier(text),
        };

        self.add_token(kind);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.current += 1;
            self.column += 1;
            true
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(
            kind,
            lexeme,
            self.start_line,
            self.start_column,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let tokens = kinds("BEGIN x := 3; write(x) END");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Begin,
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Number(3),
                TokenKind::Semicolon,
                TokenKind::Write,
                TokenKind::LeftParen,
                TokenKind::Identifier("x".into()),
                TokenKind::RightParen,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(kinds("While wHILE od")[..3], [TokenKind::While, TokenKind::While, TokenKind::Od]);
        assert_eq!(kinds("Begin2")[0], TokenKind::Identifier("Begin2".into()));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("& * / + - = != < > <= >=");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ref,
                TokenKind::MulOp(Arithmetic::Multiply),
                TokenKind::MulOp(Arithmetic::Divide),
                TokenKind::AddOp(Arithmetic::Plus),
                TokenKind::AddOp(Arithmetic::Minus),
                TokenKind::Cmp(Comparison::Eq),
                TokenKind::Cmp(Comparison::Ne),
                TokenKind::Cmp(Comparison::Lt),
                TokenKind::Cmp(Comparison::Gt),
                TokenKind::Cmp(Comparison::Le),
                TokenKind::Cmp(Comparison::Ge),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_and_line_numbers() {
        let tokens = Scanner::new("/* one\ntwo */ x\n:= 1").scan_tokens();
        assert_eq!(tokens[0].kind, TokenKind::Identifier("x".into()));
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].kind, TokenKind::Assign);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_illegal_tokens() {
        let tokens = kinds("x : 1 # 99999999999999999999 /* open");
        assert_eq!(tokens[1], TokenKind::Illegal(":".into()));
        assert_eq!(tokens[3], TokenKind::Illegal("#".into()));
        assert_eq!(tokens[4], TokenKind::Illegal("99999999999999999999".into()));
        assert_eq!(tokens[5], TokenKind::Illegal("/*".into()));
        assert_eq!(tokens[6], TokenKind::Eof);
    }
}
