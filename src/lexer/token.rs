use std::fmt;

use serde::{Deserialize, Serialize};

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// Arithmetic operator carried by `AddOp` and `MulOp` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arithmetic {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`, also the dereference marker in operand position
    Multiply,
    /// `/`
    Divide,
}

/// Comparison operator carried by `Cmp` tokens
///
/// The discriminants are the relation numbers the `COMPARE` instruction takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// `=`
    Eq = 0,
    /// `!=`
    Ne = 1,
    /// `<`
    Lt = 2,
    /// `>`
    Gt = 3,
    /// `<=`
    Le = 4,
    /// `>=`
    Ge = 5,
}

impl Comparison {
    /// Relation number used as the `COMPARE` operand
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Inverse of [`Comparison::code`]
    pub fn from_code(code: i64) -> Option<Self> {
        use Comparison::*;
        match code {
            0 => Some(Eq),
            1 => Some(Ne),
            2 => Some(Lt),
            3 => Some(Gt),
            4 => Some(Le),
            5 => Some(Ge),
            _ => None,
        }
    }

    /// Applies the relation to two operands
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Ge => lhs >= rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Gt => ">",
            Comparison::Le => "<=",
            Comparison::Ge => ">=",
        }
    }
}

/// All possible token types in Milan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Number(i64),

    // Identifiers
    /// Variable or function name
    Identifier(String),

    // Keywords
    /// BEGIN keyword
    Begin,
    /// END keyword
    End,
    /// IF keyword
    If,
    /// THEN keyword
    Then,
    /// ELSE keyword
    Else,
    /// FI keyword (closes IF)
    Fi,
    /// WHILE keyword
    While,
    /// DO keyword
    Do,
    /// OD keyword (closes WHILE)
    Od,
    /// WRITE keyword
    Write,
    /// READ keyword
    Read,
    /// FUNCTION keyword
    Function,

    // Operators
    /// `+` or `-`
    AddOp(Arithmetic),
    /// `*` or `/`
    MulOp(Arithmetic),
    /// One of `= != < > <= >=`
    Cmp(Comparison),
    /// Reference marker `&`
    Ref,
    /// Assignment `:=`
    Assign,

    // Delimiters
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left bracket [
    LeftBracket,
    /// Right bracket ]
    RightBracket,
    /// Comma ,
    Comma,
    /// Semicolon ;
    Semicolon,

    // Special
    /// Text the scanner could not turn into a token
    Illegal(String),
    /// End of input
    Eof,
}

impl TokenKind {
    /// True when both kinds are the same variant, ignoring payloads
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// `*` in operand position
    pub fn is_deref(&self) -> bool {
        matches!(self, TokenKind::MulOp(Arithmetic::Multiply))
    }

    /// Name of the token class without its payload, as used in "expected" messages
    pub fn name(&self) -> String {
        match self {
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::Identifier(_) => "identifier".to_string(),
            TokenKind::Illegal(_) => "illegal token".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::AddOp(_) => "'+' or '-'".to_string(),
            TokenKind::MulOp(_) => "'*' or '/'".to_string(),
            TokenKind::Cmp(_) => "comparison operator".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Begin => write!(f, "'begin'"),
            TokenKind::End => write!(f, "'end'"),
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Then => write!(f, "'then'"),
            TokenKind::Else => write!(f, "'else'"),
            TokenKind::Fi => write!(f, "'fi'"),
            TokenKind::While => write!(f, "'while'"),
            TokenKind::Do => write!(f, "'do'"),
            TokenKind::Od => write!(f, "'od'"),
            TokenKind::Write => write!(f, "'write'"),
            TokenKind::Read => write!(f, "'read'"),
            TokenKind::Function => write!(f, "'function'"),
            TokenKind::AddOp(Arithmetic::Plus) | TokenKind::MulOp(Arithmetic::Plus) => {
                write!(f, "'+'")
            }
            TokenKind::AddOp(Arithmetic::Minus) | TokenKind::MulOp(Arithmetic::Minus) => {
                write!(f, "'-'")
            }
            TokenKind::AddOp(Arithmetic::Multiply) | TokenKind::MulOp(Arithmetic::Multiply) => {
                write!(f, "'*'")
            }
            TokenKind::AddOp(Arithmetic::Divide) | TokenKind::MulOp(Arithmetic::Divide) => {
                write!(f, "'/'")
            }
            TokenKind::Cmp(cmp) => write!(f, "'{}'", cmp.symbol()),
            TokenKind::Ref => write!(f, "'&'"),
            TokenKind::Assign => write!(f, "':='"),
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
            TokenKind::LeftBracket => write!(f, "'['"),
            TokenKind::RightBracket => write!(f, "']'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Illegal(text) => write!(f, "illegal token '{}'", text),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}
