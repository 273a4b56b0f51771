//! Error types for the Milan toolchain
//!
//! Two layers live here. [`Error`] is what crosses the public API: I/O
//! failures, a failed translation pass and runtime faults of the virtual
//! machine. [`TranslateError`] is a single line-tagged diagnostic recorded by
//! the translator while it keeps going after a mistake.

use std::fmt;

use thiserror::Error;

use crate::compiler::ValueType;

/// Milan toolchain errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Translation errors
    /// The translation pass recorded at least one diagnostic
    ///
    /// **Triggered by:** any syntax or type error in the source program
    /// **Effect:** no program is emitted; details are in the diagnostics list
    #[error("Translation failed with {count} error(s)")]
    TranslationFailed {
        /// Number of diagnostics recorded (including any beyond the storage limit)
        count: usize,
        /// Recorded diagnostics in source order
        diagnostics: Vec<Diagnostic>,
    },

    /// Malformed instruction listing handed to the loader
    #[error("Listing error at line {line}: {message}")]
    ListingError {
        /// Line number in the listing (1-indexed)
        line: usize,
        /// Error description
        message: String,
    },

    // Runtime errors
    /// Division by zero
    ///
    /// **Triggered by:** `DIV` with a zero divisor
    /// **Example:** `BEGIN write(1/0) END` translates fine and fails here
    #[error("Division by zero at instruction {pc}")]
    DivisionByZero {
        /// Address of the faulting instruction
        pc: usize,
    },

    /// Operand stack underflow
    #[error("Stack underflow at instruction {pc}")]
    StackUnderflow {
        /// Address of the faulting instruction
        pc: usize,
    },

    /// Access outside global memory or outside the operand stack
    #[error("Invalid address {address} at instruction {pc}")]
    InvalidAddress {
        /// Offending address (absolute or already resolved against the base pointer)
        address: i64,
        /// Address of the faulting instruction
        pc: usize,
    },

    /// Control transferred outside the program
    #[error("Jump target {target} is outside the program")]
    InvalidJump {
        /// Offending target
        target: i64,
    },

    /// `SJUMP` executed with an empty call stack
    #[error("Subroutine return without a matching call at instruction {pc}")]
    ReturnWithoutCall {
        /// Address of the faulting instruction
        pc: usize,
    },

    /// Call stack deeper than the configured limit
    #[error("Call depth limit exceeded (max: {limit})")]
    CallDepthExceeded {
        /// Maximum allowed call depth
        limit: usize,
    },

    /// Execution limit exceeded
    #[error("Execution limit exceeded (max: {limit} instructions)")]
    ExecutionLimitExceeded {
        /// Maximum allowed instruction count
        limit: u64,
    },

    /// `READ` could not obtain an integer
    #[error("Input error: {message}")]
    InputError {
        /// Error description
        message: String,
    },

    /// Reading or writing a stream failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Create a listing error with a message
    pub fn listing(line: usize, msg: impl Into<String>) -> Self {
        Error::ListingError {
            line,
            message: msg.into(),
        }
    }

    /// Diagnostics carried by a failed translation, empty for every other error
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::TranslationFailed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Result type for Milan toolchain operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single problem found while translating
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// Expected terminal not found
    ///
    /// **Example:** `BEGIN x := 1 write(x) END` (missing `;`)
    #[error("{found} found while {expected} expected.")]
    UnexpectedToken {
        /// Token actually present
        found: String,
        /// Token the rule required
        expected: String,
    },

    /// No factor could start at the current token
    #[error("expression expected.")]
    ExpressionExpected,

    /// No statement could start at the current token
    #[error("statement expected.")]
    StatementExpected,

    /// A condition lacks its comparison operator
    #[error("comparison operator expected.")]
    ComparisonExpected,

    /// Variable referenced before it was defined in the active scope
    #[error("undefined variable '{name}'.")]
    UndefinedVariable {
        /// Variable name
        name: String,
    },

    /// Function called before its declaration was completed
    #[error("undefined function '{name}'.")]
    UndefinedFunction {
        /// Function name
        name: String,
    },

    /// Inferred type disagrees with the one required by the context
    ///
    /// **Example:** `x := 1; x := &x` (address assigned to an integer variable)
    #[error("type mismatch in {context}: expected {expected}, got {got}.")]
    TypeMismatch {
        /// Where the mismatch happened (assignment, index, argument 2 of 'f', ...)
        context: String,
        /// Required type
        expected: ValueType,
        /// Inferred type
        got: ValueType,
    },

    /// Call argument count differs from the declared parameter count
    #[error("function '{name}' expects {expected} argument(s), got {got}.")]
    ArityMismatch {
        /// Function name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Array, parameter or function declared twice
    #[error("'{name}' is already declared.")]
    Redeclaration {
        /// Declared name
        name: String,
    },

    /// `&` or `*` applied to something that is neither a variable nor `( expression )`
    #[error("only a variable or (<expression>) can be {operation}.")]
    MalformedOperand {
        /// `referenced` or `dereferenced`
        operation: &'static str,
    },

    /// A function name used as a value
    #[error("function '{name}' must be called using '(' and ')'.")]
    CallSyntax {
        /// Function name
        name: String,
    },

    /// An array name used as an assignment target
    #[error("array '{name}' cannot be assigned as a whole.")]
    ArrayAssignment {
        /// Array name
        name: String,
    },

    /// `name[size]` with a size outside `1..=MAX_ARRAY_LEN`
    #[error("array '{name}' has invalid size {size}.")]
    InvalidArraySize {
        /// Array name
        name: String,
        /// Declared size
        size: i64,
    },
}

/// A translation error tagged with the source line it was found on
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Source line (1-indexed)
    pub line: usize,
    /// What went wrong
    pub error: TranslateError,
}

impl Diagnostic {
    /// Creates a diagnostic for the given line
    pub fn new(line: usize, error: TranslateError) -> Self {
        Self { line, error }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.error)
    }
}
