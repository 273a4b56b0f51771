//! # milanc - A Translator and Stack Machine for Milan
//!
//! Milan is a tiny imperative language: integer and address variables, one
//! level of functions, `IF`/`WHILE`, arrays, references and console I/O. This
//! crate translates Milan source in a single recursive-descent pass into code
//! for a stack virtual machine and ships a reference machine to run it.
//!
//! ## Quick Start
//!
//! ```rust
//! use milanc::{CompileOptions, Compiler, Machine, VmOptions};
//!
//! # fn main() -> milanc::Result<()> {
//! let source = r#"
//!     FUNCTION square(n) BEGIN square := n * n END
//!     BEGIN
//!         i := 1;
//!         WHILE i <= 3 DO write(square(i)); i := i + 1 OD
//!     END
//! "#;
//!
//! let result = Compiler::new(CompileOptions::default()).compile(source)?;
//!
//! let mut machine = Machine::new(result.program, VmOptions::default());
//! let mut output = Vec::new();
//! machine.run(&mut std::io::empty(), &mut output)?;
//!
//! assert_eq!(String::from_utf8_lossy(&output), "1\n4\n9\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Language Summary
//!
//! | Construct | Example |
//! |-----------|---------|
//! | Assignment | `x := 3 * (y + 1)` |
//! | Input / output | `x := read; write(x)` |
//! | Conditional | `IF x > 0 THEN write(x) ELSE write(-x) FI` |
//! | Loop | `WHILE i < 10 DO i := i + 1 OD` |
//! | Array | `a[10]; a[2] := 7; write(a[2])` |
//! | References | `p := &x; *p := 5; write(*(p))` |
//! | Functions | `FUNCTION max(a, b) BEGIN IF a > b THEN max := a ELSE max := b FI END` |
//! | By-reference parameters | `FUNCTION inc(&p) BEGIN *p := *p + 1; inc := *p END` |
//!
//! Keywords are case-insensitive and comments are written `/* ... */`.
//!
//! ## Errors
//!
//! Translation never stops at the first mistake; every diagnostic comes back
//! in [`Error::TranslationFailed`]:
//!
//! ```rust
//! use milanc::{CompileOptions, Compiler};
//!
//! let err = Compiler::new(CompileOptions::default())
//!     .compile("BEGIN x := ; write(x) END")
//!     .unwrap_err();
//! assert_eq!(err.diagnostics()[0].to_string(), "Line 1: expression expected.");
//! ```

/// Version of the milanc toolchain
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod lexer;
pub mod runtime;

use std::io::{BufRead, Write};

// Re-export main types
pub use compiler::{
    CompileOptions, CompileResult, Compiler, Instruction, Program, Translator, ValueType,
};
pub use error::{Diagnostic, Error, Result, TranslateError};
pub use lexer::{Scanner, Token, TokenKind, TokenStream};
pub use runtime::{Machine, VmOptions};

/// Compiles `source` and runs it to completion
pub fn execute<R: BufRead, W: Write>(
    source: &str,
    options: &VmOptions,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let compiled = Compiler::new(CompileOptions::default()).compile(source)?;
    Machine::new(compiled.program, options.clone()).run(input, output)
}
