//! # Milan Compiler - Source to Stack Machine Code
//!
//! This module translates Milan programs into instructions for the stack
//! virtual machine in [`crate::runtime`].
//!
//! ## Architecture
//!
//! ```text
//! Milan Source → Tokens → Translator (parse + check + emit) → Program / Listing
//! ```
//!
//! There is no syntax tree: the [`Translator`] emits code while it parses and
//! backpatches forward jumps through [`Reserved`] slot handles.
//!
//! ## Usage
//!
//! ```ignore
//! use milanc::compiler::{Compiler, CompileOptions};
//!
//! let compiler = Compiler::new(CompileOptions::default());
//! let result = compiler.compile("BEGIN x := 3; write(x) END")?;
//! print!("{}", result.listing);
//! ```

pub mod codegen;
pub mod symbols;
pub mod translator;

pub use codegen::{AddressingMode, CodeGen, Instruction, InstructionSink, Program, Reserved};
pub use symbols::{
    AlreadyDeclared, Declared, FunctionInfo, FunctionTable, Parameter, ScopeStack, Storage,
    SymbolTable, ValueType, Variable,
};
pub use translator::Translator;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lexer::TokenStream;

/// Compilation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Maximum number of diagnostics kept; later ones are only counted
    pub max_diagnostics: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_diagnostics: translator::DEFAULT_MAX_DIAGNOSTICS,
        }
    }
}

/// Compilation result with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    /// The translated program
    pub program: Program,
    /// Textual listing, one `addr:\tMNEMONIC\toperand` line per instruction
    pub listing: String,
    /// Number of declared functions
    pub function_count: usize,
    /// Number of global memory cells used
    pub global_slots: usize,
}

/// Milan to stack machine compiler
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile Milan source code
    ///
    /// Fails with [`crate::Error::TranslationFailed`] carrying every
    /// diagnostic when the source has syntax or type errors.
    pub fn compile(&self, source: &str) -> Result<CompileResult> {
        let tokens = TokenStream::from_source(source);
        let mut translator = Translator::new(tokens, CodeGen::buffered())
            .with_max_diagnostics(self.options.max_diagnostics);

        translator.translate_program()?;

        let function_count = translator.functions().len();
        let global_slots = translator.globals().slot_count();
        let sink = translator.into_sink();
        let listing = sink.listing();
        let (program, _) = sink.into_parts();

        tracing::debug!(
            instructions = program.len(),
            functions = function_count,
            "compiled program"
        );

        Ok(CompileResult {
            program,
            listing,
            function_count,
            global_slots,
        })
    }
}
