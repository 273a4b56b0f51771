//! # Recursive-Descent Translator
//!
//! Single-pass translation of Milan source into stack machine code. Every
//! grammar rule is a method that consumes tokens, checks the grammar and type
//! rules and emits instructions into the sink as a side effect.
//!
//! ```text
//! program      := functionDecl* BEGIN statementList END
//! functionDecl := FUNCTION IDENT '(' paramList ')' BEGIN statementList END
//! statementList:= (statement (';' statement)*)?
//! statement    := assignOrCall | ifStmt | whileStmt | writeStmt | derefAssign
//! expression   := term (('+' | '-') term)*
//! term         := factor (('*' | '/') factor)*
//! factor       := NUMBER | '&' IDENT | '*' (IDENT | '(' expression ')')
//!               | IDENT (arrayIndex | call)? | '-' factor | '(' expression ')' | READ
//! relation     := expression cmpOp expression
//! ```
//!
//! ## Errors
//!
//! Nothing unwinds. A rule that cannot continue records a line-tagged
//! [`Diagnostic`] and, when a specific terminal was expected, skips tokens
//! until that terminal (or the end of input) and carries on. Once any
//! diagnostic is recorded the sink is never flushed.
//!
//! ## Function frames
//!
//! ```text
//! bp-2  result slot (the function's own name)
//! bp-1  return address
//! bp+0  first parameter
//! ...   remaining parameters, then locals and local array cells
//! ```
//!
//! A function's entry instruction jumps to a prologue emitted after the body,
//! which pushes one placeholder per local slot and jumps back to the body.
//! The epilogue pops the whole frame and returns with `SJUMP`, leaving the
//! result slot on the caller's stack.
//!
//! `&x` and a bare array name yield absolute addresses (`PUSH` for globals,
//! `SADDR` for frame slots), so `*p` and `p[i]` always go through
//! `BLOAD`/`BSTORE` no matter which scope took the address. Elements of an
//! array declared in the current function use `SBLOAD`/`SBSTORE` directly.

mod call;
mod expression;
mod statement;

use crate::compiler::codegen::{Instruction, InstructionSink};
use crate::compiler::symbols::{
    FunctionInfo, FunctionTable, Parameter, ScopeStack, Storage, SymbolTable, ValueType, Variable,
    RESULT_SLOT,
};
use crate::error::{Diagnostic, Error, Result, TranslateError};
use crate::lexer::{TokenKind, TokenSource};

/// Largest accepted array length
pub const MAX_ARRAY_LEN: i64 = 65_536;

/// Default cap on stored diagnostics
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 100;

/// Translator state for one program
pub struct Translator<S: TokenSource, K: InstructionSink> {
    /// Token source
    tokens: S,
    /// Instruction sink
    sink: K,
    /// Global and function scopes
    scopes: ScopeStack,
    /// Functions translated so far
    functions: FunctionTable,
    /// Stored diagnostics
    diagnostics: Vec<Diagnostic>,
    /// Every recorded diagnostic, stored or not
    error_count: usize,
    /// Storage limit for diagnostics
    max_diagnostics: usize,
}

impl<S: TokenSource, K: InstructionSink> Translator<S, K> {
    /// Creates a translator reading from `tokens` and emitting into `sink`
    pub fn new(tokens: S, sink: K) -> Self {
        Self {
            tokens,
            sink,
            scopes: ScopeStack::new(),
            functions: FunctionTable::new(),
            diagnostics: Vec::new(),
            error_count: 0,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
        }
    }

    /// Limits how many diagnostics are stored (all are still counted)
    pub fn with_max_diagnostics(mut self, max: usize) -> Self {
        self.max_diagnostics = max;
        self
    }

    /// Translates the whole program
    ///
    /// On success the sink has been flushed exactly once. If any diagnostic
    /// was recorded the sink is left unflushed and the diagnostics are
    /// returned in [`Error::TranslationFailed`].
    pub fn translate_program(&mut self) -> Result<()> {
        self.program();

        if self.has_errors() {
            tracing::warn!(
                errors = self.error_count,
                "translation failed, program output suppressed"
            );
            return Err(Error::TranslationFailed {
                count: self.error_count,
                diagnostics: self.diagnostics.clone(),
            });
        }

        self.sink.flush()
    }

    /// True once any diagnostic has been recorded
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of recorded diagnostics, including those beyond the storage limit
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Stored diagnostics in source order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Functions declared so far
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// The global symbol table
    pub fn globals(&self) -> &SymbolTable {
        self.scopes.global()
    }

    /// The instruction sink
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Consumes the translator, returning the instruction sink
    pub fn into_sink(self) -> K {
        self.sink
    }

    // ---- program structure ----

    /// `program := functionDecl* BEGIN statementList END`
    fn program(&mut self) {
        let entry_jump = self.sink.reserve();

        while self.see(&TokenKind::Function) {
            self.function_declaration();
        }

        let entry = self.sink.current_address();
        self.sink.emit_at(entry_jump, Instruction::Jump(entry));
        tracing::debug!(entry, "patched program entry");

        self.must_be(TokenKind::Begin);
        self.statement_list();
        self.must_be(TokenKind::End);

        self.sink.emit(Instruction::Stop);
    }

    /// `functionDecl := FUNCTION IDENT '(' paramList ')' BEGIN statementList END`
    fn function_declaration(&mut self) {
        self.must_be(TokenKind::Function);
        let line = self.tokens.line();
        let name = self.expect_identifier();
        self.must_be(TokenKind::LeftParen);

        let locals = self.scopes.enter_function();
        if let Some(name) = &name {
            locals.bind(
                name,
                Variable {
                    address: RESULT_SLOT,
                    ty: ValueType::Integer,
                    storage: Storage::Scalar,
                },
            );
        }

        let parameters = self.parameter_list();
        self.must_be(TokenKind::RightParen);

        let entry = self.sink.reserve();
        let entry_address = entry.address();
        let body = self.sink.current_address();

        self.must_be(TokenKind::Begin);
        self.statement_list();
        self.must_be(TokenKind::End);

        let locals = self.scopes.exit_function().unwrap_or_default();
        let frame_slots = locals.slot_count();
        for _ in 0..frame_slots {
            self.sink.emit(Instruction::Pop);
        }
        self.sink.emit(Instruction::SJump);

        let prologue = self.sink.current_address();
        self.sink.emit_at(entry, Instruction::Jump(prologue));
        let local_slot_count = frame_slots.saturating_sub(parameters.len());
        for _ in 0..local_slot_count {
            self.sink.emit(Instruction::Push(0));
        }
        self.sink.emit(Instruction::Jump(body));

        let Some(name) = name else { return };
        let info = FunctionInfo {
            entry_address,
            parameters,
            local_slot_count,
            locals,
        };
        match self.functions.declare(&name, info) {
            Ok(()) => tracing::debug!(
                function = %name,
                entry = entry_address,
                locals = local_slot_count,
                "registered function"
            ),
            Err(_) => self.report_at(line, TranslateError::Redeclaration { name }),
        }
    }

    /// `paramList := (['&'] IDENT (',' ['&'] IDENT)*)?`
    fn parameter_list(&mut self) -> Vec<Parameter> {
        let mut parameters = Vec::new();
        if self.see(&TokenKind::RightParen) {
            return parameters;
        }

        loop {
            let ty = if self.accept(&TokenKind::Ref) {
                ValueType::Address
            } else {
                ValueType::Integer
            };

            if let Some(name) = self.expect_identifier() {
                let table = self.scopes.active_mut();
                if table.resolve(&name).is_some() {
                    self.report(TranslateError::Redeclaration { name });
                } else {
                    table.resolve_or_declare(&name);
                    table.set_type(&name, ty);
                    parameters.push(Parameter { name, ty });
                }
            }

            if !self.accept(&TokenKind::Comma) {
                break;
            }
        }

        parameters
    }

    // ---- token helpers ----

    /// True if the current token has the same kind as `kind`
    fn see(&self, kind: &TokenKind) -> bool {
        self.tokens.token().same_kind(kind)
    }

    /// Consumes the current token if it has the same kind as `kind`
    fn accept(&mut self, kind: &TokenKind) -> bool {
        if self.see(kind) {
            self.tokens.advance();
            true
        } else {
            false
        }
    }

    /// Consumes `kind`, or reports it missing and skips to it
    fn must_be(&mut self, kind: TokenKind) {
        if self.accept(&kind) {
            return;
        }
        self.report(TranslateError::UnexpectedToken {
            found: self.tokens.token().to_string(),
            expected: kind.name(),
        });
        self.recover(&kind);
    }

    /// Panic mode: skip until `kind` or end of input, consuming `kind` if found
    fn recover(&mut self, kind: &TokenKind) {
        while !self.see(kind) && !self.see(&TokenKind::Eof) {
            self.tokens.advance();
        }
        if self.see(kind) {
            self.tokens.advance();
        }
    }

    /// Consumes an identifier and returns its text
    fn expect_identifier(&mut self) -> Option<String> {
        if let TokenKind::Identifier(name) = self.tokens.token() {
            let name = name.clone();
            self.tokens.advance();
            Some(name)
        } else {
            self.must_be(TokenKind::Identifier(String::new()));
            None
        }
    }

    /// Consumes a number literal and returns its value
    fn expect_number(&mut self) -> Option<i64> {
        if let &TokenKind::Number(value) = self.tokens.token() {
            self.tokens.advance();
            Some(value)
        } else {
            self.must_be(TokenKind::Number(0));
            None
        }
    }

    // ---- diagnostics ----

    /// Records a diagnostic on the current line
    fn report(&mut self, error: TranslateError) {
        let line = self.tokens.line();
        self.report_at(line, error);
    }

    /// Records a diagnostic on `line`
    fn report_at(&mut self, line: usize, error: TranslateError) {
        tracing::debug!(line, %error, "translation error");
        self.error_count += 1;
        if self.diagnostics.len() < self.max_diagnostics {
            self.diagnostics.push(Diagnostic::new(line, error));
        }
    }

    /// Reports a type mismatch unless `got` is `expected`
    fn check_type(&mut self, context: impl FnOnce() -> String, expected: ValueType, got: ValueType) {
        if expected != got {
            self.report(TranslateError::TypeMismatch {
                context: context(),
                expected,
                got,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::codegen::CodeGen;
    use crate::lexer::TokenStream;

    fn translate(source: &str) -> Translator<TokenStream, CodeGen<Vec<u8>>> {
        let mut translator = Translator::new(TokenStream::from_source(source), CodeGen::buffered());
        let _ = translator.translate_program();
        translator
    }

    fn errors(source: &str) -> Vec<TranslateError> {
        translate(source)
            .diagnostics()
            .iter()
            .map(|d| d.error.clone())
            .collect()
    }

    #[test]
    fn test_minimal_program() {
        let t = translate("BEGIN END");
        assert!(!t.has_errors());
        assert_eq!(
            t.sink().instructions(),
            &[Instruction::Jump(1), Instruction::Stop]
        );
        assert_eq!(t.sink().flush_count(), 1);
    }

    #[test]
    fn test_missing_begin_is_reported() {
        let errs = errors("x := 1 END");
        assert_eq!(
            errs[0],
            TranslateError::UnexpectedToken {
                found: "identifier 'x'".to_string(),
                expected: "'begin'".to_string(),
            }
        );
    }

    #[test]
    fn test_function_frame_layout() {
        let t = translate("FUNCTION f(a) BEGIN t := a; f := t END BEGIN END");
        assert!(!t.has_errors(), "{:?}", t.diagnostics());
        let f = t.functions().lookup("f").unwrap();
        assert_eq!(f.entry_address, 1);
        assert_eq!(f.local_slot_count, 1);
        assert_eq!(f.locals.resolve("a").unwrap().address, 0);
        assert_eq!(f.locals.resolve("t").unwrap().address, 1);
        assert_eq!(f.locals.resolve("f").unwrap().address, RESULT_SLOT);

        use Instruction::*;
        assert_eq!(
            t.sink().instructions(),
            &[
                Jump(11),
                Jump(9),
                SLoad(0),
                SStore(1),
                SLoad(1),
                SStore(-2),
                Pop,
                Pop,
                SJump,
                Push(0),
                Jump(2),
                Stop,
            ]
        );
    }

    #[test]
    fn test_duplicate_parameter() {
        let errs = errors("FUNCTION f(a, a) BEGIN END BEGIN END");
        assert_eq!(
            errs,
            vec![TranslateError::Redeclaration {
                name: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_duplicate_function_keeps_first() {
        let t = translate(
            "FUNCTION f() BEGIN f := 1 END FUNCTION f(a) BEGIN f := a END BEGIN END",
        );
        assert_eq!(
            t.diagnostics()[0].error,
            TranslateError::Redeclaration {
                name: "f".to_string()
            }
        );
        assert!(t.functions().lookup("f").unwrap().parameters.is_empty());
    }

    #[test]
    fn test_diagnostic_limit_counts_everything() {
        let mut translator = Translator::new(
            TokenStream::from_source("BEGIN write(&a); write(&b); write(&c) END"),
            CodeGen::buffered(),
        )
        .with_max_diagnostics(2);
        let err = translator.translate_program().unwrap_err();
        assert_eq!(translator.error_count(), 3);
        assert_eq!(translator.diagnostics().len(), 2);
        assert!(matches!(err, Error::TranslationFailed { count: 3, .. }));
    }
}
