//! Function calls
//!
//! Caller sequence for `f(a1, ..., an)`:
//!
//! ```text
//! PUSH   0        result slot
//! PUSH   0        return address slot
//! <a1> ... <an>
//! BP     n        save bp, bp := first argument
//! PUSH   ret
//! SSTORE -1       return address below the arguments
//! JUMP   entry
//! ret:            result slot is on top of the stack
//! ```

use super::Translator;
use crate::compiler::codegen::{Instruction, InstructionSink};
use crate::compiler::symbols::{ValueType, RETURN_SLOT};
use crate::error::TranslateError;
use crate::lexer::{TokenKind, TokenSource};

impl<S: TokenSource, K: InstructionSink> Translator<S, K> {
    /// `IDENT '(' arguments ')'`, called with the name consumed and `(` current
    pub(super) fn call(&mut self, name: &str) -> ValueType {
        let line = self.tokens.line();
        let callee = self
            .functions
            .lookup(name)
            .map(|f| (f.entry_address, f.parameters.clone()));
        if callee.is_none() {
            self.report(TranslateError::UndefinedFunction {
                name: name.to_string(),
            });
        }

        self.sink.emit(Instruction::Push(0));
        self.sink.emit(Instruction::Push(0));

        self.must_be(TokenKind::LeftParen);
        let arguments = self.arguments();
        self.must_be(TokenKind::RightParen);

        let Some((entry, parameters)) = callee else {
            return ValueType::Integer;
        };

        if arguments.len() != parameters.len() {
            self.report_at(
                line,
                TranslateError::ArityMismatch {
                    name: name.to_string(),
                    expected: parameters.len(),
                    got: arguments.len(),
                },
            );
        }
        for (position, (parameter, &got)) in parameters.iter().zip(&arguments).enumerate() {
            if parameter.ty != got {
                self.report_at(
                    line,
                    TranslateError::TypeMismatch {
                        context: format!("argument {} of '{}'", position + 1, name),
                        expected: parameter.ty,
                        got,
                    },
                );
            }
        }

        self.sink.emit(Instruction::Bp(arguments.len() as i64));
        let ret = self.sink.current_address() + 3;
        self.sink.emit(Instruction::Push(ret as i64));
        self.sink.emit(Instruction::SStore(RETURN_SLOT));
        self.sink.emit(Instruction::Jump(entry));

        ValueType::Integer
    }

    /// `(expression (',' expression)*)?`, returning each argument's type
    fn arguments(&mut self) -> Vec<ValueType> {
        let mut types = Vec::new();
        if self.see(&TokenKind::RightParen) {
            return types;
        }

        types.push(self.expression());
        while self.accept(&TokenKind::Comma) {
            types.push(self.expression());
        }
        types
    }
}
