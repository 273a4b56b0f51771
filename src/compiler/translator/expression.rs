//! Expression rules
//!
//! Each rule leaves exactly one value on the operand stack and returns its
//! static type.

use super::Translator;
use crate::compiler::codegen::{AddressingMode, Instruction, InstructionSink};
use crate::compiler::symbols::{ValueType, Variable};
use crate::error::TranslateError;
use crate::lexer::{Arithmetic, TokenKind, TokenSource};

impl<S: TokenSource, K: InstructionSink> Translator<S, K> {
    /// `expression := term (('+' | '-') term)*`
    pub(super) fn expression(&mut self) -> ValueType {
        let mut ty = self.term();

        while let &TokenKind::AddOp(op) = self.tokens.token() {
            self.tokens.advance();
            let rhs = self.term();
            self.sink.emit(match op {
                Arithmetic::Minus => Instruction::Sub,
                _ => Instruction::Add,
            });
            ty = ty.combine(rhs);
        }

        ty
    }

    /// `term := factor (('*' | '/') factor)*`
    fn term(&mut self) -> ValueType {
        let mut ty = self.factor();

        while let &TokenKind::MulOp(op) = self.tokens.token() {
            self.tokens.advance();
            let rhs = self.factor();
            self.sink.emit(match op {
                Arithmetic::Divide => Instruction::Div,
                _ => Instruction::Mult,
            });
            ty = ty.combine(rhs);
        }

        ty
    }

    fn factor(&mut self) -> ValueType {
        match self.tokens.token().clone() {
            TokenKind::Number(value) => {
                self.tokens.advance();
                self.sink.emit(Instruction::Push(value));
                ValueType::Integer
            }
            TokenKind::Ref => {
                self.tokens.advance();
                self.reference();
                ValueType::Address
            }
            token if token.is_deref() => {
                self.tokens.advance();
                if let Some(ty) = self.dereference_operand() {
                    self.check_type(|| "dereference".to_string(), ValueType::Address, ty);
                }
                self.sink.emit(AddressingMode::Absolute.load_indirect(0));
                ValueType::Integer
            }
            TokenKind::Identifier(name) => {
                self.tokens.advance();
                self.identifier_factor(&name)
            }
            TokenKind::AddOp(Arithmetic::Minus) => {
                self.tokens.advance();
                let ty = self.factor();
                self.sink.emit(Instruction::Invert);
                ty
            }
            TokenKind::LeftParen => {
                self.tokens.advance();
                let ty = self.expression();
                self.must_be(TokenKind::RightParen);
                ty
            }
            TokenKind::Read => {
                self.tokens.advance();
                self.sink.emit(Instruction::Input);
                ValueType::Integer
            }
            _ => {
                self.report(TranslateError::ExpressionExpected);
                ValueType::Integer
            }
        }
    }

    /// `'&' IDENT`: pushes the variable's absolute address
    fn reference(&mut self) {
        let TokenKind::Identifier(name) = self.tokens.token().clone() else {
            self.report(TranslateError::MalformedOperand {
                operation: "referenced",
            });
            return;
        };
        self.tokens.advance();

        match self.scopes.active().resolve(&name).copied() {
            Some(var) => {
                let address = self.scopes.mode().address_of(var.address);
                self.sink.emit(address);
            }
            None => self.report(TranslateError::UndefinedVariable { name }),
        }
    }

    /// Operand of a prefix `*`: pushes the address to dereference
    ///
    /// Returns the operand's type, or `None` if it could not be translated.
    pub(super) fn dereference_operand(&mut self) -> Option<ValueType> {
        match self.tokens.token().clone() {
            TokenKind::Identifier(name) => {
                self.tokens.advance();
                match self.scopes.active().resolve(&name).copied() {
                    Some(var) => {
                        self.push_value(var);
                        Some(var.ty)
                    }
                    None => {
                        self.report(TranslateError::UndefinedVariable { name });
                        None
                    }
                }
            }
            TokenKind::LeftParen => {
                self.tokens.advance();
                let ty = self.expression();
                self.must_be(TokenKind::RightParen);
                Some(ty)
            }
            _ => {
                self.report(TranslateError::MalformedOperand {
                    operation: "dereferenced",
                });
                None
            }
        }
    }

    /// A variable read, element read, call or misuse of a function name
    fn identifier_factor(&mut self, name: &str) -> ValueType {
        if self.see(&TokenKind::LeftParen) {
            return self.call(name);
        }

        let var = self.scopes.active().resolve(name).copied();

        if self.accept(&TokenKind::LeftBracket) {
            match var {
                Some(var) => {
                    let (mode, offset) = self.element_address(name, var);
                    self.sink.emit(mode.load_indirect(offset));
                }
                None => {
                    self.report(TranslateError::UndefinedVariable {
                        name: name.to_string(),
                    });
                    self.expression();
                    self.must_be(TokenKind::RightBracket);
                }
            }
            return ValueType::Integer;
        }

        match var {
            Some(var) => {
                self.push_value(var);
                var.ty
            }
            None if self.functions.contains(name) => {
                self.report(TranslateError::CallSyntax {
                    name: name.to_string(),
                });
                ValueType::Integer
            }
            None => {
                self.report(TranslateError::UndefinedVariable {
                    name: name.to_string(),
                });
                ValueType::Integer
            }
        }
    }

    /// Pushes a variable's value; an array name stands for its base address
    fn push_value(&mut self, var: Variable) {
        let instr = if var.is_array() {
            self.scopes.mode().address_of(var.address)
        } else {
            self.scopes.mode().load(var.address)
        };
        self.sink.emit(instr);
    }

    /// Translates `index ']'` after `name[` and returns how to reach the element
    ///
    /// For an array the index alone is pushed and the element sits at the
    /// array base in the current scope's mode. For an `ADDRESS` variable the
    /// pointer plus the index is pushed, an absolute address.
    pub(super) fn element_address(&mut self, name: &str, var: Variable) -> (AddressingMode, i64) {
        if !var.is_array() {
            self.check_type(|| format!("indexing '{}'", name), ValueType::Address, var.ty);
            let load = self.scopes.mode().load(var.address);
            self.sink.emit(load);
        }

        let index = self.expression();
        self.check_type(|| "array index".to_string(), ValueType::Integer, index);

        if !var.is_array() {
            self.sink.emit(Instruction::Add);
        }
        self.must_be(TokenKind::RightBracket);

        if var.is_array() {
            (self.scopes.mode(), var.address)
        } else {
            (AddressingMode::Absolute, 0)
        }
    }

    /// `relation := expression cmpOp expression`
    pub(super) fn relation(&mut self) {
        self.expression();

        if let &TokenKind::Cmp(cmp) = self.tokens.token() {
            self.tokens.advance();
            self.expression();
            self.sink.emit(Instruction::Compare(cmp));
        } else {
            self.report(TranslateError::ComparisonExpected);
        }
    }
}
