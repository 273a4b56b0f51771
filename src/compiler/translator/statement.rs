//! Statement rules

use super::{Translator, MAX_ARRAY_LEN};
use crate::compiler::codegen::{AddressingMode, Instruction, InstructionSink};
use crate::compiler::symbols::{ValueType, Variable};
use crate::error::TranslateError;
use crate::lexer::{TokenKind, TokenSource};

impl<S: TokenSource, K: InstructionSink> Translator<S, K> {
    /// `statementList := (statement (';' statement)*)?`
    pub(super) fn statement_list(&mut self) {
        if self.at_block_end() {
            return;
        }
        self.statement();
        while self.accept(&TokenKind::Semicolon) {
            self.statement();
        }
    }

    fn at_block_end(&self) -> bool {
        matches!(
            self.tokens.token(),
            TokenKind::End | TokenKind::Od | TokenKind::Else | TokenKind::Fi
        )
    }

    fn statement(&mut self) {
        match self.tokens.token().clone() {
            TokenKind::Identifier(name) => {
                self.tokens.advance();
                self.identifier_statement(name);
            }
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Write => self.write_statement(),
            token if token.is_deref() => self.dereference_assignment(),
            _ => self.report(TranslateError::StatementExpected),
        }
    }

    /// Assignment, array declaration, element assignment or call statement
    ///
    /// The name is only looked up once the following token is known, so a
    /// call statement never allocates a variable.
    fn identifier_statement(&mut self, name: String) {
        if self.see(&TokenKind::LeftParen) {
            self.call(&name);
            self.sink.emit(Instruction::Pop);
            return;
        }

        if self.accept(&TokenKind::LeftBracket) {
            match self.scopes.active().resolve(&name).copied() {
                None => self.array_declaration(name),
                Some(var) => self.element_assignment(name, var),
            }
            return;
        }

        self.assignment(name);
    }

    /// `IDENT := expression`
    fn assignment(&mut self, name: String) {
        let declared = self.scopes.active_mut().resolve_or_declare(&name);
        let var = declared.variable();
        if var.is_array() {
            self.report(TranslateError::ArrayAssignment { name: name.clone() });
        }

        self.must_be(TokenKind::Assign);
        let ty = self.expression();

        if declared.is_new() {
            self.scopes.active_mut().set_type(&name, ty);
        } else {
            self.check_type(|| format!("assignment to '{}'", name), var.ty, ty);
        }

        let store = self.scopes.mode().store(var.address);
        self.sink.emit(store);
    }

    /// `IDENT '[' NUMBER ']'` on a new name
    fn array_declaration(&mut self, name: String) {
        let size = self.expect_number();
        self.must_be(TokenKind::RightBracket);

        let Some(size) = size else { return };
        if !(1..=MAX_ARRAY_LEN).contains(&size) {
            self.report(TranslateError::InvalidArraySize { name, size });
            return;
        }

        let table = self.scopes.active_mut();
        table.resolve_or_declare(&name);
        table.declare_array(&name, size as usize);
    }

    /// `IDENT '[' expression ']' := expression` on an existing name
    fn element_assignment(&mut self, name: String, var: Variable) {
        let (mode, offset) = self.element_address(&name, var);

        if !self.accept(&TokenKind::Assign) {
            self.report(TranslateError::Redeclaration { name });
            return;
        }

        let ty = self.expression();
        self.check_type(|| format!("assignment to '{}[]'", name), ValueType::Integer, ty);

        self.sink.emit(mode.store_indirect(offset));
    }

    /// `'*' (IDENT | '(' expression ')') := expression`
    fn dereference_assignment(&mut self) {
        self.tokens.advance();
        if let Some(ty) = self.dereference_operand() {
            self.check_type(|| "dereference".to_string(), ValueType::Address, ty);
        }

        self.must_be(TokenKind::Assign);
        let ty = self.expression();
        self.check_type(
            || "assignment through a reference".to_string(),
            ValueType::Integer,
            ty,
        );

        self.sink.emit(AddressingMode::Absolute.store_indirect(0));
    }

    /// `IF relation THEN statementList [ELSE statementList] FI`
    fn if_statement(&mut self) {
        self.tokens.advance();
        self.relation();

        let jump_no = self.sink.reserve();
        self.must_be(TokenKind::Then);
        self.statement_list();

        if self.accept(&TokenKind::Else) {
            let jump = self.sink.reserve();
            let else_start = self.sink.current_address();
            self.sink.emit_at(jump_no, Instruction::JumpNo(else_start));

            self.statement_list();
            let end = self.sink.current_address();
            self.sink.emit_at(jump, Instruction::Jump(end));
        } else {
            let end = self.sink.current_address();
            self.sink.emit_at(jump_no, Instruction::JumpNo(end));
        }

        self.must_be(TokenKind::Fi);
    }

    /// `WHILE relation DO statementList OD`
    fn while_statement(&mut self) {
        self.tokens.advance();
        let head = self.sink.current_address();
        self.relation();

        let exit = self.sink.reserve();
        self.must_be(TokenKind::Do);
        self.statement_list();
        self.must_be(TokenKind::Od);

        self.sink.emit(Instruction::Jump(head));
        let end = self.sink.current_address();
        self.sink.emit_at(exit, Instruction::JumpNo(end));
    }

    /// `WRITE '(' expression ')'`
    fn write_statement(&mut self) {
        self.tokens.advance();
        self.must_be(TokenKind::LeftParen);
        self.expression();
        self.must_be(TokenKind::RightParen);
        self.sink.emit(Instruction::Print);
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::codegen::{CodeGen, Instruction};
    use crate::compiler::symbols::ValueType;
    use crate::compiler::translator::Translator;
    use crate::error::TranslateError;
    use crate::lexer::TokenStream;

    fn compile(source: &str) -> Vec<Instruction> {
        let mut translator =
            Translator::new(TokenStream::from_source(source), CodeGen::buffered());
        translator
            .translate_program()
            .unwrap_or_else(|e| panic!("{}: {:?}", e, e.diagnostics()));
        assert_eq!(translator.sink().unpatched(), 0);
        translator.into_sink().into_parts().0.instructions
    }

    fn errors(source: &str) -> Vec<TranslateError> {
        let mut translator =
            Translator::new(TokenStream::from_source(source), CodeGen::buffered());
        let _ = translator.translate_program();
        translator
            .diagnostics()
            .iter()
            .map(|d| d.error.clone())
            .collect()
    }

    #[test]
    fn test_if_else_patching() {
        use Instruction::*;
        let code = compile("BEGIN IF 1 < 2 THEN write(1) ELSE write(2) FI END");
        assert_eq!(
            code,
            vec![
                Jump(1),
                Push(1),
                Push(2),
                Compare(crate::lexer::Comparison::Lt),
                JumpNo(8),
                Push(1),
                Print,
                Jump(10),
                Push(2),
                Print,
                Stop,
            ]
        );
    }

    #[test]
    fn test_while_back_edge() {
        use Instruction::*;
        let code = compile("BEGIN i := 0; WHILE i < 3 DO i := i + 1 OD END");
        assert_eq!(
            code,
            vec![
                Jump(1),
                Push(0),
                Store(0),
                Load(0),
                Push(3),
                Compare(crate::lexer::Comparison::Lt),
                JumpNo(12),
                Load(0),
                Push(1),
                Add,
                Store(0),
                Jump(3),
                Stop,
            ]
        );
    }

    #[test]
    fn test_array_declaration_and_element_store() {
        use Instruction::*;
        let code = compile("BEGIN a[3]; b := 1; a[2] := 7 END");
        assert_eq!(
            code,
            vec![Jump(1), Push(1), Store(3), Push(2), Push(7), BStore(0), Stop]
        );
    }

    #[test]
    fn test_array_errors() {
        assert_eq!(
            errors("BEGIN a[0] END"),
            vec![TranslateError::InvalidArraySize {
                name: "a".to_string(),
                size: 0
            }]
        );
        assert_eq!(
            errors("BEGIN a[2]; a[1] END"),
            vec![TranslateError::Redeclaration {
                name: "a".to_string()
            }]
        );
        assert_eq!(
            errors("BEGIN a[2]; a := 1 END"),
            vec![
                TranslateError::ArrayAssignment {
                    name: "a".to_string()
                },
                TranslateError::TypeMismatch {
                    context: "assignment to 'a'".to_string(),
                    expected: ValueType::Address,
                    got: ValueType::Integer,
                }
            ]
        );
    }

    #[test]
    fn test_assignment_type_is_fixed() {
        assert_eq!(
            errors("BEGIN x := 1; y := 2; x := &y END"),
            vec![TranslateError::TypeMismatch {
                context: "assignment to 'x'".to_string(),
                expected: ValueType::Integer,
                got: ValueType::Address,
            }]
        );
    }

    #[test]
    fn test_dereference_assignment() {
        use Instruction::*;
        let code = compile("BEGIN v := 0; p := &v; *p := 5; *(p) := 6 END");
        assert_eq!(
            code,
            vec![
                Jump(1),
                Push(0),
                Store(0),
                Push(0),
                Store(1),
                Load(1),
                Push(5),
                BStore(0),
                Load(1),
                Push(6),
                BStore(0),
                Stop,
            ]
        );
        assert_eq!(
            errors("BEGIN v := 0; *v := 1 END"),
            vec![TranslateError::TypeMismatch {
                context: "dereference".to_string(),
                expected: ValueType::Address,
                got: ValueType::Integer,
            }]
        );
    }

    #[test]
    fn test_statement_expected() {
        assert_eq!(
            errors("BEGIN 5 END"),
            vec![
                TranslateError::StatementExpected,
                TranslateError::UnexpectedToken {
                    found: "number 5".to_string(),
                    expected: "'end'".to_string(),
                }
            ]
        );
    }
}
