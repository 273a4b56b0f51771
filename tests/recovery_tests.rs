//! Panic-mode recovery and diagnostic reporting

use milanc::{CompileOptions, Compiler, Diagnostic, Error, TranslateError};

fn diagnostics(source: &str) -> Vec<Diagnostic> {
    match Compiler::new(CompileOptions::default()).compile(source) {
        Err(Error::TranslationFailed { diagnostics, .. }) => diagnostics,
        Ok(_) => panic!("{} translated without errors", source),
        Err(other) => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_missing_expression_recovers_at_statement_boundary() {
    let diags = diagnostics("BEGIN x := ; write(x) END");
    assert_eq!(
        diags,
        vec![Diagnostic::new(1, TranslateError::ExpressionExpected)]
    );
}

#[test]
fn test_diagnostics_carry_source_lines() {
    let source = "BEGIN\n  x := 1;\n  y := ;\n  write(x)\nEND";
    let diags = diagnostics(source);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line, 3);
    assert_eq!(diags[0].to_string(), "Line 3: expression expected.");
}

#[test]
fn test_missing_semicolon_skips_to_end() {
    let diags = diagnostics("BEGIN\nx := 1\nwrite(x)\nEND");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line, 3);
    assert_eq!(
        diags[0].error,
        TranslateError::UnexpectedToken {
            found: "'write'".to_string(),
            expected: "'end'".to_string(),
        }
    );
}

#[test]
fn test_several_independent_errors_in_one_pass() {
    let source = "
        BEGIN
            a := &nothing;
            b := 1;
            b := &b;
            IF b THEN write(b) FI
        END";
    let errors: Vec<TranslateError> = diagnostics(source).into_iter().map(|d| d.error).collect();
    assert_eq!(errors.len(), 3, "{:?}", errors);
    assert!(matches!(errors[0], TranslateError::UndefinedVariable { .. }));
    assert!(matches!(errors[1], TranslateError::TypeMismatch { .. }));
    assert_eq!(errors[2], TranslateError::ComparisonExpected);
}

#[test]
fn test_missing_fi_names_the_expected_keyword() {
    let diags = diagnostics("BEGIN IF 1 < 2 THEN write(1) END");
    assert_eq!(
        diags[0].error,
        TranslateError::UnexpectedToken {
            found: "'end'".to_string(),
            expected: "'fi'".to_string(),
        }
    );
}

#[test]
fn test_illegal_characters_are_diagnosed() {
    let diags = diagnostics("BEGIN x := 1 $ 2 END");
    assert_eq!(
        diags[0].error,
        TranslateError::UnexpectedToken {
            found: "illegal token '$'".to_string(),
            expected: "'end'".to_string(),
        }
    );

    let diags = diagnostics("BEGIN x : 1 END");
    assert!(matches!(
        diags[0].error,
        TranslateError::UnexpectedToken { .. }
    ));
}

#[test]
fn test_recovery_always_terminates_at_end_of_input() {
    for source in ["", "BEGIN", "FUNCTION", "FUNCTION f(", "BEGIN IF", "BEGIN WHILE 1 < 2 DO", "END END"] {
        let diags = diagnostics(source);
        assert!(!diags.is_empty(), "{:?}", source);
    }
}

#[test]
fn test_diagnostic_cap() {
    let source = format!("BEGIN {} END", vec!["write(&z)"; 20].join("; "));
    let compiler = Compiler::new(CompileOptions { max_diagnostics: 5 });
    match compiler.compile(&source) {
        Err(Error::TranslationFailed { count, diagnostics }) => {
            assert_eq!(count, 20);
            assert_eq!(diagnostics.len(), 5);
        }
        other => panic!("unexpected {:?}", other),
    }
}
