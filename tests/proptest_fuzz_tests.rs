//! Property-based fuzzing tests for the Milan scanner, translator and machine
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. Scanning and translation never panic on arbitrary input
//! 2. A program with diagnostics is never flushed
//! 3. Valid arithmetic programs print what Rust computes

use milanc::compiler::{CodeGen, Translator};
use milanc::{execute, Scanner, TokenKind, TokenStream, VmOptions};
use proptest::prelude::*;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Generate random strings that might break the scanner
fn arbitrary_source_string() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[\x00-\x7F]{0,300}").unwrap()
}

/// Generate sequences of Milan tokens in random order
fn token_soup() -> impl Strategy<Value = String> {
    prop::collection::vec(milan_token(), 0..60).prop_map(|tokens| tokens.join(" "))
}

fn milan_token() -> impl Strategy<Value = String> {
    prop_oneof![
        // Keywords
        Just("BEGIN".to_string()),
        Just("END".to_string()),
        Just("IF".to_string()),
        Just("THEN".to_string()),
        Just("ELSE".to_string()),
        Just("FI".to_string()),
        Just("WHILE".to_string()),
        Just("DO".to_string()),
        Just("OD".to_string()),
        Just("write".to_string()),
        Just("read".to_string()),
        Just("FUNCTION".to_string()),
        // Operators and punctuation
        Just(":=".to_string()),
        Just("+".to_string()),
        Just("-".to_string()),
        Just("*".to_string()),
        Just("/".to_string()),
        Just("&".to_string()),
        Just("<".to_string()),
        Just(">=".to_string()),
        Just("!=".to_string()),
        Just("(".to_string()),
        Just(")".to_string()),
        Just("[".to_string()),
        Just("]".to_string()),
        Just(",".to_string()),
        Just(";".to_string()),
        // Numbers and identifiers
        (0i64..1000).prop_map(|n| n.to_string()),
        "[a-c]".prop_map(|s| s),
    ]
}

/// Arithmetic expression with a reference evaluation
#[derive(Debug, Clone)]
enum Expr {
    Num(i64),
    Neg(Box<Expr>),
    Bin(Box<Expr>, char, Box<Expr>),
}

impl Expr {
    fn source(&self) -> String {
        match self {
            Expr::Num(n) => n.to_string(),
            Expr::Neg(e) => format!("-({})", e.source()),
            Expr::Bin(l, op, r) => format!("({} {} {})", l.source(), op, r.source()),
        }
    }

    fn eval(&self) -> i64 {
        match self {
            Expr::Num(n) => *n,
            Expr::Neg(e) => e.eval().wrapping_neg(),
            Expr::Bin(l, op, r) => {
                let (l, r) = (l.eval(), r.eval());
                match op {
                    '+' => l.wrapping_add(r),
                    '-' => l.wrapping_sub(r),
                    '*' => l.wrapping_mul(r),
                    _ => l.wrapping_div(r),
                }
            }
        }
    }
}

fn arith_expr() -> impl Strategy<Value = Expr> {
    let leaf = (0i64..100).prop_map(Expr::Num);
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop_oneof![Just('+'), Just('-'), Just('*')],
                inner.clone()
            )
                .prop_map(|(l, op, r)| Expr::Bin(Box::new(l), op, Box::new(r))),
            (inner.clone(), 1i64..10)
                .prop_map(|(l, d)| Expr::Bin(Box::new(l), '/', Box::new(Expr::Num(d)))),
            inner.prop_map(|e| Expr::Neg(Box::new(e))),
        ]
    })
}

fn run(source: &str) -> String {
    let mut output = Vec::new();
    execute(source, &VmOptions::default(), &mut std::io::empty(), &mut output)
        .unwrap_or_else(|e| panic!("{}: {}", source, e));
    String::from_utf8(output).unwrap()
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn scanner_always_ends_with_single_eof(source in arbitrary_source_string()) {
        let tokens = Scanner::new(&source).scan_tokens();
        prop_assert_eq!(&tokens.last().unwrap().kind, &TokenKind::Eof);
        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        prop_assert_eq!(eofs, 1);
    }

    #[test]
    fn translator_never_panics_on_arbitrary_text(source in arbitrary_source_string()) {
        let mut translator = Translator::new(TokenStream::from_source(&source), CodeGen::buffered());
        let result = translator.translate_program();
        prop_assert_eq!(result.is_err(), translator.has_errors());
    }

    #[test]
    fn programs_with_diagnostics_are_never_flushed(source in token_soup()) {
        let mut translator = Translator::new(TokenStream::from_source(&source), CodeGen::buffered());
        let result = translator.translate_program();
        if translator.has_errors() {
            prop_assert!(result.is_err());
            prop_assert_eq!(translator.sink().flush_count(), 0);
            prop_assert!(translator.sink().listing().is_empty());
            prop_assert!(!translator.diagnostics().is_empty());
        } else {
            prop_assert_eq!(translator.sink().flush_count(), 1);
            prop_assert_eq!(translator.sink().unpatched(), 0);
        }
    }

    #[test]
    fn arithmetic_matches_reference(expr in arith_expr()) {
        let source = format!("BEGIN write({}) END", expr.source());
        prop_assert_eq!(run(&source), format!("{}\n", expr.eval()));
    }

    #[test]
    fn arithmetic_through_function_matches_reference(expr in arith_expr(), x in 0i64..50) {
        let source = format!(
            "FUNCTION f(n) BEGIN t := n; f := t + ({}) END BEGIN write(f({})) END",
            expr.source(),
            x
        );
        prop_assert_eq!(run(&source), format!("{}\n", x.wrapping_add(expr.eval())));
    }

    #[test]
    fn array_element_round_trip(size in 1usize..20, index in 0usize..20, value in -1000i64..1000) {
        let index = index % size;
        let source = format!(
            "BEGIN a[{size}]; a[{index}] := {value}; write(a[{index}]) END",
        );
        prop_assert_eq!(run(&source), format!("{}\n", value));
    }
}
