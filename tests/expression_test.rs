mod common;
use cmdlang::lang::ErrorCode;
use cmdlang::mach::Runtime;
use common::*;

#[test]
fn test_precedence() {
    let mut r = Runtime::default();
    assert_eq!(exec(&mut r, "print 2 + 3 * 4"), "14\n");
    assert_eq!(exec(&mut r, "print (2 + 3) * 4"), "20\n");
    assert_eq!(exec(&mut r, "print 2 ^ 3 ^ 2"), "512\n");
    assert_eq!(exec(&mut r, "print -2 ^ 2"), "4\n");
    assert_eq!(exec(&mut r, "print 10 - 4 - 3"), "3\n");
}

#[test]
fn test_numeric_promotion() {
    let mut r = Runtime::default();
    assert_eq!(exec(&mut r, "print 1 + 0.5"), "1.5\n");
    assert_eq!(exec(&mut r, "print 7 / 2, 7.0 / 2"), "3 3.5\n");
    assert_eq!(exec(&mut r, "print 1 < 1.5"), "T\n");
    assert_eq!(exec(&mut r, "n = 3; n = n * 1.9; print n"), "5\n");
}

#[test]
fn test_text_operators() {
    let mut r = Runtime::default();
    assert_eq!(exec(&mut r, "print 'ab' // \"cd\""), "abcd\n");
    assert_eq!(exec(&mut r, "print 'hello'[2:4]"), "ell\n");
    assert_eq!(exec(&mut r, "w = 'word'; print w[1], len(w)"), "w 4\n");
    assert_eq!(exec(&mut r, "print 'a' < 'b'"), "T\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    let mut r = Runtime::default();
    assert_eq!(exec(&mut r, "print 1 == 1 || 1 / 0 == 1"), "T\n");
    assert_eq!(exec(&mut r, "print 1 == 2 && 1 / 0 == 1"), "F\n");
    assert_eq!(exec(&mut r, "print !(1 > 2), true && false"), "T F\n");
    assert_eq!(errors(&mut r, "print 1 == 1 && 1 / 0 == 1"), vec![ErrorCode::DivisionByZero]);
}

#[test]
fn test_type_errors_at_compile_time() {
    let mut r = Runtime::default();
    assert_eq!(errors(&mut r, "y = 'a' + 1"), vec![ErrorCode::TypeMismatch]);
    assert!(r.get("y").is_none());
    assert_eq!(errors(&mut r, "print 1 && true"), vec![ErrorCode::TypeMismatch]);
    assert_eq!(errors(&mut r, "print -'a'"), vec![ErrorCode::TypeMismatch]);
}

#[test]
fn test_runtime_errors() {
    let mut r = Runtime::default();
    assert_eq!(errors(&mut r, "print 1 / 0"), vec![ErrorCode::DivisionByZero]);
    assert_eq!(errors(&mut r, "print sqrt(-1)"), vec![ErrorCode::DomainError]);
    assert_eq!(errors(&mut r, "print 'abc'[2:9]"), vec![ErrorCode::SubscriptOutOfRange]);
    assert_eq!(errors(&mut r, "print 9223372036854775807 + 1"), vec![ErrorCode::Overflow]);
}

#[test]
fn test_error_skips_rest_of_line_only() {
    let mut r = Runtime::default();
    let out = exec(&mut r, "print 1 / 0; print 2\nprint 3");
    assert!(out.starts_with('?'));
    assert!(out.ends_with("3\n"));
    assert!(!out.contains("2\n"));
}
