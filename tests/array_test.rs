mod common;
use cmdlang::lang::ErrorCode;
use cmdlang::mach::{Runtime, Shape};
use common::*;

#[test]
fn test_broadcast_over_declared_arrays() {
    let mut r = Runtime::default();
    exec(&mut r, "float b(10); b = @; float a(10); a = b + 1");
    assert_eq!(exec(&mut r, "print a"), "2 3 4 5 6 7 8 9 10 11\n");
    assert_eq!(exec(&mut r, "print a(3), a(9:10)"), "4 10 11\n");
    assert_eq!(exec(&mut r, "print sum(a) - sum(b)"), "10\n");
}

#[test]
fn test_scalar_fills_target() {
    let mut r = Runtime::default();
    exec(&mut r, "integer c(3); c = 7");
    assert_eq!(exec(&mut r, "print c"), "7 7 7\n");
    assert_eq!(r.get("c").map(|v| v.shape()), Some(Shape::vector(3)));
}

#[test]
fn test_overlapping_section_copy() {
    let mut r = Runtime::default();
    exec(&mut r, "integer a(10); a = @; a(2:9) = a(1:8)");
    assert_eq!(exec(&mut r, "print a"), "1 1 2 3 4 5 6 7 8 10\n");
    exec(&mut r, "a = @; a(1:8) = a(2:9)");
    assert_eq!(exec(&mut r, "print a"), "2 3 4 5 6 7 8 9 9 10\n");
}

#[test]
fn test_sections_with_steps() {
    let mut r = Runtime::default();
    exec(&mut r, "integer v(6); v = @");
    assert_eq!(exec(&mut r, "print v(::2)"), "1 3 5\n");
    assert_eq!(exec(&mut r, "print v(::-1)"), "6 5 4 3 2 1\n");
    assert_eq!(exec(&mut r, "print v(5:2:-2)"), "5 3\n");
    exec(&mut r, "v(2::2) = 0");
    assert_eq!(exec(&mut r, "print v"), "1 0 3 0 5 0\n");
    assert_eq!(errors(&mut r, "print v(7)"), vec![ErrorCode::SubscriptOutOfRange]);
    assert_eq!(errors(&mut r, "print v(0:2)"), vec![ErrorCode::SubscriptOutOfRange]);
    assert_eq!(errors(&mut r, "print v(1, 1)"), vec![ErrorCode::RankMismatch]);
}

#[test]
fn test_two_dimensions() {
    let mut r = Runtime::default();
    exec(&mut r, "integer m(3, 2); m = @");
    assert_eq!(exec(&mut r, "print m(:, 2)"), "4 5 6\n");
    assert_eq!(exec(&mut r, "print m(2, :)"), "2 5\n");
    exec(&mut r, "integer row(3); row = 10 * @");
    assert_eq!(exec(&mut r, "print m(:, 1) + row"), "11 22 33\n");
    assert_eq!(exec(&mut r, "print size(m), size(m, 1), size(m, 2)"), "6 3 2\n");
}

#[test]
fn test_reshape_cast() {
    let mut r = Runtime::default();
    exec(&mut r, "integer v(6); v = @");
    exec(&mut r, "integer m(2, 3); m = v{2, 3}");
    assert_eq!(exec(&mut r, "print m(2, :)"), "2 4 6\n");
    assert_eq!(errors(&mut r, "m = v{4, 2}"), vec![ErrorCode::ShapeMismatch]);
}

#[test]
fn test_assignment_extents() {
    let mut r = Runtime::default();
    exec(&mut r, "integer c(3); c = ramp(5)");
    assert_eq!(exec(&mut r, "print size(c), c"), "5 1 2 3 4 5\n");
    assert_eq!(errors(&mut r, "c(1:2) = ramp(3)"), vec![ErrorCode::ShapeMismatch]);
    assert_eq!(exec(&mut r, "print size(c)"), "5\n");
    exec(&mut r, "c(4:5) = ramp(2)");
    assert_eq!(exec(&mut r, "print c"), "1 2 3 1 2\n");
}

#[test]
fn test_value_lists() {
    let mut r = Runtime::default();
    exec(&mut r, "x = 1, 2.5, 4");
    assert_eq!(exec(&mut r, "print x"), "1 2.5 4\n");
    assert_eq!(r.get("x").map(|v| v.shape()), Some(Shape::vector(3)));
    exec(&mut r, "integer k(4); k(2:3) = 8, 9");
    assert_eq!(exec(&mut r, "print k"), "0 8 9 0\n");
    assert_eq!(errors(&mut r, "k = 1, k"), vec![ErrorCode::ShapeMismatch]);
}

#[test]
fn test_extent_mismatch() {
    let mut r = Runtime::default();
    exec(&mut r, "float p(4); integer q(3)");
    assert_eq!(errors(&mut r, "print p + q"), vec![ErrorCode::ShapeMismatch]);
    assert_eq!(exec(&mut r, "print p(1:3) + q"), "0 0 0\n");
}
