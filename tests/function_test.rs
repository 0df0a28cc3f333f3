mod common;
use cmdlang::lang::{Capture, Error, ErrorCode};
use cmdlang::mach::{
    ArgDecl, ArgRank, ArgType, Function, Host, Module, Ownership, Returns, Runtime, Scalar, Type, Val,
};
use common::*;

#[test]
fn test_elemental_over_arrays() {
    let mut r = Runtime::default();
    exec(&mut r, "integer v(4); v = @");
    assert_eq!(exec(&mut r, "print abs(v - 3)"), "2 1 0 1\n");
    assert_eq!(exec(&mut r, "print int(v / 2.0 + 0.5)"), "1 1 2 2\n");
    assert_eq!(exec(&mut r, "w = sqrt(v * v); print w"), "1 2 3 4\n");
    assert_eq!(r.get("w").map(|v| v.ty()), Some(Type::Float));
}

#[test]
fn test_once_functions() {
    let mut r = Runtime::default();
    exec(&mut r, "integer v(4); v = @");
    assert_eq!(exec(&mut r, "print sum(v), maxval(v) - minval(v)"), "10 3\n");
    assert_eq!(exec(&mut r, "print ramp(3) * 2"), "2 4 6\n");
    assert_eq!(exec(&mut r, "print v + ramp(4)"), "2 4 6 8\n");
    assert_eq!(errors(&mut r, "print sum(v + 1)"), vec![ErrorCode::ModeMismatch]);
}

#[test]
fn test_swap_writes_back() {
    let mut r = Runtime::default();
    exec(&mut r, "a = 1; b = 2");
    assert_eq!(exec(&mut r, "swap a, b; print a, b"), "2 1\n");
    exec(&mut r, "float x(3); x = @; float y");
    exec(&mut r, "swap x, y");
    assert_eq!(exec(&mut r, "print size(x), y"), "1 1 2 3\n");
    exec(&mut r, "e = 2.0");
    assert_eq!(errors(&mut r, "swap e, pi"), vec![ErrorCode::ReadOnly]);
    assert_eq!(errors(&mut r, "swap a, e"), vec![ErrorCode::TypeMismatch]);
}

#[test]
fn test_command_argument_counts() {
    let mut r = Runtime::default();
    exec(&mut r, "a = 1");
    assert_eq!(errors(&mut r, "swap a"), vec![ErrorCode::WrongArgumentCount]);
    assert_eq!(errors(&mut r, "print sqrt()"), vec![ErrorCode::WrongArgumentCount]);
    assert_eq!(errors(&mut r, "print abs(1, 2)"), vec![ErrorCode::WrongArgumentCount]);
    assert_eq!(errors(&mut r, "sqrt 4"), vec![ErrorCode::SyntaxError]);
    assert_eq!(errors(&mut r, "x = print"), vec![ErrorCode::TypeMismatch]);
}

fn scale(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<(), Error> {
    let factor = f64::try_from(&args[1])?;
    let mut v = args[0].convert(Type::Float)?;
    for i in 0..v.len() {
        let x = v.get(i)?.as_f64()?;
        v.set(i, Scalar::Float(x * factor))?;
    }
    if let Some(out) = out {
        *out = v.with_owner(Ownership::FunctionValue);
    }
    Ok(())
}

fn bump(host: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<(), Error> {
    let n = i64::try_from(&args[0])?;
    args[0] = Val::scalar(Scalar::Integer(n + 1));
    host.print("bumped\n");
    Ok(())
}

fn module() -> Module {
    let mut m = Module::new("extra");
    m.functions = vec![
        Function::once(
            "scale",
            &[
                ArgDecl::value(ArgType::Numeric, ArgRank::Any),
                ArgDecl::value(ArgType::Float, ArgRank::Scalar),
            ],
            Returns::Fixed(Type::Float),
            scale,
        )
        .returning_rank(ArgRank::Any),
        Function::command("bump", &[ArgDecl::reference(ArgType::Integer, ArgRank::Scalar)], bump),
    ];
    m.variables = vec![("limit", Val::scalar(Scalar::Integer(3)).with_owner(Ownership::Parameter))];
    m
}

#[test]
fn test_registered_module() {
    let mut r = Runtime::default();
    r.register(module()).unwrap();
    assert_eq!(exec(&mut r, "print scale(ramp(3), 0.5)"), "0.5 1 1.5\n");
    assert_eq!(exec(&mut r, "n = 4; bump n; print n"), "bumped\n5\n");
    assert_eq!(errors(&mut r, "bump limit"), vec![ErrorCode::ReadOnly]);
    assert_eq!(errors(&mut r, "bump 3"), vec![ErrorCode::ModeMismatch]);
    let mut c = Capture::new(&[]);
    r.enter(&mut c, "help extra");
    assert!(c.output.starts_with("extra\n"));
    assert!(c.output.contains("scale("));
    assert!(c.errors.is_empty());
}
