mod common;
use cmdlang::lang::{Capture, Error, ErrorCode};
use cmdlang::mach::{
    ArgDecl, ArgRank, ArgType, ExitMode, Function, Host, Module, Ownership, Returns, Runtime, Scalar, Type, Val,
};
use common::*;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn test_minimum_match_names() {
    let mut r = Runtime::default();
    assert_eq!(exec(&mut r, "prin 5"), "5\n");
    assert_eq!(exec(&mut r, "p 6"), "6\n");
    assert_eq!(exec(&mut r, "print sq(16.0)"), "4\n");
    exec(&mut r, "alpha = 3");
    assert_eq!(exec(&mut r, "print alp + 1"), "4\n");
    assert_eq!(errors(&mut r, "s 1"), vec![ErrorCode::AmbiguousName]);
    assert_eq!(errors(&mut r, "print nothing"), vec![ErrorCode::UndefinedName]);
}

#[test]
fn test_documented_sessions() {
    let mut r = Runtime::default();
    exec(&mut r, "float b(10)\nb = @");
    assert_eq!(exec(&mut r, "prin 2 * sum(b)"), "110\n");
    exec(&mut r, "a = b * 2 + 1");
    assert_eq!(exec(&mut r, "print sum(a), a(2:4)"), "120 5 7 9\n");
}

#[test]
fn test_exact_name_beats_longer_names() {
    let mut r = Runtime::default();
    exec(&mut r, "s = 2; si = 3");
    assert_eq!(exec(&mut r, "print s + si"), "5\n");
    assert_eq!(exec(&mut r, "print sin(0.0)"), "0\n");
}

#[test]
fn test_verbose_echo() {
    let mut r = Runtime::default();
    exec(&mut r, "verbose = true");
    assert_eq!(exec(&mut r, "print 1"), "print 1\n1\n");
    exec(&mut r, "verbose = false");
    assert_eq!(exec(&mut r, "print 1"), "1\n");
}

#[test]
fn test_show_and_delete() {
    let mut r = Runtime::default();
    exec(&mut r, "zed = 1; integer zz(2)");
    assert_eq!(exec(&mut r, "show z"), "zed INTEGER = 1\nzz INTEGER(2) = 0 0\n");
    exec(&mut r, "delete zed");
    assert!(r.get("zed").is_none());
    assert_eq!(errors(&mut r, "print zed"), vec![ErrorCode::UndefinedName]);
    assert_eq!(errors(&mut r, "delete zed"), vec![ErrorCode::UndefinedName]);
    assert_eq!(errors(&mut r, "delete print"), vec![ErrorCode::ReadOnly]);
}

#[test]
fn test_help() {
    let mut r = Runtime::default();
    let out = exec(&mut r, "help");
    assert!(out.starts_with("core: print show delete swap"));
    let out = exec(&mut r, "help swap");
    assert!(out.starts_with("swap(any by reference, any by reference)\n"));
}

#[test]
fn test_macros() {
    let mut r = Runtime::default();
    exec(&mut r, ":+double print %1 * 2");
    assert_eq!(exec(&mut r, "double 21"), "42\n");
    assert_eq!(exec(&mut r, "dou 4"), "8\n");
    r.define_macro("both", "print %1; print '%%2.*'").unwrap();
    assert_eq!(exec(&mut r, "both 1 2 3"), "1\n2 3\n");
    assert_eq!(exec(&mut r, ":?do"), "double = print %1 * 2\n");
    exec(&mut r, ":-double");
    assert_eq!(errors(&mut r, "double 1"), vec![ErrorCode::UndefinedName]);
}

#[test]
fn test_macro_extending_a_command_name() {
    let mut r = Runtime::default();
    exec(&mut r, ":+printall print 99");
    assert_eq!(exec(&mut r, "print 1"), "1\n");
    assert_eq!(exec(&mut r, "p 2"), "2\n");
    assert_eq!(exec(&mut r, "printa"), "99\n");
    assert_eq!(exec(&mut r, "printall"), "99\n");
    exec(&mut r, ":+doall print 'all'");
    assert_eq!(exec(&mut r, "do i = 1, 2\nprint i\nend do"), "1\n2\n");
}

#[test]
fn test_error_at_first_column_has_caret() {
    let mut r = Runtime::default();
    let mut c = Capture::new(&[]);
    r.enter(&mut c, "prnt 1");
    assert_eq!(c.errors.len(), 1);
    assert_eq!(c.errors[0].code(), ErrorCode::UndefinedName);
    assert_eq!(c.errors[0].caret("prnt 1").as_deref(), Some("prnt 1\n^^^^"));
}

#[test]
fn test_assignment_to_macro_name() {
    let mut r = Runtime::default();
    exec(&mut r, ":+total print 'macro'");
    assert_eq!(exec(&mut r, "total = 5; print total + 1"), "6\n");
}

#[test]
fn test_command_file_with_arguments() {
    let path = std::env::temp_dir().join(format!("cmdlang_session_{}.cmd", std::process::id()));
    std::fs::write(&path, "# comment\nprint %1 + 1\nprint '%%2'\n").unwrap();
    let mut r = Runtime::default();
    let mut c = Capture::new(&[]);
    let mode = r.run_file(&mut c, &path, vec!["4".into(), "x".into()]).unwrap();
    assert_eq!(mode, None);
    assert_eq!(c.take_output(), "5\nx\n");
    let line = format!("@{} 10 y\nprint 'back'", path.display());
    assert_eq!(exec(&mut r, &line), "11\ny\nback\n");
    std::fs::remove_file(&path).unwrap();
    let e = r.run_file(&mut c, &path, vec![]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::FileNotFound);
}

#[test]
fn test_block_spans_lines() {
    let mut r = Runtime::default();
    let mut c = Capture::new(&["i = 0; while i < 3", "i = i + 1", "end while", "print i"]);
    assert_eq!(r.run(&mut c), ExitMode::Full(0));
    assert_eq!(c.take_output(), "3\n");
}

fn first(host: &mut Host, mode: ExitMode) {
    host.print(&format!("first {:?}\n", mode));
}

fn second(host: &mut Host, _: ExitMode) {
    host.print("second\n");
}

#[test]
fn test_shutdown_order_and_cleanup() {
    let mut r = Runtime::default();
    let mut a = Module::new("alpha_mod");
    a.teardown = Some(first);
    let mut b = Module::new("beta_mod");
    b.teardown = Some(second);
    r.register(a).unwrap();
    r.register(b).unwrap();
    exec(&mut r, "kept = 1\n:+m print 1");
    let mut c = Capture::new(&[]);
    r.shutdown(&mut c, ExitMode::Minimal(0));
    assert_eq!(c.take_output(), "second\nfirst Minimal(0)\n");
    assert!(r.get("kept").is_some());
    r.shutdown(&mut c, ExitMode::Full(2));
    assert_eq!(c.take_output(), "second\nfirst Full(2)\n");
    assert!(r.get("kept").is_none());
    assert!(r.get("verbose").is_some());
    assert_eq!(errors(&mut r, "m"), vec![ErrorCode::AmbiguousName]);
}

#[test]
fn test_quit_inside_block() {
    let mut r = Runtime::default();
    let mut c = Capture::new(&["print 'never'"]);
    let mode = r.enter(&mut c, "do i = 1, 5\nif (i == 2) then\nquit 7\nend if\nprint i\nend do\nprint 'no'");
    assert_eq!(mode, Some(ExitMode::Full(7)));
    assert_eq!(c.take_output(), "1\n");
}

#[test]
fn test_abort_flag_unwinds_one_statement() {
    let mut r = Runtime::default();
    r.abort_flag().store(true, Ordering::SeqCst);
    assert_eq!(errors(&mut r, "print 1"), vec![ErrorCode::Interrupted]);
    assert!(!r.abort_flag().load(Ordering::SeqCst));
    assert_eq!(exec(&mut r, "print 2"), "2\n");
}

thread_local! {
    static TRIPWIRE: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
    static CALLS: Cell<usize> = const { Cell::new(0) };
}

/// Raises the abort flag while evaluating the element equal to 3.
fn trip(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<(), Error> {
    let n = i64::try_from(&args[0])?;
    CALLS.with(|calls| calls.set(calls.get() + 1));
    if n == 3 {
        TRIPWIRE.with(|flag| {
            if let Some(flag) = &*flag.borrow() {
                flag.store(true, Ordering::SeqCst);
            }
        });
    }
    if let Some(out) = out {
        *out = Val::scalar(Scalar::Integer(n)).with_owner(Ownership::FunctionValue);
    }
    Ok(())
}

#[test]
fn test_abort_flag_stops_element_loop() {
    let mut r = Runtime::default();
    let mut m = Module::new("tripwire");
    m.functions = vec![Function::elemental(
        "trip",
        &[ArgDecl::value(ArgType::Integer, ArgRank::Scalar)],
        Returns::Fixed(Type::Integer),
        trip,
    )];
    r.register(m).unwrap();
    TRIPWIRE.with(|flag| *flag.borrow_mut() = Some(r.abort_flag()));
    exec(&mut r, "integer v(6); v = @");
    assert_eq!(errors(&mut r, "print trip(v)"), vec![ErrorCode::Interrupted]);
    assert_eq!(CALLS.with(|calls| calls.get()), 3);
    assert!(!r.abort_flag().load(Ordering::SeqCst));
    assert_eq!(exec(&mut r, "print trip(2)"), "2\n");
}
