#![allow(dead_code)]
use cmdlang::lang::{Capture, ErrorCode};
use cmdlang::mach::Runtime;

/// Run `text` and return what it printed, errors included as `?` lines.
pub fn exec(runtime: &mut Runtime, text: &str) -> String {
    let mut console = Capture::new(&[]);
    runtime.enter(&mut console, text);
    console.take_output()
}

/// Run `text` and return the codes of the errors it raised.
pub fn errors(runtime: &mut Runtime, text: &str) -> Vec<ErrorCode> {
    let mut console = Capture::new(&[]);
    runtime.enter(&mut console, text);
    console.errors.iter().map(|e| e.code()).collect()
}
