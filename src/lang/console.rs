use super::Error;
use std::collections::VecDeque;

/// The primary input stream and the place printed text goes.
pub trait Console {
    /// `Ok(None)` signals end of input.
    fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>>;
    fn print(&mut self, text: &str);
    /// Report an error raised while processing `line`.
    fn error(&mut self, error: &Error, line: &str);
}

/// A console fed from a list of lines that records everything written to
/// it. Errors are recorded as `?MESSAGE` lines.
#[derive(Debug, Default, Clone)]
pub struct Capture {
    input: VecDeque<String>,
    pub output: String,
    pub errors: Vec<Error>,
}

impl Capture {
    pub fn new(lines: &[&str]) -> Capture {
        Capture {
            input: lines.iter().map(|s| s.to_string()).collect(),
            ..Capture::default()
        }
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Console for Capture {
    fn read_line(&mut self, _prompt: &str) -> std::io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn error(&mut self, error: &Error, _line: &str) {
        self.output.push_str(&format!("?{}\n", error));
        self.errors.push(error.clone());
    }
}
