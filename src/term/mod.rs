//! Line editing terminal for the interactive session.

use ansi_term::{Colour, Style};
use cmdlang::lang::{Console, Error};
use linefeed::{DefaultTerminal, Interface, ReadResult, Signal};
use std::io::Write;

pub struct Terminal {
    interface: Interface<DefaultTerminal>,
}

impl Terminal {
    pub fn new() -> std::io::Result<Terminal> {
        let interface = Interface::new("cmdlang")?;
        interface.set_report_signal(Signal::Interrupt, true);
        Ok(Terminal { interface })
    }
}

impl Console for Terminal {
    fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        self.interface.set_prompt(prompt)?;
        loop {
            match self.interface.read_line()? {
                ReadResult::Input(string) => {
                    if !string.trim().is_empty() {
                        self.interface.add_history_unique(string.clone());
                    }
                    return Ok(Some(string));
                }
                ReadResult::Signal(Signal::Interrupt) => {
                    self.interface.set_buffer("")?;
                    self.interface.lock_reader().cancel_read_line()?;
                }
                ReadResult::Signal(_) | ReadResult::Eof => return Ok(None),
            }
        }
    }

    fn print(&mut self, text: &str) {
        let _ = self.interface.write_fmt(format_args!("{}", text));
    }

    fn error(&mut self, error: &Error, line: &str) {
        let message = Style::new().bold().fg(Colour::Red).paint(format!("?{}", error));
        if let Some(caret) = error.caret(line) {
            let _ = self.interface.write_fmt(format_args!("{}\n", caret));
        }
        let _ = self.interface.write_fmt(format_args!("{}\n", message));
    }
}

/// Console for scripts run without a terminal: plain stdin and stdout.
pub struct Plain;

impl Console for Plain {
    fn read_line(&mut self, _prompt: &str) -> std::io::Result<Option<String>> {
        let mut s = String::new();
        match std::io::stdin().read_line(&mut s)? {
            0 => Ok(None),
            _ => Ok(Some(s.trim_end_matches(&['\r', '\n'][..]).to_string())),
        }
    }

    fn print(&mut self, text: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn error(&mut self, error: &Error, line: &str) {
        if let Some(caret) = error.caret(line) {
            eprintln!("{}", caret);
        }
        eprintln!("?{}", error);
    }
}
