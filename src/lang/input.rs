use super::symbol::{Match, SymbolTable};
use super::{Console, Error, Keyword};
use crate::config::Config;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

/// One statement's worth of pre-processed text.
#[derive(Debug, Clone, PartialEq)]
pub struct SubLine {
    pub text: String,
    pub origin: Rc<str>,
}

enum Feed {
    Console,
    File(BufReader<File>, usize),
    Lines(VecDeque<String>),
}

struct Level {
    name: Rc<str>,
    feed: Feed,
    args: Vec<String>,
    pending: VecDeque<String>,
    /// Exhausting this level ends the current run instead of falling
    /// through to the level below.
    terminal: bool,
}

impl Level {
    fn origin(&self) -> Rc<str> {
        match &self.feed {
            Feed::File(_, line) => format!("{}:{}", self.name, line).into(),
            _ => self.name.clone(),
        }
    }
}

/// ## Input level stack and pre-processor
///
/// Characters are drawn from the top level only. A level is the
/// interactive console, a command file, or a buffer of lines such as a
/// macro body. Physical lines are split into sub-lines at semicolons
/// after positional arguments (`%1`, `%2.3`, `%2.*`, `%`) are substituted
/// from the level's captured arguments.
pub struct Input {
    levels: Vec<Level>,
    macros: SymbolTable<String>,
    max_depth: usize,
    comment_prefix: char,
    shell_prefix: char,
    macro_prefix: char,
    file_prefix: char,
    shell_escape: bool,
}

impl Input {
    pub fn new(config: &Config) -> Input {
        Input {
            levels: vec![Level {
                name: "".into(),
                feed: Feed::Console,
                args: vec![],
                pending: VecDeque::new(),
                terminal: false,
            }],
            macros: SymbolTable::new(config.limits.name_length),
            max_depth: config.limits.input_depth.max(2),
            comment_prefix: config.comment_prefix,
            shell_prefix: config.shell_prefix,
            macro_prefix: config.macro_prefix,
            file_prefix: config.file_prefix,
            shell_escape: config.shell_escape,
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn macros(&self) -> &SymbolTable<String> {
        &self.macros
    }

    pub fn define_macro(&mut self, name: &str, body: &str) -> Result<()> {
        debug!(target: "cmdlang::input", name, "define macro");
        self.macros.insert(name, body.to_string(), true)?;
        Ok(())
    }

    fn push(&mut self, level: Level) -> Result<()> {
        if self.levels.len() >= self.max_depth {
            return Err(error!(InputNesting; format!("AT '{}'", level.name)));
        }
        trace!(target: "cmdlang::input", name = %level.name, depth = self.levels.len(), "push level");
        self.levels.push(level);
        Ok(())
    }

    /// Run the lines of `text` as a level of their own.
    pub fn push_text(&mut self, name: &str, text: &str, args: Vec<String>, terminal: bool) -> Result<()> {
        self.push(Level {
            name: name.into(),
            feed: Feed::Lines(text.lines().map(String::from).collect()),
            args,
            pending: VecDeque::new(),
            terminal,
        })
    }

    pub fn push_file(&mut self, path: &Path, args: Vec<String>, terminal: bool) -> Result<()> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                return Err(error!(FileNotFound; format!("{}: {}", path.display(), e)));
            }
        };
        self.push(Level {
            name: path.display().to_string().into(),
            feed: Feed::File(BufReader::new(file), 0),
            args,
            pending: VecDeque::new(),
            terminal,
        })
    }

    /// Discard the rest of the current line and close nested command files
    /// and macro expansions down to the primary level.
    pub fn flush(&mut self) {
        while let Some(level) = self.levels.last() {
            if level.terminal || matches!(level.feed, Feed::Console) {
                break;
            }
            self.levels.pop();
        }
        if let Some(level) = self.levels.last_mut() {
            level.pending.clear();
        }
    }

    /// Close every level above the console, terminal ones included.
    pub fn reset(&mut self) {
        self.levels.truncate(1);
        if let Some(level) = self.levels.last_mut() {
            level.pending.clear();
        }
    }

    pub fn clear_macros(&mut self) {
        self.macros.clear();
    }

    /// Next sub-line, reading and pre-processing physical lines as needed.
    /// `Ok(None)` is end of input on the console, or exhaustion of a
    /// terminal level. `known` tells whether a word resolves in the global
    /// name space; such a word only calls a macro spelled exactly like it.
    pub fn next_line(
        &mut self,
        console: &mut dyn Console,
        prompt: &str,
        known: &dyn Fn(&str) -> bool,
    ) -> Result<Option<SubLine>> {
        loop {
            let top = match self.levels.last_mut() {
                Some(top) => top,
                None => return Ok(None),
            };
            if let Some(text) = top.pending.pop_front() {
                let origin = top.origin();
                if let Some((name, body, args)) = self.macro_call(&text, known) {
                    debug!(target: "cmdlang::input", name = %name, "expand macro");
                    self.push(Level {
                        name: name.into(),
                        feed: Feed::Lines(VecDeque::from(vec![body])),
                        args,
                        pending: VecDeque::new(),
                        terminal: false,
                    })?;
                    continue;
                }
                return Ok(Some(SubLine { text, origin }));
            }
            let raw = match &mut top.feed {
                Feed::Console => match console.read_line(prompt) {
                    Ok(line) => line,
                    Err(e) => return Err(error!(IoError; e.to_string())),
                },
                Feed::File(reader, number) => {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) => None,
                        Ok(_) => {
                            *number += 1;
                            Some(line.trim_end_matches(&['\r', '\n'][..]).to_string())
                        }
                        Err(e) => return Err(error!(IoError; e.to_string())),
                    }
                }
                Feed::Lines(lines) => lines.pop_front(),
            };
            match raw {
                Some(line) => self.physical(&line, console)?,
                None => {
                    if matches!(top.feed, Feed::Console) {
                        return Ok(None);
                    }
                    let terminal = top.terminal;
                    if let Some(level) = self.levels.pop() {
                        trace!(target: "cmdlang::input", name = %level.name, "pop level");
                    }
                    if terminal {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn args(&self) -> (&str, &[String]) {
        match self.levels.last() {
            Some(level) => (&level.name, &level.args),
            None => ("", &[]),
        }
    }

    fn physical(&mut self, line: &str, console: &mut dyn Console) -> Result<()> {
        let trimmed = line.trim();
        let first = match trimmed.chars().next() {
            Some(ch) => ch,
            None => return Ok(()),
        };
        let rest = &trimmed[first.len_utf8()..];
        if first == self.comment_prefix {
            return Ok(());
        }
        if first == self.macro_prefix {
            return self.manage_macro(rest.trim_start(), console);
        }
        if first == self.shell_prefix {
            let (name, args) = self.args();
            let command = substitute(rest, name, args)?.join(";");
            return self.shell(&command, console);
        }
        if first == self.file_prefix {
            let (name, args) = self.args();
            let text = substitute(rest, name, args)?.join(";");
            let mut words = split_args(&text).into_iter();
            let path = match words.next() {
                Some(path) => unquote(&path),
                None => return Err(error!(SyntaxError; "MISSING FILE NAME")),
            };
            return self.push_file(Path::new(&path), words.collect(), false);
        }
        let (name, args) = self.args();
        let sub_lines = substitute(trimmed, name, args)?;
        if let Some(top) = self.levels.last_mut() {
            top.pending
                .extend(sub_lines.into_iter().filter(|s| !s.trim().is_empty()));
        }
        Ok(())
    }

    fn manage_macro(&mut self, text: &str, console: &mut dyn Console) -> Result<()> {
        let mut chars = text.chars();
        let action = chars.next();
        let rest = chars.as_str().trim();
        match action {
            Some('+') => {
                let (name, body) = match rest.find(char::is_whitespace) {
                    Some(at) => (&rest[..at], rest[at..].trim()),
                    None => (rest, ""),
                };
                if name.is_empty() {
                    return Err(error!(SyntaxError; "MISSING MACRO NAME"));
                }
                self.define_macro(name, body)
            }
            Some('-') => {
                let full = self.macros.lookup(rest)?.0.to_string();
                self.macros.remove(&full);
                debug!(target: "cmdlang::input", name = %full, "remove macro");
                Ok(())
            }
            Some('?') => {
                let mut s = String::new();
                for (name, body) in self.macros.with_prefix(rest) {
                    s.push_str(&format!("{} = {}\n", name, body));
                }
                console.print(&s);
                Ok(())
            }
            _ => Err(error!(SyntaxError; "EXPECTED +NAME, -NAME OR ?PREFIX")),
        }
    }

    fn shell(&self, command: &str, console: &mut dyn Console) -> Result<()> {
        if !self.shell_escape {
            return Err(error!(SyntaxError; "SHELL ESCAPE DISABLED"));
        }
        debug!(target: "cmdlang::input", command, "shell escape");
        match std::process::Command::new("sh").arg("-c").arg(command).output() {
            Ok(out) => {
                console.print(&String::from_utf8_lossy(&out.stdout));
                console.print(&String::from_utf8_lossy(&out.stderr));
                Ok(())
            }
            Err(e) => Err(error!(IoError; e.to_string())),
        }
    }

    /// A sub-line whose first word names a macro becomes an expansion. An
    /// assignment to a same-named variable is left alone.
    fn macro_call(&self, text: &str, known: &dyn Fn(&str) -> bool) -> Option<(String, String, Vec<String>)> {
        if self.macros.is_empty() {
            return None;
        }
        let text = text.trim_start();
        let end = text
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or_else(|| text.len());
        let word = &text[..end];
        if word.is_empty() || !word.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            return None;
        }
        let rest = text[end..].trim_start();
        if rest.starts_with('=') && !rest.starts_with("==") {
            return None;
        }
        match self.macros.classify(word) {
            Match::Exact(_) => {}
            _ => return None,
        }
        let (name, body) = self.macros.lookup(word).ok()?;
        if !name.eq_ignore_ascii_case(word) && (known(word) || Keyword::from_name(word).is_some()) {
            return None;
        }
        Some((name.to_string(), body.clone(), split_args(rest)))
    }
}

fn unquote(s: &str) -> String {
    let t = s.trim();
    if t.len() >= 2
        && ((t.starts_with('"') && t.ends_with('"')) || (t.starts_with('\'') && t.ends_with('\'')))
    {
        t[1..t.len() - 1].to_string()
    } else {
        t.to_string()
    }
}

/// Split an argument string at blanks and commas outside quotes. Quotes are
/// kept so a substituted argument stays a string literal.
pub fn split_args(text: &str) -> Vec<String> {
    let mut args = vec![];
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                cur.push(ch);
                if ch == '\\' {
                    if let Some(esc) = chars.next() {
                        cur.push(esc);
                    }
                } else if ch == q {
                    quote = None;
                }
            }
            None => {
                if ch == ' ' || ch == '\t' || ch == ',' {
                    if !cur.is_empty() {
                        args.push(std::mem::take(&mut cur));
                    }
                } else {
                    if ch == '"' || ch == '\'' {
                        quote = Some(ch);
                    }
                    cur.push(ch);
                }
            }
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

/// Substitute positional arguments and split at semicolons.
///
/// Outside quotes `;` separates sub-lines, `%%` is a literal percent sign
/// and any other `%` is an argument reference. Inside quotes both are
/// literal, except that a doubled `%%` followed by a digit substitutes.
pub fn substitute(line: &str, name: &str, args: &[String]) -> Result<Vec<String>> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = vec![];
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match quote {
            Some(q) => {
                if ch == '\\' && i + 1 < chars.len() {
                    cur.push(ch);
                    cur.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if ch == q {
                    quote = None;
                } else if ch == '%'
                    && chars.get(i + 1) == Some(&'%')
                    && matches!(chars.get(i + 2), Some(c) if c.is_ascii_digit())
                {
                    i = reference(&chars, i + 1, name, args, &mut cur)?;
                    continue;
                }
                cur.push(ch);
                i += 1;
            }
            None => {
                match ch {
                    '"' | '\'' => {
                        quote = Some(ch);
                        cur.push(ch);
                    }
                    ';' => out.push(std::mem::take(&mut cur)),
                    '%' if chars.get(i + 1) == Some(&'%') => {
                        cur.push('%');
                        i += 2;
                        continue;
                    }
                    '%' => {
                        i = reference(&chars, i, name, args, &mut cur)?;
                        continue;
                    }
                    _ => cur.push(ch),
                }
                i += 1;
            }
        }
    }
    out.push(cur);
    Ok(out)
}

/// Expand the reference starting at the `%` in `chars[at]`; returns the
/// index just past it.
fn reference(chars: &[char], at: usize, name: &str, args: &[String], out: &mut String) -> Result<usize> {
    fn number(chars: &[char], mut i: usize) -> (Option<usize>, usize) {
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return (None, i);
        }
        let s: String = chars[start..i].iter().collect();
        (s.parse().ok(), i)
    }
    fn arg<'a>(n: usize, name: &'a str, args: &'a [String]) -> &'a str {
        if n == 0 {
            name
        } else {
            args.get(n - 1).map(|s| s.as_str()).unwrap_or("")
        }
    }
    let (first, i) = number(chars, at + 1);
    let first = match first {
        Some(n) => n,
        None => {
            if i > at + 1 {
                return Err(error!(Overflow, ..&(at..i); "ARGUMENT NUMBER"));
            }
            out.push_str(&args.len().to_string());
            return Ok(i);
        }
    };
    if chars.get(i) == Some(&'.') {
        if chars.get(i + 1) == Some(&'*') {
            let joined: Vec<&str> = (first.max(1)..=args.len()).map(|n| arg(n, name, args)).collect();
            out.push_str(&joined.join(" "));
            return Ok(i + 2);
        }
        if let (Some(last), next) = number(chars, i + 1) {
            let joined: Vec<&str> = (first..=last.min(args.len())).map(|n| arg(n, name, args)).collect();
            out.push_str(&joined.join(" "));
            return Ok(next);
        }
    }
    out.push_str(arg(first, name, args));
    Ok(i)
}
