use super::builtin;
use super::compile::{Compiler, LineSource};
use super::exec::{Flow, Machine};
use super::function::{FuncId, Function, Module, Teardown};
use super::var::{prefer, Entry, Vars};
use super::{ExitMode, Host, Link, Ownership, Scalar, Stack, Val};
use crate::config::Config;
use crate::lang::{Console, Error, Input, SubLine, SymbolTable};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

type Result<T> = std::result::Result<T, Error>;

/// What the runtime keeps of a registered module.
#[derive(Debug)]
pub struct Registered {
    pub name: &'static str,
    pub help_dir: Option<PathBuf>,
    pub functions: Vec<FuncId>,
    pub teardown: Option<Teardown>,
}

/// Continuation lines of a block statement, read with the secondary prompt.
struct Feeder<'a> {
    input: &'a mut Input,
    console: &'a mut dyn Console,
    prompt: &'a str,
}

impl<'a> LineSource for Feeder<'a> {
    fn next_line(&mut self, known: &dyn Fn(&str) -> bool) -> Result<Option<SubLine>> {
        self.input.next_line(self.console, self.prompt, known)
    }
}

enum Step {
    Ran,
    EndOfInput,
    Exit(ExitMode),
}

/// ## Interpreter session
///
/// Owns the name space, the variable memory, the function registry and the
/// input stack. Each statement is compiled into the link, executed, and its
/// printed output handed to the console.
pub struct Runtime {
    config: Config,
    symbols: SymbolTable<Entry>,
    vars: Vars,
    functions: Vec<Function>,
    modules: Vec<Registered>,
    host: Host,
    input: Input,
    link: Link,
    values: Stack<Val>,
    run: Stack<Scalar>,
    abort: Arc<AtomicBool>,
}

impl Default for Runtime {
    fn default() -> Runtime {
        Runtime::new(Config::default())
    }
}

impl Runtime {
    pub fn new(config: Config) -> Runtime {
        let limits = config.limits.clone();
        let mut runtime = Runtime {
            symbols: SymbolTable::new(limits.name_length).with_resolver(prefer),
            vars: Vars::new(),
            functions: vec![],
            modules: vec![],
            host: Host::new(),
            input: Input::new(&config),
            link: Link::new(limits.compile_stack),
            values: Stack::new("VALUE STACK", limits.value_stack),
            run: Stack::new("RUN STACK", limits.run_stack),
            abort: Arc::new(AtomicBool::new(false)),
            config,
        };
        if let Err(e) = runtime.register(builtin::core()) {
            warn!(target: "cmdlang::runtime", error = %e, "core module");
        }
        runtime
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Set to interrupt the running statement; cleared once reported.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    /// Add a module's functions and variables to the name space.
    pub fn register(&mut self, module: Module) -> Result<()> {
        let index = self.modules.len();
        self.symbols.insert(module.name, Entry::Module(index), false)?;
        let mut functions = Vec::with_capacity(module.functions.len());
        for f in module.functions {
            let id = self.functions.len();
            self.symbols.insert(
                f.name,
                Entry::Function {
                    id,
                    preferred: f.preferred,
                },
                false,
            )?;
            self.functions.push(f);
            functions.push(id);
        }
        for (name, val) in module.variables {
            let id = self.vars.insert(name.into(), val);
            self.symbols.insert(name, Entry::Variable(id), false)?;
        }
        debug!(target: "cmdlang::runtime", module = module.name, functions = functions.len(), "register");
        self.modules.push(Registered {
            name: module.name,
            help_dir: module.help_dir,
            functions,
            teardown: module.teardown,
        });
        Ok(())
    }

    pub fn define_macro(&mut self, name: &str, body: &str) -> Result<()> {
        self.input.define_macro(name, body)
    }

    /// The value of a variable, by exact name.
    pub fn get(&self, name: &str) -> Option<&Val> {
        match self.symbols.get_exact(name) {
            Some(Entry::Variable(id)) => self.vars.val(*id).ok(),
            _ => None,
        }
    }

    /// Listing of the most recently compiled statement.
    pub fn listing(&self) -> String {
        self.link.listing()
    }

    /// Run the lines of `text` as if typed, then return. `Some` when a
    /// statement asked to leave.
    pub fn enter(&mut self, console: &mut dyn Console, text: &str) -> Option<ExitMode> {
        if let Err(e) = self.input.push_text("", text, vec![], true) {
            self.report(console, &e, text);
            return None;
        }
        self.drain(console)
    }

    /// Run a command file with positional arguments, then return.
    pub fn run_file(&mut self, console: &mut dyn Console, path: &Path, args: Vec<String>) -> Result<Option<ExitMode>> {
        info!(target: "cmdlang::runtime", path = %path.display(), "run file");
        self.input.push_file(path, args, true)?;
        Ok(self.drain(console))
    }

    fn drain(&mut self, console: &mut dyn Console) -> Option<ExitMode> {
        let depth = self.input.depth();
        while self.input.depth() >= depth {
            match self.step(console) {
                Step::Ran => {}
                Step::EndOfInput => return None,
                Step::Exit(mode) => {
                    self.input.reset();
                    return Some(mode);
                }
            }
        }
        None
    }

    /// Interactive session on the console's own input.
    pub fn run(&mut self, console: &mut dyn Console) -> ExitMode {
        let mut eofs = 0;
        loop {
            match self.step(console) {
                Step::Ran => eofs = 0,
                Step::EndOfInput => {
                    eofs += 1;
                    if eofs >= self.config.eof_limit.max(1) {
                        return ExitMode::Full(0);
                    }
                }
                Step::Exit(mode) => return mode,
            }
        }
    }

    fn step(&mut self, console: &mut dyn Console) -> Step {
        let symbols = &self.symbols;
        let known = |word: &str| symbols.find(word).is_some();
        let line = match self.input.next_line(console, &self.config.prompt, &known) {
            Ok(Some(line)) => line,
            Ok(None) => return Step::EndOfInput,
            Err(e) => {
                self.report(console, &e, "");
                return Step::Ran;
            }
        };
        match self.statement(console, &line) {
            Ok(Some(mode)) => Step::Exit(mode),
            Ok(None) => Step::Ran,
            Err((e, text)) => {
                self.report(console, &e, &text);
                Step::Ran
            }
        }
    }

    fn report(&mut self, console: &mut dyn Console, e: &Error, line: &str) {
        warn!(target: "cmdlang::runtime", code = ?e.code(), "{}", e);
        console.error(e, line);
        self.input.flush();
        self.abort.store(false, Ordering::SeqCst);
    }

    fn verbose(&self) -> bool {
        matches!(self.get("verbose").map(|v| v.first()), Some(Ok(Scalar::Logical(true))))
    }

    /// Compile and execute one statement. Errors carry the text to put a
    /// caret under.
    fn statement(&mut self, console: &mut dyn Console, line: &SubLine) -> std::result::Result<Option<ExitMode>, (Error, String)> {
        trace!(target: "cmdlang::runtime", origin = %line.origin, text = %line.text, "statement");
        if self.verbose() {
            console.print(&format!("{}\n", line.text.trim()));
        }
        self.link.clear();
        {
            let mut source = Feeder {
                input: &mut self.input,
                console: &mut *console,
                prompt: &self.config.continuation_prompt,
            };
            let mut compiler = Compiler::new(
                &mut self.symbols,
                &mut self.vars,
                &self.functions,
                &mut self.link,
                &mut source,
                self.config.limits.name_length,
            );
            if let Err(e) = compiler.compile(&line.text) {
                let text = compiler.line();
                return Err((e, text));
            }
        }
        let mut code = self.link.take();
        let result = Machine {
            symbols: &mut self.symbols,
            vars: &mut self.vars,
            functions: &self.functions,
            modules: &self.modules,
            host: &mut self.host,
            values: &mut self.values,
            run: &mut self.run,
            abort: &self.abort,
        }
        .exe_control(&mut code);
        self.link.restore(code);
        self.values.clear();
        self.run.clear();
        let output = self.host.take_output();
        if !output.is_empty() {
            console.print(&output);
        }
        match result {
            Ok(Flow::Exit(mode)) => Ok(Some(mode)),
            Ok(Flow::Finished) | Ok(Flow::Stopped) => Ok(None),
            Err(e) => Err((e, line.text.clone())),
        }
    }

    /// Run the module teardowns, newest first. A full exit also releases
    /// user variables, macros and open command files.
    pub fn shutdown(&mut self, console: &mut dyn Console, mode: ExitMode) {
        info!(target: "cmdlang::runtime", ?mode, "shutdown");
        for module in self.modules.iter().rev() {
            if let Some(teardown) = module.teardown {
                debug!(target: "cmdlang::runtime", module = module.name, "teardown");
                teardown(&mut self.host, mode);
            }
        }
        if let ExitMode::Full(_) = mode {
            let declared: Vec<String> = self
                .symbols
                .iter()
                .filter_map(|(name, entry)| match entry {
                    Entry::Variable(id) => match self.vars.val(*id) {
                        Ok(val) if val.owner() == Ownership::Declared => Some(name.to_string()),
                        _ => None,
                    },
                    _ => None,
                })
                .collect();
            for name in declared {
                if let Some(Entry::Variable(id)) = self.symbols.remove(&name) {
                    self.vars.remove(id);
                }
            }
            self.input.clear_macros();
            self.input.reset();
        }
        let output = self.host.take_output();
        if !output.is_empty() {
            console.print(&output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Capture;

    #[test]
    fn test_register_rejects_duplicates() {
        let mut r = Runtime::default();
        let mut m = Module::new("extra");
        m.variables = vec![("pi", Val::scalar(Scalar::Float(3.0)))];
        let e = r.register(m).unwrap_err();
        assert_eq!(e.code(), crate::lang::ErrorCode::Duplicate);
    }

    #[test]
    fn test_enter_returns_after_text() {
        let mut r = Runtime::default();
        let mut c = Capture::new(&["print 99"]);
        assert_eq!(r.enter(&mut c, "x = 2\nprint x * 3"), None);
        assert_eq!(c.take_output(), "6\n");
        assert_eq!(r.get("x").map(|v| v.to_string()), Some("2".to_string()));
    }

    #[test]
    fn test_exit_modes() {
        let mut r = Runtime::default();
        let mut c = Capture::new(&[]);
        assert_eq!(r.enter(&mut c, "quit 3"), Some(ExitMode::Full(3)));
        assert_eq!(r.enter(&mut c, "exit"), Some(ExitMode::Minimal(0)));
        assert_eq!(r.enter(&mut c, "print 1; quit; print 2"), Some(ExitMode::Full(0)));
        assert_eq!(c.take_output(), "1\n");
    }

    #[test]
    fn test_run_stops_after_eof_limit() {
        let mut r = Runtime::default();
        let mut c = Capture::new(&["print 1"]);
        assert_eq!(r.run(&mut c), ExitMode::Full(0));
        assert_eq!(c.take_output(), "1\n");
    }
}
