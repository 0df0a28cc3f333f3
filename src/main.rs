//! # cmdlang
//!
//! Interactive shell and script runner for the command language.

mod term;

use clap::Parser;
use cmdlang::config::Config;
use cmdlang::lang::Console;
use cmdlang::mach::{ExitMode, Runtime};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, Level};

#[derive(Parser, Debug)]
#[command(name = "cmdlang", version, about = "Array command language interpreter")]
struct Args {
    /// Configuration file; defaults to ~/.cmdlang.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(short, long)]
    log: Option<String>,

    /// Command file to run instead of the interactive prompt
    script: Option<PathBuf>,

    /// Arguments available to the command file as %1, %2, ...
    args: Vec<String>,
}

fn level(name: &str) -> Level {
    match name.to_ascii_lowercase().as_str() {
        "error" => Level::ERROR,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::WARN,
    }
}

fn main() {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::discover(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("?{}", e);
            std::process::exit(2);
        }
    };

    let log = args
        .log
        .clone()
        .or_else(|| std::env::var("CMDLANG_LOG").ok())
        .or_else(|| config.log.clone())
        .unwrap_or_else(|| "warn".to_string());
    tracing_subscriber::fmt()
        .with_max_level(level(&log))
        .with_writer(std::io::stderr)
        .init();

    let mut runtime = Runtime::new(config);
    let abort = runtime.abort_flag();
    if let Err(e) = ctrlc::set_handler(move || abort.store(true, Ordering::SeqCst)) {
        error!(target: "cmdlang::runtime", error = %e, "interrupt handler");
    }

    let mut console: Box<dyn Console> = match args.script {
        Some(_) => Box::new(term::Plain),
        None => match term::Terminal::new() {
            Ok(t) => Box::new(t),
            Err(_) => Box::new(term::Plain),
        },
    };
    let console = console.as_mut();

    let mode = session(&mut runtime, console, args.script, args.args);
    runtime.shutdown(console, mode);
    std::process::exit(mode.code());
}

fn session(runtime: &mut Runtime, console: &mut dyn Console, script: Option<PathBuf>, args: Vec<String>) -> ExitMode {
    if let Some(startup) = runtime.config().startup.clone() {
        match runtime.run_file(console, &startup, vec![]) {
            Ok(Some(mode)) => return mode,
            Ok(None) => {}
            Err(e) => console.error(&e, ""),
        }
    }
    match script {
        Some(path) => match runtime.run_file(console, &path, args) {
            Ok(Some(mode)) => mode,
            Ok(None) => ExitMode::Full(0),
            Err(e) => {
                console.error(&e, "");
                ExitMode::Full(1)
            }
        },
        None => runtime.run(console),
    }
}
