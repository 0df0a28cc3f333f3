//! # cmdlang
//!
//! An embeddable command language for interactive array computation.
//!
//! Statements are typed at a prompt or read from command files. Names may
//! be shortened to any unambiguous prefix, macros and `%n` arguments are
//! expanded before compiling, and every expression broadcasts over arrays
//! of up to three dimensions.
//!
//! ```text
//! cmd> float b(10)
//! cmd> b = @
//! cmd> prin 2 * sum(b)
//! 110
//! ```
//!
//! A host application embeds the interpreter by building a
//! [`Runtime`](mach::Runtime), registering its own [`Module`](mach::Module)s
//! and feeding it a [`Console`](lang::Console).

pub mod config;
pub mod lang;
pub mod mach;
