/*!
# Language Module

Lexical analysis and pre-processing: the minimum-match symbol table, the
input level stack with macro and argument expansion, and the tokenizer
the compiler pulls from.

*/

#[macro_use]
mod error;
mod console;
mod input;
mod lex;
pub mod symbol;
pub mod token;

pub type Column = std::ops::Range<usize>;

pub use console::{Capture, Console};
pub use error::{Category, Error, ErrorCode};
pub use input::{split_args, substitute, Input, SubLine};
pub use lex::{lex, Lexer, Mark};
pub use symbol::SymbolTable;
pub use token::{Keyword, Operator, Token};
