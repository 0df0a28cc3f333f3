/*!
## Machine Module

The compiler and executor. A statement is compiled into a flat, relocatable
vector of nodes, then run: control nodes step by step, expressions once
per element of their broadcast domain.

*/

mod builtin;
mod compile;
mod eval;
mod exec;
mod expression;
mod function;
mod host;
mod link;
mod opcode;
mod operation;
mod runtime;
mod stack;
mod val;
mod var;

pub use builtin::core;
pub use compile::{Compiler, LineSource};
pub use eval::View;
pub use exec::{Flow, Machine};
pub use expression::Typed;
pub use function::{ArgDecl, ArgRank, ArgType, FuncId, Function, Kind, Mode, Module, Native, Returns, Teardown};
pub use host::{ExitMode, Host, Request};
pub use link::{Address, Link};
pub use opcode::{Access, Axis, ExprInfo, LoopState, Offset, Opcode};
pub use operation::{BinOp, Operation, Signature};
pub use runtime::{Registered, Runtime};
pub use stack::Stack;
pub use val::{float_to_int, Data, Ownership, Scalar, Shape, Type, Val, MAX_RANK};
pub use var::{prefer, Entry, VarId, Variable, Vars};
