use super::{ExitMode, Host, Type, Val};
use crate::lang::Error;
use std::path::PathBuf;

type Result<T> = std::result::Result<T, Error>;

pub type FuncId = usize;

/// Native calling convention: the argument cells and, for functions that
/// return something, the output cell.
pub type Native = fn(&mut Host, &mut [Val], Option<&mut Val>) -> Result<()>;

pub type Teardown = fn(&mut Host, ExitMode);

/// Declared type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Float,
    Integer,
    Text,
    Logical,
    Any,
    Numeric,
    /// Unquoted text up to the next comma in command position.
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRank {
    Scalar,
    One,
    Two,
    Three,
    Any,
}

impl ArgRank {
    pub fn accepts(self, rank: usize, len: usize) -> bool {
        match self {
            ArgRank::Any => true,
            ArgRank::Scalar => rank == 0 || len == 1,
            ArgRank::One => rank == 1,
            ArgRank::Two => rank == 2,
            ArgRank::Three => rank == 3,
        }
    }

    pub fn rank(self) -> Option<usize> {
        match self {
            ArgRank::Scalar => Some(0),
            ArgRank::One => Some(1),
            ArgRank::Two => Some(2),
            ArgRank::Three => Some(3),
            ArgRank::Any => None,
        }
    }
}

/// Passing mode of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Value,
    /// A bare variable; changes the native makes are written back.
    Reference,
    /// A bare name, passed as text and not resolved.
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgDecl {
    pub ty: ArgType,
    pub rank: ArgRank,
    pub mode: Mode,
}

impl ArgDecl {
    pub const fn value(ty: ArgType, rank: ArgRank) -> ArgDecl {
        ArgDecl {
            ty,
            rank,
            mode: Mode::Value,
        }
    }

    pub const fn reference(ty: ArgType, rank: ArgRank) -> ArgDecl {
        ArgDecl {
            ty,
            rank,
            mode: Mode::Reference,
        }
    }

    pub const fn name() -> ArgDecl {
        ArgDecl {
            ty: ArgType::Text,
            rank: ArgRank::Scalar,
            mode: Mode::Name,
        }
    }

    pub const fn literal() -> ArgDecl {
        ArgDecl {
            ty: ArgType::Literal,
            rank: ArgRank::Scalar,
            mode: Mode::Value,
        }
    }
}

/// Elemental calls are replayed per broadcast element; once calls see
/// whole arrays and run a single time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Elemental,
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    Nothing,
    Fixed(Type),
    /// The type of the given argument after conversion.
    SameAs(usize),
}

/// ## Function descriptor

#[derive(Clone)]
pub struct Function {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    /// The last declaration repeats for any further arguments.
    pub args: Vec<ArgDecl>,
    pub kind: Kind,
    pub returns: Returns,
    pub rank: ArgRank,
    /// Wins a minimum-match tie against other names.
    pub preferred: bool,
    pub help: &'static str,
    pub native: Native,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function {{ {} }}", self.signature())
    }
}

impl Function {
    fn build(name: &'static str, kind: Kind, args: &[ArgDecl], returns: Returns, native: Native) -> Function {
        Function {
            name,
            min_args: args.len(),
            max_args: args.len(),
            args: args.to_vec(),
            kind,
            returns,
            rank: ArgRank::Scalar,
            preferred: false,
            help: "",
            native,
        }
    }

    pub fn elemental(name: &'static str, args: &[ArgDecl], returns: Returns, native: Native) -> Function {
        Function::build(name, Kind::Elemental, args, returns, native)
    }

    pub fn once(name: &'static str, args: &[ArgDecl], returns: Returns, native: Native) -> Function {
        Function::build(name, Kind::Once, args, returns, native)
    }

    pub fn command(name: &'static str, args: &[ArgDecl], native: Native) -> Function {
        Function::build(name, Kind::Once, args, Returns::Nothing, native)
    }

    pub fn arity(mut self, min_args: usize, max_args: usize) -> Function {
        self.min_args = min_args;
        self.max_args = max_args;
        self
    }

    pub fn returning_rank(mut self, rank: ArgRank) -> Function {
        self.rank = rank;
        self
    }

    pub fn preferred(mut self) -> Function {
        self.preferred = true;
        self
    }

    pub fn help(mut self, help: &'static str) -> Function {
        self.help = help;
        self
    }

    pub fn decl(&self, index: usize) -> ArgDecl {
        match self.args.get(index).or_else(|| self.args.last()) {
            Some(decl) => *decl,
            None => ArgDecl::value(ArgType::Any, ArgRank::Any),
        }
    }

    pub fn signature(&self) -> String {
        let mut s = format!("{}(", self.name);
        for i in 0..self.max_args.min(self.args.len().max(self.min_args)) {
            if i > 0 {
                s.push_str(", ");
            }
            if i >= self.min_args {
                s.push('[');
            }
            let decl = self.decl(i);
            s.push_str(&format!("{:?}", decl.ty).to_ascii_lowercase());
            if decl.mode != Mode::Value {
                s.push_str(&format!(" by {:?}", decl.mode).to_ascii_lowercase());
            }
            if i >= self.min_args {
                s.push(']');
            }
        }
        if self.max_args > self.args.len().max(self.min_args) {
            s.push_str(", ...");
        }
        s.push(')');
        if self.kind == Kind::Elemental {
            s.push_str(" elemental");
        }
        s
    }
}

/// A bundle registered with the interpreter at start up.
pub struct Module {
    pub name: &'static str,
    pub help_dir: Option<PathBuf>,
    pub variables: Vec<(&'static str, Val)>,
    pub functions: Vec<Function>,
    pub teardown: Option<Teardown>,
}

impl Module {
    pub fn new(name: &'static str) -> Module {
        Module {
            name,
            help_dir: None,
            variables: vec![],
            functions: vec![],
            teardown: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nothing(_: &mut Host, _: &mut [Val], _: Option<&mut Val>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_decl_repeats_last() {
        let f = Function::command("print", &[ArgDecl::value(ArgType::Any, ArgRank::Any)], nothing)
            .arity(0, usize::MAX);
        assert_eq!(f.decl(7).ty, ArgType::Any);
        assert_eq!(f.signature(), "print([any], ...)");
    }

    #[test]
    fn test_signature() {
        let f = Function::elemental(
            "sqrt",
            &[ArgDecl::value(ArgType::Float, ArgRank::Scalar)],
            Returns::Fixed(Type::Float),
            nothing,
        );
        assert_eq!(f.signature(), "sqrt(float) elemental");
        let f = Function::command(
            "swap",
            &[ArgDecl::reference(ArgType::Any, ArgRank::Any); 2],
            nothing,
        );
        assert_eq!(f.signature(), "swap(any by reference, any by reference)");
    }
}
