use super::{BinOp, FuncId, Scalar, Type, VarId};
use std::rc::Rc;

/// Relative distance between two nodes of a compiled unit.
pub type Offset = isize;

/// ## Program nodes
///
/// A compiled statement is a flat vector of nodes. Every branch is stored
/// relative to the node holding it so a unit stays valid when relocated.
///
/// An expression is a header followed by its prologue (operands that must
/// be resolved before the element loop: whole arrays, indexed arrays and
/// once calls, each given a slot) and then its body, the scalar program
/// replayed once per element of the broadcast domain.
///
/// Statement markers come first and are followed by the expressions they
/// consume: `Command` by its arguments, `Assign` by its subscripts and
/// right-hand sides, `Declare` by its extents.

#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    // *** Expression header and prologue
    Expr(ExprInfo),
    /// Whole variable, optionally reshaped by `cast` extent expressions.
    Array { slot: usize, var: VarId, cast: usize },
    /// Array section; followed by the subscript expressions of `axes`.
    Index { slot: usize, var: VarId, axes: Rc<[Axis]> },
    /// Once call; followed by `argc` argument expressions.
    Once { slot: usize, func: FuncId, argc: usize, ty: Type },

    // *** Expression body
    Constant(Scalar),
    Operand(usize),
    /// 1-based position in the broadcast domain.
    Placeholder,
    /// Elemental call on `argc` run-stack values.
    Call { func: FuncId, argc: usize, ty: Type },
    /// Sub-string with one or two bounds on the run stack.
    SubString(usize),
    /// Numeric conversion of the run-stack entry `depth` below the top.
    Coerce { to: Type, depth: usize },
    Neg(Type),
    Not,
    Binary(BinOp, Type),
    /// Keep a false left operand and skip the right one.
    AndGuard(Offset),
    /// Keep a true left operand and skip the right one.
    OrGuard(Offset),

    // *** Statements
    Assign { var: VarId, axes: Option<Rc<[Axis]>>, count: usize },
    Command { func: FuncId, argc: usize },
    Declare { var: VarId, dims: usize },
    Branch(Offset),
    /// Pop a logical from the value stack and branch when false.
    BranchIfFalse(Offset),
    /// Reserved ahead of a loop body. `exit` leaves the loop, `next`
    /// starts its following iteration.
    Link { exit: Offset, next: Offset },
    /// `break` (exit) or `continue` through the `Link` at `link`.
    Via { link: Offset, exit: bool },
    /// Pop start, end and optional step into the `LoopParam` at `param`.
    LoopInit { param: Offset, step: bool },
    LoopParam { var: VarId, state: Option<LoopState>, exit: Offset },
    Abort,
}

/// Summary carried by an expression header.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprInfo {
    /// Nodes after the header that belong to the expression.
    pub len: usize,
    pub slots: usize,
    pub ty: Type,
    pub access: Access,
}

/// How an expression hands its value over.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Value,
    Reference(VarId),
    Name(Rc<str>),
}

/// One subscript of an array section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `:`, the whole extent.
    All,
    /// A single element; the axis drops out of the section's rank.
    At,
    /// `lo:hi:step` where each part may be missing.
    Range { lo: bool, hi: bool, step: bool },
}

impl Axis {
    /// How many subscript expressions follow for this axis.
    pub fn exprs(self) -> usize {
        match self {
            Axis::All => 0,
            Axis::At => 1,
            Axis::Range { lo, hi, step } => lo as usize + hi as usize + step as usize,
        }
    }
}

/// Run-time bookkeeping of a `do` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    pub next: Scalar,
    pub step: Scalar,
    pub remaining: u64,
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Opcode::*;
        match self {
            Expr(info) => write!(f, "EXPR({},{},{})", info.len, info.slots, info.ty),
            Array { slot, cast, .. } => write!(f, "ARRAY({},{})", slot, cast),
            Index { slot, axes, .. } => write!(f, "INDEX({},{})", slot, axes.len()),
            Once { slot, func, argc, .. } => write!(f, "ONCE({},{},{})", slot, func, argc),
            Constant(s) => write!(f, "CONST({})", s),
            Operand(slot) => write!(f, "OPERAND({})", slot),
            Placeholder => write!(f, "PLACEHOLDER"),
            Call { func, argc, .. } => write!(f, "CALL({},{})", func, argc),
            SubString(n) => write!(f, "SUBSTR({})", n),
            Coerce { to, depth } => write!(f, "COERCE({},{})", to, depth),
            Neg(ty) => write!(f, "NEG({})", ty),
            Not => write!(f, "NOT"),
            Binary(op, ty) => write!(f, "{:?}({})", op, ty),
            AndGuard(o) => write!(f, "ANDGUARD({})", o),
            OrGuard(o) => write!(f, "ORGUARD({})", o),
            Assign { count, axes, .. } => {
                write!(f, "ASSIGN({},{})", axes.as_ref().map_or(0, |a| a.len()), count)
            }
            Command { func, argc } => write!(f, "COMMAND({},{})", func, argc),
            Declare { dims, .. } => write!(f, "DECLARE({})", dims),
            Branch(o) => write!(f, "BRANCH({})", o),
            BranchIfFalse(o) => write!(f, "IFNOT({})", o),
            Link { exit, next } => write!(f, "LINK({},{})", exit, next),
            Via { link, exit } => write!(f, "VIA({},{})", link, if *exit { "EXIT" } else { "NEXT" }),
            LoopInit { param, step } => write!(f, "LOOPINIT({},{})", param, step),
            LoopParam { exit, .. } => write!(f, "LOOPPARAM({})", exit),
            Abort => write!(f, "ABORT"),
        }
    }
}

/*
Block layouts.

// while (c)
Link(:exit, :test)
:test
-- eval c
IfNot(:exit)
-- body
Branch(:test)
:exit

// do v = a, b, s
-- eval a, b, s
LoopInit(:param)
Link(:exit, :param)
:param
LoopParam(:exit)
-- body
Branch(:param)
:exit

// repeat ... until (c)
Link(:exit, :test)
:top
-- body
:test
-- eval c
IfNot(:top)
:exit

// if (c1) ... else if (c2) ... else ... end if
-- eval c1
IfNot(:arm2)
-- body
Branch(:end)
:arm2
-- eval c2
IfNot(:arm3)
-- body
Branch(:end)
:arm3
-- else body
:end
*/
