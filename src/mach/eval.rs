use super::exec::Machine;
use super::function::{FuncId, Mode};
use super::opcode::{Access, Axis, Opcode};
use super::var::VarId;
use super::{Operation, Ownership, Scalar, Shape, Type, Val, MAX_RANK};
use crate::error;
use crate::lang::Error;
use std::sync::atomic::Ordering;
use tracing::trace;

type Result<T> = std::result::Result<T, Error>;

/// How the elements of an operand are laid over its storage. Offsets are
/// signed so sections with negative strides can be described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub base: isize,
    pub shape: Shape,
    pub steps: [isize; MAX_RANK],
}

impl View {
    pub fn whole(shape: Shape) -> View {
        let strides = shape.strides();
        View {
            base: 0,
            shape,
            steps: [strides[0] as isize, strides[1] as isize, strides[2] as isize],
        }
    }

    /// Storage offset of a domain index. Axes of extent 1 broadcast.
    pub fn offset(&self, index: [usize; MAX_RANK]) -> usize {
        let mut at = self.base;
        for (k, i) in index.iter().enumerate() {
            if self.shape.extent(k) > 1 {
                at += *i as isize * self.steps[k];
            }
        }
        at as usize
    }
}

enum Source {
    Var(VarId),
    Temp(Val),
}

/// A resolved prologue operand.
struct Slot {
    source: Source,
    view: View,
}

/// Extents every operand agrees with, treating extent 1 as a wildcard.
fn domain(slots: &[Slot]) -> Result<Shape> {
    let mut dims = [1usize; MAX_RANK];
    let mut rank = 0;
    for slot in slots {
        let shape = slot.view.shape;
        rank = rank.max(shape.rank());
        for (k, dim) in dims.iter_mut().enumerate().take(shape.rank()) {
            let extent = shape.extent(k);
            if extent == 1 || extent == *dim {
                continue;
            }
            if *dim != 1 {
                return Err(error!(ShapeMismatch; format!("EXTENT {} AGAINST {} ON AXIS {}", extent, dim, k + 1)));
            }
            *dim = extent;
        }
    }
    Shape::new(&dims[..rank])
}

fn jump(pc: usize, offset: isize) -> usize {
    (pc as isize + offset) as usize
}

impl<'a> Machine<'a> {
    /// Evaluate the expression whose header is at `at`. A scalar result is
    /// broadcast to `fill` when one is given.
    pub fn exe_expr(&mut self, code: &[Opcode], at: usize, fill: Option<Shape>) -> Result<Val> {
        let info = match code.get(at) {
            Some(Opcode::Expr(info)) => info,
            _ => return Err(error!(InternalError; "EXPRESSION EXPECTED")),
        };
        match &info.access {
            Access::Reference(var) => {
                return Ok(self.vars.val(*var)?.clone().with_owner(Ownership::Reference));
            }
            Access::Name(name) => return Ok(Val::scalar(Scalar::Text(name.to_string()))),
            Access::Value => {}
        }
        let end = at + 1 + info.len;
        let mut pc = at + 1;
        let mut slots = Vec::with_capacity(info.slots);
        while slots.len() < info.slots {
            let slot = match &code[pc] {
                Opcode::Array { var, cast, .. } => {
                    pc += 1;
                    self.array(code, &mut pc, *var, *cast)?
                }
                Opcode::Index { var, axes, .. } => {
                    pc += 1;
                    let shape = self.vars.val(*var)?.shape();
                    Slot {
                        source: Source::Var(*var),
                        view: self.view(code, &mut pc, shape, axes)?,
                    }
                }
                Opcode::Once { func, argc, ty, .. } => {
                    pc += 1;
                    self.once(code, &mut pc, *func, *argc, *ty)?
                }
                op => return Err(error!(InternalError; format!("{} IN PROLOGUE", op))),
            };
            slots.push(slot);
        }
        let mut shape = domain(&slots)?;
        if shape.is_scalar() {
            if let Some(fill) = fill {
                shape = fill;
            }
        }
        let mut out = Val::try_new(info.ty, shape, Ownership::Temporary)?;
        let mut n = 0;
        for i2 in 0..shape.extent(2) {
            for i1 in 0..shape.extent(1) {
                for i0 in 0..shape.extent(0) {
                    if self.abort.load(Ordering::Relaxed) {
                        return Err(error!(Interrupted));
                    }
                    let value = self.element(code, pc, end, &slots, [i0, i1, i2], n)?;
                    out.set(n, value)?;
                    n += 1;
                }
            }
        }
        Ok(out)
    }

    /// Evaluate the nested expression at `pc` and step over it.
    pub fn nested(&mut self, code: &[Opcode], pc: &mut usize, fill: Option<Shape>) -> Result<Val> {
        let len = match code.get(*pc) {
            Some(Opcode::Expr(info)) => info.len,
            _ => return Err(error!(InternalError; "EXPRESSION EXPECTED")),
        };
        let val = self.exe_expr(code, *pc, fill)?;
        *pc += 1 + len;
        Ok(val)
    }

    fn index(&mut self, code: &[Opcode], pc: &mut usize) -> Result<i64> {
        let val = self.nested(code, pc, None)?;
        i64::try_from(&val)
    }

    /// One replay of the body for domain element `n`.
    fn element(
        &mut self,
        code: &[Opcode],
        start: usize,
        end: usize,
        slots: &[Slot],
        index: [usize; MAX_RANK],
        n: usize,
    ) -> Result<Scalar> {
        let base = self.run.len();
        let mut pc = start;
        while pc < end {
            match &code[pc] {
                Opcode::Constant(s) => self.run.push(s.clone())?,
                Opcode::Operand(slot) => {
                    let slot = match slots.get(*slot) {
                        Some(slot) => slot,
                        None => return Err(error!(InternalError; "SLOT")),
                    };
                    let offset = slot.view.offset(index);
                    let value = match &slot.source {
                        Source::Var(var) => self.vars.val(*var)?.get(offset)?,
                        Source::Temp(val) => val.get(offset)?,
                    };
                    self.run.push(value)?;
                }
                Opcode::Placeholder => self.run.push(Scalar::Integer(n as i64 + 1))?,
                Opcode::Call { func, argc, ty } => {
                    let value = self.elemental(*func, *argc, *ty)?;
                    self.run.push(value)?;
                }
                Opcode::SubString(bounds) => {
                    let hi = if *bounds == 2 {
                        Some(self.run.pop()?.as_i64()?)
                    } else {
                        None
                    };
                    let lo = self.run.pop()?.as_i64()?;
                    let text = match self.run.pop()? {
                        Scalar::Text(text) => text,
                        _ => return Err(error!(TypeMismatch; "SUB-STRING OF NON STRING")),
                    };
                    let sub = Operation::substring(&text, lo, hi.unwrap_or(lo))?;
                    self.run.push(Scalar::Text(sub))?;
                }
                Opcode::Coerce { to, depth } => {
                    let at = match self.run.len().checked_sub(1 + depth) {
                        Some(at) if at >= base => at,
                        _ => return Err(error!(InternalError; "UNDERFLOW")),
                    };
                    if let Some(value) = self.run.get_mut(at) {
                        let old = std::mem::replace(value, Scalar::Logical(false));
                        *value = old.convert(*to)?;
                    }
                }
                Opcode::Neg(_) => {
                    let value = self.run.pop()?;
                    self.run.push(Operation::negate(value)?)?;
                }
                Opcode::Not => {
                    let value = self.run.pop()?;
                    self.run.push(Operation::not(value)?)?;
                }
                Opcode::Binary(op, _) => {
                    let (lhs, rhs) = self.run.pop_2()?;
                    self.run.push(Operation::binary(*op, lhs, rhs)?)?;
                }
                Opcode::AndGuard(skip) | Opcode::OrGuard(skip) => {
                    let decided = match self.run.last() {
                        Some(value) => value.truth()? == matches!(code[pc], Opcode::OrGuard(_)),
                        None => return Err(error!(InternalError; "UNDERFLOW")),
                    };
                    if decided {
                        pc = jump(pc, *skip);
                        continue;
                    }
                    self.run.pop()?;
                }
                op => return Err(error!(InternalError; format!("{} IN EXPRESSION BODY", op))),
            }
            pc += 1;
        }
        let value = self.run.pop()?;
        if self.run.len() != base {
            return Err(error!(InternalError; "RUN STACK NOT BALANCED"));
        }
        Ok(value)
    }

    fn elemental(&mut self, func: FuncId, argc: usize, ty: Type) -> Result<Scalar> {
        let functions = self.functions;
        let f = match functions.get(func) {
            Some(f) => f,
            None => return Err(error!(InternalError; "FUNCTION")),
        };
        let mut args: Vec<Val> = self.run.pop_n(argc)?.into_iter().map(Val::scalar).collect();
        let mut out = Val::new(ty, Shape::SCALAR, Ownership::Temporary);
        (f.native)(self.host, &mut args, Some(&mut out))?;
        out.first()
    }

    /// Run a once function and keep its whole result as a slot.
    fn once(&mut self, code: &[Opcode], pc: &mut usize, func: FuncId, argc: usize, ty: Type) -> Result<Slot> {
        let functions = self.functions;
        let f = match functions.get(func) {
            Some(f) => f,
            None => return Err(error!(InternalError; "FUNCTION")),
        };
        let base = self.values.len();
        for i in 0..argc {
            let decl = f.decl(i);
            let mut val = self.nested(code, pc, None)?;
            if !decl.rank.accepts(val.rank(), val.len()) {
                return Err(error!(RankMismatch;
                    format!("ARGUMENT {} OF {} HAS RANK {}", i + 1, f.name, val.rank()).to_ascii_uppercase()));
            }
            if decl.mode == Mode::Reference {
                val.set_owner(Ownership::FunctionReference);
            }
            self.values.push(val)?;
        }
        trace!(target: "cmdlang::exec", function = f.name, argc, "once");
        let mut out = Val::try_new(ty, Shape::SCALAR, Ownership::FunctionValue)?;
        let result = (f.native)(self.host, self.values.tail_mut(argc)?, Some(&mut out));
        self.values.truncate(base);
        result?;
        if out.ty() != ty {
            out = out.convert(ty)?;
        }
        Ok(Slot {
            view: View::whole(out.shape()),
            source: Source::Temp(out),
        })
    }

    /// A whole variable, optionally reshaped by cast extents.
    fn array(&mut self, code: &[Opcode], pc: &mut usize, var: VarId, cast: usize) -> Result<Slot> {
        let shape = self.vars.val(var)?.shape();
        if cast == 0 {
            return Ok(Slot {
                source: Source::Var(var),
                view: View::whole(shape),
            });
        }
        let mut dims = Vec::with_capacity(cast);
        for _ in 0..cast {
            let n = self.index(code, pc)?;
            if n < 0 {
                return Err(error!(DomainError; "NEGATIVE EXTENT"));
            }
            dims.push(n as usize);
        }
        let cast = Shape::new(&dims)?;
        if cast.len() != shape.len() {
            return Err(error!(ShapeMismatch; format!("CANNOT CAST {} TO {}", shape, cast)));
        }
        Ok(Slot {
            source: Source::Var(var),
            view: View::whole(cast),
        })
    }

    /// Resolve a section of an array of `shape`. Subscripts count from 1
    /// and bounds are inclusive.
    pub fn view(&mut self, code: &[Opcode], pc: &mut usize, shape: Shape, axes: &[Axis]) -> Result<View> {
        if axes.len() != shape.rank() {
            return Err(error!(RankMismatch;
                format!("{} SUBSCRIPTS FOR RANK {}", axes.len(), shape.rank())));
        }
        let strides = shape.strides();
        let mut base: isize = 0;
        let mut dims = Vec::with_capacity(axes.len());
        let mut steps = [0isize; MAX_RANK];
        for (k, axis) in axes.iter().enumerate() {
            let extent = shape.extent(k) as i64;
            let (lo, hi, step) = match *axis {
                Axis::All => (1, extent, 1),
                Axis::At => {
                    let i = self.index(code, pc)?;
                    (i, i, 1)
                }
                Axis::Range { lo, hi, step } => {
                    let lo = if lo { Some(self.index(code, pc)?) } else { None };
                    let hi = if hi { Some(self.index(code, pc)?) } else { None };
                    let step = if step { self.index(code, pc)? } else { 1 };
                    if step == 0 {
                        return Err(error!(DomainError; "ZERO STEP"));
                    }
                    let (first, last) = if step > 0 { (1, extent) } else { (extent, 1) };
                    (lo.unwrap_or(first), hi.unwrap_or(last), step)
                }
            };
            let (lo, hi, step) = (lo as i128, hi as i128, step as i128);
            let count = if (step > 0 && hi >= lo) || (step < 0 && hi <= lo) {
                (hi - lo) / step + 1
            } else {
                0
            };
            if count > 0 {
                let last = lo + (count - 1) * step;
                let inside = |i: i128| i >= 1 && i <= extent as i128;
                if !inside(lo) || !inside(last) {
                    return Err(error!(SubscriptOutOfRange;
                        format!("{} ON AXIS {} OF EXTENT {}", if inside(lo) { last } else { lo }, k + 1, extent)));
                }
                base += (lo as isize - 1) * strides[k] as isize;
            }
            if *axis != Axis::At {
                steps[dims.len()] = step as isize * strides[k] as isize;
                dims.push(count as usize);
            }
        }
        Ok(View {
            base,
            shape: Shape::new(&dims)?,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_offsets() {
        let shape = Shape::new(&[3, 4]).unwrap();
        let view = View::whole(shape);
        assert_eq!(view.offset([2, 0, 0]), 2);
        assert_eq!(view.offset([1, 2, 0]), 7);
        let row = View {
            base: 1,
            shape: Shape::vector(4),
            steps: [3, 0, 0],
        };
        assert_eq!(row.offset([3, 0, 0]), 10);
        let scalar = View::whole(Shape::SCALAR);
        assert_eq!(scalar.offset([5, 6, 0]), 0);
    }
}
