use super::eval::View;
use super::function::{Function, Returns};
use super::opcode::{Access, Axis, ExprInfo, LoopState, Opcode};
use super::runtime::Registered;
use super::var::{Entry, VarId, Vars};
use super::{float_to_int, ExitMode, Host, Operation, Ownership, Request, Scalar, Shape, Stack, Type, Val};
use crate::error;
use crate::lang::{Error, SymbolTable};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

/// How a compiled unit finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Finished,
    /// A `stop` statement.
    Stopped,
    Exit(ExitMode),
}

/// ## Executor
///
/// Borrows what one statement needs from the runtime. Control nodes are
/// stepped by `exe_control`; each expression is handed to `exe_expr`.
pub struct Machine<'a> {
    pub symbols: &'a mut SymbolTable<Entry>,
    pub vars: &'a mut Vars,
    pub functions: &'a [Function],
    pub modules: &'a [Registered],
    pub host: &'a mut Host,
    pub values: &'a mut Stack<Val>,
    pub run: &'a mut Stack<Scalar>,
    pub abort: &'a AtomicBool,
}

fn jump(pc: usize, offset: isize) -> usize {
    (pc as isize + offset) as usize
}

impl<'a> Machine<'a> {
    pub fn exe_control(&mut self, code: &mut [Opcode]) -> Result<Flow> {
        let mut pc = 0;
        while pc < code.len() {
            if self.abort.load(Ordering::Relaxed) {
                return Err(error!(Interrupted));
            }
            let op = code[pc].clone();
            trace!(target: "cmdlang::exec", pc, op = %op);
            pc = match op {
                Opcode::Expr(ExprInfo { len, .. }) => {
                    let val = self.exe_expr(code, pc, None)?;
                    self.values.push(val)?;
                    pc + 1 + len
                }
                Opcode::Assign { var, axes, count } => self.assign(code, pc, var, axes, count)?,
                Opcode::Command { func, argc } => {
                    let next = self.command(code, pc, func, argc)?;
                    if let Some(flow) = self.requests()? {
                        return Ok(flow);
                    }
                    next
                }
                Opcode::Declare { var, dims } => self.declare(code, pc, var, dims)?,
                Opcode::Branch(offset) => jump(pc, offset),
                Opcode::BranchIfFalse(offset) => {
                    let cond = self.values.pop()?;
                    if cond.len() != 1 {
                        return Err(error!(ShapeMismatch; "CONDITION MUST BE A SCALAR"));
                    }
                    if cond.first()?.truth()? {
                        pc + 1
                    } else {
                        jump(pc, offset)
                    }
                }
                Opcode::Link { .. } => pc + 1,
                Opcode::Via { link, exit } => {
                    let at = jump(pc, link);
                    match code.get(at) {
                        Some(Opcode::Link { exit: e, next: n }) => jump(at, if exit { *e } else { *n }),
                        _ => return Err(error!(InternalError; "VIA WITHOUT LINK")),
                    }
                }
                Opcode::LoopInit { param, step } => {
                    let step = if step { Some(self.values.pop()?) } else { None };
                    let end = self.values.pop()?;
                    let start = self.values.pop()?;
                    let at = jump(pc, param);
                    match code.get_mut(at) {
                        Some(Opcode::LoopParam { var, state, .. }) => {
                            let ty = self.vars.val(*var)?.ty();
                            *state = Some(loop_state(ty, &start, &end, step.as_ref())?);
                        }
                        _ => return Err(error!(InternalError; "LOOP WITHOUT PARAMETER")),
                    }
                    pc + 1
                }
                Opcode::LoopParam { var, state, exit } => {
                    let mut state = match state {
                        Some(state) => state,
                        None => return Err(error!(InternalError; "LOOP NOT INITIALIZED")),
                    };
                    if state.remaining == 0 {
                        jump(pc, exit)
                    } else {
                        let cell = &mut self.vars.get_mut(var)?.val;
                        if cell.len() != 1 {
                            return Err(error!(RankMismatch; "LOOP VARIABLE MUST BE A SCALAR"));
                        }
                        cell.set(0, state.next.clone())?;
                        state.remaining -= 1;
                        if state.remaining > 0 {
                            state.next = Operation::sum(state.next, state.step.clone())?;
                        }
                        if let Some(Opcode::LoopParam { state: s, .. }) = code.get_mut(pc) {
                            *s = Some(state);
                        }
                        pc + 1
                    }
                }
                Opcode::Abort => return Ok(Flow::Stopped),
                op => return Err(error!(InternalError; format!("{} AT TOP LEVEL", op))),
            };
        }
        Ok(Flow::Finished)
    }

    fn assign(
        &mut self,
        code: &[Opcode],
        pc: usize,
        var: VarId,
        axes: Option<Rc<[Axis]>>,
        count: usize,
    ) -> Result<usize> {
        let mut p = pc + 1;
        let target = self.vars.val(var)?;
        let (ty, shape) = (target.ty(), target.shape());
        if !target.owner().is_writable() {
            return Err(error!(ReadOnly; format!("'{}'", self.vars.get(var)?.name)));
        }
        let view = match &axes {
            Some(axes) => Some(self.view(code, &mut p, shape, axes)?),
            None => None,
        };
        let fill = view.map_or(shape, |v| v.shape);
        let rhs = if count == 1 {
            self.nested(code, &mut p, Some(fill))?
        } else {
            let mut list = Val::new(ty, Shape::vector(count), Ownership::Temporary);
            for i in 0..count {
                let item = self.nested(code, &mut p, None)?;
                if item.len() != 1 {
                    return Err(error!(ShapeMismatch; "LIST ITEMS MUST BE SCALARS"));
                }
                list.set(i, item.first()?)?;
            }
            list
        };
        let target = &mut self.vars.get_mut(var)?.val;
        match view {
            None => target.assign(rhs)?,
            Some(view) => store(target, &view, &rhs)?,
        }
        Ok(p)
    }

    fn declare(&mut self, code: &[Opcode], pc: usize, var: VarId, dims: usize) -> Result<usize> {
        let mut p = pc + 1;
        let mut extents = Vec::with_capacity(dims);
        for _ in 0..dims {
            let n = i64::try_from(&self.nested(code, &mut p, None)?)?;
            if n < 0 {
                return Err(error!(DomainError; "NEGATIVE EXTENT"));
            }
            extents.push(n as usize);
        }
        let shape = Shape::new(&extents)?;
        let val = &mut self.vars.get_mut(var)?.val;
        if val.shape() != shape {
            if val.rank() == shape.rank() {
                val.resize(shape)?;
            } else {
                *val = Val::try_new(val.ty(), shape, val.owner())?;
            }
        }
        Ok(p)
    }

    fn command(&mut self, code: &[Opcode], pc: usize, func: usize, argc: usize) -> Result<usize> {
        let functions = self.functions;
        let f = match functions.get(func) {
            Some(f) => f,
            None => return Err(error!(InternalError; "FUNCTION")),
        };
        let mut p = pc + 1;
        let base = self.values.len();
        let mut refs = Vec::with_capacity(argc);
        for i in 0..argc {
            refs.push(match code.get(p) {
                Some(Opcode::Expr(ExprInfo {
                    access: Access::Reference(var),
                    ..
                })) => Some(*var),
                _ => None,
            });
            let val = self.nested(code, &mut p, None)?;
            if !f.decl(i).rank.accepts(val.rank(), val.len()) {
                return Err(error!(RankMismatch;
                    format!("ARGUMENT {} OF {} HAS RANK {}", i + 1, f.name, val.rank()).to_ascii_uppercase()));
            }
            self.values.push(val)?;
        }
        debug!(target: "cmdlang::exec", command = f.name, argc, "call");
        let mut out = match f.returns {
            Returns::Nothing => None,
            Returns::Fixed(ty) => Some(Val::new(ty, Shape::SCALAR, Ownership::FunctionValue)),
            Returns::SameAs(_) => Some(Val::new(Type::Float, Shape::SCALAR, Ownership::FunctionValue)),
        };
        (f.native)(self.host, self.values.tail_mut(argc)?, out.as_mut())?;
        for (i, var) in refs.into_iter().enumerate() {
            let var = match var {
                Some(var) => var,
                None => continue,
            };
            let new = match self.values.get(base + i) {
                Some(new) => new,
                None => return Err(error!(InternalError; "UNDERFLOW")),
            };
            let cell = &mut self.vars.get_mut(var)?.val;
            if cell.same(new) {
                continue;
            }
            if !cell.owner().is_writable() {
                return Err(error!(ReadOnly; format!("ARGUMENT {} OF {}", i + 1, f.name).to_ascii_uppercase()));
            }
            cell.assign(new.clone())?;
        }
        self.values.truncate(base);
        Ok(p)
    }

    /// Carry out what the last native asked for.
    fn requests(&mut self) -> Result<Option<Flow>> {
        for request in self.host.take_requests() {
            debug!(target: "cmdlang::exec", ?request, "request");
            match request {
                Request::Delete(name) => self.delete(&name)?,
                Request::Show(prefix) => self.show(&prefix)?,
                Request::Help(topic) => self.help(&topic)?,
                Request::Exit(mode) => return Ok(Some(Flow::Exit(mode))),
            }
        }
        Ok(None)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let var = match self.symbols.get_exact(name) {
            Some(Entry::Variable(var)) => *var,
            Some(_) => return Err(error!(ReadOnly; format!("'{}' IS NOT A VARIABLE", name))),
            None => return Err(error!(UndefinedName; format!("'{}'", name))),
        };
        if !self.vars.val(var)?.owner().is_deletable() {
            return Err(error!(ReadOnly; format!("CANNOT DELETE '{}'", name)));
        }
        self.symbols.remove(name);
        self.vars.remove(var);
        Ok(())
    }

    fn describe(&self, name: &str, var: VarId) -> Result<String> {
        let val = self.vars.val(var)?;
        let shape = if val.rank() > 0 {
            val.shape().to_string()
        } else {
            String::new()
        };
        Ok(format!("{} {}{} = {}\n", name, val.ty(), shape, val))
    }

    fn show(&mut self, prefix: &str) -> Result<()> {
        let mut text = String::new();
        for (name, entry) in self.symbols.with_prefix(prefix) {
            if let Entry::Variable(var) = entry {
                text.push_str(&self.describe(name, *var)?);
            }
        }
        self.host.print(&text);
        Ok(())
    }

    fn help(&mut self, topic: &str) -> Result<()> {
        let functions = self.functions;
        let mut text = String::new();
        if topic.is_empty() {
            for module in self.modules {
                let names: Vec<&str> = module.functions.iter().map(|id| functions[*id].name).collect();
                text.push_str(&format!("{}: {}\n", module.name, names.join(" ")));
            }
        } else {
            match *self.symbols.lookup(topic)?.1 {
                Entry::Module(index) => {
                    if let Some(module) = self.modules.get(index) {
                        text.push_str(&format!("{}\n", module.name));
                        if let Some(dir) = &module.help_dir {
                            text.push_str(&format!("  help files in {}\n", dir.display()));
                        }
                        for id in &module.functions {
                            let f = &functions[*id];
                            text.push_str(&format!("  {}  {}\n", f.signature(), f.help));
                        }
                    }
                }
                Entry::Function { id, .. } => {
                    let f = &functions[id];
                    text.push_str(&format!("{}\n  {}\n", f.signature(), f.help));
                }
                Entry::Variable(var) => {
                    let name = self.vars.get(var)?.name.clone();
                    text.push_str(&self.describe(&name, var)?);
                }
            }
        }
        self.host.print(&text);
        Ok(())
    }
}

/// Write `rhs` over a section in section order. A single value is
/// broadcast; otherwise the element counts must agree.
fn store(target: &mut Val, view: &View, rhs: &Val) -> Result<()> {
    let shape = view.shape;
    if rhs.len() != 1 && rhs.len() != shape.len() {
        return Err(error!(ShapeMismatch; format!("{} VALUES FOR {} ELEMENTS", rhs.len(), shape.len())));
    }
    let mut n = 0;
    for i2 in 0..shape.extent(2) {
        for i1 in 0..shape.extent(1) {
            for i0 in 0..shape.extent(0) {
                let value = rhs.get(if rhs.len() == 1 { 0 } else { n })?;
                target.set(view.offset([i0, i1, i2]), value)?;
                n += 1;
            }
        }
    }
    Ok(())
}

/// Trip count and first value of a `do` loop, computed once on entry.
fn loop_state(ty: Type, start: &Val, end: &Val, step: Option<&Val>) -> Result<LoopState> {
    match ty {
        Type::Integer => {
            let first = i64::try_from(start)?;
            let last = i64::try_from(end)?;
            let step = match step {
                Some(step) => i64::try_from(step)?,
                None => 1,
            };
            if step == 0 {
                return Err(error!(DomainError; "ZERO STEP"));
            }
            let (f, l, s) = (first as i128, last as i128, step as i128);
            let count = if (s > 0 && l >= f) || (s < 0 && l <= f) {
                (l - f) / s + 1
            } else {
                0
            };
            Ok(LoopState {
                next: Scalar::Integer(first),
                step: Scalar::Integer(step),
                remaining: count as u64,
            })
        }
        Type::Float => {
            let first = f64::try_from(start)?;
            let last = f64::try_from(end)?;
            let step = match step {
                Some(step) => f64::try_from(step)?,
                None => 1.0,
            };
            if step == 0.0 {
                return Err(error!(DomainError; "ZERO STEP"));
            }
            let count = ((last - first + step) / step).floor();
            let remaining = if count.is_nan() || count <= 0.0 {
                0
            } else {
                float_to_int(count)? as u64
            };
            Ok(LoopState {
                next: Scalar::Float(first),
                step: Scalar::Float(step),
                remaining,
            })
        }
        _ => Err(error!(TypeMismatch; "LOOP VARIABLE MUST BE NUMERIC")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_counts() {
        let int = |n: i64| Val::scalar(Scalar::Integer(n));
        let s = loop_state(Type::Integer, &int(1), &int(10), None).unwrap();
        assert_eq!(s.remaining, 10);
        let s = loop_state(Type::Integer, &int(10), &int(1), Some(&int(-3))).unwrap();
        assert_eq!(s.remaining, 4);
        let s = loop_state(Type::Integer, &int(5), &int(1), None).unwrap();
        assert_eq!(s.remaining, 0);
        assert!(loop_state(Type::Integer, &int(1), &int(2), Some(&int(0))).is_err());
        let float = |n: f64| Val::scalar(Scalar::Float(n));
        let s = loop_state(Type::Float, &float(0.0), &float(1.0), Some(&float(0.25))).unwrap();
        assert_eq!(s.remaining, 5);
        assert_eq!(s.next, Scalar::Float(0.0));
    }

    #[test]
    fn test_store_broadcasts_single_value() {
        let mut target = Val::integers(vec![0; 6]);
        let view = View {
            base: 1,
            shape: Shape::vector(3),
            steps: [2, 0, 0],
        };
        store(&mut target, &view, &Val::scalar(Scalar::Integer(7))).unwrap();
        assert_eq!(target.as_integers().unwrap(), [0, 7, 0, 7, 0, 7]);
        let e = store(&mut target, &view, &Val::integers(vec![1, 2])).unwrap_err();
        assert_eq!(e.code(), crate::lang::ErrorCode::ShapeMismatch);
    }
}
