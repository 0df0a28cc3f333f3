use super::opcode::{Offset, Opcode};
use super::Stack;
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

pub type Address = usize;

/// ## Compiled unit
///
/// The compile stack of one statement. Forward branches are emitted with a
/// placeholder offset and back-patched through the address `emit` returns
/// once the target is known.

#[derive(Debug)]
pub struct Link {
    ops: Stack<Opcode>,
}

fn offset(from: Address, to: Address) -> Offset {
    to as Offset - from as Offset
}

impl Link {
    pub fn new(limit: usize) -> Link {
        Link {
            ops: Stack::new("COMPILE STACK", limit),
        }
    }

    pub fn clear(&mut self) {
        self.ops.clear()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, addr: Address) -> Option<&Opcode> {
        self.ops.get(addr)
    }

    pub fn emit(&mut self, op: Opcode) -> Result<Address> {
        let addr = self.ops.len();
        self.ops.push(op)?;
        Ok(addr)
    }

    pub fn extend(&mut self, ops: Vec<Opcode>) -> Result<()> {
        self.ops.extend(ops)
    }

    /// Emit an unconditional branch back to `target`.
    pub fn emit_branch_to(&mut self, target: Address) -> Result<Address> {
        let addr = self.ops.len();
        self.emit(Opcode::Branch(offset(addr, target)))
    }

    /// Point the branch or exit at `addr` to `target`.
    pub fn patch(&mut self, addr: Address, target: Address) -> Result<()> {
        let o = offset(addr, target);
        match self.ops.get_mut(addr) {
            Some(Opcode::Branch(x))
            | Some(Opcode::BranchIfFalse(x))
            | Some(Opcode::Link { exit: x, .. })
            | Some(Opcode::LoopParam { exit: x, .. })
            | Some(Opcode::LoopInit { param: x, .. }) => {
                *x = o;
                Ok(())
            }
            _ => Err(error!(InternalError; "PATCH OF NON BRANCH")),
        }
    }

    /// Point the branch at `addr` to the next node to be emitted.
    pub fn patch_here(&mut self, addr: Address) -> Result<()> {
        let here = self.ops.len();
        self.patch(addr, here)
    }

    /// Set where `continue` through the link at `addr` goes.
    pub fn patch_next(&mut self, addr: Address, target: Address) -> Result<()> {
        let o = offset(addr, target);
        match self.ops.get_mut(addr) {
            Some(Opcode::Link { next, .. }) => {
                *next = o;
                Ok(())
            }
            _ => Err(error!(InternalError; "PATCH OF NON LINK")),
        }
    }

    /// Every control branch lands inside the unit or just past its end.
    pub fn verify(&self) -> Result<()> {
        let len = self.ops.len() as Offset;
        for (addr, op) in self.ops.as_slice().iter().enumerate() {
            let here = addr as Offset;
            let targets: Vec<Offset> = match op {
                Opcode::Branch(o) | Opcode::BranchIfFalse(o) => vec![*o],
                Opcode::Link { exit, next } => vec![*exit, *next],
                Opcode::LoopParam { exit, .. } => vec![*exit],
                Opcode::LoopInit { param, .. } => vec![*param],
                Opcode::Via { link, .. } => vec![*link],
                _ => continue,
            };
            for o in targets {
                let to = here + o;
                if to < 0 || to > len {
                    return Err(error!(InternalError; format!("BRANCH AT {} LEAVES UNIT", addr)));
                }
            }
        }
        Ok(())
    }

    pub fn take(&mut self) -> Vec<Opcode> {
        self.ops.take()
    }

    pub fn restore(&mut self, ops: Vec<Opcode>) {
        self.ops.restore(ops)
    }

    pub fn listing(&self) -> String {
        let mut s = String::new();
        for (addr, op) in self.ops.as_slice().iter().enumerate() {
            s.push_str(&format!("{:4} {}\n", addr, op));
        }
        s
    }
}
