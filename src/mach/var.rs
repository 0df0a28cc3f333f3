use super::{FuncId, Val};
use crate::error;
use crate::lang::Error;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Handle to a variable. The generation makes handles held by compiled
/// code detectably stale once the variable is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId {
    index: u32,
    generation: u32,
}

/// What a name in the global symbol table stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Variable(VarId),
    Function { id: FuncId, preferred: bool },
    Module(usize),
}

/// Settles an ambiguous minimum match in favor of the single function
/// flagged as preferred, so `p` can mean `print` next to `pi`.
pub fn prefer(_: &str, window: &[(&str, &Entry)]) -> Option<usize> {
    let mut picks = window
        .iter()
        .enumerate()
        .filter(|(_, (_, entry))| matches!(entry, Entry::Function { preferred: true, .. }));
    match (picks.next(), picks.next()) {
        (Some((index, _)), None) => Some(index),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: Rc<str>,
    pub val: Val,
}

#[derive(Debug, Default)]
struct Cell {
    generation: u32,
    var: Option<Variable>,
}

/// ## Variable memory

#[derive(Debug, Default)]
pub struct Vars {
    cells: Vec<Cell>,
    free: Vec<u32>,
}

impl Vars {
    pub fn new() -> Vars {
        Vars::default()
    }

    pub fn insert(&mut self, name: Rc<str>, val: Val) -> VarId {
        let var = Some(Variable { name, val });
        match self.free.pop() {
            Some(index) => {
                let cell = &mut self.cells[index as usize];
                cell.var = var;
                VarId {
                    index,
                    generation: cell.generation,
                }
            }
            None => {
                self.cells.push(Cell { generation: 0, var });
                VarId {
                    index: (self.cells.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    fn stale(id: VarId) -> Error {
        error!(DeletedVariable; format!("HANDLE {}.{}", id.index, id.generation))
    }

    pub fn get(&self, id: VarId) -> Result<&Variable> {
        match self.cells.get(id.index as usize) {
            Some(Cell {
                generation,
                var: Some(var),
            }) if *generation == id.generation => Ok(var),
            _ => Err(Vars::stale(id)),
        }
    }

    pub fn get_mut(&mut self, id: VarId) -> Result<&mut Variable> {
        match self.cells.get_mut(id.index as usize) {
            Some(Cell {
                generation,
                var: Some(var),
            }) if *generation == id.generation => Ok(var),
            _ => Err(Vars::stale(id)),
        }
    }

    pub fn val(&self, id: VarId) -> Result<&Val> {
        Ok(&self.get(id)?.val)
    }

    pub fn remove(&mut self, id: VarId) -> Option<Variable> {
        let cell = self.cells.get_mut(id.index as usize)?;
        if cell.generation != id.generation {
            return None;
        }
        let var = cell.var.take()?;
        cell.generation = cell.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(var)
    }

    pub fn len(&self) -> usize {
        self.cells.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
