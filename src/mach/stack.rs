use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## Stack enforced and size limited vector

pub struct Stack<T> {
    overflow_message: &'static str,
    limit: usize,
    vec: Vec<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.vec)
    }
}

impl<T> Stack<T> {
    pub fn new(overflow_message: &'static str, limit: usize) -> Stack<T> {
        Stack {
            overflow_message,
            limit,
            vec: vec![],
        }
    }
    pub fn limit(&self) -> usize {
        self.limit
    }
    fn overflow_check(&self) -> Result<()> {
        if self.vec.len() > self.limit {
            Err(error!(StackOverflow; self.overflow_message))
        } else {
            Ok(())
        }
    }
    fn underflow_error(&self) -> Error {
        error!(InternalError; "UNDERFLOW")
    }
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.vec.get(idx)
    }
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.vec.get_mut(index)
    }
    /// Clears the contents but keeps the allocation for the next statement.
    pub fn clear(&mut self) {
        self.vec.clear()
    }
    pub fn truncate(&mut self, len: usize) {
        self.vec.truncate(len)
    }
    pub fn len(&self) -> usize {
        self.vec.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
    pub fn last(&self) -> Option<&T> {
        self.vec.last()
    }
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.vec.last_mut()
    }
    pub fn as_slice(&self) -> &[T] {
        &self.vec
    }
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.vec
    }
    /// The top `len` entries, bottom first.
    pub fn tail_mut(&mut self, len: usize) -> Result<&mut [T]> {
        if len > self.vec.len() {
            return Err(self.underflow_error());
        }
        let start = self.vec.len() - len;
        Ok(&mut self.vec[start..])
    }
    pub fn push(&mut self, val: T) -> Result<()> {
        self.vec.push(val);
        self.overflow_check()
    }
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<()> {
        self.vec.extend(iter);
        self.overflow_check()
    }
    pub fn pop(&mut self) -> Result<T> {
        match self.vec.pop() {
            Some(v) => Ok(v),
            None => Err(self.underflow_error()),
        }
    }
    pub fn pop_2(&mut self) -> Result<(T, T)> {
        let two = self.pop()?;
        let one = self.pop()?;
        Ok((one, two))
    }
    pub fn pop_n(&mut self, len: usize) -> Result<Vec<T>> {
        if len > self.vec.len() {
            Err(self.underflow_error())
        } else {
            let range = (self.vec.len() - len)..;
            Ok(self.vec.drain(range).collect())
        }
    }
    /// Hand the contents over, leaving the stack empty.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.vec)
    }
    /// Put back contents taken with [`Stack::take`].
    pub fn restore(&mut self, vec: Vec<T>) {
        self.vec = vec;
    }
}
