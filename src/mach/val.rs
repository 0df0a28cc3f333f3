use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Float,
    Integer,
    Text,
    Logical,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Float | Type::Integer)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Type::Float => "FLOAT",
            Type::Integer => "INTEGER",
            Type::Text => "STRING",
            Type::Logical => "LOGICAL",
        };
        write!(f, "{}", s)
    }
}

/// Who owns a cell and what may be done to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Declared by the user: read, write and delete.
    Declared,
    /// Registered by a module, read only.
    Parameter,
    /// Registered by a module, writable but never deleted.
    ReadWrite,
    /// Built while one statement executes.
    Temporary,
    /// Held on the value stack until the statement ends.
    Pinned,
    /// Stands for a variable passed by reference.
    Reference,
    /// Whole array handed to a once function by reference.
    FunctionReference,
    /// Array produced by a once function.
    FunctionValue,
}

impl Ownership {
    pub fn is_writable(self) -> bool {
        !matches!(self, Ownership::Parameter)
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, Ownership::Declared)
    }
}

pub const MAX_RANK: usize = 3;

/// Rank and per-axis extents. Axis 0 varies fastest in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shape {
    rank: usize,
    dims: [usize; MAX_RANK],
}

impl Shape {
    pub const SCALAR: Shape = Shape {
        rank: 0,
        dims: [1; MAX_RANK],
    };

    pub fn new(dims: &[usize]) -> Result<Shape> {
        if dims.len() > MAX_RANK {
            return Err(error!(RankMismatch; "AT MOST 3 DIMENSIONS"));
        }
        let mut len: usize = 1;
        for d in dims {
            len = match len.checked_mul(*d) {
                Some(len) => len,
                None => return Err(error!(Overflow; "ARRAY TOO LARGE")),
            };
        }
        let mut shape = Shape::SCALAR;
        shape.rank = dims.len();
        shape.dims[..dims.len()].copy_from_slice(dims);
        Ok(shape)
    }

    pub fn vector(len: usize) -> Shape {
        Shape {
            rank: 1,
            dims: [len, 1, 1],
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims[..self.rank]
    }

    /// Extent along `axis`; 1 past the rank.
    pub fn extent(&self, axis: usize) -> usize {
        if axis < self.rank {
            self.dims[axis]
        } else {
            1
        }
    }

    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scalar(&self) -> bool {
        self.rank == 0
    }

    /// Storage distance between neighbours along each axis.
    pub fn strides(&self) -> [usize; MAX_RANK] {
        let mut strides = [0; MAX_RANK];
        let mut acc = 1;
        for (axis, stride) in strides.iter_mut().enumerate() {
            *stride = acc;
            acc *= self.extent(axis);
        }
        strides
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let dims: Vec<String> = self.dims().iter().map(|d| d.to_string()).collect();
        write!(f, "({})", dims.join(","))
    }
}

/// One element, as it lives on the run stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Float(f64),
    Integer(i64),
    Text(String),
    Logical(bool),
}

impl Scalar {
    pub fn ty(&self) -> Type {
        match self {
            Scalar::Float(_) => Type::Float,
            Scalar::Integer(_) => Type::Integer,
            Scalar::Text(_) => Type::Text,
            Scalar::Logical(_) => Type::Logical,
        }
    }

    pub fn zero(ty: Type) -> Scalar {
        match ty {
            Type::Float => Scalar::Float(0.0),
            Type::Integer => Scalar::Integer(0),
            Type::Text => Scalar::Text(String::new()),
            Type::Logical => Scalar::Logical(false),
        }
    }

    pub fn truth(&self) -> Result<bool> {
        match self {
            Scalar::Logical(b) => Ok(*b),
            _ => Err(error!(TypeMismatch; "LOGICAL VALUE EXPECTED")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Scalar::Float(n) => Ok(*n),
            Scalar::Integer(n) => Ok(*n as f64),
            _ => Err(error!(TypeMismatch; "NUMBER EXPECTED")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Scalar::Integer(n) => Ok(*n),
            Scalar::Float(n) => float_to_int(*n),
            _ => Err(error!(TypeMismatch; "NUMBER EXPECTED")),
        }
    }

    /// Numeric conversion to `ty`; Text and Logical convert only to themselves.
    pub fn convert(self, ty: Type) -> Result<Scalar> {
        if self.ty() == ty {
            return Ok(self);
        }
        match ty {
            Type::Float => Ok(Scalar::Float(self.as_f64()?)),
            Type::Integer => Ok(Scalar::Integer(self.as_i64()?)),
            _ => Err(error!(TypeMismatch; format!("{} WHERE {} EXPECTED", self.ty(), ty))),
        }
    }
}

/// Truncate toward zero, refusing values an `i64` cannot hold.
pub fn float_to_int(n: f64) -> Result<i64> {
    if !n.is_finite() || n >= 9.223_372_036_854_776e18 || n < -9.223_372_036_854_776e18 {
        return Err(error!(Overflow; "FLOAT TO INTEGER"));
    }
    Ok(n.trunc() as i64)
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Integer(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Float(Vec<f64>),
    Integer(Vec<i64>),
    Text(Vec<String>),
    Logical(Vec<bool>),
}

impl Data {
    fn zeroed(ty: Type, len: usize) -> Data {
        match ty {
            Type::Float => Data::Float(vec![0.0; len]),
            Type::Integer => Data::Integer(vec![0; len]),
            Type::Text => Data::Text(vec![String::new(); len]),
            Type::Logical => Data::Logical(vec![false; len]),
        }
    }

    fn try_zeroed(ty: Type, len: usize) -> Result<Data> {
        fn zeroed<T: Clone>(len: usize, zero: T) -> Result<Vec<T>> {
            let mut v = Vec::new();
            if v.try_reserve_exact(len).is_err() {
                return Err(error!(OutOfMemory; format!("{} ELEMENTS", len)));
            }
            v.resize(len, zero);
            Ok(v)
        }
        Ok(match ty {
            Type::Float => Data::Float(zeroed(len, 0.0)?),
            Type::Integer => Data::Integer(zeroed(len, 0)?),
            Type::Text => Data::Text(zeroed(len, String::new())?),
            Type::Logical => Data::Logical(zeroed(len, false)?),
        })
    }

    fn len(&self) -> usize {
        match self {
            Data::Float(v) => v.len(),
            Data::Integer(v) => v.len(),
            Data::Text(v) => v.len(),
            Data::Logical(v) => v.len(),
        }
    }
}

/// ## Value cell
///
/// Typed storage plus a shape of rank 0 to 3. Storage length always equals
/// the product of the extents.
#[derive(Debug, Clone, PartialEq)]
pub struct Val {
    data: Data,
    shape: Shape,
    owner: Ownership,
}

impl Val {
    pub fn new(ty: Type, shape: Shape, owner: Ownership) -> Val {
        Val {
            data: Data::zeroed(ty, shape.len()),
            shape,
            owner,
        }
    }

    /// Like [`Val::new`] but reports an allocation failure as an error.
    pub fn try_new(ty: Type, shape: Shape, owner: Ownership) -> Result<Val> {
        Ok(Val {
            data: Data::try_zeroed(ty, shape.len())?,
            shape,
            owner,
        })
    }

    pub fn from_data(data: Data, shape: Shape) -> Result<Val> {
        if data.len() != shape.len() {
            return Err(error!(InternalError; "STORAGE DOES NOT MATCH SHAPE"));
        }
        Ok(Val {
            data,
            shape,
            owner: Ownership::Temporary,
        })
    }

    pub fn scalar(s: Scalar) -> Val {
        let data = match s {
            Scalar::Float(n) => Data::Float(vec![n]),
            Scalar::Integer(n) => Data::Integer(vec![n]),
            Scalar::Text(s) => Data::Text(vec![s]),
            Scalar::Logical(b) => Data::Logical(vec![b]),
        };
        Val {
            data,
            shape: Shape::SCALAR,
            owner: Ownership::Temporary,
        }
    }

    pub fn floats(v: Vec<f64>) -> Val {
        let shape = Shape::vector(v.len());
        Val {
            data: Data::Float(v),
            shape,
            owner: Ownership::Temporary,
        }
    }

    pub fn integers(v: Vec<i64>) -> Val {
        let shape = Shape::vector(v.len());
        Val {
            data: Data::Integer(v),
            shape,
            owner: Ownership::Temporary,
        }
    }

    pub fn texts(v: Vec<String>) -> Val {
        let shape = Shape::vector(v.len());
        Val {
            data: Data::Text(v),
            shape,
            owner: Ownership::Temporary,
        }
    }

    pub fn ty(&self) -> Type {
        match self.data {
            Data::Float(_) => Type::Float,
            Data::Integer(_) => Type::Integer,
            Data::Text(_) => Type::Text,
            Data::Logical(_) => Type::Logical,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owner(&self) -> Ownership {
        self.owner
    }

    pub fn with_owner(mut self, owner: Ownership) -> Val {
        self.owner = owner;
        self
    }

    pub fn set_owner(&mut self, owner: Ownership) {
        self.owner = owner;
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn get(&self, index: usize) -> Result<Scalar> {
        let missing = || error!(SubscriptOutOfRange; format!("ELEMENT {}", index + 1));
        Ok(match &self.data {
            Data::Float(v) => Scalar::Float(*v.get(index).ok_or_else(missing)?),
            Data::Integer(v) => Scalar::Integer(*v.get(index).ok_or_else(missing)?),
            Data::Text(v) => Scalar::Text(v.get(index).ok_or_else(missing)?.clone()),
            Data::Logical(v) => Scalar::Logical(*v.get(index).ok_or_else(missing)?),
        })
    }

    /// Store one element, converting between Integer and Float.
    pub fn set(&mut self, index: usize, value: Scalar) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(error!(SubscriptOutOfRange; format!("ELEMENT {}", index + 1)));
        }
        let ty = self.ty();
        match (&mut self.data, value.convert(ty)?) {
            (Data::Float(v), Scalar::Float(n)) => v[index] = n,
            (Data::Integer(v), Scalar::Integer(n)) => v[index] = n,
            (Data::Text(v), Scalar::Text(s)) => v[index] = s,
            (Data::Logical(v), Scalar::Logical(b)) => v[index] = b,
            _ => return Err(error!(InternalError; "CONVERSION")),
        }
        Ok(())
    }

    pub fn fill(&mut self, value: Scalar) -> Result<()> {
        for index in 0..self.len() {
            self.set(index, value.clone())?;
        }
        Ok(())
    }

    /// Change the extents keeping the leading elements in storage order.
    /// Text elements trimmed away are released before the storage shrinks.
    pub fn resize(&mut self, shape: Shape) -> Result<()> {
        let len = shape.len();
        let grow = len.saturating_sub(self.len());
        let reserved = match &mut self.data {
            Data::Float(v) => v.try_reserve(grow),
            Data::Integer(v) => v.try_reserve(grow),
            Data::Text(v) => v.try_reserve(grow),
            Data::Logical(v) => v.try_reserve(grow),
        };
        if reserved.is_err() {
            return Err(error!(OutOfMemory; format!("{} ELEMENTS", len)));
        }
        match &mut self.data {
            Data::Float(v) => v.resize(len, 0.0),
            Data::Integer(v) => v.resize(len, 0),
            Data::Text(v) => {
                v.truncate(len);
                v.resize(len, String::new());
            }
            Data::Logical(v) => v.resize(len, false),
        }
        self.shape = shape;
        Ok(())
    }

    /// Equal extents and elements, whatever the ownership.
    pub fn same(&self, other: &Val) -> bool {
        self.shape == other.shape && self.data == other.data
    }

    /// Replace contents and extents with `src` converted to this cell's
    /// type. The cell keeps its ownership. Text elements past the new length
    /// are released first and the surviving buffers are reused.
    pub fn assign(&mut self, src: Val) -> Result<()> {
        let src = if src.ty() == self.ty() {
            src
        } else {
            src.convert(self.ty())?
        };
        let shape = src.shape;
        match (&mut self.data, src.data) {
            (Data::Text(dst), Data::Text(src)) => {
                dst.truncate(src.len());
                let keep = dst.len();
                for (d, s) in dst.iter_mut().zip(src.iter()) {
                    d.clone_from(s);
                }
                dst.extend(src.into_iter().skip(keep));
            }
            (dst, data) => *dst = data,
        }
        self.shape = shape;
        Ok(())
    }

    /// Reinterpret the storage under new extents of the same element count.
    pub fn reshape(&mut self, shape: Shape) -> Result<()> {
        if shape.len() != self.len() {
            return Err(error!(ShapeMismatch;
                format!("CANNOT VIEW {} ELEMENTS AS {}", self.len(), shape)));
        }
        self.shape = shape;
        Ok(())
    }

    /// Copy converted to `ty`; only Integer and Float interconvert.
    pub fn convert(&self, ty: Type) -> Result<Val> {
        if self.ty() == ty {
            return Ok(self.clone());
        }
        let data = match (&self.data, ty) {
            (Data::Integer(v), Type::Float) => Data::Float(v.iter().map(|n| *n as f64).collect()),
            (Data::Float(v), Type::Integer) => {
                Data::Integer(v.iter().map(|n| float_to_int(*n)).collect::<Result<_>>()?)
            }
            _ => {
                return Err(error!(TypeMismatch; format!("{} WHERE {} EXPECTED", self.ty(), ty)));
            }
        };
        Ok(Val {
            data,
            shape: self.shape,
            owner: self.owner,
        })
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match &self.data {
            Data::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_integers(&self) -> Option<&[i64]> {
        match &self.data {
            Data::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_texts(&self) -> Option<&[String]> {
        match &self.data {
            Data::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_logicals(&self) -> Option<&[bool]> {
        match &self.data {
            Data::Logical(v) => Some(v),
            _ => None,
        }
    }

    pub fn first(&self) -> Result<Scalar> {
        self.get(0)
    }

    /// Text from a scalar Text cell.
    pub fn text(&self) -> Result<&str> {
        match &self.data {
            Data::Text(v) if v.len() == 1 => Ok(&v[0]),
            _ => Err(error!(TypeMismatch; "STRING EXPECTED")),
        }
    }
}

impl TryFrom<&Val> for i64 {
    type Error = Error;
    fn try_from(val: &Val) -> Result<i64> {
        if val.len() != 1 {
            return Err(error!(RankMismatch; "SCALAR EXPECTED"));
        }
        val.first()?.as_i64()
    }
}

impl TryFrom<&Val> for f64 {
    type Error = Error;
    fn try_from(val: &Val) -> Result<f64> {
        if val.len() != 1 {
            return Err(error!(RankMismatch; "SCALAR EXPECTED"));
        }
        val.first()?.as_f64()
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for index in 0..self.len() {
            if index > 0 {
                write!(f, " ")?;
            }
            match self.get(index) {
                Ok(s) => write!(f, "{}", s)?,
                Err(_) => return Err(std::fmt::Error),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    #[test]
    fn test_shape_basics() {
        let s = Shape::new(&[3, 4]).unwrap();
        assert_eq!(s.len(), 12);
        assert_eq!(s.extent(2), 1);
        assert_eq!(s.strides(), [1, 3, 12]);
        assert_eq!(s.to_string(), "(3,4)");
        assert_eq!(Shape::SCALAR.len(), 1);
        assert!(Shape::new(&[1, 1, 1, 1]).is_err());
    }

    #[test]
    fn test_set_converts_numbers_only() {
        let mut v = Val::new(Type::Integer, Shape::vector(2), Ownership::Declared);
        v.set(0, Scalar::Float(-2.7)).unwrap();
        assert_eq!(v.get(0).unwrap(), Scalar::Integer(-2));
        let e = v.set(1, Scalar::Text("x".into())).unwrap_err();
        assert_eq!(e.code(), ErrorCode::TypeMismatch);
        assert_eq!(
            v.set(2, Scalar::Integer(1)).unwrap_err().code(),
            ErrorCode::SubscriptOutOfRange
        );
        assert!(v.set(1, Scalar::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_resize_text_releases_tail() {
        let mut v = Val::texts((0..10).map(|i| format!("s{}", i)).collect());
        v.resize(Shape::vector(3)).unwrap();
        assert_eq!(v.as_texts().unwrap(), ["s0", "s1", "s2"]);
        v.resize(Shape::vector(4)).unwrap();
        assert_eq!(v.as_texts().unwrap(), ["s0", "s1", "s2", ""]);
    }

    #[test]
    fn test_assign_reextends_and_converts() {
        let mut v = Val::new(Type::Float, Shape::vector(10), Ownership::Declared);
        v.assign(Val::integers(vec![1, 2, 3])).unwrap();
        assert_eq!(v.shape(), Shape::vector(3));
        assert_eq!(v.as_floats().unwrap(), [1.0, 2.0, 3.0]);
        assert_eq!(v.owner(), Ownership::Declared);
        let mut t = Val::texts(vec!["a".into(), "b".into()]);
        t.assign(Val::texts(vec!["c".into()])).unwrap();
        assert_eq!(t.as_texts().unwrap(), ["c"]);
        assert!(t.assign(Val::integers(vec![1])).is_err());
    }

    #[test]
    fn test_reshape_and_convert() {
        let mut v = Val::integers((1..=6).collect());
        v.reshape(Shape::new(&[2, 3]).unwrap()).unwrap();
        assert_eq!(v.rank(), 2);
        assert!(v.reshape(Shape::vector(5)).is_err());
        let f = v.convert(Type::Float).unwrap();
        assert_eq!(f.as_floats().unwrap()[5], 6.0);
        assert!(v.convert(Type::Text).is_err());
        assert_eq!(f.to_string(), "1 2 3 4 5 6");
    }
}
