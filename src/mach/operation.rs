use super::{Scalar, Type};
use crate::error;
use crate::lang::{Error, Operator};

type Result<T> = std::result::Result<T, Error>;

/// Binary operators after parsing; `&&` and `||` compile to guards instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Concat,
}

impl BinOp {
    pub fn from_operator(op: Operator) -> Option<BinOp> {
        use BinOp::*;
        Some(match op {
            Operator::Plus => Add,
            Operator::Minus => Sub,
            Operator::Multiply => Mul,
            Operator::Divide => Div,
            Operator::Caret => Pow,
            Operator::Equal => Eq,
            Operator::NotEqual => NotEq,
            Operator::Less => Lt,
            Operator::LessEqual => LtEq,
            Operator::Greater => Gt,
            Operator::GreaterEqual => GtEq,
            Operator::Concat => Concat,
            _ => return None,
        })
    }

    fn is_comparison(self) -> bool {
        use BinOp::*;
        matches!(self, Eq | NotEq | Lt | LtEq | Gt | GtEq)
    }
}

/// Operand and result types of a binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Both operands are converted to this type first.
    pub operand: Type,
    pub result: Type,
}

pub struct Operation {}

impl Operation {
    /// Type rules checked at compile time. Integer and Float meet at Float;
    /// Text and Logical never convert.
    pub fn signature(op: BinOp, lhs: Type, rhs: Type) -> Result<Signature> {
        use Type::*;
        let mismatch = || error!(TypeMismatch; format!("{} {:?} {}", lhs, op, rhs).to_ascii_uppercase());
        let operand = match (lhs, rhs) {
            (Integer, Integer) => Integer,
            (Float, Float) | (Float, Integer) | (Integer, Float) => Float,
            (Text, Text) => Text,
            (Logical, Logical) => Logical,
            _ => return Err(mismatch()),
        };
        let result = match op {
            BinOp::Concat if operand == Text => Text,
            BinOp::Concat => return Err(mismatch()),
            BinOp::Eq | BinOp::NotEq => Logical,
            _ if op.is_comparison() && operand != Logical => Logical,
            _ if operand.is_numeric() => operand,
            _ => return Err(mismatch()),
        };
        Ok(Signature { operand, result })
    }

    pub fn binary(op: BinOp, lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
        use BinOp::*;
        match op {
            Add => Operation::sum(lhs, rhs),
            Sub => Operation::subtract(lhs, rhs),
            Mul => Operation::multiply(lhs, rhs),
            Div => Operation::divide(lhs, rhs),
            Pow => Operation::power(lhs, rhs),
            Concat => Operation::concat(lhs, rhs),
            Eq => Ok(Scalar::Logical(Operation::compare(lhs, rhs)? == std::cmp::Ordering::Equal)),
            NotEq => Ok(Scalar::Logical(Operation::compare(lhs, rhs)? != std::cmp::Ordering::Equal)),
            Lt => Ok(Scalar::Logical(Operation::compare(lhs, rhs)? == std::cmp::Ordering::Less)),
            LtEq => Ok(Scalar::Logical(Operation::compare(lhs, rhs)? != std::cmp::Ordering::Greater)),
            Gt => Ok(Scalar::Logical(Operation::compare(lhs, rhs)? == std::cmp::Ordering::Greater)),
            GtEq => Ok(Scalar::Logical(Operation::compare(lhs, rhs)? != std::cmp::Ordering::Less)),
        }
    }

    fn finite(n: f64) -> Result<Scalar> {
        if n.is_finite() {
            Ok(Scalar::Float(n))
        } else {
            Err(error!(Overflow))
        }
    }

    pub fn negate(val: Scalar) -> Result<Scalar> {
        use Scalar::*;
        match val {
            Integer(n) => match n.checked_neg() {
                Some(i) => Ok(Integer(i)),
                None => Err(error!(Overflow)),
            },
            Float(n) => Ok(Float(-n)),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn not(val: Scalar) -> Result<Scalar> {
        Ok(Scalar::Logical(!val.truth()?))
    }

    pub fn sum(lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
        use Scalar::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => match l.checked_add(r) {
                Some(i) => Ok(Integer(i)),
                None => Err(error!(Overflow)),
            },
            (Float(l), Float(r)) => Operation::finite(l + r),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn subtract(lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
        use Scalar::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => match l.checked_sub(r) {
                Some(i) => Ok(Integer(i)),
                None => Err(error!(Overflow)),
            },
            (Float(l), Float(r)) => Operation::finite(l - r),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn multiply(lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
        use Scalar::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => match l.checked_mul(r) {
                Some(i) => Ok(Integer(i)),
                None => Err(error!(Overflow)),
            },
            (Float(l), Float(r)) => Operation::finite(l * r),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn divide(lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
        use Scalar::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => match l.checked_div(r) {
                Some(i) => Ok(Integer(i)),
                None => {
                    if r == 0 {
                        Err(error!(DivisionByZero))
                    } else {
                        Err(error!(Overflow))
                    }
                }
            },
            (Float(l), Float(r)) => {
                if r == 0.0 {
                    Err(error!(DivisionByZero))
                } else {
                    Operation::finite(l / r)
                }
            }
            _ => Err(error!(TypeMismatch)),
        }
    }

    /// Integer powers with a negative exponent truncate toward zero the way
    /// integer division does.
    pub fn power(lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
        use Scalar::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => {
                if r < 0 {
                    return match l {
                        0 => Err(error!(DivisionByZero)),
                        1 => Ok(Integer(1)),
                        -1 => Ok(Integer(if r % 2 == 0 { 1 } else { -1 })),
                        _ => Ok(Integer(0)),
                    };
                }
                let r = match u32::try_from(r) {
                    Ok(r) => r,
                    Err(_) if l == 0 || l == 1 => return Ok(Integer(l)),
                    Err(_) if l == -1 => return Ok(Integer(if r % 2 == 0 { 1 } else { -1 })),
                    Err(_) => return Err(error!(Overflow)),
                };
                match l.checked_pow(r) {
                    Some(i) => Ok(Integer(i)),
                    None => Err(error!(Overflow)),
                }
            }
            (Float(l), Float(r)) => {
                if l < 0.0 && r.fract() != 0.0 {
                    return Err(error!(DomainError; "NEGATIVE BASE, FRACTIONAL POWER"));
                }
                if l == 0.0 && r < 0.0 {
                    return Err(error!(DivisionByZero));
                }
                Operation::finite(l.powf(r))
            }
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn concat(lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
        match (lhs, rhs) {
            (Scalar::Text(mut l), Scalar::Text(r)) => {
                l.push_str(&r);
                Ok(Scalar::Text(l))
            }
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn compare(lhs: Scalar, rhs: Scalar) -> Result<std::cmp::Ordering> {
        use Scalar::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => Ok(l.cmp(&r)),
            (Float(l), Float(r)) => match l.partial_cmp(&r) {
                Some(ord) => Ok(ord),
                None => Err(error!(DomainError; "NOT A NUMBER")),
            },
            (Text(l), Text(r)) => Ok(l.cmp(&r)),
            (Logical(l), Logical(r)) => Ok(l.cmp(&r)),
            _ => Err(error!(TypeMismatch)),
        }
    }

    /// Characters `from..=to` counted from 1.
    pub fn substring(text: &str, from: i64, to: i64) -> Result<String> {
        let len = text.chars().count() as i64;
        if to < from {
            return Ok(String::new());
        }
        if from < 1 || to > len {
            return Err(error!(SubscriptOutOfRange; format!("[{}:{}] OF {} CHARACTERS", from, to, len)));
        }
        Ok(text
            .chars()
            .skip((from - 1) as usize)
            .take((to - from + 1) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use Scalar::*;

    #[test]
    fn test_signature() {
        let s = Operation::signature(BinOp::Add, Type::Integer, Type::Float).unwrap();
        assert_eq!(s.operand, Type::Float);
        assert_eq!(s.result, Type::Float);
        let s = Operation::signature(BinOp::Lt, Type::Text, Type::Text).unwrap();
        assert_eq!(s.result, Type::Logical);
        assert!(Operation::signature(BinOp::Add, Type::Text, Type::Float).is_err());
        assert!(Operation::signature(BinOp::Lt, Type::Logical, Type::Logical).is_err());
        assert!(Operation::signature(BinOp::Concat, Type::Integer, Type::Integer).is_err());
        let s = Operation::signature(BinOp::NotEq, Type::Logical, Type::Logical).unwrap();
        assert_eq!(s.result, Type::Logical);
    }

    #[test]
    fn test_arithmetic_errors() {
        let e = Operation::divide(Integer(1), Integer(0)).unwrap_err();
        assert_eq!(e.code(), ErrorCode::DivisionByZero);
        let e = Operation::divide(Float(1.0), Float(0.0)).unwrap_err();
        assert_eq!(e.code(), ErrorCode::DivisionByZero);
        let e = Operation::power(Float(-8.0), Float(0.5)).unwrap_err();
        assert_eq!(e.code(), ErrorCode::DomainError);
        let e = Operation::sum(Integer(i64::MAX), Integer(1)).unwrap_err();
        assert_eq!(e.code(), ErrorCode::Overflow);
        assert_eq!(Operation::power(Float(-8.0), Float(2.0)).unwrap(), Float(64.0));
        assert_eq!(Operation::power(Integer(2), Integer(-1)).unwrap(), Integer(0));
        assert_eq!(Operation::power(Integer(-1), Integer(-3)).unwrap(), Integer(-1));
    }

    #[test]
    fn test_text() {
        let s = Operation::concat(Text("ab".into()), Text("cd".into())).unwrap();
        assert_eq!(s, Text("abcd".into()));
        assert_eq!(Operation::substring("hello", 2, 4).unwrap(), "ell");
        assert_eq!(Operation::substring("hello", 3, 2).unwrap(), "");
        assert!(Operation::substring("hello", 0, 2).is_err());
        assert_eq!(
            Operation::binary(BinOp::Lt, Text("a".into()), Text("b".into())).unwrap(),
            Logical(true)
        );
    }
}
