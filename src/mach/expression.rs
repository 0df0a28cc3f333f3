use super::compile::Compiler;
use super::function::{ArgDecl, ArgType, Function, Kind, Mode, Returns};
use super::opcode::{Access, Axis, ExprInfo, Offset, Opcode};
use super::var::{Entry, VarId};
use super::{BinOp, Operation, Scalar, Type, MAX_RANK};
use crate::error;
use crate::lang::{Column, Error, Operator, Token};

type Result<T> = std::result::Result<T, Error>;

/// Static type of a compiled (sub)expression. The rank is known for
/// operands whose rank cannot change before the statement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Typed {
    pub ty: Type,
    pub rank: Option<usize>,
}

impl Typed {
    fn scalar(ty: Type) -> Typed {
        Typed { ty, rank: Some(0) }
    }
}

fn merge(lhs: Option<usize>, rhs: Option<usize>) -> Option<usize> {
    match (lhs, rhs) {
        (Some(l), Some(r)) => Some(l.max(r)),
        _ => None,
    }
}

const OR: u8 = 1;
const AND: u8 = 2;
const COMPARE: u8 = 3;
const ADD: u8 = 4;
const MULTIPLY: u8 = 5;
const POWER: u8 = 6;
const UNARY: u8 = 7;
const CONCAT: u8 = 8;

fn precedence(op: Operator) -> Option<u8> {
    use Operator::*;
    match op {
        Or => Some(OR),
        And => Some(AND),
        Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => Some(COMPARE),
        Plus | Minus => Some(ADD),
        Multiply | Divide => Some(MULTIPLY),
        Caret => Some(POWER),
        Concat => Some(CONCAT),
        Not => None,
    }
}

/// One expression under construction. Operands that need resolving before
/// the element loop go to the prologue and get a slot; everything else is
/// the body.
#[derive(Debug, Default)]
struct Builder {
    prologue: Vec<Opcode>,
    body: Vec<Opcode>,
    slots: usize,
}

impl Builder {
    fn slot(&mut self) -> usize {
        self.slots += 1;
        self.slots - 1
    }

    fn finish(self, ty: Type) -> Vec<Opcode> {
        let mut code = Vec::with_capacity(1 + self.prologue.len() + self.body.len());
        code.push(Opcode::Expr(ExprInfo {
            len: self.prologue.len() + self.body.len(),
            slots: self.slots,
            ty,
            access: Access::Value,
        }));
        code.extend(self.prologue);
        code.extend(self.body);
        code
    }
}

fn header(ty: Type, access: Access) -> Vec<Opcode> {
    vec![Opcode::Expr(ExprInfo {
        len: 0,
        slots: 0,
        ty,
        access,
    })]
}

impl<'a> Compiler<'a> {
    pub(super) fn expression(&mut self) -> Result<(Vec<Opcode>, Typed)> {
        let mut b = Builder::default();
        let typed = self.expr(&mut b, 0)?;
        Ok((b.finish(typed.ty), typed))
    }

    /// An integer valued expression such as a subscript or an extent.
    pub(super) fn subscript(&mut self) -> Result<Vec<Opcode>> {
        let col = self.lexer.peek_column()?;
        let mut b = Builder::default();
        let typed = self.expr(&mut b, 0)?;
        self.convert(&mut b, typed.ty, Type::Integer, &col)?;
        Ok(b.finish(Type::Integer))
    }

    /// Axes of a section up to and including the closing parenthesis.
    pub(super) fn subscripts(&mut self) -> Result<(Vec<Axis>, Vec<Opcode>)> {
        let mut axes = vec![];
        let mut code = vec![];
        loop {
            let col = self.lexer.peek_column()?;
            let mut lo = false;
            let mut range = false;
            let mut hi = false;
            let mut step = false;
            if self.lexer.peek()? != &Token::Colon {
                code.extend(self.subscript()?);
                lo = true;
            }
            if self.lexer.peek()? == &Token::Colon {
                self.lexer.next()?;
                range = true;
                if !matches!(self.lexer.peek()?, Token::Colon | Token::Comma | Token::RParen) {
                    code.extend(self.subscript()?);
                    hi = true;
                }
                if self.lexer.peek()? == &Token::Colon {
                    self.lexer.next()?;
                    code.extend(self.subscript()?);
                    step = true;
                }
            }
            axes.push(match (range, lo || hi || step) {
                (false, _) => Axis::At,
                (true, false) => Axis::All,
                (true, true) => Axis::Range { lo, hi, step },
            });
            if axes.len() > MAX_RANK {
                return Err(error!(RankMismatch, ..&col; "AT MOST 3 SUBSCRIPTS"));
            }
            match self.lexer.next()? {
                Token::Comma => continue,
                Token::RParen => break,
                _ => return Err(error!(UnmatchedBracket, ..&self.lexer.column(); "EXPECTED ')'")),
            }
        }
        Ok((axes, code))
    }

    /// An argument of a once function or a command, as a nested expression.
    pub(super) fn argument(&mut self, decl: ArgDecl) -> Result<(Vec<Opcode>, Typed)> {
        let col = self.lexer.peek_column()?;
        match decl.mode {
            Mode::Name => match self.lexer.next()? {
                Token::Name(name) => Ok((
                    header(Type::Text, Access::Name(name.as_str().into())),
                    Typed::scalar(Type::Text),
                )),
                _ => Err(error!(ModeMismatch, ..&col; "NAME EXPECTED")),
            },
            Mode::Reference => {
                let name = match self.lexer.next()? {
                    Token::Name(name) => name,
                    _ => return Err(error!(ModeMismatch, ..&col; "VARIABLE EXPECTED")),
                };
                if !matches!(self.lexer.peek()?, Token::Comma | Token::RParen | Token::End) {
                    return Err(error!(ModeMismatch, ..&col; "VARIABLE EXPECTED"));
                }
                let var = match *self.symbols.lookup(&name).map_err(|e| e.in_column(&col))?.1 {
                    Entry::Variable(id) => id,
                    _ => return Err(error!(ModeMismatch, ..&col; "VARIABLE EXPECTED")),
                };
                let val = self.vars.val(var)?;
                let (ty, rank) = (val.ty(), val.rank());
                let accepted = match decl.ty {
                    ArgType::Any => true,
                    ArgType::Numeric => ty.is_numeric(),
                    ArgType::Float => ty == Type::Float,
                    ArgType::Integer => ty == Type::Integer,
                    ArgType::Text | ArgType::Literal => ty == Type::Text,
                    ArgType::Logical => ty == Type::Logical,
                };
                if !accepted {
                    return Err(error!(TypeMismatch, ..&col; format!("{:?} EXPECTED", decl.ty).to_ascii_uppercase()));
                }
                Ok((header(ty, Access::Reference(var)), Typed { ty, rank: Some(rank) }))
            }
            Mode::Value => {
                let mut b = Builder::default();
                let typed = self.expr(&mut b, 0)?;
                let ty = self.accept(&mut b, decl, typed.ty, &col)?;
                if decl.rank.rank() == Some(0) && matches!(typed.rank, Some(r) if r > 0) {
                    return Err(error!(RankMismatch, ..&col; "SCALAR EXPECTED"));
                }
                Ok((b.finish(ty), Typed { ty, rank: typed.rank }))
            }
        }
    }

    fn expr(&mut self, b: &mut Builder, min: u8) -> Result<Typed> {
        let mut lhs = self.unary(b)?;
        loop {
            let op = match self.lexer.peek()? {
                Token::Operator(op) => *op,
                _ => break,
            };
            let prec = match precedence(op) {
                Some(prec) if prec >= min => prec,
                _ => break,
            };
            self.lexer.next()?;
            let col = self.lexer.column();
            if op == Operator::And || op == Operator::Or {
                if lhs.ty != Type::Logical {
                    return Err(error!(TypeMismatch, ..&col; format!("{} {}", lhs.ty, op)));
                }
                let guard = b.body.len();
                b.body.push(Opcode::Not);
                let rhs = self.expr(b, prec + 1)?;
                if rhs.ty != Type::Logical {
                    return Err(error!(TypeMismatch, ..&col; format!("{} {}", op, rhs.ty)));
                }
                let skip = (b.body.len() - guard) as Offset;
                b.body[guard] = if op == Operator::And {
                    Opcode::AndGuard(skip)
                } else {
                    Opcode::OrGuard(skip)
                };
                lhs = Typed {
                    ty: Type::Logical,
                    rank: merge(lhs.rank, rhs.rank),
                };
                continue;
            }
            let next = if op == Operator::Caret { prec } else { prec + 1 };
            let rhs = self.expr(b, next)?;
            let bin = match BinOp::from_operator(op) {
                Some(bin) => bin,
                None => return Err(error!(InternalError, ..&col; "OPERATOR")),
            };
            let sig = Operation::signature(bin, lhs.ty, rhs.ty).map_err(|e| e.in_column(&col))?;
            if lhs.ty != sig.operand {
                b.body.push(Opcode::Coerce {
                    to: sig.operand,
                    depth: 1,
                });
            }
            if rhs.ty != sig.operand {
                b.body.push(Opcode::Coerce {
                    to: sig.operand,
                    depth: 0,
                });
            }
            b.body.push(Opcode::Binary(bin, sig.operand));
            lhs = Typed {
                ty: sig.result,
                rank: merge(lhs.rank, rhs.rank),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self, b: &mut Builder) -> Result<Typed> {
        let op = match self.lexer.peek()? {
            Token::Operator(op @ Operator::Minus)
            | Token::Operator(op @ Operator::Plus)
            | Token::Operator(op @ Operator::Not) => *op,
            _ => return self.postfix(b),
        };
        self.lexer.next()?;
        let col = self.lexer.column();
        let typed = self.expr(b, UNARY)?;
        match op {
            Operator::Not => {
                if typed.ty != Type::Logical {
                    return Err(error!(TypeMismatch, ..&col; format!("! {}", typed.ty)));
                }
                b.body.push(Opcode::Not);
            }
            _ if !typed.ty.is_numeric() => {
                return Err(error!(TypeMismatch, ..&col; format!("{} {}", op, typed.ty)));
            }
            Operator::Minus => {
                let literal = typed.rank == Some(0) && b.prologue.is_empty();
                let folded = match b.body.last_mut() {
                    Some(Opcode::Constant(c)) if literal => {
                        *c = Operation::negate(c.clone()).map_err(|e| e.in_column(&col))?;
                        true
                    }
                    _ => false,
                };
                if !folded {
                    b.body.push(Opcode::Neg(typed.ty));
                }
            }
            _ => {}
        }
        Ok(typed)
    }

    fn postfix(&mut self, b: &mut Builder) -> Result<Typed> {
        let typed = self.primary(b)?;
        if self.lexer.peek()? != &Token::LBracket {
            return Ok(typed);
        }
        self.lexer.next()?;
        let col = self.lexer.column();
        if typed.ty != Type::Text {
            return Err(error!(TypeMismatch, ..&col; "SUB-STRING OF NON STRING"));
        }
        let mut bounds = 1;
        let lcol = self.lexer.peek_column()?;
        let lo = self.expr(b, 0)?;
        self.convert(b, lo.ty, Type::Integer, &lcol)?;
        if self.lexer.peek()? == &Token::Colon {
            self.lexer.next()?;
            let hcol = self.lexer.peek_column()?;
            let hi = self.expr(b, 0)?;
            self.convert(b, hi.ty, Type::Integer, &hcol)?;
            bounds = 2;
        }
        self.expect(Token::RBracket)?;
        b.body.push(Opcode::SubString(bounds));
        Ok(typed)
    }

    fn primary(&mut self, b: &mut Builder) -> Result<Typed> {
        let token = self.lexer.next()?;
        let col = self.lexer.column();
        let constant = |b: &mut Builder, s: Scalar| -> Result<Typed> {
            let ty = s.ty();
            b.body.push(Opcode::Constant(s));
            Ok(Typed::scalar(ty))
        };
        match token {
            Token::Integer(n) => constant(b, Scalar::Integer(n)),
            Token::Float(n) => constant(b, Scalar::Float(n)),
            Token::Text(s) => constant(b, Scalar::Text(s)),
            Token::Placeholder => {
                b.body.push(Opcode::Placeholder);
                Ok(Typed {
                    ty: Type::Integer,
                    rank: None,
                })
            }
            Token::LParen => {
                let typed = self.expr(b, 0)?;
                match self.lexer.next()? {
                    Token::RParen => Ok(typed),
                    _ => Err(error!(UnmatchedBracket, ..&col; "NO MATCHING ')'")),
                }
            }
            Token::Name(name) if name.eq_ignore_ascii_case("true") => constant(b, Scalar::Logical(true)),
            Token::Name(name) if name.eq_ignore_ascii_case("false") => constant(b, Scalar::Logical(false)),
            Token::Name(name) => {
                let entry = *self.symbols.lookup(&name).map_err(|e| e.in_column(&col))?.1;
                match entry {
                    Entry::Variable(var) => self.operand(b, var),
                    Entry::Function { id, .. } => self.call(b, id, &col),
                    Entry::Module(_) => Err(error!(SyntaxError, ..&col; format!("'{}' IS A MODULE", name))),
                }
            }
            Token::End => Err(error!(SyntaxError, ..&col; "EXPRESSION EXPECTED")),
            t => Err(error!(UnexpectedToken, ..&col; format!("'{}'", t))),
        }
    }

    /// A variable: whole, as a section `v(...)`, or reshaped `v{...}`.
    fn operand(&mut self, b: &mut Builder, var: VarId) -> Result<Typed> {
        let val = self.vars.val(var)?;
        let (ty, rank) = (val.ty(), val.rank());
        match self.lexer.peek()? {
            Token::LParen => {
                self.lexer.next()?;
                let (axes, code) = self.subscripts()?;
                let rank = axes.iter().filter(|axis| **axis != Axis::At).count();
                let slot = b.slot();
                b.prologue.push(Opcode::Index {
                    slot,
                    var,
                    axes: axes.into(),
                });
                b.prologue.extend(code);
                b.body.push(Opcode::Operand(slot));
                Ok(Typed { ty, rank: Some(rank) })
            }
            Token::LBrace => {
                let col = self.lexer.peek_column()?;
                self.lexer.next()?;
                let mut dims = vec![];
                if self.lexer.peek()? != &Token::RBrace {
                    loop {
                        dims.push(self.subscript()?);
                        if self.lexer.peek()? != &Token::Comma {
                            break;
                        }
                        self.lexer.next()?;
                    }
                }
                self.expect(Token::RBrace)?;
                if dims.len() > MAX_RANK {
                    return Err(error!(RankMismatch, ..&col; "AT MOST 3 DIMENSIONS"));
                }
                let slot = b.slot();
                b.prologue.push(Opcode::Array {
                    slot,
                    var,
                    cast: dims.len(),
                });
                let rank = dims.len();
                for code in dims {
                    b.prologue.extend(code);
                }
                b.body.push(Opcode::Operand(slot));
                Ok(Typed { ty, rank: Some(rank) })
            }
            _ => {
                let slot = b.slot();
                b.prologue.push(Opcode::Array { slot, var, cast: 0 });
                b.body.push(Opcode::Operand(slot));
                Ok(Typed { ty, rank: Some(rank) })
            }
        }
    }

    fn call(&mut self, b: &mut Builder, id: usize, col: &Column) -> Result<Typed> {
        let functions = self.functions;
        let f = &functions[id];
        let parens = self.lexer.peek()? == &Token::LParen;
        if parens {
            self.lexer.next()?;
        } else if f.min_args > 0 {
            return Err(error!(WrongArgumentCount, ..col; format!("{} NEEDS ARGUMENTS", f.name).to_ascii_uppercase()));
        }
        match f.kind {
            Kind::Elemental => {
                let mut types = vec![];
                let mut rank = Some(0);
                if parens && !self.closing()? {
                    loop {
                        self.too_many(f, types.len())?;
                        let decl = f.decl(types.len());
                        let acol = self.lexer.peek_column()?;
                        if decl.mode != Mode::Value {
                            return Err(error!(ModeMismatch, ..&acol; "ELEMENTAL ARGUMENTS ARE VALUES"));
                        }
                        let typed = self.expr(b, 0)?;
                        types.push(self.accept(b, decl, typed.ty, &acol)?);
                        rank = merge(rank, typed.rank);
                        if !self.next_argument()? {
                            break;
                        }
                    }
                }
                self.enough(f, types.len(), col)?;
                let ty = self.returns(f, &types, col)?;
                b.body.push(Opcode::Call {
                    func: id,
                    argc: types.len(),
                    ty,
                });
                Ok(Typed { ty, rank })
            }
            Kind::Once => {
                let mut args = vec![];
                let mut types = vec![];
                if parens && !self.closing()? {
                    loop {
                        self.too_many(f, args.len())?;
                        let (code, typed) = self.argument(f.decl(args.len()))?;
                        types.push(typed.ty);
                        args.push(code);
                        if !self.next_argument()? {
                            break;
                        }
                    }
                }
                self.enough(f, args.len(), col)?;
                let ty = self.returns(f, &types, col)?;
                let slot = b.slot();
                b.prologue.push(Opcode::Once {
                    slot,
                    func: id,
                    argc: args.len(),
                    ty,
                });
                for code in args {
                    b.prologue.extend(code);
                }
                b.body.push(Opcode::Operand(slot));
                Ok(Typed {
                    ty,
                    rank: f.rank.rank(),
                })
            }
        }
    }

    /// Consume `)` of an empty argument list.
    fn closing(&mut self) -> Result<bool> {
        if self.lexer.peek()? == &Token::RParen {
            self.lexer.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// After an argument: `,` continues, `)` ends the list.
    fn next_argument(&mut self) -> Result<bool> {
        match self.lexer.next()? {
            Token::Comma => Ok(true),
            Token::RParen => Ok(false),
            _ => Err(error!(UnmatchedBracket, ..&self.lexer.column(); "EXPECTED ')'")),
        }
    }

    fn too_many(&mut self, f: &Function, count: usize) -> Result<()> {
        if count >= f.max_args {
            let col = self.lexer.peek_column()?;
            return Err(error!(WrongArgumentCount, ..&col;
                format!("{} TAKES AT MOST {}", f.name, f.max_args).to_ascii_uppercase()));
        }
        Ok(())
    }

    fn enough(&self, f: &Function, count: usize, col: &Column) -> Result<()> {
        if count < f.min_args {
            return Err(error!(WrongArgumentCount, ..col;
                format!("{} NEEDS AT LEAST {}", f.name, f.min_args).to_ascii_uppercase()));
        }
        Ok(())
    }

    fn returns(&self, f: &Function, types: &[Type], col: &Column) -> Result<Type> {
        match f.returns {
            Returns::Fixed(ty) => Ok(ty),
            Returns::SameAs(index) => match types.get(index) {
                Some(ty) => Ok(*ty),
                None => Err(error!(WrongArgumentCount, ..col; format!("{} NEEDS AN ARGUMENT", f.name).to_ascii_uppercase())),
            },
            Returns::Nothing => Err(error!(TypeMismatch, ..col; format!("{} RETURNS NO VALUE", f.name).to_ascii_uppercase())),
        }
    }

    /// Convert the value on top of the run stack to what `decl` accepts.
    fn accept(&mut self, b: &mut Builder, decl: ArgDecl, ty: Type, col: &Column) -> Result<Type> {
        let want = match decl.ty {
            ArgType::Float => Type::Float,
            ArgType::Integer => Type::Integer,
            ArgType::Text | ArgType::Literal => Type::Text,
            ArgType::Logical => Type::Logical,
            ArgType::Any => return Ok(ty),
            ArgType::Numeric if ty.is_numeric() => return Ok(ty),
            ArgType::Numeric => return Err(error!(TypeMismatch, ..col; format!("NUMBER EXPECTED, NOT {}", ty))),
        };
        self.convert(b, ty, want, col)?;
        Ok(want)
    }

    fn convert(&mut self, b: &mut Builder, from: Type, to: Type, col: &Column) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if from.is_numeric() && to.is_numeric() {
            b.body.push(Opcode::Coerce { to, depth: 0 });
            return Ok(());
        }
        Err(error!(TypeMismatch, ..col; format!("{} EXPECTED, NOT {}", to, from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ladder() {
        assert!(precedence(Operator::Or) < precedence(Operator::And));
        assert!(precedence(Operator::Less) < precedence(Operator::Plus));
        assert!(precedence(Operator::Caret).unwrap() < UNARY);
        assert!(UNARY < precedence(Operator::Concat).unwrap());
        assert_eq!(precedence(Operator::Not), None);
    }

    #[test]
    fn test_builder_layout() {
        let mut b = Builder::default();
        let slot = b.slot();
        b.prologue.push(Opcode::Placeholder);
        b.body.push(Opcode::Operand(slot));
        let code = b.finish(Type::Float);
        assert_eq!(code.len(), 3);
        match &code[0] {
            Opcode::Expr(info) => {
                assert_eq!(info.len, 2);
                assert_eq!(info.slots, 1);
            }
            op => panic!("{}", op),
        }
    }
}
