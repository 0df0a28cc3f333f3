use super::function::{ArgType, Function, Kind};
use super::link::{Address, Link};
use super::opcode::{ExprInfo, Opcode};
use super::var::{Entry, VarId, Vars};
use super::{Access, Ownership, Scalar, Shape, Type, Val, MAX_RANK};
use crate::error;
use crate::lang::symbol::fold;
use crate::lang::{Column, Error, Keyword, Lexer, SubLine, SymbolTable, Token};
use std::rc::Rc;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

/// Where the lines of a block statement come from once the first line
/// has been handed to the compiler.
pub trait LineSource {
    /// `known` tells whether a word resolves in the global name space.
    fn next_line(&mut self, known: &dyn Fn(&str) -> bool) -> Result<Option<SubLine>>;
}

/// ## Statement compiler
///
/// Compiles one top level statement into the link. Block statements pull
/// their remaining lines from the source until the matching terminator, so
/// a whole `while ... end while` becomes a single unit. Names the statement
/// creates are withdrawn again when compilation fails.
pub struct Compiler<'a> {
    pub(super) symbols: &'a mut SymbolTable<Entry>,
    pub(super) vars: &'a mut Vars,
    pub(super) functions: &'a [Function],
    link: &'a mut Link,
    source: &'a mut dyn LineSource,
    max_name: usize,
    pub(super) lexer: Lexer,
    loops: Vec<Address>,
    created: Vec<(String, VarId)>,
}

impl<'a> Compiler<'a> {
    pub fn new(
        symbols: &'a mut SymbolTable<Entry>,
        vars: &'a mut Vars,
        functions: &'a [Function],
        link: &'a mut Link,
        source: &'a mut dyn LineSource,
        max_name: usize,
    ) -> Compiler<'a> {
        Compiler {
            symbols,
            vars,
            functions,
            link,
            source,
            max_name,
            lexer: Lexer::new("", max_name),
            loops: vec![],
            created: vec![],
        }
    }

    /// The sub-line being compiled, for error carets.
    pub fn line(&self) -> String {
        self.lexer.text()
    }

    pub fn compile(&mut self, text: &str) -> Result<()> {
        self.lexer = Lexer::new(text, self.max_name);
        let start = self.link.len();
        let result = match self.statement() {
            Ok(Some((kw, col))) => Err(error!(UnmatchedBlock, ..&col;
                format!("'{}' WITHOUT OPENING STATEMENT", kw).to_ascii_uppercase())),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                debug!(target: "cmdlang::compile", nodes = self.link.len() - start, "compiled");
                Ok(())
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    fn rollback(&mut self) {
        for (name, id) in self.created.drain(..).rev() {
            trace!(target: "cmdlang::compile", name = %name, "withdraw");
            self.symbols.remove(&name);
            self.vars.remove(id);
        }
    }

    /// Compile one statement. A block terminator is returned to the block
    /// that is waiting for it instead.
    fn statement(&mut self) -> Result<Option<(Keyword, Column)>> {
        let token = self.lexer.next()?;
        let col = self.lexer.column();
        let name = match token {
            Token::End => return Ok(None),
            Token::Name(name) => name,
            t => return Err(error!(UnexpectedToken, ..&col; format!("'{}'", t))),
        };
        if let Some(kw) = Keyword::from_name(&name) {
            return self.keyword(kw, col);
        }
        if self.assignment_follows()? {
            self.assignment(&name, col)?;
        } else {
            self.command(&name, col)?;
        }
        self.expect_end()?;
        Ok(None)
    }

    fn keyword(&mut self, kw: Keyword, col: Column) -> Result<Option<(Keyword, Column)>> {
        match kw {
            Keyword::If => self.if_block(col)?,
            Keyword::While => self.while_block(col)?,
            Keyword::Repeat => self.repeat_block(col)?,
            Keyword::Do => self.do_block(col)?,
            Keyword::Break | Keyword::Continue => {
                let link = match self.loops.last() {
                    Some(link) => *link,
                    None => return Err(error!(NotInLoop, ..&col; format!("'{}'", kw).to_ascii_uppercase())),
                };
                let here = self.link.len();
                self.link.emit(Opcode::Via {
                    link: link as isize - here as isize,
                    exit: kw == Keyword::Break,
                })?;
                self.expect_end()?;
            }
            Keyword::Stop => {
                self.link.emit(Opcode::Abort)?;
                self.expect_end()?;
            }
            Keyword::Integer => self.declaration(Type::Integer)?,
            Keyword::Float => self.declaration(Type::Float)?,
            Keyword::String => self.declaration(Type::Text)?,
            Keyword::Logical => self.declaration(Type::Logical)?,
            Keyword::Then => return Err(error!(UnexpectedToken, ..&col; "'THEN'")),
            Keyword::Else => {
                if let Token::Name(name) = self.lexer.peek()? {
                    if Keyword::from_name(name) == Some(Keyword::If) {
                        self.lexer.next()?;
                        return Ok(Some((Keyword::ElseIf, col)));
                    }
                }
                return Ok(Some((kw, col)));
            }
            Keyword::End => {
                let which = match self.lexer.next()? {
                    Token::Name(name) => Keyword::from_name(&name).and_then(Keyword::terminator),
                    _ => None,
                };
                return match which {
                    Some(kw) => Ok(Some((kw, col))),
                    None => Err(error!(SyntaxError, ..&self.lexer.column(); "END OF WHAT")),
                };
            }
            Keyword::ElseIf | Keyword::EndIf | Keyword::EndWhile | Keyword::EndDo | Keyword::Until => {
                return Ok(Some((kw, col)))
            }
        }
        Ok(None)
    }

    pub(super) fn expect_end(&mut self) -> Result<()> {
        match self.lexer.next()? {
            Token::End => Ok(()),
            t => Err(error!(UnexpectedToken, ..&self.lexer.column(); format!("'{}'", t))),
        }
    }

    pub(super) fn expect(&mut self, want: Token) -> Result<()> {
        let token = self.lexer.next()?;
        if token == want {
            return Ok(());
        }
        let col = self.lexer.column();
        match want {
            Token::RParen | Token::RBracket | Token::RBrace => {
                Err(error!(UnmatchedBracket, ..&col; format!("EXPECTED '{}'", want)))
            }
            _ => Err(error!(SyntaxError, ..&col; format!("EXPECTED '{}' NOT '{}'", want, token))),
        }
    }

    fn name(&mut self) -> Result<(String, Column)> {
        match self.lexer.next()? {
            Token::Name(name) => Ok((name, self.lexer.column())),
            t => Err(error!(SyntaxError, ..&self.lexer.column(); format!("NAME EXPECTED, NOT '{}'", t))),
        }
    }

    /// Compile statements from following lines until one of `until`.
    fn block(&mut self, opener: Keyword, until: &[Keyword]) -> Result<Keyword> {
        loop {
            let symbols = &*self.symbols;
            let line = match self.source.next_line(&|word: &str| symbols.find(word).is_some())? {
                Some(line) => line,
                None => {
                    return Err(error!(UnmatchedBlock;
                        format!("END OF INPUT INSIDE '{}'", opener).to_ascii_uppercase()))
                }
            };
            trace!(target: "cmdlang::compile", origin = %line.origin, text = %line.text, "block line");
            self.lexer = Lexer::new(&line.text, self.max_name);
            if let Some((kw, col)) = self.statement()? {
                if until.contains(&kw) {
                    if !matches!(kw, Keyword::ElseIf | Keyword::Until) {
                        self.expect_end()?;
                    }
                    return Ok(kw);
                }
                return Err(error!(UnmatchedBlock, ..&col;
                    format!("'{}' INSIDE '{}'", kw, opener).to_ascii_uppercase()));
            }
        }
    }

    fn condition(&mut self) -> Result<()> {
        let col = self.lexer.peek_column()?;
        let (code, typed) = self.expression()?;
        if typed.ty != Type::Logical {
            return Err(error!(TypeMismatch, ..&col; "CONDITION MUST BE LOGICAL"));
        }
        self.link.extend(code)?;
        if let Token::Name(name) = self.lexer.peek()? {
            if Keyword::from_name(name) == Some(Keyword::Then) {
                self.lexer.next()?;
            }
        }
        Ok(())
    }

    fn if_block(&mut self, _col: Column) -> Result<()> {
        let mut ends = vec![];
        let mut skip = None;
        let mut kw = Keyword::If;
        loop {
            if let Some(addr) = skip.take() {
                self.link.patch_here(addr)?;
            }
            match kw {
                Keyword::If | Keyword::ElseIf => {
                    self.condition()?;
                    skip = Some(self.link.emit(Opcode::BranchIfFalse(0))?);
                    self.expect_end()?;
                    kw = self.block(Keyword::If, &[Keyword::ElseIf, Keyword::Else, Keyword::EndIf])?;
                    if kw != Keyword::EndIf {
                        ends.push(self.link.emit(Opcode::Branch(0))?);
                    }
                }
                Keyword::Else => {
                    kw = self.block(Keyword::Else, &[Keyword::EndIf])?;
                }
                _ => break,
            }
        }
        if let Some(addr) = skip {
            self.link.patch_here(addr)?;
        }
        for addr in ends {
            self.link.patch_here(addr)?;
        }
        Ok(())
    }

    fn while_block(&mut self, _col: Column) -> Result<()> {
        let link = self.link.emit(Opcode::Link { exit: 0, next: 1 })?;
        self.condition()?;
        let test = self.link.emit(Opcode::BranchIfFalse(0))?;
        self.expect_end()?;
        self.loops.push(link);
        let body = self.block(Keyword::While, &[Keyword::EndWhile]);
        self.loops.pop();
        body?;
        self.link.emit_branch_to(link + 1)?;
        self.link.patch_here(test)?;
        self.link.patch_here(link)
    }

    fn repeat_block(&mut self, _col: Column) -> Result<()> {
        self.expect_end()?;
        let link = self.link.emit(Opcode::Link { exit: 0, next: 1 })?;
        self.loops.push(link);
        let body = self.block(Keyword::Repeat, &[Keyword::Until]);
        self.loops.pop();
        body?;
        let test = self.link.len();
        self.link.patch_next(link, test)?;
        self.condition()?;
        self.expect_end()?;
        let back = self.link.emit(Opcode::BranchIfFalse(0))?;
        self.link.patch(back, link + 1)?;
        self.link.patch_here(link)
    }

    fn do_block(&mut self, _col: Column) -> Result<()> {
        let (name, col) = self.name()?;
        self.expect(Token::Assign)?;
        let mut bounds = vec![];
        loop {
            let ecol = self.lexer.peek_column()?;
            let (code, typed) = self.expression()?;
            if !typed.ty.is_numeric() {
                return Err(error!(TypeMismatch, ..&ecol; "LOOP BOUNDS MUST BE NUMERIC"));
            }
            bounds.push((code, typed.ty));
            if bounds.len() == 3 || self.lexer.peek()? != &Token::Comma {
                break;
            }
            self.lexer.next()?;
        }
        if bounds.len() < 2 {
            return Err(error!(SyntaxError, ..&self.lexer.peek_column()?; "EXPECTED ', END'"));
        }
        self.expect_end()?;
        let var = match self.symbols.get_exact(&name).copied() {
            Some(Entry::Variable(id)) => {
                let val = self.vars.val(id)?;
                if !val.ty().is_numeric() {
                    return Err(error!(TypeMismatch, ..&col; "LOOP VARIABLE MUST BE NUMERIC"));
                }
                if !val.owner().is_writable() {
                    return Err(error!(ReadOnly, ..&col; format!("'{}'", name)));
                }
                id
            }
            Some(_) => return Err(error!(ReadOnly, ..&col; format!("'{}' IS NOT A VARIABLE", name))),
            None => {
                let ty = if bounds.iter().all(|(_, ty)| *ty == Type::Integer) {
                    Type::Integer
                } else {
                    Type::Float
                };
                self.create(&name, Val::new(ty, Shape::SCALAR, Ownership::Declared))?
            }
        };
        let step = bounds.len() == 3;
        for (code, _) in bounds {
            self.link.extend(code)?;
        }
        let init = self.link.emit(Opcode::LoopInit { param: 0, step })?;
        let link = self.link.emit(Opcode::Link { exit: 0, next: 1 })?;
        let param = self.link.emit(Opcode::LoopParam {
            var,
            state: None,
            exit: 0,
        })?;
        self.link.patch(init, param)?;
        self.loops.push(link);
        let body = self.block(Keyword::Do, &[Keyword::EndDo]);
        self.loops.pop();
        body?;
        self.link.emit_branch_to(param)?;
        self.link.patch_here(param)?;
        self.link.patch_here(link)
    }

    /// `integer n, a(10), m(n, 2)`
    fn declaration(&mut self, ty: Type) -> Result<()> {
        loop {
            let (name, col) = self.name()?;
            let mut dims = vec![];
            if self.lexer.peek()? == &Token::LParen {
                self.lexer.next()?;
                loop {
                    dims.push(self.subscript()?);
                    match self.lexer.next()? {
                        Token::Comma => continue,
                        Token::RParen => break,
                        _ => return Err(error!(UnmatchedBracket, ..&self.lexer.column(); "EXPECTED ')'")),
                    }
                }
            }
            if dims.len() > MAX_RANK {
                return Err(error!(RankMismatch, ..&col; "AT MOST 3 DIMENSIONS"));
            }
            let var = self.declare(&name, ty, dims.len(), &col)?;
            self.link.emit(Opcode::Declare { var, dims: dims.len() })?;
            for code in dims {
                self.link.extend(code)?;
            }
            if self.lexer.peek()? != &Token::Comma {
                break;
            }
            self.lexer.next()?;
        }
        self.expect_end()
    }

    fn declare(&mut self, name: &str, ty: Type, rank: usize, col: &Column) -> Result<VarId> {
        match self.symbols.get_exact(name).copied() {
            Some(Entry::Variable(id)) => {
                let have = self.vars.val(id)?.ty();
                if have != ty {
                    return Err(error!(Redeclared, ..col; format!("'{}' IS {}", name, have)));
                }
                Ok(id)
            }
            Some(_) => Err(error!(Duplicate, ..col; format!("'{}' IS NOT A VARIABLE", name))),
            None => {
                let shape = Shape::new(&[0, 0, 0][..rank])?;
                self.create(name, Val::new(ty, shape, Ownership::Declared))
            }
        }
    }

    fn create(&mut self, name: &str, val: Val) -> Result<VarId> {
        let folded = fold(name);
        let id = self.vars.insert(folded.as_str().into(), val);
        if let Err(e) = self.symbols.insert(&folded, Entry::Variable(id), false) {
            self.vars.remove(id);
            return Err(e);
        }
        debug!(target: "cmdlang::compile", name = %folded, "create variable");
        self.created.push((folded, id));
        Ok(id)
    }

    /// Looks past a name and an optional parenthesized group for `=`.
    fn assignment_follows(&mut self) -> Result<bool> {
        let mark = self.lexer.mark();
        let mut found = false;
        let mut depth = 0usize;
        loop {
            match self.lexer.next() {
                Ok(Token::LParen) => depth += 1,
                Ok(Token::RParen) if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        found = self.lexer.peek().map_or(false, |t| t == &Token::Assign);
                        break;
                    }
                }
                Ok(Token::Assign) if depth == 0 => {
                    found = true;
                    break;
                }
                Ok(Token::End) | Err(_) => break,
                Ok(_) if depth == 0 => break,
                Ok(_) => {}
            }
        }
        self.lexer.reset(mark);
        Ok(found)
    }

    /// `v = e`, `v = e1, e2, ...` or `v(section) = e`
    fn assignment(&mut self, name: &str, col: Column) -> Result<()> {
        let target = match self.symbols.get_exact(name).copied() {
            Some(Entry::Variable(id)) => Some(id),
            Some(_) => return Err(error!(ReadOnly, ..&col; format!("'{}' IS NOT A VARIABLE", name))),
            None => None,
        };
        let mut section = None;
        if self.lexer.peek()? == &Token::LParen {
            if target.is_none() {
                return Err(error!(UndefinedName, ..&col; format!("'{}'", name)));
            }
            self.lexer.next()?;
            section = Some(self.subscripts()?);
        }
        self.expect(Token::Assign)?;
        let mut rhs = vec![];
        let mut ty: Option<Type> = None;
        loop {
            let ecol = self.lexer.peek_column()?;
            let (code, typed) = self.expression()?;
            ty = Some(match ty {
                None => typed.ty,
                Some(t) if t == typed.ty => t,
                Some(t) if t.is_numeric() && typed.ty.is_numeric() => Type::Float,
                Some(t) => {
                    return Err(error!(TypeMismatch, ..&ecol; format!("{} IN {} LIST", typed.ty, t)))
                }
            });
            rhs.push(code);
            if self.lexer.peek()? != &Token::Comma {
                break;
            }
            self.lexer.next()?;
        }
        let ty = ty.unwrap_or(Type::Integer);
        let var = match target {
            Some(id) => {
                let val = self.vars.val(id)?;
                if !val.owner().is_writable() {
                    return Err(error!(ReadOnly, ..&col; format!("'{}'", name)));
                }
                if val.ty() != ty && !(val.ty().is_numeric() && ty.is_numeric()) {
                    return Err(error!(TypeMismatch, ..&col; format!("{} = {}", val.ty(), ty)));
                }
                id
            }
            None => self.create(name, Val::new(ty, Shape::SCALAR, Ownership::Declared))?,
        };
        let (axes, subscripts) = match section {
            Some((axes, code)) => (Some(Rc::from(axes)), code),
            None => (None, vec![]),
        };
        self.link.emit(Opcode::Assign {
            var,
            axes,
            count: rhs.len(),
        })?;
        self.link.extend(subscripts)?;
        for code in rhs {
            self.link.extend(code)?;
        }
        Ok(())
    }

    /// `name arg, arg` or `name(arg, arg)`
    fn command(&mut self, name: &str, col: Column) -> Result<()> {
        let entry = *self.symbols.lookup(name).map_err(|e| e.in_column(&col))?.1;
        let id = match entry {
            Entry::Function { id, .. } => id,
            Entry::Variable(_) => return Err(error!(SyntaxError, ..&col; "EXPECTED '=' AFTER VARIABLE")),
            Entry::Module(_) => return Err(error!(SyntaxError, ..&col; "MODULE IS NOT A COMMAND")),
        };
        let functions = self.functions;
        let f = &functions[id];
        if f.kind == Kind::Elemental {
            return Err(error!(SyntaxError, ..&col; format!("'{}' IS NOT A COMMAND", f.name)));
        }
        let args = if self.lexer.peek()? == &Token::LParen {
            let mark = self.lexer.mark();
            self.lexer.next()?;
            match self.arguments(f, true, &col) {
                Ok(args) if self.lexer.at_end()? => args,
                _ => {
                    self.lexer.reset(mark);
                    self.arguments(f, false, &col)?
                }
            }
        } else {
            self.arguments(f, false, &col)?
        };
        self.link.emit(Opcode::Command { func: id, argc: args.len() })?;
        for code in args {
            self.link.extend(code)?;
        }
        Ok(())
    }

    fn arguments(&mut self, f: &Function, parens: bool, col: &Column) -> Result<Vec<Vec<Opcode>>> {
        let mut args = vec![];
        let empty = if parens {
            self.lexer.peek()? == &Token::RParen
        } else {
            self.lexer.at_end()?
        };
        if empty {
            if parens {
                self.lexer.next()?;
            }
        } else {
            loop {
                if args.len() >= f.max_args {
                    return Err(error!(WrongArgumentCount, ..&self.lexer.peek_column()?;
                        format!("{} TAKES AT MOST {}", f.name, f.max_args).to_ascii_uppercase()));
                }
                let decl = f.decl(args.len());
                let code = if decl.ty == ArgType::Literal && !parens {
                    self.literal_argument()?
                } else {
                    self.argument(decl)?.0
                };
                args.push(code);
                if self.lexer.peek()? != &Token::Comma {
                    break;
                }
                self.lexer.next()?;
            }
            if parens {
                self.expect(Token::RParen)?;
            }
        }
        if args.len() < f.min_args {
            return Err(error!(WrongArgumentCount, ..col;
                format!("{} NEEDS AT LEAST {}", f.name, f.min_args).to_ascii_uppercase()));
        }
        Ok(args)
    }

    fn literal_argument(&mut self) -> Result<Vec<Opcode>> {
        let text = match self.lexer.literal()? {
            Token::Literal(s) | Token::Text(s) => s,
            t => return Err(error!(SyntaxError, ..&self.lexer.column(); format!("TEXT EXPECTED, NOT '{}'", t))),
        };
        Ok(vec![
            Opcode::Expr(ExprInfo {
                len: 1,
                slots: 0,
                ty: Type::Text,
                access: Access::Value,
            }),
            Opcode::Constant(Scalar::Text(text)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use crate::mach::builtin;
    use std::collections::VecDeque;

    struct Lines(VecDeque<String>);

    impl LineSource for Lines {
        fn next_line(&mut self, _: &dyn Fn(&str) -> bool) -> Result<Option<SubLine>> {
            Ok(self.0.pop_front().map(|text| SubLine {
                text,
                origin: "test".into(),
            }))
        }
    }

    struct Fixture {
        symbols: SymbolTable<Entry>,
        vars: Vars,
        functions: Vec<Function>,
        link: Link,
    }

    impl Fixture {
        fn new() -> Fixture {
            let mut symbols = SymbolTable::new(32).with_resolver(crate::mach::var::prefer);
            let mut vars = Vars::new();
            let module = builtin::core();
            let mut functions = vec![];
            for f in module.functions {
                symbols
                    .insert(f.name, Entry::Function { id: functions.len(), preferred: f.preferred }, false)
                    .unwrap();
                functions.push(f);
            }
            for (name, val) in module.variables {
                let id = vars.insert(name.into(), val);
                symbols.insert(name, Entry::Variable(id), false).unwrap();
            }
            Fixture {
                symbols,
                vars,
                functions,
                link: Link::new(1024),
            }
        }

        fn compile(&mut self, lines: &[&str]) -> Result<()> {
            self.link.clear();
            let mut source = Lines(lines[1..].iter().map(|s| s.to_string()).collect());
            let mut compiler = Compiler::new(
                &mut self.symbols,
                &mut self.vars,
                &self.functions,
                &mut self.link,
                &mut source,
                32,
            );
            compiler.compile(lines[0])
        }
    }

    #[test]
    fn test_while_layout() {
        let mut fx = Fixture::new();
        fx.compile(&["while (1 < 2)", "print 1", "end while"]).unwrap();
        assert_eq!(fx.link.get(0), Some(&Opcode::Link { exit: 10, next: 1 }));
        assert_eq!(fx.link.get(5), Some(&Opcode::BranchIfFalse(5)));
        assert_eq!(fx.link.get(9), Some(&Opcode::Branch(-8)));
        fx.link.verify().unwrap();
    }

    #[test]
    fn test_do_creates_integer_variable() {
        let mut fx = Fixture::new();
        fx.compile(&["do i = 1, 3", "end do"]).unwrap();
        fx.link.verify().unwrap();
        let id = match fx.symbols.get_exact("i") {
            Some(Entry::Variable(id)) => *id,
            other => panic!("{:?}", other),
        };
        assert_eq!(fx.vars.val(id).unwrap().ty(), Type::Integer);
    }

    #[test]
    fn test_failed_statement_withdraws_names() {
        let mut fx = Fixture::new();
        let e = fx.compile(&["do k = 1, 3", "x = 1"]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::UnmatchedBlock);
        assert!(fx.symbols.get_exact("k").is_none());
        assert!(fx.symbols.get_exact("x").is_none());
    }

    #[test]
    fn test_block_errors() {
        let mut fx = Fixture::new();
        assert_eq!(fx.compile(&["break"]).unwrap_err().code(), ErrorCode::NotInLoop);
        assert_eq!(fx.compile(&["end while"]).unwrap_err().code(), ErrorCode::UnmatchedBlock);
        let e = fx.compile(&["if (true)", "end while"]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::UnmatchedBlock);
        let e = fx.compile(&["if (3)", "end if"]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_declarations() {
        let mut fx = Fixture::new();
        fx.compile(&["float a(10), b"]).unwrap();
        assert_eq!(fx.compile(&["integer a"]).unwrap_err().code(), ErrorCode::Redeclared);
        assert_eq!(fx.compile(&["float print"]).unwrap_err().code(), ErrorCode::Duplicate);
        assert_eq!(fx.compile(&["float c(1,2,3,4)"]).unwrap_err().code(), ErrorCode::RankMismatch);
        fx.compile(&["float a(20)"]).unwrap();
    }

    #[test]
    fn test_assignment_checks() {
        let mut fx = Fixture::new();
        assert_eq!(fx.compile(&["pi = 3"]).unwrap_err().code(), ErrorCode::ReadOnly);
        fx.compile(&["s = 'text'"]).unwrap();
        assert_eq!(fx.compile(&["s = 1"]).unwrap_err().code(), ErrorCode::TypeMismatch);
        assert_eq!(fx.compile(&["q(1) = 1"]).unwrap_err().code(), ErrorCode::UndefinedName);
        fx.compile(&["x = 1, 2.5"]).unwrap();
        let id = match fx.symbols.get_exact("x") {
            Some(Entry::Variable(id)) => *id,
            other => panic!("{:?}", other),
        };
        assert_eq!(fx.vars.val(id).unwrap().ty(), Type::Float);
    }

    #[test]
    fn test_command_forms() {
        let mut fx = Fixture::new();
        fx.compile(&["print 1, 2"]).unwrap();
        assert_eq!(fx.link.get(0), Some(&Opcode::Command { func: 0, argc: 2 }));
        fx.compile(&["print(1, 2)"]).unwrap();
        assert_eq!(fx.link.get(0), Some(&Opcode::Command { func: 0, argc: 2 }));
        fx.compile(&["print (1 + 2) * 3"]).unwrap();
        assert_eq!(fx.link.get(0), Some(&Opcode::Command { func: 0, argc: 1 }));
        let e = fx.compile(&["swap pi"]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::WrongArgumentCount);
        let e = fx.compile(&["swap 1, pi"]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::ModeMismatch);
        let e = fx.compile(&["sqrt 2"]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::SyntaxError);
    }
}
