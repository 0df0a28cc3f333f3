use super::token::{Token, OPERATORS};
use super::{Column, Error};

type Result<T> = std::result::Result<T, Error>;

fn is_lang_whitespace(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// ## Token stream over one pre-processed sub-line
///
/// Columns are character offsets into the sub-line so errors can put a
/// caret under the token that caused them.
#[derive(Debug, Clone)]
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    max_name: usize,
    col: Column,
    peeked: Option<(Column, Token)>,
}

/// A saved lexer position for one token of backtracking.
#[derive(Debug, Clone)]
pub struct Mark {
    pos: usize,
    col: Column,
    peeked: Option<(Column, Token)>,
}

impl Lexer {
    pub fn new(text: &str, max_name: usize) -> Lexer {
        Lexer {
            chars: text.chars().collect(),
            pos: 0,
            max_name,
            col: 0..0,
            peeked: None,
        }
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Column of the most recently consumed token.
    pub fn column(&self) -> Column {
        self.col.clone()
    }

    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            col: self.col.clone(),
            peeked: self.peeked.clone(),
        }
    }

    pub fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.col = mark.col;
        self.peeked = mark.peeked;
    }

    pub fn next(&mut self) -> Result<Token> {
        if let Some((col, token)) = self.peeked.take() {
            self.col = col;
            return Ok(token);
        }
        let (col, token) = self.scan()?;
        self.col = col;
        Ok(token)
    }

    pub fn peek(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            let scanned = self.scan()?;
            self.peeked = Some(scanned);
        }
        match &self.peeked {
            Some((_, token)) => Ok(token),
            None => Err(error!(InternalError; "PEEK")),
        }
    }

    /// Column the peeked token will have once consumed.
    pub fn peek_column(&mut self) -> Result<Column> {
        self.peek()?;
        match &self.peeked {
            Some((col, _)) => Ok(col.clone()),
            None => Ok(self.pos..self.pos),
        }
    }

    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_end())
    }

    /// Unconsumed text, for argument strings handed to a macro.
    pub fn rest(&mut self) -> String {
        let start = match &self.peeked {
            Some((col, _)) => col.start,
            None => self.pos,
        };
        self.chars[start.min(self.chars.len())..]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Read an unquoted literal up to the next comma, or a quoted string.
    /// Used for arguments declared as literal text.
    pub fn literal(&mut self) -> Result<Token> {
        if let Some((col, _)) = self.peeked.take() {
            self.pos = col.start;
        }
        self.skip_whitespace();
        let start = self.pos;
        match self.chars.get(self.pos) {
            Some('"') | Some('\'') => return self.next(),
            None => {
                self.col = start..start;
                return Ok(Token::End);
            }
            _ => {}
        }
        let mut s = String::new();
        while let Some(&ch) = self.chars.get(self.pos) {
            if ch == ',' {
                break;
            }
            self.pos += 1;
            if ch == '\\' {
                if let Some(&esc) = self.chars.get(self.pos) {
                    self.pos += 1;
                    s.push(unescape(esc));
                    continue;
                }
            }
            s.push(ch);
        }
        let trimmed = s.trim_end().to_string();
        self.col = start..start + trimmed.chars().count();
        Ok(Token::Literal(trimmed))
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.get(self.pos) {
            if !is_lang_whitespace(ch) {
                break;
            }
            self.pos += 1;
        }
    }

    fn scan(&mut self) -> Result<(Column, Token)> {
        self.skip_whitespace();
        let start = self.pos;
        let ch = match self.chars.get(self.pos) {
            Some(ch) => *ch,
            None => return Ok((start..start, Token::End)),
        };
        let token = if ch.is_ascii_digit()
            || (ch == '.' && matches!(self.chars.get(self.pos + 1), Some(c) if c.is_ascii_digit()))
        {
            self.number()?
        } else if is_name_start(ch) {
            self.name()?
        } else if ch == '"' || ch == '\'' {
            self.string()?
        } else {
            self.minutia()?
        };
        Ok((start..self.pos, token))
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut s = String::new();
        let mut float = false;
        while let Some(&ch) = self.chars.get(self.pos) {
            if ch.is_ascii_digit() {
                s.push(ch);
            } else if ch == '.' && !float {
                float = true;
                s.push(ch);
            } else {
                break;
            }
            self.pos += 1;
        }
        if let Some(&ch) = self.chars.get(self.pos) {
            if matches!(ch, 'e' | 'E' | 'd' | 'D') {
                let mut look = self.pos + 1;
                if matches!(self.chars.get(look), Some('+') | Some('-')) {
                    look += 1;
                }
                if matches!(self.chars.get(look), Some(c) if c.is_ascii_digit()) {
                    float = true;
                    s.push('e');
                    s.extend(self.chars[self.pos + 1..look].iter());
                    self.pos = look;
                    while let Some(&ch) = self.chars.get(self.pos) {
                        if !ch.is_ascii_digit() {
                            break;
                        }
                        s.push(ch);
                        self.pos += 1;
                    }
                }
            }
        }
        let col = start..self.pos;
        if float {
            match s.parse::<f64>() {
                Ok(n) => Ok(Token::Float(n)),
                Err(_) => Err(error!(BadNumber, ..&col)),
            }
        } else {
            match s.parse::<i64>() {
                Ok(n) => Ok(Token::Integer(n)),
                Err(_) => Err(error!(Overflow, ..&col; "INTEGER LITERAL TOO LARGE")),
            }
        }
    }

    fn name(&mut self) -> Result<Token> {
        let start = self.pos;
        while let Some(&ch) = self.chars.get(self.pos) {
            if !is_name_char(ch) {
                break;
            }
            self.pos += 1;
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        if s.chars().count() > self.max_name {
            return Err(error!(NameTooLong, ..&(start..self.pos)));
        }
        Ok(Token::Name(s))
    }

    fn string(&mut self) -> Result<Token> {
        let start = self.pos;
        let quote = self.chars[self.pos];
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.chars.get(self.pos) {
                None => {
                    return Err(error!(UnterminatedString, ..&(start..self.pos)));
                }
                Some(&ch) if ch == quote => {
                    self.pos += 1;
                    return Ok(Token::Text(s));
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.chars.get(self.pos) {
                        Some(&esc) => s.push(unescape(esc)),
                        None => {
                            return Err(error!(UnterminatedString, ..&(start..self.pos)));
                        }
                    }
                    self.pos += 1;
                }
                Some(&ch) => {
                    s.push(ch);
                    self.pos += 1;
                }
            }
        }
    }

    fn minutia(&mut self) -> Result<Token> {
        let rest = &self.chars[self.pos..];
        for (spelling, op) in OPERATORS {
            let len = spelling.chars().count();
            if rest.len() >= len && rest[..len].iter().copied().eq(spelling.chars()) {
                self.pos += len;
                return Ok(Token::Operator(*op));
            }
        }
        let ch = rest[0];
        self.pos += 1;
        Ok(match ch {
            '=' => Token::Assign,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '@' => Token::Placeholder,
            _ => {
                let col = self.pos - 1..self.pos;
                return Err(error!(IllegalCharacter, ..&col; format!("'{}'", ch)));
            }
        })
    }
}

fn unescape(ch: char) -> char {
    match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

/// Tokenize a whole sub-line; used by tests and diagnostics.
pub fn lex(s: &str, max_name: usize) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(s, max_name);
    let mut v = vec![];
    loop {
        let t = lexer.next()?;
        if t.is_end() {
            return Ok(v);
        }
        v.push(t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::token::Operator;
    use crate::lang::ErrorCode;

    #[test]
    fn test_statement_tokens() {
        assert_eq!(
            lex("x(2:5) = a1 // 'b\\'c'", 32).unwrap(),
            vec![
                Token::Name("x".into()),
                Token::LParen,
                Token::Integer(2),
                Token::Colon,
                Token::Integer(5),
                Token::RParen,
                Token::Assign,
                Token::Name("a1".into()),
                Token::Operator(Operator::Concat),
                Token::Text("b'c".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex("1 2.5 .5 1e3 2d-1 7.", 32).unwrap(),
            vec![
                Token::Integer(1),
                Token::Float(2.5),
                Token::Float(0.5),
                Token::Float(1000.0),
                Token::Float(0.2),
                Token::Float(7.0),
            ]
        );
        assert_eq!(
            lex("99999999999999999999", 32).unwrap_err().code(),
            ErrorCode::Overflow
        );
    }

    #[test]
    fn test_longest_operator_match() {
        assert_eq!(
            lex("a<=b==c!=!d@", 32).unwrap(),
            vec![
                Token::Name("a".into()),
                Token::Operator(Operator::LessEqual),
                Token::Name("b".into()),
                Token::Operator(Operator::Equal),
                Token::Name("c".into()),
                Token::Operator(Operator::NotEqual),
                Token::Operator(Operator::Not),
                Token::Name("d".into()),
                Token::Placeholder,
            ]
        );
    }

    #[test]
    fn test_lexical_errors() {
        assert_eq!(
            lex("\"open", 32).unwrap_err().code(),
            ErrorCode::UnterminatedString
        );
        let e = lex("a ` b", 32).unwrap_err();
        assert_eq!(e.code(), ErrorCode::IllegalCharacter);
        assert_eq!(e.column(), &(2..3));
        assert_eq!(
            lex("abcdefgh", 4).unwrap_err().code(),
            ErrorCode::NameTooLong
        );
    }

    #[test]
    fn test_literal_and_rest() {
        let mut lexer = Lexer::new("load my\\,file.dat , 3", 32);
        assert_eq!(lexer.next().unwrap(), Token::Name("load".into()));
        assert_eq!(lexer.peek().unwrap(), &Token::Name("my".into()));
        assert_eq!(lexer.rest(), "my\\,file.dat , 3");
        assert_eq!(lexer.literal().unwrap(), Token::Literal("my,file.dat".into()));
        assert_eq!(lexer.next().unwrap(), Token::Comma);
        assert_eq!(lexer.next().unwrap(), Token::Integer(3));
        assert!(lexer.at_end().unwrap());
    }

    #[test]
    fn test_mark_and_reset() {
        let mut lexer = Lexer::new("a = 1", 32);
        let mark = lexer.mark();
        lexer.next().unwrap();
        assert_eq!(lexer.next().unwrap(), Token::Assign);
        lexer.reset(mark);
        assert_eq!(lexer.next().unwrap(), Token::Name("a".into()));
        assert_eq!(lexer.column(), 0..1);
    }
}
