#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Name(String),
    Integer(i64),
    Float(f64),
    Text(String),
    Literal(String),
    Placeholder,
    Operator(Operator),
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    End,
}

impl Token {
    pub fn is_end(&self) -> bool {
        matches!(self, Token::End)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Token::*;
        match self {
            Name(s) => write!(f, "{}", s),
            Integer(n) => write!(f, "{}", n),
            Float(n) => write!(f, "{:?}", n),
            Text(s) => write!(f, "\"{}\"", s),
            Literal(s) => write!(f, "{}", s),
            Placeholder => write!(f, "@"),
            Operator(op) => write!(f, "{}", op),
            Assign => write!(f, "="),
            LParen => write!(f, "("),
            RParen => write!(f, ")"),
            LBracket => write!(f, "["),
            RBracket => write!(f, "]"),
            LBrace => write!(f, "{{"),
            RBrace => write!(f, "}}"),
            Comma => write!(f, ","),
            Colon => write!(f, ":"),
            End => write!(f, "end of statement"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Caret,
    Not,
    Concat,
}

/// Operator spellings, two-character forms first so the lexer takes the
/// longest match.
pub const OPERATORS: &[(&str, Operator)] = &[
    ("||", Operator::Or),
    ("&&", Operator::And),
    ("==", Operator::Equal),
    ("!=", Operator::NotEqual),
    ("<=", Operator::LessEqual),
    (">=", Operator::GreaterEqual),
    ("//", Operator::Concat),
    ("**", Operator::Caret),
    ("<", Operator::Less),
    (">", Operator::Greater),
    ("+", Operator::Plus),
    ("-", Operator::Minus),
    ("*", Operator::Multiply),
    ("/", Operator::Divide),
    ("^", Operator::Caret),
    ("!", Operator::Not),
];

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Operator::*;
        let s = match self {
            Or => "||",
            And => "&&",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            Plus => "+",
            Minus => "-",
            Multiply => "*",
            Divide => "/",
            Caret => "^",
            Not => "!",
            Concat => "//",
        };
        write!(f, "{}", s)
    }
}

/// Statement keywords. These are matched exactly, never by minimum match,
/// so they cannot be shadowed by a variable or function name.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Keyword {
    If,
    Then,
    Else,
    ElseIf,
    End,
    EndIf,
    While,
    EndWhile,
    Repeat,
    Until,
    Do,
    EndDo,
    Break,
    Continue,
    Stop,
    Integer,
    Float,
    String,
    Logical,
}

impl Keyword {
    pub fn from_name(name: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match name.to_ascii_lowercase().as_str() {
            "if" => If,
            "then" => Then,
            "else" => Else,
            "elseif" | "else_if" => ElseIf,
            "end" => End,
            "endif" | "end_if" => EndIf,
            "while" => While,
            "endwhile" | "end_while" => EndWhile,
            "repeat" => Repeat,
            "until" => Until,
            "do" => Do,
            "enddo" | "end_do" => EndDo,
            "break" => Break,
            "continue" => Continue,
            "stop" => Stop,
            "integer" => Integer,
            "float" => Float,
            "string" => String,
            "logical" => Logical,
            _ => return None,
        })
    }

    /// The joined terminator for `end <keyword>`.
    pub fn terminator(self) -> Option<Keyword> {
        use Keyword::*;
        match self {
            If => Some(EndIf),
            While => Some(EndWhile),
            Do => Some(EndDo),
            _ => None,
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Keyword::*;
        let s = match self {
            If => "if",
            Then => "then",
            Else => "else",
            ElseIf => "else if",
            End => "end",
            EndIf => "end if",
            While => "while",
            EndWhile => "end while",
            Repeat => "repeat",
            Until => "until",
            Do => "do",
            EndDo => "end do",
            Break => "break",
            Continue => "continue",
            Stop => "stop",
            Integer => "integer",
            Float => "float",
            String => "string",
            Logical => "logical",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_spellings() {
        assert_eq!(Keyword::from_name("END_IF"), Some(Keyword::EndIf));
        assert_eq!(Keyword::from_name("EndDo"), Some(Keyword::EndDo));
        assert_eq!(Keyword::from_name("whilst"), None);
        assert_eq!(Keyword::While.terminator(), Some(Keyword::EndWhile));
    }

    #[test]
    fn test_two_char_operators_first() {
        let first_single = OPERATORS.iter().position(|(s, _)| s.len() == 1).unwrap();
        assert!(OPERATORS[first_single..].iter().all(|(s, _)| s.len() == 1));
    }
}
