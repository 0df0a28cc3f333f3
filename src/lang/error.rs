use super::Column;
use std::borrow::Cow;

#[derive(Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    column: Column,
    message: Cow<'static, str>,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident, ..$col:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).in_column($col)
    };
    ($err:ident; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message($msg)
    };
    ($err:ident, ..$col:expr; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_column($col)
            .message($msg)
    };
}

/// Which phase of statement processing raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Lexical,
    Syntactic,
    Semantic,
    Runtime,
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code,
            column: 0..0,
            message: Cow::Borrowed(""),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn category(&self) -> Category {
        self.code.category()
    }

    /// Attach a column unless one is already known. Errors raised deep in
    /// the compiler keep the most precise location.
    pub fn in_column(self, column: &Column) -> Error {
        if self.has_column() {
            return self;
        }
        Error {
            column: column.clone(),
            ..self
        }
    }

    pub fn message<S: Into<Cow<'static, str>>>(self, message: S) -> Error {
        Error {
            message: message.into(),
            ..self
        }
    }

    /// `0..0` is the unset column; every located error has another range.
    pub fn has_column(&self) -> bool {
        self.column != (0..0)
    }

    /// Render the offending source line with a caret run under the column,
    /// or `None` when there is no line or no column to point at.
    pub fn caret(&self, line: &str) -> Option<String> {
        if !self.has_column() || line.is_empty() {
            return None;
        }
        let width = line.chars().count();
        let start = self.column.start.min(width);
        let end = self.column.end.max(start + 1);
        let mut s = String::with_capacity(line.len() * 2 + 2);
        s.push_str(line);
        s.push('\n');
        s.extend(std::iter::repeat(' ').take(start));
        s.extend(std::iter::repeat('^').take(end - start));
        Some(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    IllegalCharacter = 1,
    NameTooLong = 2,
    UnterminatedString = 3,
    BadNumber = 4,

    SyntaxError = 10,
    UnexpectedToken = 11,
    UnmatchedBracket = 12,
    UnmatchedBlock = 13,
    WrongArgumentCount = 14,
    NotInLoop = 15,

    TypeMismatch = 20,
    RankMismatch = 21,
    ModeMismatch = 22,
    Redeclared = 23,
    SubscriptOutOfRange = 24,
    DivisionByZero = 25,
    DomainError = 26,
    Overflow = 27,
    ReadOnly = 28,
    UndefinedName = 29,
    AmbiguousName = 30,
    ShapeMismatch = 31,
    Duplicate = 32,

    FunctionFailed = 40,
    OutOfMemory = 41,
    Interrupted = 42,
    StackOverflow = 43,
    InputNesting = 44,
    FileNotFound = 45,
    IoError = 46,
    DeletedVariable = 47,
    InternalError = 51,
}

impl ErrorCode {
    pub fn category(self) -> Category {
        match self as u16 {
            0..=9 => Category::Lexical,
            10..=19 => Category::Syntactic,
            20..=39 => Category::Semantic,
            _ => Category::Runtime,
        }
    }

    fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            IllegalCharacter => "ILLEGAL CHARACTER",
            NameTooLong => "NAME TOO LONG",
            UnterminatedString => "UNTERMINATED STRING",
            BadNumber => "BAD NUMBER",
            SyntaxError => "SYNTAX ERROR",
            UnexpectedToken => "UNEXPECTED TOKEN",
            UnmatchedBracket => "UNMATCHED BRACKET",
            UnmatchedBlock => "UNMATCHED BLOCK",
            WrongArgumentCount => "WRONG NUMBER OF ARGUMENTS",
            NotInLoop => "NOT INSIDE A LOOP",
            TypeMismatch => "TYPE MISMATCH",
            RankMismatch => "RANK MISMATCH",
            ModeMismatch => "PASSING MODE MISMATCH",
            Redeclared => "REDECLARED VARIABLE",
            SubscriptOutOfRange => "SUBSCRIPT OUT OF RANGE",
            DivisionByZero => "DIVISION BY ZERO",
            DomainError => "ARGUMENT OUT OF RANGE",
            Overflow => "OVERFLOW",
            ReadOnly => "READ ONLY",
            UndefinedName => "UNDEFINED NAME",
            AmbiguousName => "AMBIGUOUS NAME",
            ShapeMismatch => "ARRAY SHAPES DO NOT CONFORM",
            Duplicate => "DUPLICATE NAME",
            FunctionFailed => "FUNCTION FAILED",
            OutOfMemory => "OUT OF MEMORY",
            Interrupted => "INTERRUPTED",
            StackOverflow => "STACK OVERFLOW",
            InputNesting => "INPUT NESTED TOO DEEPLY",
            FileNotFound => "FILE NOT FOUND",
            IoError => "I/O ERROR",
            DeletedVariable => "VARIABLE WAS DELETED",
            InternalError => "INTERNAL ERROR",
        }
    }
}

impl std::error::Error for Error {}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code.as_str())?;
        if !self.message.is_empty() {
            write!(f, "; {}", self.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_category() {
        let e = error!(TypeMismatch, ..&(4..7); "TEXT AND FLOAT");
        assert_eq!(e.to_string(), "TYPE MISMATCH; TEXT AND FLOAT");
        assert_eq!(e.category(), Category::Semantic);
        assert_eq!(error!(NameTooLong).category(), Category::Lexical);
        assert_eq!(error!(UnmatchedBlock).category(), Category::Syntactic);
        assert_eq!(error!(Interrupted).category(), Category::Runtime);
    }

    #[test]
    fn test_first_column_wins() {
        let e = error!(SyntaxError, ..&(2..3)).in_column(&(0..9));
        assert_eq!(e.column(), &(2..3));
    }

    #[test]
    fn test_caret() {
        let e = error!(SyntaxError, ..&(4..7));
        assert_eq!(e.caret("x = foo +").as_deref(), Some("x = foo +\n    ^^^"));
        assert_eq!(e.caret(""), None);
        assert_eq!(error!(SyntaxError).caret("x = foo +"), None);
    }

    #[test]
    fn test_caret_at_first_column() {
        let e = error!(UndefinedName, ..&(0..4); "PRNT");
        assert!(e.has_column());
        assert_eq!(e.caret("prnt 1").as_deref(), Some("prnt 1\n^^^^"));
    }
}
