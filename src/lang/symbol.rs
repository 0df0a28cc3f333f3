use super::Error;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Picks one entry out of an ambiguous window, by index into the window.
pub type Resolver<T> = fn(&str, &[(&str, &T)]) -> Option<usize>;

/// Outcome of a minimum-match query against the sorted names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    NotFound,
    BadCharacters,
    Exact(usize),
    Ambiguous(std::ops::Range<usize>),
}

/// ## Sorted minimum-match name table
///
/// Names are folded to lower case and kept sorted in `[0-9_a-z]` collation.
/// A query matches every entry it is a prefix of; it resolves when exactly
/// one entry matches or when one of the matches is spelled exactly like the
/// query. The same table backs the global name space and the smaller
/// private tables (macros).
pub struct SymbolTable<T> {
    entries: Vec<(Rc<str>, T)>,
    resolver: Option<Resolver<T>>,
    max_len: usize,
}

impl<T: std::fmt::Debug> std::fmt::Debug for SymbolTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        SymbolTable::new(32)
    }
}

pub fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn is_symbol_char(ch: char) -> bool {
    ch.is_ascii_digit() || ch.is_ascii_lowercase() || ch == '_'
}

impl<T> SymbolTable<T> {
    pub fn new(max_len: usize) -> SymbolTable<T> {
        SymbolTable {
            entries: vec![],
            resolver: None,
            max_len,
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver<T>) -> SymbolTable<T> {
        self.resolver = Some(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_name(&self, name: &str) -> Result<String> {
        let folded = fold(name);
        if folded.is_empty() || !folded.chars().all(is_symbol_char) {
            return Err(error!(IllegalCharacter; format!("IN NAME '{}'", name)));
        }
        if folded.chars().count() > self.max_len {
            return Err(error!(NameTooLong; format!("'{}'", name)));
        }
        Ok(folded)
    }

    /// Insert keeping the table sorted. An exact duplicate is rejected
    /// unless `replace` is set, in which case the old payload is returned.
    pub fn insert(&mut self, name: &str, payload: T, replace: bool) -> Result<Option<T>> {
        let folded = self.check_name(name)?;
        match self
            .entries
            .binary_search_by(|(k, _)| k.as_ref().cmp(folded.as_str()))
        {
            Ok(index) => {
                if !replace {
                    return Err(error!(Duplicate; format!("'{}'", folded)));
                }
                Ok(Some(std::mem::replace(&mut self.entries[index].1, payload)))
            }
            Err(index) => {
                self.entries.insert(index, (folded.into(), payload));
                Ok(None)
            }
        }
    }

    /// Classify a query without resolving ambiguity.
    pub fn classify(&self, name: &str) -> Match {
        let query = fold(name);
        if query.is_empty() || !query.chars().all(is_symbol_char) {
            return Match::BadCharacters;
        }
        let first = self
            .entries
            .partition_point(|(k, _)| k.as_ref() < query.as_str());
        let last = first
            + self.entries[first..]
                .iter()
                .take_while(|(k, _)| k.starts_with(query.as_str()))
                .count();
        if first == last {
            Match::NotFound
        } else if last - first == 1 || self.entries[first].0.as_ref() == query {
            Match::Exact(first)
        } else {
            Match::Ambiguous(first..last)
        }
    }

    fn resolve(&self, name: &str) -> Result<usize> {
        match self.classify(name) {
            Match::Exact(index) => Ok(index),
            Match::NotFound => Err(error!(UndefinedName; format!("'{}'", name))),
            Match::BadCharacters => Err(error!(IllegalCharacter; format!("IN NAME '{}'", name))),
            Match::Ambiguous(range) => {
                let window: Vec<(&str, &T)> = self.entries[range.clone()]
                    .iter()
                    .map(|(k, v)| (k.as_ref(), v))
                    .collect();
                if let Some(resolver) = self.resolver {
                    if let Some(pick) = resolver(name, &window) {
                        if pick < window.len() {
                            return Ok(range.start + pick);
                        }
                    }
                }
                let names: Vec<&str> = window.iter().map(|(k, _)| *k).collect();
                Err(error!(AmbiguousName;
                    format!("'{}' COULD BE {}", name, names.join(", "))))
            }
        }
    }

    /// Minimum-match lookup that reports why a query failed.
    pub fn lookup(&self, name: &str) -> Result<(&str, &T)> {
        let index = self.resolve(name)?;
        let (k, v) = &self.entries[index];
        Ok((k.as_ref(), v))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Result<(Rc<str>, &mut T)> {
        let index = self.resolve(name)?;
        let (k, v) = &mut self.entries[index];
        Ok((k.clone(), v))
    }

    /// Minimum-match lookup without error reporting.
    pub fn find(&self, name: &str) -> Option<(&str, &T)> {
        self.lookup(name).ok()
    }

    pub fn get_exact(&self, name: &str) -> Option<&T> {
        let query = fold(name);
        self.entries
            .binary_search_by(|(k, _)| k.as_ref().cmp(query.as_str()))
            .ok()
            .map(|index| &self.entries[index].1)
    }

    /// Remove by exact name.
    pub fn remove(&mut self, name: &str) -> Option<T> {
        let query = fold(name);
        match self
            .entries
            .binary_search_by(|(k, _)| k.as_ref().cmp(query.as_str()))
        {
            Ok(index) => Some(self.entries.remove(index).1),
            Err(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Entries whose names begin with `prefix`, in collation order.
    pub fn with_prefix<'a>(&'a self, prefix: &str) -> impl Iterator<Item = (&'a str, &'a T)> {
        let query = fold(prefix);
        let first = self
            .entries
            .partition_point(|(k, _)| k.as_ref() < query.as_str());
        self.entries[first..]
            .iter()
            .take_while(move |(k, _)| k.starts_with(query.as_str()))
            .map(|(k, v)| (k.as_ref(), v))
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    fn table() -> SymbolTable<u32> {
        let mut t = SymbolTable::new(16);
        for (i, name) in ["print", "printer", "plot", "pi", "x_1", "x2", "sqrt"]
            .iter()
            .enumerate()
        {
            t.insert(name, i as u32, false).unwrap();
        }
        t
    }

    #[test]
    fn test_sorted_after_insert() {
        let t = table();
        let names: Vec<&str> = t.iter().map(|(k, _)| k).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names, ["pi", "plot", "print", "printer", "sqrt", "x2", "x_1"]);
    }

    #[test]
    fn test_unique_prefix_any_case() {
        let t = table();
        assert_eq!(t.lookup("SQ").unwrap(), ("sqrt", &6));
        assert_eq!(t.lookup("Pl").unwrap(), ("plot", &2));
        assert_eq!(t.lookup("x_").unwrap(), ("x_1", &4));
    }

    #[test]
    fn test_exact_beats_longer() {
        let t = table();
        assert_eq!(t.lookup("print").unwrap().0, "print");
        assert_eq!(t.lookup("pi").unwrap().0, "pi");
    }

    #[test]
    fn test_ambiguous_and_missing() {
        let t = table();
        assert_eq!(t.classify("pri"), Match::Ambiguous(2..4));
        assert_eq!(t.lookup("p").unwrap_err().code(), ErrorCode::AmbiguousName);
        assert_eq!(t.lookup("zebra").unwrap_err().code(), ErrorCode::UndefinedName);
        assert_eq!(t.classify("a-b"), Match::BadCharacters);
        assert_eq!(t.find("q"), None);
    }

    #[test]
    fn test_resolver_breaks_tie() {
        fn shortest(_: &str, window: &[(&str, &u32)]) -> Option<usize> {
            (0..window.len()).min_by_key(|i| window[*i].0.len())
        }
        let t = table().with_resolver(shortest);
        assert_eq!(t.lookup("pri").unwrap().0, "print");
        assert_eq!(t.lookup("p").unwrap().0, "pi");
    }

    #[test]
    fn test_duplicates_and_replace() {
        let mut t = table();
        assert_eq!(
            t.insert("PLOT", 9, false).unwrap_err().code(),
            ErrorCode::Duplicate
        );
        assert_eq!(t.insert("PLOT", 9, true).unwrap(), Some(2));
        assert_eq!(t.get_exact("plot"), Some(&9));
        assert_eq!(t.remove("plot"), Some(9));
        assert_eq!(t.remove("plot"), None);
        assert_eq!(
            t.insert("abcdefghijklmnopq", 1, false).unwrap_err().code(),
            ErrorCode::NameTooLong
        );
    }

    #[test]
    fn test_with_prefix() {
        let t = table();
        let names: Vec<&str> = t.with_prefix("pr").map(|(k, _)| k).collect();
        assert_eq!(names, ["print", "printer"]);
    }
}
