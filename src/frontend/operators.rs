use std::collections::{HashMap, HashSet};

use super::ast::ProtoKind;
use super::lexer::Token;

/// Precedence of the assignment operator `=`; lower than every built-in.
pub const ASSIGN_PRECEDENCE: u32 = 2;

/// Default precedence of a user binary operator declared without one.
pub const DEFAULT_USER_PRECEDENCE: u32 = 30;

const BUILTIN_BINARY: [(char, u32); 6] = [
    ('=', ASSIGN_PRECEDENCE),
    ('<', 10),
    ('+', 20),
    ('-', 20),
    ('*', 40),
    ('/', 40),
];

/// What a symbol meant before a user definition replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorEntry {
    Binary { op: char, previous: Option<u32> },
    Unary { op: char, was_unary: bool },
}

/// Per-compiler operator table. Seeded with the built-in binary operators and
/// extended as operator functions are defined.
#[derive(Debug, Clone)]
pub struct OperatorTable {
    binary: HashMap<char, u32>,
    unary: HashSet<char>,
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorTable {
    pub fn new() -> Self {
        Self {
            binary: BUILTIN_BINARY.into_iter().collect(),
            unary: HashSet::new(),
        }
    }

    /// Binary precedence of `token`, or `None` when it is not a binary operator.
    pub fn binary_precedence(&self, token: &Token) -> Option<u32> {
        let Token::Char(c) = token else {
            return None;
        };
        self.binary.get(c).copied().filter(|&p| p > 0)
    }

    pub fn is_unary(&self, token: &Token) -> bool {
        matches!(token, Token::Char(c) if self.unary.contains(c))
    }

    /// Register the operator a prototype introduces. Returns the entry it
    /// replaced so a failed definition can put it back.
    pub fn define(&mut self, kind: ProtoKind) -> Option<OperatorEntry> {
        match kind {
            ProtoKind::Function => None,
            ProtoKind::Binary { op, precedence } => {
                let previous = self.binary.insert(op, precedence);
                log::debug!("[ops] binary '{op}' precedence {precedence}");
                Some(OperatorEntry::Binary { op, previous })
            }
            ProtoKind::Unary { op } => {
                let was_unary = !self.unary.insert(op);
                log::debug!("[ops] unary '{op}'");
                Some(OperatorEntry::Unary { op, was_unary })
            }
        }
    }

    pub fn restore(&mut self, entry: OperatorEntry) {
        match entry {
            OperatorEntry::Binary { op, previous: Some(prec) } => {
                self.binary.insert(op, prec);
            }
            OperatorEntry::Binary { op, previous: None } => {
                self.binary.remove(&op);
            }
            OperatorEntry::Unary { op, was_unary } => {
                if !was_unary {
                    self.unary.remove(&op);
                }
            }
        }
        log::debug!("[ops] restored {entry:?}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_precedences() {
        let ops = OperatorTable::new();
        assert_eq!(ops.binary_precedence(&Token::Char('<')), Some(10));
        assert_eq!(ops.binary_precedence(&Token::Char('+')), Some(20));
        assert_eq!(ops.binary_precedence(&Token::Char('-')), Some(20));
        assert_eq!(ops.binary_precedence(&Token::Char('*')), Some(40));
        assert_eq!(ops.binary_precedence(&Token::Char('/')), Some(40));
        assert_eq!(ops.binary_precedence(&Token::Char('=')), Some(ASSIGN_PRECEDENCE));
        assert_eq!(ops.binary_precedence(&Token::Char('|')), None);
        assert_eq!(ops.binary_precedence(&Token::Ident("x".into())), None);
        assert!(!ops.is_unary(&Token::Char('!')));
    }

    #[test]
    fn define_and_restore_binary() {
        let mut ops = OperatorTable::new();
        let entry = ops.define(ProtoKind::Binary { op: '|', precedence: 5 }).unwrap();
        assert_eq!(ops.binary_precedence(&Token::Char('|')), Some(5));
        ops.restore(entry);
        assert_eq!(ops.binary_precedence(&Token::Char('|')), None);
    }

    #[test]
    fn restore_puts_back_builtin_precedence() {
        let mut ops = OperatorTable::new();
        let entry = ops.define(ProtoKind::Binary { op: '+', precedence: 70 }).unwrap();
        assert_eq!(ops.binary_precedence(&Token::Char('+')), Some(70));
        ops.restore(entry);
        assert_eq!(ops.binary_precedence(&Token::Char('+')), Some(20));
    }

    #[test]
    fn define_and_restore_unary() {
        let mut ops = OperatorTable::new();
        let entry = ops.define(ProtoKind::Unary { op: '!' }).unwrap();
        assert!(ops.is_unary(&Token::Char('!')));
        ops.restore(entry);
        assert!(!ops.is_unary(&Token::Char('!')));
    }

    #[test]
    fn tables_are_independent() {
        let mut a = OperatorTable::new();
        let b = OperatorTable::new();
        a.define(ProtoKind::Binary { op: '&', precedence: 6 });
        assert_eq!(b.binary_precedence(&Token::Char('&')), None);
    }
}
