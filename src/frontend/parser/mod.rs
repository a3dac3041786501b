//! Recursive-descent parser with a single token of lookahead.
//!
//! The parser never owns the operator table: the table changes as operator
//! functions are lowered, so every entry point borrows it for the duration of
//! one function.

mod expr;
mod stmt;

use super::ast::{Function, Pos};
use super::error::{CompileError, Diagnostics};
use super::lexer::{Lexer, SpannedToken, Token};
use super::operators::OperatorTable;

/// Result of asking the parser for the next top-level item.
#[derive(Debug)]
pub enum Parsed {
    Function(Function),
    /// A function was attempted but had errors (already reported).
    Failed,
    End,
}

pub struct Parser<I: Iterator<Item = char>> {
    lexer: Lexer<I>,
    cur: SpannedToken,
    /// Set by any recovered statement error inside the current function.
    failed: bool,
}

impl<I: Iterator<Item = char>> Parser<I> {
    pub fn new(lexer: Lexer<I>) -> Self {
        Self {
            lexer,
            // Placeholder until the first token is read; skipped silently.
            cur: SpannedToken { token: Token::Invalid, pos: Pos::new(1, 1) },
            failed: false,
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.cur.token
    }

    fn pos(&self) -> Pos {
        self.cur.pos
    }

    /// Move to the next token. On a lex error the current token becomes
    /// `Invalid` and the error is returned.
    fn advance(&mut self) -> Result<(), CompileError> {
        match self.lexer.next_token() {
            Ok(tok) => {
                self.cur = tok;
                Ok(())
            }
            Err(e) => {
                self.cur = SpannedToken { token: Token::Invalid, pos: e.pos };
                Err(e)
            }
        }
    }

    fn expect(&mut self, expected: &Token, context: &str) -> Result<(), CompileError> {
        if self.peek() == expected {
            self.advance()
        } else {
            Err(CompileError::parser(
                format!("expected '{expected}' {context}, found '{}'", self.peek()),
                self.pos(),
            ))
        }
    }

    fn expect_char(&mut self, c: char, context: &str) -> Result<(), CompileError> {
        self.expect(&Token::Char(c), context)
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, CompileError> {
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance()?;
            Ok(name)
        } else {
            Err(CompileError::parser(
                format!("expected identifier {context}, found '{}'", self.peek()),
                self.pos(),
            ))
        }
    }

    /// Skip to the next `FUNC` (or end of input), reporting lex errors met on the way.
    fn skip_to_function(&mut self, diags: &mut dyn Diagnostics) {
        while !matches!(self.peek(), Token::Func | Token::Eof) {
            if let Err(e) = self.advance() {
                diags.report(e);
            }
        }
    }

    // ── Top level ──────────────────────────────────────────────────

    /// Parse the next function definition. Errors are reported to `diags`;
    /// after a failure the parser is positioned at the next `FUNC`.
    pub fn next_function(
        &mut self,
        ops: &OperatorTable,
        diags: &mut dyn Diagnostics,
    ) -> Parsed {
        loop {
            match self.peek() {
                Token::Eof => return Parsed::End,
                Token::Invalid => {
                    if let Err(e) = self.advance() {
                        diags.report(e);
                    }
                }
                Token::Func => {
                    self.failed = false;
                    return match self.parse_function(ops, diags) {
                        Ok(func) if !self.failed => Parsed::Function(func),
                        Ok(_) => Parsed::Failed,
                        Err(e) => {
                            diags.report(e);
                            self.skip_to_function(diags);
                            Parsed::Failed
                        }
                    };
                }
                _ => {
                    diags.report(CompileError::parser(
                        format!("expected 'FUNC' at top level, found '{}'", self.peek()),
                        self.pos(),
                    ));
                    self.skip_to_function(diags);
                }
            }
        }
    }

    /// Error reports from recovered statements go through here so the
    /// enclosing function is marked as failed.
    fn recover(&mut self, error: CompileError, diags: &mut dyn Diagnostics) {
        diags.report(error);
        self.failed = true;
        self.synchronize(diags);
    }

    /// Skip until a token that can begin a statement or close a block.
    fn synchronize(&mut self, diags: &mut dyn Diagnostics) {
        loop {
            match self.peek() {
                Token::Return
                | Token::Print
                | Token::Continue
                | Token::If
                | Token::While
                | Token::Var
                | Token::Func
                | Token::Eof => return,
                Token::Char('{' | '}') => return,
                _ => {
                    if let Err(e) = self.advance() {
                        diags.report(e);
                    }
                }
            }
        }
    }
}

/// Parse a whole source without lowering it. Operator functions still take
/// effect for the functions after them.
pub fn parse_source(source: &str, escapes: bool) -> (Vec<Function>, Vec<CompileError>) {
    let mut parser = Parser::new(Lexer::from_source(source).with_escapes(escapes));
    let mut ops = OperatorTable::new();
    let mut errors: Vec<CompileError> = Vec::new();
    let mut functions = Vec::new();
    loop {
        match parser.next_function(&ops, &mut errors) {
            Parsed::Function(func) => {
                ops.define(func.proto.kind);
                functions.push(func);
            }
            Parsed::Failed => {}
            Parsed::End => break,
        }
    }
    (functions, errors)
}
