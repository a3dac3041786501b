use super::Parser;
use crate::frontend::ast::{
    binary_fn_name, unary_fn_name, Expr, ExprKind, Function, ProtoKind, Prototype, Stmt, StmtKind,
};
use crate::frontend::error::{CompileError, Diagnostics};
use crate::frontend::lexer::Token;
use crate::frontend::operators::{OperatorTable, DEFAULT_USER_PRECEDENCE};

impl<I: Iterator<Item = char>> Parser<I> {
    /// `FUNC prototype stat`. Statement errors inside blocks are reported to
    /// `diags` and mark the function as failed; anything else aborts it.
    pub(super) fn parse_function(
        &mut self,
        ops: &OperatorTable,
        diags: &mut dyn Diagnostics,
    ) -> Result<Function, CompileError> {
        self.expect(&Token::Func, "to start a function")?;
        let proto = self.parse_prototype()?;
        let body = self.parse_statement(ops, diags)?;
        Ok(Function { proto, body })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn parse_prototype(&mut self) -> Result<Prototype, CompileError> {
        let pos = self.pos();
        let (name, kind) = match self.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                (name, ProtoKind::Function)
            }
            Token::Unary => {
                self.advance()?;
                let op = self.expect_operator_symbol()?;
                (unary_fn_name(op), ProtoKind::Unary { op })
            }
            Token::Binary => {
                self.advance()?;
                let op = self.expect_operator_symbol()?;
                let precedence = if let Token::Number(n) = *self.peek() {
                    let prec_pos = self.pos();
                    self.advance()?;
                    if n.fract() != 0.0 || !(1.0..=100.0).contains(&n) {
                        return Err(CompileError::parser(
                            format!("invalid precedence {n}: must be an integer in 1..=100"),
                            prec_pos,
                        ));
                    }
                    n as u32
                } else {
                    DEFAULT_USER_PRECEDENCE
                };
                (binary_fn_name(op), ProtoKind::Binary { op, precedence })
            }
            other => {
                return Err(CompileError::parser(
                    format!("expected function name in prototype, found '{other}'"),
                    pos,
                ));
            }
        };

        self.expect_char('(', "in prototype")?;
        let mut params = Vec::new();
        if self.peek().is_char(')') {
            self.advance()?;
        } else {
            loop {
                params.push(self.expect_ident("in parameter list")?);
                if self.peek().is_char(')') {
                    self.advance()?;
                    break;
                }
                self.expect_char(',', "or ')' in parameter list")?;
            }
        }
        Ok(Prototype { name, params, kind, pos })
    }

    fn expect_operator_symbol(&mut self) -> Result<char, CompileError> {
        match *self.peek() {
            Token::Char(c) if !matches!(c, '(' | ')' | '{' | '}' | ',' | '"') => {
                self.advance()?;
                Ok(c)
            }
            _ => Err(CompileError::parser(
                format!("expected operator symbol, found '{}'", self.peek()),
                self.pos(),
            )),
        }
    }

    pub(super) fn parse_statement(
        &mut self,
        ops: &OperatorTable,
        diags: &mut dyn Diagnostics,
    ) -> Result<Stmt, CompileError> {
        let pos = self.pos();
        let kind = match self.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                self.expect(&Token::Assign, "after variable name")?;
                let value = self.parse_expression(ops)?;
                StmtKind::Assign { name, value }
            }
            Token::Return => {
                self.advance()?;
                StmtKind::Return { value: self.parse_expression(ops)? }
            }
            Token::Print => {
                self.advance()?;
                StmtKind::Print { items: self.parse_print_items(ops)? }
            }
            Token::Continue => {
                self.advance()?;
                StmtKind::Continue
            }
            Token::If => {
                self.advance()?;
                let cond = self.parse_expression(ops)?;
                self.expect(&Token::Then, "after IF condition")?;
                let then = Box::new(self.parse_statement(ops, diags)?);
                let otherwise = if *self.peek() == Token::Else {
                    self.advance()?;
                    Some(Box::new(self.parse_statement(ops, diags)?))
                } else {
                    None
                };
                self.expect(&Token::Fi, "to close IF")?;
                StmtKind::If { cond, then, otherwise }
            }
            Token::While => {
                self.advance()?;
                let cond = self.parse_expression(ops)?;
                self.expect(&Token::Do, "after WHILE condition")?;
                let body = Box::new(self.parse_statement(ops, diags)?);
                self.expect(&Token::Done, "to close WHILE")?;
                StmtKind::While { cond, body }
            }
            Token::Char('{') => {
                self.advance()?;
                self.parse_block(ops, diags)?
            }
            Token::Var => {
                self.advance()?;
                let bindings = self.parse_bindings(ops)?;
                let body = Box::new(self.parse_statement(ops, diags)?);
                StmtKind::VarDecl { bindings, body }
            }
            _ => return Err(self.stray_token()),
        };
        Ok(Stmt::new(kind, pos))
    }

    /// Consume exactly the token that cannot begin a statement.
    fn stray_token(&mut self) -> CompileError {
        let error = CompileError::parser(
            format!("unknown token '{}' when expecting a statement", self.peek()),
            self.pos(),
        );
        match self.advance() {
            Ok(()) => error,
            Err(lex) => lex,
        }
    }

    fn parse_print_items(&mut self, ops: &OperatorTable) -> Result<Vec<Expr>, CompileError> {
        let mut items = Vec::new();
        loop {
            if let Token::Text(text) = self.peek() {
                let item = Expr::new(ExprKind::Text { value: text.clone() }, self.pos());
                self.advance()?;
                items.push(item);
            } else {
                items.push(self.parse_expression(ops)?);
            }
            if !self.peek().is_char(',') {
                return Ok(items);
            }
            self.advance()?;
        }
    }

    /// Block contents after `{`, through the closing `}`.
    fn parse_block(
        &mut self,
        ops: &OperatorTable,
        diags: &mut dyn Diagnostics,
    ) -> Result<StmtKind, CompileError> {
        let mut declared = Vec::new();
        while *self.peek() == Token::Var {
            self.advance()?;
            declared.extend(self.parse_bindings(ops)?);
        }

        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::Char('}') => {
                    self.advance()?;
                    return Ok(StmtKind::Block { declared, body });
                }
                Token::Eof | Token::Func => {
                    return Err(CompileError::parser(
                        format!("expected '}}' to close block, found '{}'", self.peek()),
                        self.pos(),
                    ));
                }
                Token::Invalid => {
                    if let Err(e) = self.advance() {
                        diags.report(e);
                    }
                }
                // Only the stray token is dropped; the statements after it
                // still parse.
                token if !starts_statement(token) => {
                    let error = self.stray_token();
                    diags.report(error);
                    self.failed = true;
                }
                _ => match self.parse_statement(ops, diags) {
                    Ok(stmt) => body.push(stmt),
                    Err(e) => self.recover(e, diags),
                },
            }
        }
    }
}

fn starts_statement(token: &Token) -> bool {
    matches!(
        token,
        Token::Ident(_)
            | Token::Return
            | Token::Print
            | Token::Continue
            | Token::If
            | Token::While
            | Token::Var
            | Token::Char('{')
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use crate::frontend::ast::{ExprKind, Function, ProtoKind, StmtKind};
    use crate::frontend::error::{CompileError, ErrorKind};
    use crate::frontend::parser::parse_source;

    fn parse_one(src: &str) -> Function {
        let (mut funcs, errors) = parse_source(src, true);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(funcs.len(), 1);
        funcs.remove(0)
    }

    fn errors_of(src: &str) -> Vec<CompileError> {
        parse_source(src, true).1
    }

    #[test]
    fn assign_return_print() {
        let f = parse_one("FUNC f(a) { a := a + 1 PRINT \"a is \", a RETURN a }");
        let StmtKind::Block { declared, body } = &f.body.kind else {
            panic!("expected block");
        };
        assert!(declared.is_empty());
        assert!(matches!(&body[0].kind, StmtKind::Assign { name, .. } if name == "a"));
        let StmtKind::Print { items } = &body[1].kind else {
            panic!("expected print");
        };
        assert!(matches!(&items[0].kind, ExprKind::Text { value } if value == "a is "));
        assert!(matches!(&items[1].kind, ExprKind::Variable { .. }));
        assert!(matches!(body[2].kind, StmtKind::Return { .. }));
    }

    #[test]
    fn block_declarations() {
        let f = parse_one("FUNC main() { VAR x = 3 VAR y, z = 2 x := x + 2 RETURN x }");
        let StmtKind::Block { declared, body } = &f.body.kind else {
            panic!("expected block");
        };
        let names: Vec<&str> = declared.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert!(declared[1].init.is_none());
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn if_with_and_without_else() {
        let f = parse_one("FUNC f(a) { IF a THEN RETURN 1 FI IF a < 2 THEN PRINT 1 ELSE PRINT 2 FI }");
        let StmtKind::Block { body, .. } = &f.body.kind else {
            panic!("expected block");
        };
        assert!(matches!(&body[0].kind, StmtKind::If { otherwise: None, .. }));
        assert!(matches!(&body[1].kind, StmtKind::If { otherwise: Some(_), .. }));
    }

    #[test]
    fn while_and_continue() {
        let f = parse_one("FUNC f(n) WHILE n DO { n := n - 1 CONTINUE } DONE");
        let StmtKind::While { body, .. } = &f.body.kind else {
            panic!("expected while");
        };
        let StmtKind::Block { body, .. } = &body.kind else {
            panic!("expected block");
        };
        assert!(matches!(body[1].kind, StmtKind::Continue));
    }

    #[test]
    fn var_statement_scopes_over_next_statement() {
        let f = parse_one("FUNC f() VAR a = 1, b RETURN a");
        let StmtKind::VarDecl { bindings, body } = &f.body.kind else {
            panic!("expected var decl");
        };
        assert_eq!(bindings.len(), 2);
        assert!(matches!(body.kind, StmtKind::Return { .. }));
    }

    #[test]
    fn operator_prototypes() {
        let f = parse_one("FUNC unary!(v) RETURN 0 - v");
        assert_eq!(f.proto.name, "unary!");
        assert_eq!(f.proto.kind, ProtoKind::Unary { op: '!' });

        let f = parse_one("FUNC binary% (a, b) RETURN a");
        assert_eq!(f.proto.kind, ProtoKind::Binary { op: '%', precedence: 30 });
    }

    #[test]
    fn precedence_out_of_range() {
        for src in ["FUNC binary| 0 (a, b) RETURN a", "FUNC binary| 101 (a, b) RETURN a", "FUNC binary| 1.5 (a, b) RETURN a"] {
            let errors = errors_of(src);
            assert_eq!(errors.len(), 1, "{src}");
            assert!(errors[0].message.contains("precedence"));
        }
    }

    #[test]
    fn missing_keywords() {
        assert_eq!(errors_of("FUNC f(a) IF a RETURN 1 FI")[0].kind, ErrorKind::Parser);
        assert!(errors_of("FUNC f(a) IF a THEN RETURN 1")[0].message.contains("FI"));
        assert!(errors_of("FUNC f(a) WHILE a DO PRINT 1")[0].message.contains("DONE"));
        assert!(errors_of("FUNC f(a) { PRINT 1")[0].message.contains("'}'"));
    }

    #[test]
    fn unknown_statement_consumes_one_token() {
        let errors = errors_of("FUNC f() { THEN PRINT 1 }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("expecting a statement"));
    }

    #[test]
    fn assignments_after_stray_token_still_parse() {
        // The bad assignment on line 3 is only reported if it was parsed.
        let errors = errors_of("FUNC f() {\n  )\n  x := \n  RETURN 1\n}");
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert_eq!(errors[0].pos.line, 2);
        assert!(errors[0].message.contains("expecting a statement"));
        assert!(errors[1].message.contains("expecting an expression"));
    }

    #[test]
    fn statement_positions() {
        let f = parse_one("FUNC f()\n{\n  PRINT 1\n}");
        let StmtKind::Block { body, .. } = &f.body.kind else {
            panic!("expected block");
        };
        assert_eq!((body[0].pos.line, body[0].pos.col), (3, 3));
    }
}
