use super::Parser;
use crate::frontend::ast::{Binding, Expr, ExprKind};
use crate::frontend::error::CompileError;
use crate::frontend::lexer::Token;
use crate::frontend::operators::OperatorTable;

impl<I: Iterator<Item = char>> Parser<I> {
    pub(super) fn parse_expression(&mut self, ops: &OperatorTable) -> Result<Expr, CompileError> {
        let lhs = self.parse_unary(ops)?;
        self.parse_binary_rhs(ops, 0, lhs)
    }

    /// Precedence climbing. Ties bind left: a right operand only absorbs the
    /// next operator when it binds strictly tighter.
    fn parse_binary_rhs(
        &mut self,
        ops: &OperatorTable,
        min_prec: u32,
        mut lhs: Expr,
    ) -> Result<Expr, CompileError> {
        loop {
            let Some(prec) = ops.binary_precedence(self.peek()) else {
                return Ok(lhs);
            };
            if prec < min_prec {
                return Ok(lhs);
            }
            let Token::Char(op) = *self.peek() else {
                return Ok(lhs);
            };
            let pos = self.pos();
            self.advance()?;

            let mut rhs = self.parse_unary(ops)?;
            if ops.binary_precedence(self.peek()).is_some_and(|next| next > prec) {
                rhs = self.parse_binary_rhs(ops, prec + 1, rhs)?;
            }
            lhs = Expr::new(
                ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                pos,
            );
        }
    }

    fn parse_unary(&mut self, ops: &OperatorTable) -> Result<Expr, CompileError> {
        if ops.is_unary(self.peek()) {
            if let Token::Char(op) = *self.peek() {
                let pos = self.pos();
                self.advance()?;
                let operand = self.parse_unary(ops)?;
                return Ok(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, pos));
            }
        }
        self.parse_primary(ops)
    }

    fn parse_primary(&mut self, ops: &OperatorTable) -> Result<Expr, CompileError> {
        let pos = self.pos();
        match self.peek() {
            Token::Number(value) => {
                let value = *value;
                self.advance()?;
                Ok(Expr::new(ExprKind::Number { value }, pos))
            }
            Token::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                if self.peek().is_char('(') {
                    self.advance()?;
                    let args = self.parse_call_args(ops)?;
                    Ok(Expr::new(ExprKind::Call { callee: name, args }, pos))
                } else {
                    Ok(Expr::new(ExprKind::Variable { name }, pos))
                }
            }
            Token::Char('(') => {
                self.advance()?;
                let inner = self.parse_expression(ops)?;
                self.expect_char(')', "to close parenthesized expression")?;
                Ok(inner)
            }
            Token::Char('-') => {
                // Negation is `0 - operand` and binds tighter than any binary operator.
                self.advance()?;
                let operand = self.parse_unary(ops)?;
                let zero = Expr::new(ExprKind::Number { value: 0.0 }, pos);
                Ok(Expr::new(
                    ExprKind::Binary { op: '-', lhs: Box::new(zero), rhs: Box::new(operand) },
                    pos,
                ))
            }
            Token::Var => {
                self.advance()?;
                let bindings = self.parse_bindings(ops)?;
                let body = self.parse_expression(ops)?;
                Ok(Expr::new(ExprKind::Var { bindings, body: Box::new(body) }, pos))
            }
            other => Err(CompileError::parser(
                format!("unknown token '{other}' when expecting an expression"),
                pos,
            )),
        }
    }

    /// Arguments after the opening `(`, through the closing `)`.
    fn parse_call_args(&mut self, ops: &OperatorTable) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.peek().is_char(')') {
            self.advance()?;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression(ops)?);
            if self.peek().is_char(')') {
                self.advance()?;
                return Ok(args);
            }
            self.expect_char(',', "or ')' in argument list")?;
        }
    }

    /// `name (= expr)? (, name (= expr)?)*`. The `VAR` keyword is already consumed.
    pub(super) fn parse_bindings(&mut self, ops: &OperatorTable) -> Result<Vec<Binding>, CompileError> {
        let mut bindings = Vec::new();
        loop {
            let pos = self.pos();
            let name = self.expect_ident("after 'VAR'")?;
            let init = if self.peek().is_char('=') {
                self.advance()?;
                Some(self.parse_expression(ops)?)
            } else {
                None
            };
            bindings.push(Binding { name, init, pos });
            if !self.peek().is_char(',') {
                return Ok(bindings);
            }
            self.advance()?;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::frontend::ast::{Expr, ExprKind, ProtoKind};
    use crate::frontend::lexer::Lexer;
    use crate::frontend::operators::OperatorTable;
    use crate::frontend::parser::Parser;

    fn parse_with(src: &str, ops: &OperatorTable) -> Expr {
        let mut parser = Parser::new(Lexer::from_source(src));
        parser.advance().unwrap();
        parser.parse_expression(ops).unwrap()
    }

    fn parse_expr(src: &str) -> Expr {
        parse_with(src, &OperatorTable::new())
    }

    /// Render as a fully parenthesized string so shapes are easy to compare.
    fn show(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Number { value } => format!("{value}"),
            ExprKind::Text { value } => format!("{value:?}"),
            ExprKind::Variable { name } => name.clone(),
            ExprKind::Unary { op, operand } => format!("{op}{}", show(operand)),
            ExprKind::Binary { op, lhs, rhs } => format!("({} {op} {})", show(lhs), show(rhs)),
            ExprKind::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(show).collect();
                format!("{callee}({})", args.join(", "))
            }
            ExprKind::Var { bindings, body } => {
                let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
                format!("var[{}] {}", names.join(","), show(body))
            }
        }
    }

    #[test]
    fn higher_precedence_binds_tighter() {
        assert_eq!(show(&parse_expr("a + b * c")), "(a + (b * c))");
        assert_eq!(show(&parse_expr("a * b + c")), "((a * b) + c)");
        assert_eq!(show(&parse_expr("a < b + c")), "(a < (b + c))");
    }

    #[test]
    fn equal_precedence_binds_left() {
        assert_eq!(show(&parse_expr("a - b - c")), "((a - b) - c)");
        assert_eq!(show(&parse_expr("a / b * c")), "((a / b) * c)");
    }

    #[test]
    fn parentheses_override() {
        assert_eq!(show(&parse_expr("(a + b) * c")), "((a + b) * c)");
    }

    #[test]
    fn assignment_is_lowest() {
        assert_eq!(show(&parse_expr("x = y < 1 + 2")), "(x = (y < (1 + 2)))");
    }

    #[test]
    fn negation_binds_tightly() {
        assert_eq!(show(&parse_expr("-a + b")), "((0 - a) + b)");
        assert_eq!(show(&parse_expr("a * -b")), "(a * (0 - b))");
    }

    #[test]
    fn calls_with_arguments() {
        assert_eq!(show(&parse_expr("f(1, g(x), a + b)")), "f(1, g(x), (a + b))");
        assert_eq!(show(&parse_expr("f()")), "f()");
    }

    #[test]
    fn var_expression() {
        assert_eq!(show(&parse_expr("VAR a = 1, b a + b")), "var[a,b] (a + b)");
    }

    #[test]
    fn user_operators() {
        let mut ops = OperatorTable::new();
        ops.define(ProtoKind::Unary { op: '!' });
        ops.define(ProtoKind::Binary { op: '&', precedence: 6 });
        assert_eq!(show(&parse_with("!a & b < c", &ops)), "(!a & (b < c))");
    }

    #[test]
    fn operator_positions() {
        let expr = parse_expr("a +\n  b");
        assert_eq!((expr.pos.line, expr.pos.col), (1, 3));
    }

    #[test]
    fn errors() {
        let ops = OperatorTable::new();
        for src in ["f(1 2)", "(a + b", "+ 1", "f(1,"] {
            let mut parser = Parser::new(Lexer::from_source(src));
            parser.advance().unwrap();
            assert!(parser.parse_expression(&ops).is_err(), "{src}");
        }
    }
}
