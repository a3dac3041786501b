//! AST node types for the toy language.

use serde::Serialize;

/// 1-based source position of the first character of a token or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    Number { value: f64 },
    Text { value: String },
    Variable { name: String },
    Unary { op: char, operand: Box<Expr> },
    Binary { op: char, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { callee: String, args: Vec<Expr> },
    /// `VAR a = 1, b body`: bindings scoped over a single expression.
    Var { bindings: Vec<Binding>, body: Box<Expr> },
}

/// `name` or `name = init` in a `VAR` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub name: String,
    pub init: Option<Expr>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Pos,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    /// `x := expr`
    Assign { name: String, value: Expr },
    Return { value: Expr },
    /// Items are text literals or arbitrary expressions.
    Print { items: Vec<Expr> },
    Continue,
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    /// `{ VAR ... stat* }`: leading declarations are zero-initialized unless given a value.
    Block { declared: Vec<Binding>, body: Vec<Stmt> },
    /// `VAR a, b stat` outside a block head.
    VarDecl { bindings: Vec<Binding>, body: Box<Stmt> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtoKind {
    Function,
    Unary { op: char },
    Binary { op: char, precedence: u32 },
}

/// Function signature. Operator prototypes are named `unary<op>` / `binary<op>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
    pub kind: ProtoKind,
    pub pos: Pos,
}

impl Prototype {
    /// Placeholder signature for a callee seen before its definition.
    pub fn placeholder(name: &str, arity: usize, pos: Pos) -> Self {
        Self {
            name: name.to_string(),
            params: (0..arity).map(|i| format!("arg{i}")).collect(),
            kind: ProtoKind::Function,
            pos,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

pub fn unary_fn_name(op: char) -> String {
    format!("unary{op}")
}

pub fn binary_fn_name(op: char) -> String {
    format!("binary{op}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    pub proto: Prototype,
    pub body: Stmt,
}
