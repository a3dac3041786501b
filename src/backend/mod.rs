//! Code emission interface and the bundled region IR.
//!
//! The front end only talks to [`CodeEmitter`]. [`ir::IrBuilder`] implements
//! it with a plain in-memory IR that [`vm::Vm`] can execute.

pub mod ir;
pub mod vm;

use serde::Serialize;

/// Literal values the front end can materialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Number(f64),
    Text(String),
}

/// Primitive binary operations on numbers. Comparisons yield 1.0 or 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Ne,
}

impl PrimitiveOp {
    /// The primitive behind a built-in operator symbol.
    pub fn from_symbol(op: char) -> Option<Self> {
        Some(match op {
            '+' => Self::Add,
            '-' => Self::Sub,
            '*' => Self::Mul,
            '/' => Self::Div,
            '<' => Self::Lt,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Lt => "lt",
            Self::Ne => "ne",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("function '{function}' has no body under construction")]
    NoBody { function: String },
    #[error("region '{region}' in function '{function}' has no terminator")]
    Unterminated { function: String, region: String },
}

/// Everything the lowering driver needs from a code generator.
///
/// Handles are small `Copy` ids owned by the emitter. Instructions are appended
/// at the current insertion point; a region stops accepting instructions once
/// it has a terminator.
pub trait CodeEmitter {
    type Function: Copy + std::fmt::Debug;
    type Region: Copy + std::fmt::Debug;
    type Slot: Copy + std::fmt::Debug;
    type Value: Copy + std::fmt::Debug;
    type Artifact;

    /// Declare (or re-declare) a function. The same name yields the same handle.
    fn declare_function(&mut self, name: &str, param_count: usize) -> Self::Function;
    fn create_region(&mut self, function: Self::Function, label: &str) -> Self::Region;
    fn set_insertion_point(&mut self, region: Self::Region);
    fn allocate_slot(&mut self, region: Self::Region, name: &str) -> Self::Slot;
    fn param(&mut self, function: Self::Function, index: usize) -> Self::Value;
    fn load(&mut self, slot: Self::Slot) -> Self::Value;
    fn store(&mut self, slot: Self::Slot, value: Self::Value);
    fn constant(&mut self, constant: Constant) -> Self::Value;
    fn primitive(&mut self, op: PrimitiveOp, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
    fn call(&mut self, callee: Self::Function, args: &[Self::Value]) -> Self::Value;
    fn print(&mut self, items: &[Self::Value]);
    fn branch_if(&mut self, cond: Self::Value, then: Self::Region, otherwise: Self::Region);
    fn branch(&mut self, target: Self::Region);
    fn ret(&mut self, value: Self::Value);
    /// Whether the current insertion region already ends in a terminator.
    fn is_terminated(&self) -> bool;
    fn finalize_function(&mut self, function: Self::Function) -> Result<Self::Artifact, EmitError>;
    /// Drop the body under construction; the declaration stays.
    fn discard_function(&mut self, function: Self::Function);
}
