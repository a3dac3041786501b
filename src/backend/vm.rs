use std::io::Write;

use serde::{Deserialize, Serialize};

use super::ir::{FunctionBody, FunctionId, Inst, Program, RegionId, Terminator, ValueId};
use super::{Constant, PrimitiveOp};

/// Runtime value. Text only comes from literals and is only printable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    fn as_number(&self, context: &str) -> Result<f64, VmError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(_) => Err(VmError::TextInArithmetic { context: context.to_string() }),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&Constant> for Value {
    fn from(c: &Constant) -> Self {
        match c {
            Constant::Number(n) => Self::Number(*n),
            Constant::Text(s) => Self::Text(s.clone()),
        }
    }
}

/// Limits that stop runaway programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub max_call_depth: usize,
    pub max_steps: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_steps: 10_000_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("function '{name}' was declared but never defined")]
    UndefinedFunction { name: String },
    #[error("no entry function '{name}' in program")]
    MissingEntry { name: String },
    #[error("function '{name}' expects {expected} arguments, got {got}")]
    Arity { name: String, expected: usize, got: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("call depth exceeded {limit}")]
    StackOverflow { limit: usize },
    #[error("step budget of {limit} exhausted")]
    StepLimit { limit: u64 },
    #[error("text value used in {context}")]
    TextInArithmetic { context: String },
    #[error("malformed function '{name}': {detail}")]
    Malformed { name: String, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Interpreter for [`Program`]. `print` output goes to `out`.
pub struct Vm<'p, W: Write> {
    program: &'p Program,
    config: VmConfig,
    out: W,
    steps: u64,
    depth: usize,
}

impl<'p, W: Write> Vm<'p, W> {
    pub fn new(program: &'p Program, config: VmConfig, out: W) -> Self {
        Self { program, config, out, steps: 0, depth: 0 }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run the program's entry function.
    pub fn run_entry(&mut self, entry_name: &str, args: Vec<Value>) -> Result<Value, VmError> {
        let id = self
            .program
            .entry
            .ok_or_else(|| VmError::MissingEntry { name: entry_name.to_string() })?;
        self.call(id, args)
    }

    pub fn call(&mut self, id: FunctionId, args: Vec<Value>) -> Result<Value, VmError> {
        let program = self.program;
        let Some(body) = program.function(id) else {
            let name = program
                .declaration(id)
                .map_or_else(|| format!("#{}", id.0), |d| d.name.clone());
            return Err(VmError::UndefinedFunction { name });
        };
        if body.params != args.len() {
            return Err(VmError::Arity {
                name: body.name.clone(),
                expected: body.params,
                got: args.len(),
            });
        }
        if self.depth >= self.config.max_call_depth {
            return Err(VmError::StackOverflow { limit: self.config.max_call_depth });
        }
        self.depth += 1;
        let result = self.execute(body, &args);
        self.depth -= 1;
        result
    }

    fn tick(&mut self) -> Result<(), VmError> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(VmError::StepLimit { limit: self.config.max_steps });
        }
        Ok(())
    }

    fn execute(&mut self, body: &FunctionBody, args: &[Value]) -> Result<Value, VmError> {
        let mut values: Vec<Value> = vec![Value::Number(0.0); body.value_count as usize];
        let mut slots: Vec<Value> = vec![Value::Number(0.0); body.slots.len()];
        let malformed = |detail: String| VmError::Malformed { name: body.name.clone(), detail };

        let read = |values: &[Value], v: ValueId| -> Result<Value, VmError> {
            values
                .get(v.0 as usize)
                .cloned()
                .ok_or_else(|| malformed(format!("value v{} out of range", v.0)))
        };

        let mut current = RegionId(0);
        loop {
            let region = body
                .region(current)
                .ok_or_else(|| malformed(format!("no region r{}", current.0)))?;

            for inst in &region.insts {
                self.tick()?;
                let (dest, value) = match inst {
                    Inst::Const { dest, value } => (*dest, Value::from(value)),
                    Inst::Param { dest, index } => {
                        let arg = args
                            .get(*index)
                            .cloned()
                            .ok_or_else(|| malformed(format!("no parameter {index}")))?;
                        (*dest, arg)
                    }
                    Inst::Load { dest, slot } => {
                        let v = slots
                            .get(slot.0 as usize)
                            .cloned()
                            .ok_or_else(|| malformed(format!("no slot s{}", slot.0)))?;
                        (*dest, v)
                    }
                    Inst::Store { slot, value } => {
                        let v = read(&values, *value)?;
                        let target = slots
                            .get_mut(slot.0 as usize)
                            .ok_or_else(|| malformed(format!("no slot s{}", slot.0)))?;
                        *target = v;
                        continue;
                    }
                    Inst::Primitive { dest, kind, lhs, rhs } => {
                        let l = read(&values, *lhs)?.as_number(kind.mnemonic())?;
                        let r = read(&values, *rhs)?.as_number(kind.mnemonic())?;
                        (*dest, Value::Number(float_binop(*kind, l, r)?))
                    }
                    Inst::Call { dest, callee, args } => {
                        let args = args
                            .iter()
                            .map(|a| read(&values, *a))
                            .collect::<Result<Vec<_>, _>>()?;
                        (*dest, self.call(*callee, args)?)
                    }
                    Inst::Print { items } => {
                        let mut line = String::new();
                        for item in items {
                            line.push_str(&read(&values, *item)?.to_string());
                        }
                        writeln!(self.out, "{line}")?;
                        continue;
                    }
                };
                let target = values
                    .get_mut(dest.0 as usize)
                    .ok_or_else(|| malformed(format!("value v{} out of range", dest.0)))?;
                *target = value;
            }

            self.tick()?;
            match region.terminator {
                Some(Terminator::Return { value }) => return read(&values, value),
                Some(Terminator::Branch { target }) => current = target,
                Some(Terminator::BranchIf { cond, then, otherwise }) => {
                    let c = read(&values, cond)?.as_number("condition")?;
                    current = if c == 0.0 { otherwise } else { then };
                }
                None => {
                    return Err(malformed(format!("region r{} has no terminator", current.0)));
                }
            }
        }
    }
}

fn float_binop(op: PrimitiveOp, l: f64, r: f64) -> Result<f64, VmError> {
    Ok(match op {
        PrimitiveOp::Add => l + r,
        PrimitiveOp::Sub => l - r,
        PrimitiveOp::Mul => l * r,
        PrimitiveOp::Div => {
            if r == 0.0 {
                return Err(VmError::DivisionByZero);
            }
            l / r
        }
        PrimitiveOp::Lt => f64::from(u8::from(l < r)),
        PrimitiveOp::Ne => f64::from(u8::from(l != r)),
    })
}
