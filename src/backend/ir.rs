//! Region-based IR: functions are lists of regions, each a straight run of
//! instructions closed by one terminator. Mutable locals live in slots.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::{CodeEmitter, Constant, EmitError, PrimitiveOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FunctionId(pub u32);

/// Index of a region within its function. Region 0 is the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ValueId(pub u32);

/// Region handle handed to the front end; knows its owning function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionRef {
    pub function: FunctionId,
    pub region: RegionId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Inst {
    Const { dest: ValueId, value: Constant },
    Param { dest: ValueId, index: usize },
    Load { dest: ValueId, slot: SlotId },
    Store { slot: SlotId, value: ValueId },
    Primitive { dest: ValueId, kind: PrimitiveOp, lhs: ValueId, rhs: ValueId },
    Call { dest: ValueId, callee: FunctionId, args: Vec<ValueId> },
    Print { items: Vec<ValueId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Terminator {
    Branch { target: RegionId },
    BranchIf { cond: ValueId, then: RegionId, otherwise: RegionId },
    Return { value: ValueId },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub label: String,
    pub insts: Vec<Inst>,
    pub terminator: Option<Terminator>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotInfo {
    pub name: String,
    /// Region the slot was allocated in.
    pub region: RegionId,
}

/// A function body. Under construction inside [`IrBuilder`], then handed out
/// by `finalize_function` with every region terminated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionBody {
    pub id: FunctionId,
    pub name: String,
    pub params: usize,
    pub slots: Vec<SlotInfo>,
    pub regions: Vec<Region>,
    pub value_count: u32,
}

impl FunctionBody {
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.0 as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub id: FunctionId,
    pub name: String,
    pub params: usize,
}

/// Implements [`CodeEmitter`] by building [`FunctionBody`] values in memory.
#[derive(Debug, Default)]
pub struct IrBuilder {
    declarations: IndexMap<String, Declaration>,
    building: HashMap<FunctionId, FunctionBody>,
    cursor: Option<RegionRef>,
    /// Ids handed out while no insertion point is set. Never referenced by IR.
    detached_values: u32,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    fn name_of(&self, id: FunctionId) -> String {
        self.declarations
            .values()
            .find(|d| d.id == id)
            .map_or_else(|| format!("#{}", id.0), |d| d.name.clone())
    }

    fn body_mut(&mut self, id: FunctionId) -> &mut FunctionBody {
        let name = self.name_of(id);
        let params = self.declarations.get(&name).map_or(0, |d| d.params);
        self.building.entry(id).or_insert_with(|| FunctionBody {
            id,
            name,
            params,
            slots: Vec::new(),
            regions: Vec::new(),
            value_count: 0,
        })
    }

    fn current_region(&mut self) -> Option<&mut Region> {
        let cursor = self.cursor?;
        self.building
            .get_mut(&cursor.function)?
            .regions
            .get_mut(cursor.region.0 as usize)
    }

    fn fresh_value(&mut self) -> ValueId {
        let Some(cursor) = self.cursor else {
            self.detached_values += 1;
            return ValueId(u32::MAX - self.detached_values);
        };
        let body = self.body_mut(cursor.function);
        let id = ValueId(body.value_count);
        body.value_count += 1;
        id
    }

    fn push(&mut self, inst: Inst) {
        if let Some(region) = self.current_region() {
            region.insts.push(inst);
        }
    }

    fn terminate(&mut self, terminator: Terminator) {
        if let Some(region) = self.current_region() {
            // The first terminator wins.
            if region.terminator.is_none() {
                region.terminator = Some(terminator);
            }
        }
    }

    /// Assemble finalized bodies into a program. Bodies keep their order.
    pub fn into_program(self, bodies: Vec<FunctionBody>, entry: &str) -> Program {
        let index = bodies.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
        let entry = bodies.iter().find(|b| b.name == entry).map(|b| b.id);
        Program {
            declarations: self.declarations.into_values().collect(),
            functions: bodies,
            entry,
            index,
        }
    }
}

impl CodeEmitter for IrBuilder {
    type Function = FunctionId;
    type Region = RegionRef;
    type Slot = SlotId;
    type Value = ValueId;
    type Artifact = FunctionBody;

    fn declare_function(&mut self, name: &str, param_count: usize) -> FunctionId {
        let next = FunctionId(u32::try_from(self.declarations.len()).unwrap_or(u32::MAX));
        let decl = self
            .declarations
            .entry(name.to_string())
            .or_insert_with(|| Declaration { id: next, name: name.to_string(), params: param_count });
        decl.params = param_count;
        decl.id
    }

    fn create_region(&mut self, function: FunctionId, label: &str) -> RegionRef {
        let body = self.body_mut(function);
        let region = RegionId(u32::try_from(body.regions.len()).unwrap_or(u32::MAX));
        body.regions.push(Region {
            label: label.to_string(),
            insts: Vec::new(),
            terminator: None,
        });
        RegionRef { function, region }
    }

    fn set_insertion_point(&mut self, region: RegionRef) {
        self.cursor = Some(region);
    }

    fn allocate_slot(&mut self, region: RegionRef, name: &str) -> SlotId {
        let body = self.body_mut(region.function);
        let id = SlotId(u32::try_from(body.slots.len()).unwrap_or(u32::MAX));
        body.slots.push(SlotInfo { name: name.to_string(), region: region.region });
        id
    }

    fn param(&mut self, _function: FunctionId, index: usize) -> ValueId {
        let dest = self.fresh_value();
        self.push(Inst::Param { dest, index });
        dest
    }

    fn load(&mut self, slot: SlotId) -> ValueId {
        let dest = self.fresh_value();
        self.push(Inst::Load { dest, slot });
        dest
    }

    fn store(&mut self, slot: SlotId, value: ValueId) {
        self.push(Inst::Store { slot, value });
    }

    fn constant(&mut self, constant: Constant) -> ValueId {
        let dest = self.fresh_value();
        self.push(Inst::Const { dest, value: constant });
        dest
    }

    fn primitive(&mut self, op: PrimitiveOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let dest = self.fresh_value();
        self.push(Inst::Primitive { dest, kind: op, lhs, rhs });
        dest
    }

    fn call(&mut self, callee: FunctionId, args: &[ValueId]) -> ValueId {
        let dest = self.fresh_value();
        self.push(Inst::Call { dest, callee, args: args.to_vec() });
        dest
    }

    fn print(&mut self, items: &[ValueId]) {
        self.push(Inst::Print { items: items.to_vec() });
    }

    fn branch_if(&mut self, cond: ValueId, then: RegionRef, otherwise: RegionRef) {
        self.terminate(Terminator::BranchIf {
            cond,
            then: then.region,
            otherwise: otherwise.region,
        });
    }

    fn branch(&mut self, target: RegionRef) {
        self.terminate(Terminator::Branch { target: target.region });
    }

    fn ret(&mut self, value: ValueId) {
        self.terminate(Terminator::Return { value });
    }

    fn is_terminated(&self) -> bool {
        self.cursor
            .and_then(|c| {
                self.building
                    .get(&c.function)?
                    .regions
                    .get(c.region.0 as usize)
                    .map(|r| r.terminator.is_some())
            })
            .unwrap_or(false)
    }

    fn finalize_function(&mut self, function: FunctionId) -> Result<FunctionBody, EmitError> {
        if self.cursor.is_some_and(|c| c.function == function) {
            self.cursor = None;
        }
        let Some(mut body) = self.building.remove(&function) else {
            return Err(EmitError::NoBody { function: self.name_of(function) });
        };
        if let Some(region) = body.regions.iter().find(|r| r.terminator.is_none()) {
            return Err(EmitError::Unterminated {
                function: body.name,
                region: region.label.clone(),
            });
        }
        // The declaration may have been updated after the body was opened.
        if let Some(decl) = self.declarations.get(&body.name) {
            body.params = decl.params;
        }
        Ok(body)
    }

    fn discard_function(&mut self, function: FunctionId) {
        if self.cursor.is_some_and(|c| c.function == function) {
            self.cursor = None;
        }
        self.building.remove(&function);
    }
}

/// A compiled program: every declared function plus the bodies that were
/// successfully lowered.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    pub functions: Vec<FunctionBody>,
    pub entry: Option<FunctionId>,
    #[serde(skip)]
    index: HashMap<FunctionId, usize>,
}

impl Program {
    pub fn function(&self, id: FunctionId) -> Option<&FunctionBody> {
        self.index.get(&id).and_then(|&i| self.functions.get(i))
    }

    pub fn find(&self, name: &str) -> Option<&FunctionBody> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn entry(&self) -> Option<&FunctionBody> {
        self.entry.and_then(|id| self.function(id))
    }

    pub fn declaration(&self, id: FunctionId) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.id == id)
    }

    fn callee_name(&self, id: FunctionId) -> String {
        self.declaration(id).map_or_else(|| format!("#{}", id.0), |d| d.name.clone())
    }
}

// ── Text dump ───────────────────────────────────────────────────────

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{n}"),
            Constant::Text(s) => write!(f, "{s:?}"),
        }
    }
}

fn join(values: &[ValueId]) -> String {
    values.iter().map(|v| format!("v{}", v.0)).collect::<Vec<_>>().join(", ")
}

impl Program {
    fn fmt_inst(&self, f: &mut fmt::Formatter<'_>, inst: &Inst) -> fmt::Result {
        match inst {
            Inst::Const { dest, value } => writeln!(f, "    v{} = const {value}", dest.0),
            Inst::Param { dest, index } => writeln!(f, "    v{} = param {index}", dest.0),
            Inst::Load { dest, slot } => writeln!(f, "    v{} = load s{}", dest.0, slot.0),
            Inst::Store { slot, value } => writeln!(f, "    store s{}, v{}", slot.0, value.0),
            Inst::Primitive { dest, kind, lhs, rhs } => {
                writeln!(f, "    v{} = {} v{}, v{}", dest.0, kind.mnemonic(), lhs.0, rhs.0)
            }
            Inst::Call { dest, callee, args } => {
                writeln!(f, "    v{} = call @{}({})", dest.0, self.callee_name(*callee), join(args))
            }
            Inst::Print { items } => writeln!(f, "    print {}", join(items)),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for decl in &self.declarations {
            if self.function(decl.id).is_none() {
                writeln!(f, "declare @{}({})", decl.name, decl.params)?;
            }
        }
        for func in &self.functions {
            writeln!(f, "fn @{}({}) {{", func.name, func.params)?;
            for (i, slot) in func.slots.iter().enumerate() {
                writeln!(f, "  slot s{i} {} in r{}", slot.name, slot.region.0)?;
            }
            for (i, region) in func.regions.iter().enumerate() {
                writeln!(f, "  r{i}.{}:", region.label)?;
                for inst in &region.insts {
                    self.fmt_inst(f, inst)?;
                }
                match region.terminator {
                    Some(Terminator::Branch { target }) => writeln!(f, "    br r{}", target.0)?,
                    Some(Terminator::BranchIf { cond, then, otherwise }) => {
                        writeln!(f, "    br_if v{}, r{}, r{}", cond.0, then.0, otherwise.0)?;
                    }
                    Some(Terminator::Return { value }) => writeln!(f, "    ret v{}", value.0)?,
                    None => writeln!(f, "    <unterminated>")?,
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
