//! Lowers one parsed function at a time through a [`CodeEmitter`].
//!
//! Every statement yields a value; the last one becomes the implicit return
//! value when control falls off the end of the function. `IF` results and
//! `WHILE` conditions go through slots, so no merge instruction is needed.

use super::ast::{binary_fn_name, unary_fn_name, Binding, Expr, ExprKind, Function, Pos, Stmt, StmtKind};
use super::error::CompileError;
use super::resolve::Resolver;
use super::scope::ScopeStack;
use super::state::CompilerState;
use crate::backend::{CodeEmitter, Constant, PrimitiveOp};

/// Lower `func`. On failure the partial body is discarded and every change
/// to `state` made for this function is rolled back.
pub fn lower_function<E: CodeEmitter>(
    func: &Function,
    state: &mut CompilerState<E>,
    emitter: &mut E,
) -> Result<E::Artifact, CompileError> {
    state.scopes.reset();
    let definition = state.resolver.begin_definition(&func.proto, emitter)?;
    let previous_op = state.operators.define(func.proto.kind);
    let function = definition.function;

    let mut lowerer = Lowerer::start(emitter, &mut state.scopes, &mut state.resolver, function);
    let result = lowerer.lower_body(func);
    let regions = lowerer.regions;

    match result {
        Ok(artifact) => {
            log::debug!("[lower] '{}' lowered into {regions} regions", func.proto.name);
            Ok(artifact)
        }
        Err(e) => {
            emitter.discard_function(function);
            state.resolver.abandon(definition);
            if let Some(entry) = previous_op {
                state.operators.restore(entry);
            }
            state.scopes.reset();
            log::debug!("[lower] '{}' discarded: {}", func.proto.name, e.message);
            Err(e)
        }
    }
}

struct Lowerer<'a, E: CodeEmitter> {
    emitter: &'a mut E,
    scopes: &'a mut ScopeStack<E::Slot>,
    resolver: &'a mut Resolver<E::Function>,
    function: E::Function,
    /// Slots are allocated here, whatever region declares them.
    entry: E::Region,
    /// Re-test regions of the enclosing loops, innermost last.
    loops: Vec<E::Region>,
    regions: usize,
}

impl<'a, E: CodeEmitter> Lowerer<'a, E> {
    fn start(
        emitter: &'a mut E,
        scopes: &'a mut ScopeStack<E::Slot>,
        resolver: &'a mut Resolver<E::Function>,
        function: E::Function,
    ) -> Self {
        let entry = emitter.create_region(function, "entry");
        emitter.set_insertion_point(entry);
        Self {
            emitter,
            scopes,
            resolver,
            function,
            entry,
            loops: Vec::new(),
            regions: 1,
        }
    }

    fn lower_body(&mut self, func: &Function) -> Result<E::Artifact, CompileError> {
        self.scopes.enter_scope();
        for (index, name) in func.proto.params.iter().enumerate() {
            let slot = self.emitter.allocate_slot(self.entry, name);
            let value = self.emitter.param(self.function, index);
            self.emitter.store(slot, value);
            self.scopes.declare(name, slot);
        }

        let value = self.lower_stmt(&func.body)?;
        if !self.emitter.is_terminated() {
            self.emitter.ret(value);
        }
        self.scopes.exit_scope();

        self.emitter
            .finalize_function(self.function)
            .map_err(|e| CompileError::lowering(e.to_string(), func.proto.pos))
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn region(&mut self, label: &str) -> E::Region {
        self.regions += 1;
        self.emitter.create_region(self.function, label)
    }

    /// Continue in a fresh region after a terminator so later statements
    /// still have somewhere to go. Nothing branches into it.
    fn open_dead_region(&mut self, label: &str) {
        let region = self.region(label);
        self.emitter.set_insertion_point(region);
    }

    fn zero(&mut self) -> E::Value {
        self.emitter.constant(Constant::Number(0.0))
    }

    /// Compare against zero, yielding 1.0 or 0.0.
    fn truthy(&mut self, value: E::Value) -> E::Value {
        let zero = self.zero();
        self.emitter.primitive(PrimitiveOp::Ne, value, zero)
    }

    fn slot_of(&self, name: &str, pos: Pos) -> Result<E::Slot, CompileError> {
        self.scopes
            .lookup(name)
            .ok_or_else(|| CompileError::binding(format!("unknown variable '{name}'"), pos))
    }

    /// Evaluate each initializer, then bind its name. A later initializer
    /// sees the earlier bindings; an initializer never sees its own name.
    fn declare_bindings(&mut self, bindings: &[Binding]) -> Result<(), CompileError> {
        for binding in bindings {
            let value = match &binding.init {
                Some(init) => self.lower_expr(init)?,
                None => self.zero(),
            };
            let slot = self.emitter.allocate_slot(self.entry, &binding.name);
            self.emitter.store(slot, value);
            self.scopes.declare(&binding.name, slot);
        }
        Ok(())
    }

    // ── Expressions ────────────────────────────────────────────────

    fn lower_expr(&mut self, expr: &Expr) -> Result<E::Value, CompileError> {
        match &expr.kind {
            ExprKind::Number { value } => Ok(self.emitter.constant(Constant::Number(*value))),
            ExprKind::Text { value } => Ok(self.emitter.constant(Constant::Text(value.clone()))),
            ExprKind::Variable { name } => {
                let slot = self.slot_of(name, expr.pos)?;
                Ok(self.emitter.load(slot))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.lower_expr(operand)?;
                let callee = self.resolver.lookup_defined(&unary_fn_name(*op)).ok_or_else(|| {
                    CompileError::lowering(format!("unknown unary operator '{op}'"), expr.pos)
                })?;
                Ok(self.emitter.call(callee, &[value]))
            }
            ExprKind::Binary { op: '=', lhs, rhs } => {
                let ExprKind::Variable { name } = &lhs.kind else {
                    return Err(CompileError::lowering(
                        "destination of '=' must be a variable",
                        lhs.pos,
                    ));
                };
                let value = self.lower_expr(rhs)?;
                let slot = self.slot_of(name, lhs.pos)?;
                self.emitter.store(slot, value);
                Ok(value)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.lower_expr(lhs)?;
                let r = self.lower_expr(rhs)?;
                if let Some(prim) = PrimitiveOp::from_symbol(*op) {
                    return Ok(self.emitter.primitive(prim, l, r));
                }
                let callee = self.resolver.lookup_defined(&binary_fn_name(*op)).ok_or_else(|| {
                    CompileError::lowering(format!("unknown binary operator '{op}'"), expr.pos)
                })?;
                Ok(self.emitter.call(callee, &[l, r]))
            }
            ExprKind::Call { callee, args } => {
                let function = self.resolver.resolve_call(callee, args.len(), expr.pos, &mut *self.emitter)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.lower_expr(arg)?);
                }
                Ok(self.emitter.call(function, &values))
            }
            ExprKind::Var { bindings, body } => {
                self.scopes.enter_scope();
                self.declare_bindings(bindings)?;
                let value = self.lower_expr(body)?;
                self.scopes.exit_scope();
                Ok(value)
            }
        }
    }

    // ── Statements ─────────────────────────────────────────────────

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<E::Value, CompileError> {
        match &stmt.kind {
            StmtKind::Assign { name, value } => {
                let value = self.lower_expr(value)?;
                let slot = self.slot_of(name, stmt.pos)?;
                self.emitter.store(slot, value);
                Ok(value)
            }
            StmtKind::Return { value } => {
                let value = self.lower_expr(value)?;
                self.emitter.ret(value);
                self.open_dead_region("after.return");
                Ok(value)
            }
            StmtKind::Print { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.lower_expr(item)?);
                }
                self.emitter.print(&values);
                Ok(self.zero())
            }
            // CONTINUE jumps to the loop's `loop.next` region, never straight
            // into the body: the condition is always tested again, so a loop
            // whose every pass ends in CONTINUE still terminates.
            StmtKind::Continue => {
                let Some(&target) = self.loops.last() else {
                    return Err(CompileError::lowering("CONTINUE outside of a loop", stmt.pos));
                };
                self.emitter.branch(target);
                self.open_dead_region("after.continue");
                Ok(self.zero())
            }
            StmtKind::If { cond, then, otherwise } => {
                self.lower_if(cond, then, otherwise.as_deref())
            }
            StmtKind::While { cond, body } => self.lower_while(cond, body),
            StmtKind::Block { declared, body } => {
                self.scopes.enter_scope();
                self.declare_bindings(declared)?;
                let mut last = None;
                for stmt in body {
                    last = Some(self.lower_stmt(stmt)?);
                }
                self.scopes.exit_scope();
                Ok(match last {
                    Some(value) => value,
                    None => self.zero(),
                })
            }
            StmtKind::VarDecl { bindings, body } => {
                self.scopes.enter_scope();
                self.declare_bindings(bindings)?;
                let value = self.lower_stmt(body)?;
                self.scopes.exit_scope();
                Ok(value)
            }
        }
    }

    /// Lower one arm in its own scope and route its value to `merge`.
    fn lower_arm(&mut self, arm: &Stmt, result: E::Slot, merge: E::Region) -> Result<(), CompileError> {
        self.scopes.enter_scope();
        let value = self.lower_stmt(arm)?;
        self.scopes.exit_scope();
        if !self.emitter.is_terminated() {
            self.emitter.store(result, value);
            self.emitter.branch(merge);
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then: &Stmt,
        otherwise: Option<&Stmt>,
    ) -> Result<E::Value, CompileError> {
        let cond = self.lower_expr(cond)?;
        let flag = self.truthy(cond);

        let result = self.emitter.allocate_slot(self.entry, "if.result");
        let zero = self.zero();
        self.emitter.store(result, zero);

        let then_region = self.region("then");
        let else_region = otherwise.map(|_| self.region("else"));
        let merge = self.region("merge");
        self.emitter.branch_if(flag, then_region, else_region.unwrap_or(merge));

        self.emitter.set_insertion_point(then_region);
        self.lower_arm(then, result, merge)?;

        if let (Some(region), Some(arm)) = (else_region, otherwise) {
            self.emitter.set_insertion_point(region);
            self.lower_arm(arm, result, merge)?;
        }

        self.emitter.set_insertion_point(merge);
        Ok(self.emitter.load(result))
    }

    /// The current region tests the condition once before the first pass.
    /// `loop.next` tests it after every pass and is where CONTINUE lands.
    fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> Result<E::Value, CompileError> {
        let flag = self.emitter.allocate_slot(self.entry, "while.cond");
        let body_region = self.region("loop");
        let retest = self.region("loop.next");
        let after = self.region("after.loop");

        self.branch_on_condition(cond, flag, body_region, after)?;

        self.emitter.set_insertion_point(body_region);
        self.loops.push(retest);
        self.scopes.enter_scope();
        self.lower_stmt(body)?;
        self.scopes.exit_scope();
        self.loops.pop();
        if !self.emitter.is_terminated() {
            self.emitter.branch(retest);
        }

        self.emitter.set_insertion_point(retest);
        self.branch_on_condition(cond, flag, body_region, after)?;

        self.emitter.set_insertion_point(after);
        Ok(self.zero())
    }

    fn branch_on_condition(
        &mut self,
        cond: &Expr,
        flag: E::Slot,
        taken: E::Region,
        not_taken: E::Region,
    ) -> Result<(), CompileError> {
        let value = self.lower_expr(cond)?;
        let truth = self.truthy(value);
        self.emitter.store(flag, truth);
        let current = self.emitter.load(flag);
        self.emitter.branch_if(current, taken, not_taken);
        Ok(())
    }
}
