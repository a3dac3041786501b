use indexmap::IndexMap;

use super::ast::{Pos, ProtoKind, Prototype};
use super::error::CompileError;
use crate::backend::CodeEmitter;

/// Tracks which functions are defined and which are only referenced so far.
///
/// A call to an unknown name synthesizes a placeholder prototype and declares
/// the function with the emitter, so the call site can hold a handle before
/// the definition exists. The real definition later takes over that handle.
#[derive(Debug)]
pub struct Resolver<F> {
    confirmed: IndexMap<String, (Prototype, F)>,
    pending: IndexMap<String, (Prototype, F)>,
    entry: String,
    /// Parameter count of the entry function, fixed the first time it is seen.
    entry_arity: Option<usize>,
}

/// A definition in progress. Hand it back to [`Resolver::abandon`] if the
/// body fails to lower.
#[derive(Debug)]
pub struct Definition<F> {
    pub function: F,
    name: String,
    displaced: Option<(Prototype, F)>,
    /// Placeholders created after this mark came from the body being lowered.
    pending_mark: usize,
    /// Entry arity once the prototype itself was checked. Calls in the body
    /// may fix it further; abandoning the body puts this value back.
    entry_arity: Option<usize>,
}

impl<F: Copy> Resolver<F> {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            confirmed: IndexMap::new(),
            pending: IndexMap::new(),
            entry: entry.into(),
            entry_arity: None,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    fn check_entry_arity(&mut self, name: &str, argc: usize, pos: Pos) -> Result<(), CompileError> {
        if name != self.entry {
            return Ok(());
        }
        match self.entry_arity {
            Some(expected) if expected != argc => Err(CompileError::signature(
                format!("entry function '{name}' takes {expected} arguments, got {argc}"),
                pos,
            )),
            Some(_) => Ok(()),
            None => {
                self.entry_arity = Some(argc);
                Ok(())
            }
        }
    }

    /// Resolve the callee of a call with `argc` arguments.
    pub fn resolve_call<E>(
        &mut self,
        name: &str,
        argc: usize,
        pos: Pos,
        emitter: &mut E,
    ) -> Result<F, CompileError>
    where
        E: CodeEmitter<Function = F>,
    {
        let known = self.confirmed.get(name).or_else(|| self.pending.get(name));
        if let Some((proto, function)) = known {
            if proto.arity() != argc {
                return Err(CompileError::signature(
                    format!("function '{name}' expects {} arguments, got {argc}", proto.arity()),
                    pos,
                ));
            }
            return Ok(*function);
        }

        self.check_entry_arity(name, argc, pos)?;
        let function = emitter.declare_function(name, argc);
        log::trace!("[resolve] placeholder for '{name}' with {argc} parameters");
        self.pending
            .insert(name.to_string(), (Prototype::placeholder(name, argc, pos), function));
        Ok(function)
    }

    /// Handle of an already defined function, used for operator calls.
    pub fn lookup_defined(&self, name: &str) -> Option<F> {
        self.confirmed.get(name).map(|(_, f)| *f)
    }

    /// Make `proto` the authoritative signature for its name.
    pub fn begin_definition<E>(
        &mut self,
        proto: &Prototype,
        emitter: &mut E,
    ) -> Result<Definition<F>, CompileError>
    where
        E: CodeEmitter<Function = F>,
    {
        let name = proto.name.as_str();
        let arity = proto.arity();
        let (label, expected) = match proto.kind {
            ProtoKind::Function => ("", arity),
            ProtoKind::Unary { .. } => ("unary ", 1),
            ProtoKind::Binary { .. } => ("binary ", 2),
        };
        if arity != expected {
            return Err(CompileError::signature(
                format!("{label}operator '{name}' takes {expected} parameters, got {arity}"),
                proto.pos,
            ));
        }
        if self.confirmed.contains_key(name) {
            return Err(CompileError::signature(
                format!("function '{name}' is already defined"),
                proto.pos,
            ));
        }
        if let Some((pending, _)) = self.pending.get(name) {
            if pending.arity() != arity {
                return Err(CompileError::signature(
                    format!(
                        "inconsistent arguments for '{name}': {} at call sites, {arity} in definition",
                        pending.arity()
                    ),
                    proto.pos,
                ));
            }
        }
        self.check_entry_arity(name, arity, proto.pos)?;

        let function = emitter.declare_function(name, arity);
        let displaced = self.pending.shift_remove(name);
        if displaced.is_some() {
            log::trace!("[resolve] '{name}' reconciled with its placeholder");
        }
        self.confirmed.insert(name.to_string(), (proto.clone(), function));
        Ok(Definition {
            function,
            name: name.to_string(),
            displaced,
            pending_mark: self.pending.len(),
            entry_arity: self.entry_arity,
        })
    }

    /// Undo a definition whose body failed. Earlier call sites go back to
    /// referring to a pending placeholder; references made only by the failed
    /// body are forgotten, including what they implied about the entry arity.
    pub fn abandon(&mut self, definition: Definition<F>) {
        self.pending.truncate(definition.pending_mark);
        self.entry_arity = definition.entry_arity;
        self.confirmed.shift_remove(&definition.name);
        if let Some(placeholder) = definition.displaced {
            self.pending.insert(definition.name, placeholder);
        }
    }

    /// Functions that were called but never defined, in first-use order.
    pub fn unresolved(&self) -> impl Iterator<Item = &Prototype> {
        self.pending.values().map(|(p, _)| p)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.confirmed.contains_key(name)
    }
}
