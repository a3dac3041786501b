use super::ast::Function;
use super::error::{CompileError, Diagnostics};
use super::lower::lower_function;
use super::parser::{Parsed, Parser};
use super::state::CompilerState;
use crate::backend::CodeEmitter;
use crate::config::CompilerConfig;

/// One compiler instance: parses a function, lowers it, then moves on to the
/// next, so operator definitions affect everything after them.
pub struct Session<'e, E: CodeEmitter> {
    state: CompilerState<E>,
    emitter: &'e mut E,
    strict_forward_refs: bool,
}

impl<'e, E: CodeEmitter> Session<'e, E> {
    pub fn new(emitter: &'e mut E, config: &CompilerConfig) -> Self {
        Self {
            state: CompilerState::new(&config.entry),
            emitter,
            strict_forward_refs: config.strict_forward_refs,
        }
    }

    /// Lower a single parsed function, reporting failure to `diags`.
    pub fn compile_function(
        &mut self,
        func: &Function,
        diags: &mut dyn Diagnostics,
    ) -> Option<E::Artifact> {
        match lower_function(func, &mut self.state, &mut *self.emitter) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                diags.report(e);
                None
            }
        }
    }

    /// Drive `parser` to the end of its input.
    pub fn compile_all<I: Iterator<Item = char>>(
        &mut self,
        parser: &mut Parser<I>,
        diags: &mut dyn Diagnostics,
    ) -> Vec<E::Artifact> {
        let mut artifacts = Vec::new();
        loop {
            match parser.next_function(&self.state.operators, diags) {
                Parsed::Function(func) => {
                    if let Some(artifact) = self.compile_function(&func, diags) {
                        artifacts.push(artifact);
                    }
                }
                Parsed::Failed => {}
                Parsed::End => return artifacts,
            }
        }
    }

    /// End-of-input checks: every referenced function must have been defined.
    pub fn finish(self, diags: &mut dyn Diagnostics) {
        for proto in self.state.resolver.unresolved() {
            if self.strict_forward_refs {
                diags.report(CompileError::signature(
                    format!("undefined function '{}'", proto.name),
                    proto.pos,
                ));
            } else {
                log::warn!("[session] '{}' is called but never defined", proto.name);
            }
        }
        if !self.state.resolver.is_defined(self.state.resolver.entry()) {
            log::info!("[session] no '{}' function defined", self.state.resolver.entry());
        }
    }
}
