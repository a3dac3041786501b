use super::operators::OperatorTable;
use super::resolve::Resolver;
use super::scope::ScopeStack;
use crate::backend::CodeEmitter;

/// Everything one compiler instance carries from function to function.
pub struct CompilerState<E: CodeEmitter> {
    pub operators: OperatorTable,
    pub scopes: ScopeStack<E::Slot>,
    pub resolver: Resolver<E::Function>,
}

impl<E: CodeEmitter> CompilerState<E> {
    pub fn new(entry: &str) -> Self {
        Self {
            operators: OperatorTable::new(),
            scopes: ScopeStack::new(),
            resolver: Resolver::new(entry),
        }
    }
}
