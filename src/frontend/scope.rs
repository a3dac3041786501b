use std::collections::HashMap;

/// Lexically scoped name → slot bindings with shadow/restore.
///
/// Each frame remembers, for every name it declared, what that name was bound
/// to before. Leaving the frame restores those bindings in reverse order.
#[derive(Debug)]
pub struct ScopeStack<S> {
    bindings: HashMap<String, S>,
    frames: Vec<Vec<(String, Option<S>)>>,
}

impl<S> Default for ScopeStack<S> {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
            frames: Vec::new(),
        }
    }
}

impl<S: Copy> ScopeStack<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn exit_scope(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        for (name, shadowed) in frame.into_iter().rev() {
            match shadowed {
                Some(slot) => {
                    self.bindings.insert(name, slot);
                }
                None => {
                    self.bindings.remove(&name);
                }
            }
        }
    }

    /// Bind `name` in the innermost frame. Declaring with no frame open binds
    /// permanently until the next [`ScopeStack::reset`].
    pub fn declare(&mut self, name: &str, slot: S) {
        let shadowed = self.bindings.insert(name.to_string(), slot);
        if let Some(frame) = self.frames.last_mut() {
            frame.push((name.to_string(), shadowed));
        }
    }

    pub fn lookup(&self, name: &str) -> Option<S> {
        self.bindings.get(name).copied()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop every binding and frame. Called at each function boundary.
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_binding_shadows_and_restores() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.declare("x", 1);
        scopes.enter_scope();
        scopes.declare("x", 2);
        assert_eq!(scopes.lookup("x"), Some(2));
        scopes.exit_scope();
        assert_eq!(scopes.lookup("x"), Some(1));
        scopes.exit_scope();
        assert_eq!(scopes.lookup("x"), None);
    }

    #[test]
    fn names_unbound_before_a_scope_are_unbound_after() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.declare("outer", 10);
        scopes.enter_scope();
        scopes.declare("inner", 11);
        scopes.exit_scope();
        assert_eq!(scopes.lookup("inner"), None);
        assert_eq!(scopes.lookup("outer"), Some(10));
    }

    #[test]
    fn redeclaring_in_one_frame_restores_the_outer_binding() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.declare("a", 1);
        scopes.enter_scope();
        scopes.declare("a", 2);
        scopes.declare("a", 3);
        assert_eq!(scopes.lookup("a"), Some(3));
        scopes.exit_scope();
        assert_eq!(scopes.lookup("a"), Some(1));
    }

    #[test]
    fn lookup_sees_innermost_at_every_depth() {
        let mut scopes = ScopeStack::new();
        for depth in 0..5 {
            scopes.enter_scope();
            scopes.declare("v", depth);
            assert_eq!(scopes.lookup("v"), Some(depth));
            assert_eq!(scopes.depth(), usize::try_from(depth).unwrap_or(0) + 1);
        }
        for depth in (0..5).rev() {
            assert_eq!(scopes.lookup("v"), Some(depth));
            scopes.exit_scope();
        }
        assert_eq!(scopes.lookup("v"), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.declare("p", 0u32);
        scopes.reset();
        assert_eq!(scopes.depth(), 0);
        assert_eq!(scopes.lookup("p"), None);
        // Unbalanced exit is a no-op.
        scopes.exit_scope();
    }
}
