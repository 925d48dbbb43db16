use crate::frame::{Frame, HashFrame};
use crate::types::{Cell, Operator};
use std::fmt;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use thiserror::Error;
use tracing::debug;

// --- Environment Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Unbound symbol: '{0}'")]
    UnboundSymbol(String),
    #[error("Cannot bind reserved operator name '{0}'")]
    ReservedName(String),
    #[error("'{0}' is already defined")]
    DuplicateDefinition(String),
}

// --- Environment Definition ---

/// The scope stack: frame 0 holds the global definitions and is never
/// popped; every procedure call pushes one frame on top for its parameters.
///
/// Lookups run from the innermost frame outwards. The environment also owns
/// the sink `print` writes to, so independent interpreters never share state.
pub struct Environment<F: Frame = HashFrame> {
    frames: Vec<F>,
    output: Box<dyn Write>,
}

impl Environment {
    /// Creates an environment with hash-table frames, printing to stdout.
    pub fn new() -> Self {
        Environment::default()
    }
}

impl<F: Frame> Default for Environment<F> {
    fn default() -> Self {
        Environment {
            frames: vec![F::default()],
            output: Box::new(io::stdout()),
        }
    }
}

impl<F: Frame> Environment<F> {
    /// Redirects `print` output.
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    /// Number of frames on the stack, the global frame included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Resolves `name`, innermost frame first.
    /// Returns an independent copy of the stored value.
    pub fn lookup(&self, name: &str) -> Result<Cell, EnvError> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.find(name))
            .cloned()
            .ok_or_else(|| EnvError::UnboundSymbol(name.to_string()))
    }

    pub fn is_globally_bound(&self, name: &str) -> bool {
        self.global().find(name).is_some()
    }

    /// Binds `name` in the global frame, whatever the current call depth.
    /// Definitions are write-once.
    pub fn define_global(&mut self, name: &str, value: Cell) -> Result<(), EnvError> {
        if Operator::is_reserved(name) {
            return Err(EnvError::ReservedName(name.to_string()));
        }
        let kind = value.type_name();
        let global = &mut self.frames[0];
        if global.insert(name.to_string(), value) {
            debug!(symbol = name, kind, "defined global");
            Ok(())
        } else {
            Err(EnvError::DuplicateDefinition(name.to_string()))
        }
    }

    /// Names bound in the global frame, sorted.
    pub fn global_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.global().iter().map(|(name, _)| name.clone()).collect();
        names.sort();
        names
    }

    /// Pushes `frame` for the lifetime of the returned guard.
    ///
    /// The frame is popped when the guard drops, so an error propagated with
    /// `?` out of a procedure body still unwinds the stack.
    pub fn push_frame(&mut self, frame: F) -> FrameGuard<'_, F> {
        self.frames.push(frame);
        debug!(depth = self.frames.len(), "pushed frame");
        FrameGuard { env: self }
    }

    fn pop_frame(&mut self) {
        // The global frame stays put
        if self.frames.len() > 1 {
            self.frames.pop();
        }
        debug!(depth = self.frames.len(), "popped frame");
    }

    fn global(&self) -> &F {
        &self.frames[0]
    }
}

impl<F: Frame> fmt::Debug for Environment<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

/// A pushed frame. Dereferences to the environment it was pushed onto.
pub struct FrameGuard<'env, F: Frame> {
    env: &'env mut Environment<F>,
}

impl<F: Frame> Deref for FrameGuard<'_, F> {
    type Target = Environment<F>;

    fn deref(&self) -> &Environment<F> {
        self.env
    }
}

impl<F: Frame> DerefMut for FrameGuard<'_, F> {
    fn deref_mut(&mut self) -> &mut Environment<F> {
        self.env
    }
}

impl<F: Frame> Drop for FrameGuard<'_, F> {
    fn drop(&mut self) {
        self.env.pop_frame();
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::OrderedFrame;
    use pretty_assertions::assert_eq;

    fn frame_with<F: Frame>(bindings: &[(&str, Cell)]) -> F {
        let mut frame = F::default();
        for (name, value) in bindings {
            frame.insert(name.to_string(), value.clone());
        }
        frame
    }

    #[test]
    fn test_define_and_lookup_global() {
        let mut env = Environment::new();
        env.define_global("x", Cell::from(10)).unwrap();

        assert_eq!(env.lookup("x"), Ok(Cell::Integer(10)));
        assert!(env.is_globally_bound("x"));
    }

    #[test]
    fn test_lookup_unbound() {
        let env = Environment::new();
        assert_eq!(
            env.lookup("y"),
            Err(EnvError::UnboundSymbol("y".to_string()))
        );
    }

    #[test]
    fn test_define_is_write_once() {
        let mut env = Environment::new();
        env.define_global("x", Cell::from(1)).unwrap();
        assert_eq!(
            env.define_global("x", Cell::from(2)),
            Err(EnvError::DuplicateDefinition("x".to_string()))
        );
        assert_eq!(env.lookup("x"), Ok(Cell::Integer(1)));
    }

    #[test]
    fn test_define_rejects_reserved_names() {
        let mut env = Environment::new();
        for name in ["+", "lambda", "nullp", "listp"] {
            assert_eq!(
                env.define_global(name, Cell::from(1)),
                Err(EnvError::ReservedName(name.to_string()))
            );
        }
        assert!(env.global_names().is_empty());
    }

    #[test]
    fn test_innermost_frame_wins() {
        let mut env = Environment::new();
        env.define_global("x", Cell::from(10)).unwrap();

        let mut outer = env.push_frame(frame_with(&[("x", Cell::from(50))]));
        let inner = outer.push_frame(frame_with(&[("y", Cell::symbol("y-value"))]));

        assert_eq!(inner.lookup("x"), Ok(Cell::Integer(50)));
        assert_eq!(inner.lookup("y"), Ok(Cell::symbol("y-value")));
        assert_eq!(inner.depth(), 3);
    }

    #[test]
    fn test_guard_pops_frame() {
        let mut env = Environment::new();
        env.define_global("x", Cell::from(10)).unwrap();
        {
            let scope = env.push_frame(frame_with(&[("x", Cell::from(50)), ("y", Cell::from(1))]));
            assert_eq!(scope.depth(), 2);
            assert_eq!(scope.lookup("x"), Ok(Cell::Integer(50)));
        }
        assert_eq!(env.depth(), 1);
        assert_eq!(env.lookup("x"), Ok(Cell::Integer(10)));
        assert!(env.lookup("y").is_err());
    }

    #[test]
    fn test_define_inside_frame_goes_global() {
        let mut env = Environment::new();
        {
            let mut scope = env.push_frame(HashFrame::default());
            scope.define_global("z", Cell::from(3)).unwrap();
        }
        assert_eq!(env.lookup("z"), Ok(Cell::Integer(3)));
    }

    #[test]
    fn test_lookup_returns_a_copy() {
        let mut env = Environment::new();
        env.define_global("xs", Cell::list([Cell::from(1), Cell::from(2)]))
            .unwrap();

        let mut copy = env.lookup("xs").unwrap();
        if let Cell::Pair(car, _) = &mut copy {
            **car = Cell::from(7);
        }
        assert_eq!(
            env.lookup("xs"),
            Ok(Cell::list([Cell::from(1), Cell::from(2)]))
        );
    }

    #[test]
    fn test_ordered_backend() {
        let mut env = Environment::<OrderedFrame>::default();
        env.define_global("b", Cell::from(2)).unwrap();
        env.define_global("a", Cell::from(1)).unwrap();
        assert_eq!(env.global_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(env.lookup("a"), Ok(Cell::Integer(1)));
    }
}
