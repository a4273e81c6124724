//! Scope restoration on every exit path
//!
//! A traversal pushes scope state on entry and pops it on exit. When a
//! handler fails half way, the exit handlers never run, so the state is
//! restored from a mark taken beforehand instead. [`ScopeGuard`] takes that
//! mark on creation and unwinds to it when dropped, unless the scope was
//! committed.

use std::ops::{Deref, DerefMut};

/// State that can be snapshot and restored
pub trait Scoped {
    type Mark;

    fn mark(&self) -> Self::Mark;

    fn unwind_to(&mut self, mark: Self::Mark);
}

pub struct ScopeGuard<'a, S: Scoped> {
    scoped: &'a mut S,
    mark: Option<S::Mark>,
}

impl<'a, S: Scoped> ScopeGuard<'a, S> {
    pub fn new(scoped: &'a mut S) -> Self {
        let mark = scoped.mark();
        Self {
            scoped,
            mark: Some(mark),
        }
    }

    /// Keep the state as it is now
    pub fn commit(mut self) {
        self.mark = None;
    }
}

impl<S: Scoped> Deref for ScopeGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.scoped
    }
}

impl<S: Scoped> DerefMut for ScopeGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.scoped
    }
}

impl<S: Scoped> Drop for ScopeGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(mark) = self.mark.take() {
            log::debug!("unwinding scope state after an early exit");
            self.scoped.unwind_to(mark);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;

    #[derive(Default)]
    struct Depth {
        open: Vec<u32>,
    }

    impl Scoped for Depth {
        type Mark = usize;

        fn mark(&self) -> usize {
            self.open.len()
        }

        fn unwind_to(&mut self, mark: usize) {
            self.open.truncate(mark);
        }
    }

    fn open_and_fail(depth: &mut Depth) -> Result<()> {
        let mut guard = ScopeGuard::new(depth);
        guard.open.push(1);
        guard.open.push(2);
        Err(internal_error!(3, "failure inside the scope"))
    }

    #[test]
    fn test_guard_unwinds_on_error() {
        let mut depth = Depth::default();
        depth.open.push(0);
        assert!(open_and_fail(&mut depth).is_err());
        assert_eq!(depth.open, vec![0], "scopes opened inside the guard are dropped");
    }

    #[test]
    fn test_committed_guard_keeps_state() {
        let mut depth = Depth::default();
        let mut guard = ScopeGuard::new(&mut depth);
        guard.open.push(7);
        guard.commit();
        assert_eq!(depth.open, vec![7]);
    }
}
