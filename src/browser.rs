//! Generic depth-first tree browser
//!
//! `browse(node)` calls `node.accept_in(visitor)`, browses the children in
//! their stored order, then calls `node.accept_out(visitor)`. Which handler
//! runs is decided by the node itself from its runtime kind; a visitor that
//! does not care about a kind keeps the default no-op handler, and the
//! node's children are browsed anyway.
//!
//! There is no skip or early-exit primitive. The only way a traversal stops
//! before the end is a handler returning an error, which is propagated as is.

use crate::errors::Result;

/// A node that can be browsed with visitors of type `V`
pub trait Browsable<V: ?Sized>: Sized {
    /// Pre-order dispatch to the visitor's start handler for this kind
    fn accept_in(&self, visitor: &mut V) -> Result<()>;

    /// Post-order dispatch to the visitor's end handler for this kind
    fn accept_out(&self, visitor: &mut V) -> Result<()>;

    /// Children in stored order
    fn children(&self) -> Vec<Self>;
}

/// Drives one visitor over a tree.
///
/// The browser holds the visitor mutably for its whole lifetime, so a
/// visitor instance cannot be used by two traversals at once.
pub struct TreeBrowser<'v, V: ?Sized> {
    visitor: &'v mut V,
}

impl<'v, V: ?Sized> TreeBrowser<'v, V> {
    pub fn new(visitor: &'v mut V) -> Self {
        Self { visitor }
    }

    /// Browse `node` and its whole subtree
    pub fn browse<N: Browsable<V>>(&mut self, node: N) -> Result<()> {
        node.accept_in(self.visitor)?;

        for child in node.children() {
            self.browse(child)?;
        }

        node.accept_out(self.visitor)
    }

    /// Give the visitor back, e.g. to collect its results
    pub fn visitor(&mut self) -> &mut V {
        self.visitor
    }
}

/// Browse `node` with `visitor` in one call
pub fn browse<V: ?Sized, N: Browsable<V>>(visitor: &mut V, node: N) -> Result<()> {
    TreeBrowser::new(visitor).browse(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny tree used to check the traversal contract
    #[derive(Clone, Copy)]
    struct Node<'a> {
        name: &'static str,
        kids: &'a [Node<'a>],
    }

    trait Recorder {
        fn start(&mut self, name: &str) -> Result<()>;
        fn end(&mut self, name: &str) -> Result<()>;
    }

    impl<'a, V: Recorder> Browsable<V> for Node<'a> {
        fn accept_in(&self, visitor: &mut V) -> Result<()> {
            visitor.start(self.name)
        }
        fn accept_out(&self, visitor: &mut V) -> Result<()> {
            visitor.end(self.name)
        }
        fn children(&self) -> Vec<Self> {
            self.kids.to_vec()
        }
    }

    #[derive(Default)]
    struct Log {
        events: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Recorder for Log {
        fn start(&mut self, name: &str) -> Result<()> {
            if self.fail_on == Some(name) {
                return Err(internal_error!(0, "refusing {}", name));
            }
            self.events.push(format!("+{}", name));
            Ok(())
        }
        fn end(&mut self, name: &str) -> Result<()> {
            self.events.push(format!("-{}", name));
            Ok(())
        }
    }

    const LEAVES: [Node<'static>; 2] = [
        Node { name: "b", kids: &[] },
        Node { name: "c", kids: &[] },
    ];

    #[test]
    fn test_pre_and_post_order_are_paired() {
        let root = Node { name: "a", kids: &LEAVES };
        let mut log = Log::default();
        browse(&mut log, root).unwrap();
        assert_eq!(log.events, vec!["+a", "+b", "-b", "+c", "-c", "-a"]);
    }

    #[test]
    fn test_error_stops_traversal() {
        let root = Node { name: "a", kids: &LEAVES };
        let mut log = Log {
            fail_on: Some("b"),
            ..Default::default()
        };
        let err = browse(&mut log, root).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(log.events, vec!["+a"], "nothing runs after a failing handler");
    }
}
