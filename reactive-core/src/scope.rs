//! Structured ownership boundaries for disposal.
//!
//! Every signal, computed and effect is owned by whichever scope (or, while
//! evaluating, effect/computed) was current when it was created. Disposing a
//! scope recursively disposes everything it owns, bottom-up: children
//! first, then this node's own `on_cleanup` callbacks, mirroring
//! [`crate::node::ReactiveNode`]'s parent/children bookkeeping.

use crate::error::ReactiveError;
use crate::node::{NodeId, NodeKind};
use crate::root::Root;

/// A disposable ownership boundary. Cheap to copy; disposing one instance
/// invalidates every other handle to the same scope.
#[derive(Clone, Copy)]
pub struct Scope {
    pub(crate) id: NodeId,
}

impl Scope {
    /// Dispose this scope and everything it owns.
    pub fn dispose(self) {
        Root::with(|root| self.id.dispose_subtree(root));
    }

    pub fn is_disposed(&self) -> bool {
        Root::with(|root| root.nodes.borrow().get(self.id).is_none())
    }

    /// Register `f` to run when this scope is disposed. Fails with
    /// [`ReactiveError::DisposedScope`] if the scope has already been
    /// disposed rather than silently dropping `f`.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) -> Result<(), ReactiveError> {
        Root::with(|root| {
            let mut nodes = root.nodes.borrow_mut();
            match nodes.get_mut(self.id) {
                Some(node) => {
                    node.cleanups.push(Box::new(f));
                    Ok(())
                }
                None => Err(ReactiveError::DisposedScope),
            }
        })
    }

    /// Run `f` with this scope as the owner of anything it creates. Fails
    /// with [`ReactiveError::DisposedScope`] instead of running `f` if this
    /// scope was already disposed.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> Result<T, ReactiveError> {
        if self.is_disposed() {
            return Err(ReactiveError::DisposedScope);
        }
        Ok(Root::with(|root| root.with_owner(self.id, f)))
    }
}

/// Create a scope nested under whichever scope is currently active, run `f`
/// inside it immediately, and return a handle for later disposal.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_child_scope<T>(f: impl FnOnce(Scope) -> T) -> (Scope, T) {
    let id = Root::with(|root| {
        let owner = root.current_owner.get();
        root.insert_node(NodeKind::Scope, owner)
    });
    let scope = Scope { id };
    let result = Root::with(|root| root.with_owner(id, || f(scope)));
    (scope, result)
}

/// Read the scope that currently owns anything created right now — the
/// imperative counterpart to [`create_child_scope`]'s closure-scoped
/// ownership, for callers that need to read or stash the ambient scope
/// outside of a callback (e.g. framework integrations driving their own
/// ownership stack).
pub fn active_scope() -> Scope {
    Root::with(|root| Scope {
        id: root.current_owner.get(),
    })
}

/// Imperatively set the ambient owner scope that newly created
/// signals/computeds/effects/scopes attach to. Pass `None` to clear it back
/// to the root scope. Returns the previous active scope so a caller can
/// restore it afterwards.
pub fn set_active_scope(scope: Option<Scope>) -> Scope {
    Root::with(|root| {
        let id = scope.map(|s| s.id).unwrap_or_else(|| root.root_node.get());
        Scope {
            id: root.current_owner.replace(id),
        }
    })
}

/// Register `f` against the innermost active owner — a [`Scope`], or
/// whichever effect/computed is currently (re-)evaluating — to run before
/// that owner's next re-evaluation, or at its disposal, whichever comes
/// first. A no-op if called with no active owner at all, which cannot
/// happen once [`crate::create_root`] has run (it always leaves a root
/// scope as owner).
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    Root::with(|root| {
        let owner = root.current_owner.get();
        if let Some(node) = root.nodes.borrow_mut().get_mut(owner) {
            node.cleanups.push(Box::new(f));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::create_root;
    use crate::signal::signal;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn disposing_a_scope_runs_its_cleanups_bottom_up() {
        create_root(|| {
            let order = Rc::new(std::cell::RefCell::new(Vec::new()));
            let (outer, _) = create_child_scope(|_outer| {
                let order1 = order.clone();
                on_cleanup(move || order1.borrow_mut().push("outer"));
                let (_inner, _) = create_child_scope(|_inner| {
                    let order2 = order.clone();
                    on_cleanup(move || order2.borrow_mut().push("inner"));
                });
            });
            outer.dispose();
            assert_eq!(*order.borrow(), vec!["inner", "outer"]);
        });
    }

    #[test]
    fn disposing_a_scope_disposes_signals_created_inside_it() {
        create_root(|| {
            let (scope, s) = create_child_scope(|_| signal(1));
            assert_eq!(s.get(), 1);
            scope.dispose();
            assert!(scope.is_disposed());
        });
    }

    #[test]
    fn operations_on_a_disposed_scope_report_an_error() {
        create_root(|| {
            let (scope, _) = create_child_scope(|_| ());
            scope.dispose();
            assert!(matches!(
                scope.on_cleanup(|| {}),
                Err(ReactiveError::DisposedScope)
            ));
            assert!(matches!(scope.run(|| 1), Err(ReactiveError::DisposedScope)));
        });
    }

    #[test]
    fn disposing_an_effects_scope_stops_it_from_rerunning() {
        create_root(|| {
            let s = signal(1);
            let runs = Rc::new(Cell::new(0));
            let (scope, ()) = create_child_scope(|_| {
                let runs2 = runs.clone();
                crate::effect::effect(move || {
                    s.get();
                    runs2.set(runs2.get() + 1);
                });
            });
            assert_eq!(runs.get(), 1);
            scope.dispose();
            s.set(2);
            crate::root::flush();
            assert_eq!(runs.get(), 1);
        });
    }

    #[test]
    fn set_active_scope_redirects_ownership_imperatively() {
        create_root(|| {
            let (held, _) = create_child_scope(|_| ());
            let previous = set_active_scope(Some(held));
            assert_eq!(active_scope().id, held.id);
            let s = signal(1);
            set_active_scope(Some(previous));

            assert_eq!(s.get(), 1);
            held.dispose();
            assert!(
                Root::with(|root| root.nodes.borrow().get(s.id).is_none()),
                "the signal created while `held` was active must be disposed with it"
            );
        });
    }

    #[test]
    fn set_active_scope_with_none_clears_back_to_root() {
        create_root(|| {
            let root_scope = active_scope();
            let (held, _) = create_child_scope(|_| ());
            set_active_scope(Some(held));
            set_active_scope(None);
            assert_eq!(active_scope().id, root_scope.id);
        });
    }
}
