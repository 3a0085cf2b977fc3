//! Memoized derivations with lazy, pull-based re-evaluation.

use std::any::Any;
use std::marker::PhantomData;

use crate::error::ReactiveError;
use crate::node::{catch_fault, NodeId, NodeKind, NodeState};
use crate::root::Root;

/// A lazily-evaluated derived value. Cheap to pass around (`Copy`, carries
/// only an id); the actual memoized value lives in the graph and is shared
/// by every clone of this handle.
pub struct Computed<T: 'static> {
    pub(crate) id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: 'static> Copy for Computed<T> {}

/// Create a computed whose value is derived by `f`. Every recomputation
/// notifies downstream consumers; use [`computed_with`] to bail out when the
/// new value compares equal to the old one.
#[cfg_attr(debug_assertions, track_caller)]
pub fn computed<T: 'static>(f: impl FnMut() -> T + 'static) -> Computed<T> {
    computed_with(f, |_, _| false)
}

/// Create a computed with a custom equality function deciding whether a
/// freshly recomputed value should be treated as unchanged (no version bump,
/// no notification) relative to the previous one.
#[cfg_attr(debug_assertions, track_caller)]
pub fn computed_with<T: 'static>(
    mut f: impl FnMut() -> T + 'static,
    equals: impl Fn(&T, &T) -> bool + 'static,
) -> Computed<T> {
    let id = Root::with(|root| {
        let owner = root.current_owner.get();
        root.insert_node(
            NodeKind::Computed {
                compute: Box::new(move || Box::new(f())),
                equals: Box::new(move |a, b| {
                    equals(
                        a.downcast_ref::<T>().expect("computed value type mismatch"),
                        b.downcast_ref::<T>().expect("computed value type mismatch"),
                    )
                }),
                value: None,
                fault: None,
                state: NodeState::Check,
                live_consumers: 0,
            },
            owner,
        )
    });
    Computed {
        id,
        _marker: PhantomData,
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Resolve and return the current value, tracking a dependency on it if
    /// called from inside another computed or effect. Panics if evaluation
    /// detected a circular dependency, or re-raises the original panic if
    /// the compute function panicked on its last run; use
    /// [`Computed::try_get`] to handle the circular-dependency case without
    /// panicking.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn get(self) -> T {
        match self.try_get() {
            Ok(v) => v,
            Err(ReactiveError::CircularDependency) => {
                panic!("circular dependency detected while evaluating a computed")
            }
            Err(other) => panic!("{other}"),
        }
    }

    /// Resolve and return the current value, or
    /// [`ReactiveError::CircularDependency`] if this computed, directly or
    /// transitively, reads itself during its own evaluation.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn try_get(self) -> Result<T, ReactiveError> {
        Root::with(|root| resolve(root, self.id))?;
        Root::with(|root| {
            root.track(self.id);
            let nodes = root.nodes.borrow();
            let node = nodes
                .get(self.id)
                .expect("computed read after its scope was disposed");
            match &node.kind {
                NodeKind::Computed { value, fault, .. } => {
                    if let Some(fault) = fault {
                        let fault = clone_fault_payload(fault);
                        drop(nodes);
                        std::panic::resume_unwind(fault);
                    }
                    let value = value
                        .as_ref()
                        .expect("computed resolved without producing a value")
                        .downcast_ref::<T>()
                        .expect("computed value type mismatch");
                    Ok(value.clone())
                }
                _ => unreachable!("computed handle pointed at a non-computed node"),
            }
        })
    }
}

/// Run the lazy pull algorithm for the computed at `id`: trust the cache
/// when nothing relevant changed, otherwise recompute. Mirrors the evaluate
/// phase of the graph's push/pull propagation pass, generalized so a cold
/// (unpushed) computed validates itself purely by polling its sources'
/// versions instead of ever being marked by a push.
fn resolve(root: &Root, id: NodeId) -> Result<(), ReactiveError> {
    if root.is_evaluating(id) {
        return Err(ReactiveError::CircularDependency);
    }
    let current_global_version = root.version.get();

    enum Plan {
        TrustCache,
        Recompute,
    }

    let needs_poll = {
        let nodes = root.nodes.borrow();
        let node = nodes
            .get(id)
            .expect("computed resolved after its scope was disposed");
        match &node.kind {
            NodeKind::Computed {
                state,
                value,
                live_consumers,
                ..
            } => {
                if value.is_none() {
                    None // never evaluated: skip straight to recompute.
                } else if *state == NodeState::Clean
                    && (*live_consumers > 0 || node.last_global_version == current_global_version)
                {
                    Some(false)
                } else {
                    Some(true)
                }
            }
            _ => unreachable!("computed handle pointed at a non-computed node"),
        }
    };

    let plan = match needs_poll {
        None => Plan::Recompute,
        Some(false) => Plan::TrustCache,
        Some(true) => {
            if sources_changed(root, id)? {
                Plan::Recompute
            } else {
                Plan::TrustCache
            }
        }
    };

    match plan {
        Plan::TrustCache => {
            let mut nodes = root.nodes.borrow_mut();
            if let Some(node) = nodes.get_mut(id) {
                if let NodeKind::Computed { state, .. } = &mut node.kind {
                    *state = NodeState::Clean;
                }
                node.last_global_version = current_global_version;
            }
            Ok(())
        }
        Plan::Recompute => recompute(root, id, current_global_version),
    }
}

/// Poll every currently-recorded source, resolving any that are themselves
/// computeds first. Short-circuits on the first source whose version no
/// longer matches what was observed at the last evaluation.
fn sources_changed(root: &Root, id: NodeId) -> Result<bool, ReactiveError> {
    let sources = {
        let nodes = root.nodes.borrow();
        match nodes.get(id) {
            Some(node) => node.sources.clone(),
            None => return Ok(false),
        }
    };
    for link in sources {
        let is_computed = {
            let nodes = root.nodes.borrow();
            nodes
                .get(link.source)
                .map(|n| n.kind.is_computed())
                .unwrap_or(false)
        };
        if is_computed {
            resolve(root, link.source)?;
        }
        let current_version = root
            .nodes
            .borrow()
            .get(link.source)
            .map(|n| n.version)
            .unwrap_or(link.observed_version);
        if current_version != link.observed_version {
            return Ok(true);
        }
    }
    Ok(false)
}

fn recompute(root: &Root, id: NodeId, current_global_version: u64) -> Result<(), ReactiveError> {
    root.dispose_children(id);
    let old_sources = root.begin_revaluation(id);

    // Take the compute closure out of the node for the duration of the call:
    // the closure needs to freely re-enter `Root::with` (e.g. to read other
    // signals), which would otherwise alias the `RefCell` borrow below.
    let mut compute_fn = {
        let mut nodes = root.nodes.borrow_mut();
        let node = nodes.get_mut(id).expect("computed disposed mid-evaluation");
        let NodeKind::Computed { compute, .. } = &mut node.kind else {
            unreachable!("computed handle pointed at a non-computed node")
        };
        std::mem::replace(compute, Box::new(|| Box::new(()) as Box<dyn Any>))
    };

    let outcome = root.with_consumer(id, || catch_fault(|| compute_fn()));
    root.end_revaluation(id, old_sources);

    {
        let mut nodes = root.nodes.borrow_mut();
        if let Some(node) = nodes.get_mut(id) {
            if let NodeKind::Computed { compute, .. } = &mut node.kind {
                *compute = compute_fn;
            }
        }
    }

    let mut nodes = root.nodes.borrow_mut();
    let node = nodes.get_mut(id).expect("computed disposed mid-evaluation");
    let NodeKind::Computed {
        value,
        fault,
        state,
        equals,
        ..
    } = &mut node.kind
    else {
        unreachable!("computed handle pointed at a non-computed node")
    };
    *state = NodeState::Clean;
    node.last_global_version = current_global_version;
    match outcome {
        Ok(new_value) => {
            *fault = None;
            let unchanged = value
                .as_ref()
                .map(|old| equals(old.as_ref(), new_value.as_ref()))
                .unwrap_or(false);
            if !unchanged {
                *value = Some(new_value);
                node.version = root.next_version();
                drop(nodes);
                root.mark_dependents(id);
            }
            Ok(())
        }
        Err(panic_payload) => {
            tracing::error!(id = ?id, "computed function panicked");
            *fault = Some(panic_payload);
            Ok(())
        }
    }
}

fn clone_fault_payload(fault: &Box<dyn Any + Send>) -> Box<dyn Any + Send> {
    if let Some(msg) = fault.downcast_ref::<&'static str>() {
        Box::new(*msg)
    } else if let Some(msg) = fault.downcast_ref::<String>() {
        Box::new(msg.clone())
    } else {
        Box::new("computed function panicked (original payload is not cloneable)")
    }
}
