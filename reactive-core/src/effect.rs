//! Eager side-effecting consumers.

use std::any::Any;

use crate::node::{catch_fault, NodeId, NodeKind, NodeState};
use crate::root::Root;

/// Register a side effect: `f` runs once immediately to discover its
/// dependencies, then again every time one of them changes, until disposed.
///
/// Returns a disposer. Calling it (or letting the owning scope drop it)
/// unlinks the effect from every source it observed and runs any
/// `on_cleanup` callbacks registered during its last run.
#[cfg_attr(debug_assertions, track_caller)]
pub fn effect(f: impl FnMut() + 'static) -> impl FnOnce() {
    let id = Root::with(|root| {
        let owner = root.current_owner.get();
        root.insert_node(
            NodeKind::Effect {
                callback: Box::new(f),
                state: NodeState::Dirty,
                disposed: false,
            },
            owner,
        )
    });
    Root::with(|root| run_effect(root, id));
    move || Root::with(|root| id.dispose_subtree(root))
}

/// Run (or re-run) the effect at `id`: previous cleanup first, then the
/// callback with a fresh dependency scan, then mark it clean. Called both
/// synchronously at creation and from [`crate::root::Root::flush`].
pub(crate) fn run_effect(root: &Root, id: NodeId) {
    let is_live = {
        let nodes = root.nodes.borrow();
        match nodes.get(id) {
            Some(node) => match &node.kind {
                NodeKind::Effect { disposed, .. } => !disposed,
                _ => false,
            },
            None => false,
        }
    };
    if !is_live {
        return;
    }

    root.dispose_children(id);
    root.run_and_clear_cleanups(id);
    let old_sources = root.begin_revaluation(id);

    let mut callback = {
        let mut nodes = root.nodes.borrow_mut();
        let node = nodes.get_mut(id).expect("effect disposed mid-run");
        let NodeKind::Effect { callback, .. } = &mut node.kind else {
            unreachable!("effect handle pointed at a non-effect node")
        };
        std::mem::replace(callback, Box::new(|| {}))
    };

    let outcome = root.with_consumer(id, || catch_fault(|| callback()));
    root.end_revaluation(id, old_sources);

    let mut nodes = root.nodes.borrow_mut();
    if let Some(node) = nodes.get_mut(id) {
        if let NodeKind::Effect { callback: slot, state, .. } = &mut node.kind {
            *slot = callback;
            *state = NodeState::Clean;
        }
    }
    drop(nodes);

    if let Err(payload) = outcome {
        log_fault(id, &payload);
    }
}

fn log_fault(id: NodeId, payload: &Box<dyn Any + Send>) {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        tracing::error!(?id, "effect function panicked: {msg}");
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        tracing::error!(?id, "effect function panicked: {msg}");
    } else {
        tracing::error!(?id, "effect function panicked");
    }
}

/// Unlink `id` from every source it currently observes, demoting any
/// computed among them that loses its last live consumer. Used during
/// disposal, where there is no "new sources" set to diff against — every
/// observed source is being dropped.
pub(crate) fn unlink_all_sources(root: &Root, id: NodeId) {
    let old_sources = root.begin_revaluation(id);
    root.end_revaluation(id, old_sources);
}
