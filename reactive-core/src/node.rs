//! The reactive graph's node representation.
//!
//! Every signal, state property, computed and effect is stored as one
//! [`ReactiveNode`] inside the arena owned by [`crate::root::Root`]. A source
//! and a consumer are not separate Rust types: a computed is both at once,
//! so a single struct carries both halves and [`NodeKind`] says which parts
//! are meaningful.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use slotmap::new_key_type;

new_key_type! {
    /// Stable identifier for a node in the reactive graph. Generational, so a
    /// stale id can never alias a node created after disposal.
    pub struct NodeId;
}

/// A directed edge from a source to a consumer, carrying the version the
/// consumer last observed at the time the link was recorded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Link {
    pub source: NodeId,
    pub observed_version: u64,
}

/// Three-state dirtiness marker for the push/pull propagation pass: a node
/// is either known unchanged, possibly stale pending a source poll, or
/// definitely stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    Clean,
    Check,
    Dirty,
}

/// Payload specific to each kind of node.
pub(crate) enum NodeKind {
    /// A plain mutable cell: [`crate::signal::Signal`] or the backing storage
    /// behind a `#[derive(Tracked)]` struct's generated handle.
    Signal { value: Box<dyn Any> },
    /// A memoized derivation: [`crate::computed::Computed`].
    Computed {
        compute: Box<dyn FnMut() -> Box<dyn Any>>,
        equals: Box<dyn Fn(&dyn Any, &dyn Any) -> bool>,
        value: Option<Box<dyn Any>>,
        /// Payload of a panic caught while evaluating `compute`, re-raised on
        /// every read until the computed is next successfully re-evaluated.
        fault: Option<Box<dyn Any + Send>>,
        state: NodeState,
        /// Number of live consumers (effects or live computeds) currently
        /// observing this computed. `> 0` means "live": pushed to eagerly.
        live_consumers: u32,
    },
    /// An eager side-effecting consumer, created by [`crate::effect::effect`].
    /// Cleanup registration goes through the generic `cleanups` list on
    /// [`ReactiveNode`] (shared with scopes), run before every re-run as
    /// well as on final disposal.
    Effect {
        callback: Box<dyn FnMut()>,
        state: NodeState,
        disposed: bool,
    },
    /// A scope: an ownership node with no value of its own.
    Scope,
}

impl NodeKind {
    pub fn is_computed(&self) -> bool {
        matches!(self, NodeKind::Computed { .. })
    }
}

pub(crate) struct ReactiveNode {
    pub kind: NodeKind,
    /// Insertion order, used only to run a batch of dirty effects in
    /// creation order (slotmap keys are not guaranteed orderable).
    pub seq: u64,
    /// Monotonic per-node version. For a signal/state-property, bumped on
    /// every value-changing write. For a computed, bumped whenever its
    /// memoized value changes after recomputation.
    pub version: u64,
    /// Global-clock snapshot as of the last time this consumer successfully
    /// evaluated. Lets a re-read short-circuit when nothing has changed
    /// anywhere since.
    pub last_global_version: u64,
    /// Live push subscribers: only effects and *live* computeds ever appear
    /// here.
    pub dependents: Vec<NodeId>,
    /// Sources observed during the last evaluation, in observation order.
    pub sources: Vec<Link>,
    /// Scope tree: owning node and owned children, for bottom-up disposal.
    pub parent: NodeId,
    pub children: Vec<NodeId>,
    pub cleanups: Vec<Box<dyn FnOnce()>>,
    pub disposed: bool,
    /// Diagnostics-only; only populated in debug builds.
    #[cfg(debug_assertions)]
    pub created_at: &'static std::panic::Location<'static>,
}

impl ReactiveNode {
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn new(kind: NodeKind, parent: NodeId, seq: u64) -> Self {
        Self {
            kind,
            seq,
            version: 0,
            last_global_version: 0,
            dependents: Vec::new(),
            sources: Vec::new(),
            parent,
            children: Vec::new(),
            cleanups: Vec::new(),
            disposed: false,
            #[cfg(debug_assertions)]
            created_at: std::panic::Location::caller(),
        }
    }
}

/// Run `f`, catching a panic and returning it as a fault payload instead of
/// unwinding. Used for computed evaluation (`ComputedFault`) and effect/
/// cleanup execution (`EffectFault`, `DisposalFault`).
pub(crate) fn catch_fault<T>(f: impl FnOnce() -> T) -> Result<T, Box<dyn Any + Send>> {
    std::panic::catch_unwind(AssertUnwindSafe(f))
}
