//! [`Root`]: the thread-local runtime that owns the reactive graph.
//!
//! `Root` lives entirely inside a `thread_local!`, since every field is
//! already interior-mutable (`Cell`/`RefCell`) rather than needing a leaked
//! `Box<Root>` to hand out a `&'static Root`. Handles only ever carry a
//! [`crate::node::NodeId`], never a reference into the arena, so there is
//! nothing to leak.

use std::cell::{Cell, RefCell};

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::node::{catch_fault, Link, NodeId, NodeKind, NodeState, ReactiveNode};
use crate::scheduler::{ImmediateScheduler, Scheduler};

thread_local! {
    static ROOT: Root = Root::new();
}

/// The reactive graph plus all ambient scheduling state for the current
/// thread. All signals, computeds and effects created on one thread share
/// the same batched set and global clock.
pub(crate) struct Root {
    pub nodes: RefCell<SlotMap<NodeId, ReactiveNode>>,
    /// Global clock, bumped on every value-changing write.
    pub version: Cell<u64>,
    /// Node that owns anything created right now (scope tree parent).
    /// Readable/settable imperatively through [`crate::scope::active_scope`]
    /// and [`crate::scope::set_active_scope`], or scoped to a closure
    /// through [`crate::scope::create_child_scope`].
    pub current_owner: Cell<NodeId>,
    /// Consumer currently evaluating, if any. `track()` calls against a
    /// source register a link against this consumer.
    pub current_consumer: Cell<Option<NodeId>>,
    /// Nodes currently on the evaluation stack, used to detect a computed
    /// that reads itself, directly or transitively, during its own
    /// evaluation.
    pub evaluating: RefCell<Vec<NodeId>>,
    /// Dirty set since the last flush, keyed by id for O(1) membership.
    pub batch: RefCell<SmallVec<[NodeId; 8]>>,
    pub flush_scheduled: Cell<bool>,
    pub batching_depth: Cell<u32>,
    pub scheduler: RefCell<Box<dyn Scheduler>>,
    pub root_node: Cell<NodeId>,
    node_seq: Cell<u64>,
}

impl Root {
    fn new() -> Self {
        let nodes = SlotMap::with_key();
        let this = Self {
            nodes: RefCell::new(nodes),
            version: Cell::new(0),
            current_owner: Cell::new(NodeId::default()),
            current_consumer: Cell::new(None),
            evaluating: RefCell::new(Vec::new()),
            batch: RefCell::new(SmallVec::new()),
            flush_scheduled: Cell::new(false),
            batching_depth: Cell::new(0),
            scheduler: RefCell::new(Box::new(ImmediateScheduler)),
            root_node: Cell::new(NodeId::default()),
            node_seq: Cell::new(0),
        };
        let root_id = this
            .nodes
            .borrow_mut()
            .insert(ReactiveNode::new(NodeKind::Scope, NodeId::default(), 0));
        this.root_node.set(root_id);
        this.current_owner.set(root_id);
        this
    }

    pub fn with<T>(f: impl FnOnce(&Root) -> T) -> T {
        ROOT.with(f)
    }

    /// Tear down every node and start over with a fresh root scope. Used by
    /// [`crate::create_root`] to give each call a clean graph (this also
    /// makes the thread-local safe to reuse across `#[test]` functions that
    /// happen to land on the same worker thread).
    pub fn reinit(&self) {
        self.root_node.get().dispose_subtree(self);
        self.nodes.borrow_mut().clear();
        self.version.set(0);
        self.evaluating.borrow_mut().clear();
        self.batch.borrow_mut().clear();
        self.flush_scheduled.set(false);
        self.batching_depth.set(0);
        let seq = self.next_node_seq();
        let root_id = self
            .nodes
            .borrow_mut()
            .insert(ReactiveNode::new(NodeKind::Scope, NodeId::default(), seq));
        self.root_node.set(root_id);
        self.current_owner.set(root_id);
        self.current_consumer.set(None);
    }

    /// Returns a fresh value for the global clock.
    pub fn next_version(&self) -> u64 {
        let v = self.version.get() + 1;
        self.version.set(v);
        v
    }

    fn next_node_seq(&self) -> u64 {
        let v = self.node_seq.get();
        self.node_seq.set(v + 1);
        v
    }

    /// Create a node owned by `parent`, registering it as one of `parent`'s
    /// children. Every signal/computed/effect/scope constructor goes through
    /// this so ownership bookkeeping and creation-order sequencing stay in
    /// one place.
    pub fn insert_node(&self, kind: NodeKind, parent: NodeId) -> NodeId {
        let seq = self.next_node_seq();
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.insert(ReactiveNode::new(kind, parent, seq));
        if let Some(parent_node) = nodes.get_mut(parent) {
            parent_node.children.push(id);
        }
        id
    }

    /// Record that `current_consumer` (if any) read `source`, and if the
    /// consumer is itself live (an effect, or a computed with at least one
    /// live consumer of its own), subscribe it to `source`'s push
    /// notifications too.
    pub fn track(&self, source: NodeId) {
        let Some(consumer) = self.current_consumer.get() else {
            return;
        };
        let is_live = {
            let nodes = self.nodes.borrow();
            match nodes.get(consumer).map(|n| &n.kind) {
                Some(NodeKind::Effect { disposed, .. }) => !disposed,
                Some(NodeKind::Computed { live_consumers, .. }) => *live_consumers > 0,
                _ => false,
            }
        };
        {
            let mut nodes = self.nodes.borrow_mut();
            if nodes.get(consumer).is_none() {
                return;
            }
            // A consumer may read the same source multiple times in one
            // evaluation; only keep the first (freshest at time of read) link.
            if nodes[consumer].sources.iter().any(|l| l.source == source) {
                return;
            }
            let observed_version = nodes.get(source).map(|n| n.version).unwrap_or(0);
            nodes[consumer].sources.push(Link {
                source,
                observed_version,
            });
        }
        if is_live {
            self.subscribe(consumer, source);
        }
    }

    /// Add `consumer` to `source`'s push subscribers. If `source` is a
    /// computed transitioning from cold to live, recursively subscribes it
    /// to its own current sources (`source.sources` must already be fresh —
    /// callers resolve a computed before tracking a read of it).
    fn subscribe(&self, consumer: NodeId, source: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let already_subscribed = match nodes.get(source) {
            Some(n) => n.dependents.contains(&consumer),
            None => return,
        };
        if already_subscribed {
            return;
        }
        nodes[source].dependents.push(consumer);
        let mut promote = None;
        if let NodeKind::Computed { live_consumers, .. } = &mut nodes[source].kind {
            *live_consumers += 1;
            if *live_consumers == 1 {
                promote = Some(nodes[source].sources.iter().map(|l| l.source).collect::<Vec<_>>());
            }
        }
        drop(nodes);
        if let Some(grand_sources) = promote {
            for grand_source in grand_sources {
                self.subscribe(source, grand_source);
            }
        }
    }

    /// Remove `consumer` from `source`'s push subscribers. If `source` is a
    /// computed that just went live-to-cold, recursively unsubscribes it
    /// from its own sources.
    fn unsubscribe(&self, consumer: NodeId, source: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(node) = nodes.get_mut(source) else {
            return;
        };
        node.dependents.retain(|&c| c != consumer);
        let mut demote = None;
        if let NodeKind::Computed { live_consumers, .. } = &mut node.kind {
            if *live_consumers > 0 {
                *live_consumers -= 1;
            }
            if *live_consumers == 0 {
                demote = Some(node.sources.iter().map(|l| l.source).collect::<Vec<_>>());
            }
        }
        drop(nodes);
        if let Some(grand_sources) = demote {
            for grand_source in grand_sources {
                self.unsubscribe(source, grand_source);
            }
        }
    }

    /// Take `id`'s current source list (clearing it) so a re-evaluation can
    /// rebuild it from scratch via fresh `track()` calls. Pair with
    /// [`Root::end_revaluation`].
    pub fn begin_revaluation(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes = self.nodes.borrow_mut();
        match nodes.get_mut(id) {
            Some(node) => std::mem::take(&mut node.sources)
                .into_iter()
                .map(|l| l.source)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Unsubscribe `id` from every source in `old_sources` that the
    /// just-finished evaluation did not re-read, demoting any computed among
    /// them that lost its last live consumer. This is what makes
    /// conditionally-read dependencies drop out correctly.
    pub fn end_revaluation(&self, id: NodeId, old_sources: Vec<NodeId>) {
        let new_sources: Vec<NodeId> = {
            let nodes = self.nodes.borrow();
            nodes
                .get(id)
                .map(|n| n.sources.iter().map(|l| l.source).collect())
                .unwrap_or_default()
        };
        for old in old_sources {
            if !new_sources.contains(&old) {
                self.unsubscribe(id, old);
            }
        }
    }

    /// Dispose every child `id` owns without disposing `id` itself. Used
    /// before re-running a computed or effect body so that nested
    /// signals/scopes created during the previous evaluation do not leak.
    pub fn dispose_children(&self, id: NodeId) {
        let children = {
            let mut nodes = self.nodes.borrow_mut();
            match nodes.get_mut(id) {
                Some(node) => std::mem::take(&mut node.children),
                None => Vec::new(),
            }
        };
        for child in children {
            child.dispose_subtree(self);
        }
    }

    /// Push-propagate a change at `source` to every live consumer downstream.
    /// Grounded on the Clean/Check/Dirty BFS in the `silex_reactivity`
    /// example in the corpus, restricted to the subgraph of live consumers:
    /// only effects and live computeds ever appear as dependents.
    pub fn mark_dependents(&self, source: NodeId) {
        let dependents = {
            let nodes = self.nodes.borrow();
            match nodes.get(source) {
                Some(n) => n.dependents.clone(),
                None => return,
            }
        };
        for dep in dependents {
            self.mark_one(dep);
        }
    }

    fn mark_one(&self, id: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(node) = nodes.get_mut(id) else {
            return;
        };
        match &mut node.kind {
            NodeKind::Effect { state, disposed, .. } => {
                if *disposed {
                    return;
                }
                let already_dirty = *state == NodeState::Dirty;
                *state = NodeState::Dirty;
                drop(nodes);
                if !already_dirty {
                    self.schedule(id);
                }
            }
            NodeKind::Computed { state, .. } => {
                // A computed never learns "definitely changed" from a push
                // alone — only that it needs to re-poll its sources next
                // time it is read (`evaluate`'s `Check` state). Already
                // `Check`/`Dirty` means this subtree was already walked.
                if *state != NodeState::Clean {
                    return;
                }
                *state = NodeState::Check;
                let further = node.dependents.clone();
                drop(nodes);
                for dep in further {
                    self.mark_one(dep);
                }
            }
            _ => {}
        }
    }

    fn schedule(&self, id: NodeId) {
        {
            let mut batch = self.batch.borrow_mut();
            if batch.contains(&id) {
                return;
            }
            batch.push(id);
        }
        if self.batching_depth.get() > 0 {
            return;
        }
        if !self.flush_scheduled.get() {
            self.flush_scheduled.set(true);
            let scheduler = self.scheduler.borrow();
            scheduler.schedule(Box::new(|| Root::with(|r| r.flush())));
        }
    }

    pub fn start_batch(&self) {
        self.batching_depth.set(self.batching_depth.get() + 1);
    }

    pub fn end_batch(&self) {
        let depth = self.batching_depth.get() - 1;
        self.batching_depth.set(depth);
        if depth == 0 && !self.batch.borrow().is_empty() {
            self.flush();
        }
    }

    /// Drain the batched set, running every still-live still-dirty effect in
    /// creation-order. Idempotent and safe to call re-entrantly (effects created mid-flush are appended and picked up by
    /// the `while` loop rather than requiring a second call).
    pub fn flush(&self) {
        self.flush_scheduled.set(false);
        loop {
            let mut pending: Vec<NodeId> = self.batch.borrow_mut().drain(..).collect();
            if pending.is_empty() {
                break;
            }
            let nodes = self.nodes.borrow();
            pending.sort_by_key(|id| nodes.get(*id).map(|n| n.seq).unwrap_or(u64::MAX));
            drop(nodes);
            for id in pending {
                self.run_if_dirty(id);
            }
        }
    }

    fn run_if_dirty(&self, id: NodeId) {
        let should_run = {
            let nodes = self.nodes.borrow();
            match nodes.get(id) {
                Some(ReactiveNode {
                    kind: NodeKind::Effect { state, disposed, .. },
                    ..
                }) => *state == NodeState::Dirty && !*disposed,
                _ => false,
            }
        };
        if should_run {
            crate::effect::run_effect(self, id);
        }
    }

    /// Run `f` with `id` as both the current owner (for newly created child
    /// nodes) and the current tracking consumer, restoring the previous
    /// ambient values afterwards regardless of panics.
    pub fn with_consumer<T>(&self, id: NodeId, f: impl FnOnce() -> T) -> T {
        let prev_owner = self.current_owner.replace(id);
        let prev_consumer = self.current_consumer.replace(Some(id));
        self.evaluating.borrow_mut().push(id);
        struct Guard<'a> {
            root: &'a Root,
            prev_owner: NodeId,
            prev_consumer: Option<NodeId>,
        }
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.root.evaluating.borrow_mut().pop();
                self.root.current_owner.set(self.prev_owner);
                self.root.current_consumer.set(self.prev_consumer);
            }
        }
        let _guard = Guard {
            root: self,
            prev_owner,
            prev_consumer,
        };
        f()
    }

    /// Run `f` with `id` as the current owner for anything it creates,
    /// without touching the tracking consumer (plain scopes are ownership
    /// boundaries, not dependency-tracking boundaries: a signal read inside
    /// `scope(...)` still tracks against whatever effect or computed is
    /// currently evaluating, if any).
    pub fn with_owner<T>(&self, id: NodeId, f: impl FnOnce() -> T) -> T {
        let prev_owner = self.current_owner.replace(id);
        struct Guard<'a> {
            root: &'a Root,
            prev: NodeId,
        }
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.root.current_owner.set(self.prev);
            }
        }
        let _guard = Guard {
            root: self,
            prev: prev_owner,
        };
        f()
    }

    pub fn is_evaluating(&self, id: NodeId) -> bool {
        self.evaluating.borrow().contains(&id)
    }

    pub fn set_scheduler(&self, scheduler: impl Scheduler + 'static) {
        *self.scheduler.borrow_mut() = Box::new(scheduler);
    }

    /// Drain and run every `on_cleanup` callback registered against `id`
    /// since the last time this ran. Used before an effect re-runs and at
    /// final disposal of any node.
    pub fn run_and_clear_cleanups(&self, id: NodeId) {
        let cleanups = {
            let mut nodes = self.nodes.borrow_mut();
            match nodes.get_mut(id) {
                Some(node) => std::mem::take(&mut node.cleanups),
                None => return,
            }
        };
        for cb in cleanups {
            if let Err(err) = catch_fault(cb) {
                tracing::error!(?id, "on_cleanup callback panicked: {:?}", err);
            }
        }
    }
}

impl NodeId {
    /// Recursively dispose `self` and everything it owns: children before
    /// parents, effects before their scope's own cleanups.
    pub(crate) fn dispose_subtree(self, root: &Root) {
        let children = {
            let mut nodes = root.nodes.borrow_mut();
            let Some(node) = nodes.get_mut(self) else {
                return;
            };
            if node.disposed {
                return;
            }
            node.disposed = true;
            std::mem::take(&mut node.children)
        };
        for child in children {
            child.dispose_subtree(root);
        }
        // Unlink from every source we observed, demoting cold computeds as
        // necessary (mirrors ordinary effect disposal).
        crate::effect::unlink_all_sources(root, self);
        root.run_and_clear_cleanups(self);
        // Remove from parent's child list and from the arena.
        let parent = root.nodes.borrow().get(self).map(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(parent_node) = root.nodes.borrow_mut().get_mut(parent) {
                parent_node.children.retain(|&c| c != self);
            }
        }
        root.nodes.borrow_mut().remove(self);
    }
}

/// Creates a new reactive root scope, runs `f` inside it, and returns a
/// handle that the caller *should* use to reset this thread's graph before
/// starting unrelated work (each call to `create_root` implicitly does this
/// by resetting the whole thread-local graph — this crate maintains exactly
/// one graph per thread).
pub fn create_root(f: impl FnOnce()) {
    Root::with(|root| {
        root.reinit();
        f();
    });
}

/// Synchronously drain the batched effect queue. Alias of [`flush_effects`].
pub fn flush() {
    Root::with(|root| root.flush());
}

/// Synchronously drain the batched effect queue.
pub fn flush_effects() {
    flush();
}

/// Batch updates from related signals/state writes together; memos and
/// effects only run once, at the end of the outermost `batch` call.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    Root::with(|root| root.start_batch());
    let ret = f();
    Root::with(|root| root.end_batch());
    ret
}

/// Run `f` with dependency tracking suspended: reads inside do not
/// establish links.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = Root::with(|root| root.current_consumer.replace(None));
    let ret = f();
    Root::with(|root| root.current_consumer.set(prev));
    ret
}

/// Install a custom [`Scheduler`], replacing the default immediate one.
pub fn set_scheduler(scheduler: impl Scheduler + 'static) {
    Root::with(|root| root.set_scheduler(scheduler));
}
