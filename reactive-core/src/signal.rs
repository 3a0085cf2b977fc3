//! Plain mutable reactive cells.

use std::marker::PhantomData;

use crate::equality::SameValueZero;
use crate::node::{NodeId, NodeKind};
use crate::root::Root;

/// A read-only view of a [`Signal`]. Every [`Signal`] can be used wherever a
/// `ReadSignal` is expected; the split exists so an API can hand out read
/// access without granting `set`/`update`.
pub struct ReadSignal<T: 'static> {
    pub(crate) id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: 'static> Copy for ReadSignal<T> {}

/// A reactive cell holding a `T`, readable and writable, `Copy` so it can be
/// moved freely into closures the way a small handle should be.
pub struct Signal<T: 'static> {
    pub(crate) id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: 'static> Copy for Signal<T> {}

/// Create a new signal seeded with `initial`.
#[cfg_attr(debug_assertions, track_caller)]
pub fn signal<T: 'static>(initial: T) -> Signal<T> {
    let id = Root::with(|root| {
        let owner = root.current_owner.get();
        root.insert_node(
            NodeKind::Signal {
                value: Box::new(initial),
            },
            owner,
        )
    });
    Signal {
        id,
        _marker: PhantomData,
    }
}

impl<T: 'static> Signal<T> {
    /// Drop the read/write split and obtain a read-only handle to the same
    /// cell.
    pub fn read_only(self) -> ReadSignal<T> {
        ReadSignal {
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + 'static> ReadSignal<T> {
    /// Track this signal and return a clone of its current value.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn get(self) -> T {
        self.with(Clone::clone)
    }
}

impl<T: Clone + 'static> Signal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn get(self) -> T {
        self.read_only().get()
    }
}

impl<T: 'static> ReadSignal<T> {
    /// Track this signal and run `f` against a borrow of its current value,
    /// without cloning it.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn with<R>(self, f: impl FnOnce(&T) -> R) -> R {
        Root::with(|root| {
            root.track(self.id);
            let nodes = root.nodes.borrow();
            let node = nodes
                .get(self.id)
                .expect("signal read after its scope was disposed");
            match &node.kind {
                NodeKind::Signal { value } => {
                    let value = value
                        .downcast_ref::<T>()
                        .expect("signal value type mismatch");
                    f(value)
                }
                _ => unreachable!("signal handle pointed at a non-signal node"),
            }
        })
    }

    /// Read the current value without establishing a dependency link, even
    /// inside a tracking context.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn peek(self) -> T
    where
        T: Clone,
    {
        crate::root::untrack(|| {
            Root::with(|root| {
                let nodes = root.nodes.borrow();
                let node = nodes
                    .get(self.id)
                    .expect("signal peeked after its scope was disposed");
                match &node.kind {
                    NodeKind::Signal { value } => {
                        value.downcast_ref::<T>().expect("signal value type mismatch").clone()
                    }
                    _ => unreachable!("signal handle pointed at a non-signal node"),
                }
            })
        })
    }
}

impl<T: 'static> Signal<T> {
    /// Run `f` against a borrow of the current value without tracking.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn with<R>(self, f: impl FnOnce(&T) -> R) -> R {
        self.read_only().with(f)
    }

    pub fn peek(self) -> T
    where
        T: Clone,
    {
        self.read_only().peek()
    }
}

impl<T: SameValueZero + 'static> Signal<T> {
    /// Overwrite the value. A no-op under same-value-zero equality does not
    /// bump the node's version and does not notify any dependents.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn set(self, next: T) {
        self.update_with(|slot| {
            if slot.same_value_zero(&next) {
                false
            } else {
                *slot = next;
                true
            }
        });
    }
}

impl<T: 'static> Signal<T> {
    /// Replace the value by applying `f` to a mutable borrow of the current
    /// one. Unlike [`Signal::set`] this always notifies dependents: `f` is
    /// given direct mutable access, so there is no prior value left to
    /// compare against cheaply. Does not require `T: SameValueZero` since it
    /// never compares.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn update(self, f: impl FnOnce(&mut T)) {
        self.update_with(|slot| {
            f(slot);
            true
        });
    }

    /// Like [`Signal::update`] but lets `f` compute a result pulled back out
    /// alongside the mutation, e.g. `Vec::pop`'s removed element.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn update_and_return<R>(self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut out = None;
        self.update_with(|slot| {
            out = Some(f(slot));
            true
        });
        out.expect("update_with always invokes f exactly once")
    }

    fn update_with(self, f: impl FnOnce(&mut T) -> bool) {
        let changed = Root::with(|root| {
            let mut nodes = root.nodes.borrow_mut();
            let node = nodes
                .get_mut(self.id)
                .expect("signal written after its scope was disposed");
            let changed = match &mut node.kind {
                NodeKind::Signal { value } => {
                    let slot = value
                        .downcast_mut::<T>()
                        .expect("signal value type mismatch");
                    f(slot)
                }
                _ => unreachable!("signal handle pointed at a non-signal node"),
            };
            if changed {
                node.version = root.next_version();
            }
            changed
        });
        if changed {
            Root::with(|root| root.mark_dependents(self.id));
        }
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize + Clone + 'static> serde::Serialize for ReadSignal<T> {
    /// Serializes the current value, same as calling [`ReadSignal::get`] just
    /// before serializing it. Establishes a dependency link like any other
    /// read.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize + Clone + 'static> serde::Serialize for Signal<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.read_only().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, T: serde::Deserialize<'de> + 'static> serde::Deserialize<'de> for Signal<T> {
    /// Deserializes a plain `T` and wraps it in a freshly created signal,
    /// owned by whatever scope is current at the deserialization call site.
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(signal)
    }
}
