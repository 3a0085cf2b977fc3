//! Deep, per-field reactive tracking over plain structs and lists.
//!
//! A dynamic language can intercept arbitrary property reads/writes with a
//! `Proxy` and track each path lazily. Rust has no such hook, so this crate
//! takes the approach `sycamore-reactive3`'s `Store` takes one level
//! further: instead of a runtime path trie keyed by string segments, derive
//! [`Tracked`](reactive_core_macro::Tracked) to generate one dedicated
//! trigger signal per struct field at compile time, each wired into a
//! generated accessor named after the field. Reading a field tracks only
//! that field's trigger; writing it bumps only that trigger, so two effects
//! reading different fields of the same state never invalidate each other.
//!
//! Every tracked handle also exposes `unwrap_value`, an untracked accessor
//! returning the plain, raw value underneath — the Rust-native equivalent of
//! unwrapping a proxy back to its target. [`unwrap_value`] (the free
//! function) is the identity counterpart for anything that is not a tracked
//! handle to begin with, since the type system already knows statically
//! whether a value is wrapped.

use std::cell::RefCell;
use std::rc::Rc;

use crate::signal::{signal, Signal};

/// Identity passthrough: returns `v` unchanged. Exists purely so a caller
/// generic over "maybe tracked, maybe not" can call `unwrap_value` uniformly
/// — a tracked handle's own inherent `unwrap_value` method returns its raw
/// target instead, since Rust's type system already distinguishes the two
/// cases at compile time and needs no runtime check.
pub fn unwrap_value<T>(v: T) -> T {
    v
}

/// Implemented by `#[derive(Tracked)]`. Not meant to be implemented by hand;
/// exists so generated wrapper types share a uniform constructor name.
pub trait TrackedFields: Sized + 'static {
    type Handle;

    fn into_tracked(self) -> Self::Handle;
}

/// One dedicated trigger per tracked field or slot. `data` never changes
/// identity, so it is read and written untracked (`peek`/`update`); reads
/// are tracked purely through the matching `Signal<u64>` counter, and
/// writes notify purely by bumping it — counters are immune to same-value-
/// zero suppression, unlike a `Signal<()>` would be, so every write reliably
/// notifies exactly the readers of that one field.
#[doc(hidden)]
pub fn new_field_trigger() -> Signal<u64> {
    signal(0)
}

#[doc(hidden)]
pub fn track_field(trigger: Signal<u64>) {
    trigger.with(|_| {});
}

#[doc(hidden)]
pub fn bump_field(trigger: Signal<u64>) {
    trigger.update(|n| *n = n.wrapping_add(1));
}

/// A growable list with structural tracking (length/membership) separate
/// from per-index value tracking, the list analogue of the per-field
/// trigger scheme above. An effect that only calls [`TrackedList::len`]
/// does not re-run when an existing element is merely replaced in place via
/// [`TrackedList::set`], and vice versa: [`TrackedList::get`] on an
/// untouched index does not re-run when the list grows via
/// [`TrackedList::push`].
pub struct TrackedList<T: Clone + 'static> {
    items: Signal<Vec<T>>,
    structure: Signal<u64>,
    item_triggers: Rc<RefCell<Vec<Signal<u64>>>>,
}

impl<T: Clone + 'static> Clone for TrackedList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items,
            structure: self.structure,
            item_triggers: self.item_triggers.clone(),
        }
    }
}

impl<T: Clone + 'static> TrackedList<T> {
    pub fn new(initial: Vec<T>) -> Self {
        let item_triggers = (0..initial.len()).map(|_| new_field_trigger()).collect();
        Self {
            items: signal(initial),
            structure: new_field_trigger(),
            item_triggers: Rc::new(RefCell::new(item_triggers)),
        }
    }

    /// Track structural membership and return the current length.
    pub fn len(&self) -> usize {
        track_field(self.structure);
        self.items.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Track only index `i`'s own trigger and return its value.
    pub fn get(&self, i: usize) -> Option<T> {
        if let Some(trigger) = self.item_triggers.borrow().get(i).copied() {
            track_field(trigger);
        } else {
            // Past the end: depends on whether the list grows long enough
            // to contain this index, which is a structural question.
            track_field(self.structure);
        }
        self.items.with(|v| v.get(i).cloned())
    }

    /// Replace the element at `i`, notifying only that index's readers.
    pub fn set(&self, i: usize, value: T) {
        self.items.update(|v| {
            if let Some(slot) = v.get_mut(i) {
                *slot = value;
            }
        });
        if let Some(trigger) = self.item_triggers.borrow().get(i).copied() {
            bump_field(trigger);
        }
    }

    /// Append an element, notifying structural (length/iteration) readers.
    pub fn push(&self, value: T) {
        self.items.update(|v| v.push(value));
        self.item_triggers.borrow_mut().push(new_field_trigger());
        bump_field(self.structure);
    }

    /// Remove and return the last element, notifying structural readers.
    pub fn pop(&self) -> Option<T> {
        let popped = self.items.update_and_return(|v| v.pop());
        if popped.is_some() {
            self.item_triggers.borrow_mut().pop();
            bump_field(self.structure);
        }
        popped
    }

    /// Track structural membership and return a snapshot of every element.
    pub fn to_vec(&self) -> Vec<T> {
        track_field(self.structure);
        for trigger in self.item_triggers.borrow().iter().copied() {
            track_field(trigger);
        }
        self.items.peek()
    }

    /// Return the raw underlying `Vec<T>` without tracking anything, not
    /// even structural membership. Unlike [`TrackedList::to_vec`], which
    /// tracks every element and the list's shape, this is a plain escape
    /// hatch back to the untracked value.
    pub fn unwrap_value(&self) -> Vec<T> {
        self.items.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::create_root;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn replacing_an_item_does_not_notify_length_readers() {
        create_root(|| {
            let list = TrackedList::new(vec![1, 2, 3]);
            let len_runs = Rc::new(Cell::new(0));
            let len_runs2 = len_runs.clone();
            let list1 = list.clone();
            crate::effect::effect(move || {
                list1.len();
                len_runs2.set(len_runs2.get() + 1);
            });
            assert_eq!(len_runs.get(), 1);
            list.set(0, 100);
            crate::root::flush();
            assert_eq!(len_runs.get(), 1, "replacing index 0 must not notify length readers");
        });
    }

    #[test]
    fn pushing_notifies_structural_readers_not_unrelated_index_readers() {
        create_root(|| {
            let list = TrackedList::new(vec![1, 2, 3]);
            let index_runs = Rc::new(Cell::new(0));
            let index_runs2 = index_runs.clone();
            let list1 = list.clone();
            crate::effect::effect(move || {
                list1.get(0);
                index_runs2.set(index_runs2.get() + 1);
            });
            assert_eq!(index_runs.get(), 1);
            list.push(4);
            crate::root::flush();
            assert_eq!(index_runs.get(), 1, "pushing must not notify readers of an untouched index");
            assert_eq!(list.len(), 4);
        });
    }

    #[test]
    fn unwrap_identity_holds_for_plain_values_and_tracked_lists() {
        create_root(|| {
            // A value that was never wrapped unwraps to itself.
            assert_eq!(unwrap_value(42), 42);
            assert_eq!(unwrap_value("raw"), "raw");

            // A tracked list unwraps to the same raw `Vec` its elements were
            // constructed from, and does not establish any dependency.
            let list = TrackedList::new(vec![1, 2, 3]);
            let reads = Rc::new(Cell::new(0));
            let reads2 = reads.clone();
            let list1 = list.clone();
            crate::effect::effect(move || {
                list1.unwrap_value();
                reads2.set(reads2.get() + 1);
            });
            assert_eq!(reads.get(), 1);
            list.push(4);
            crate::root::flush();
            assert_eq!(reads.get(), 1, "unwrap_value must not track structure or elements");
            assert_eq!(list.unwrap_value(), vec![1, 2, 3, 4]);
        });
    }
}
