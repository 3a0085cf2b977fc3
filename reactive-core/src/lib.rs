//! A fine-grained reactive dependency graph.
//!
//! [`signal`] creates a plain mutable cell. [`computed`] derives a lazily
//! re-evaluated value from other signals and computeds. [`effect`] runs a
//! side effect whenever something it reads changes. [`state`]'s
//! `#[derive(Tracked)]` extends the same per-dependency tracking down to
//! individual struct fields, so two effects reading different fields of one
//! value never invalidate each other.
//!
//! ```
//! use reactive_core::{create_root, signal, effect, flush};
//!
//! create_root(|| {
//!     let count = signal(0);
//!     let mut seen = Vec::new();
//!     effect(move || seen.push(count.get()));
//!     count.set(1);
//!     flush();
//! });
//! ```
//!
//! Every signal, computed, and effect lives in a single thread-local graph
//! ([`root::Root`]); [`create_root`] resets it, which is also how tests and
//! other short-lived call sites isolate themselves from each other on a
//! pooled thread.
//!
//! Propagation is push/pull hybrid: a write immediately (or, inside
//! [`batch`], once at the end) walks forward marking dependents `Check` (a
//! computed, which re-derives lazily on next read) or `Dirty` (an effect,
//! which the scheduler then runs). A computed with zero live (effect-rooted)
//! consumers never receives a push at all; it instead validates itself by
//! polling its own sources' versions the next time something reads it. See
//! [`computed`] for the full algorithm.

pub mod computed;
pub mod effect;
pub mod equality;
pub mod error;
pub mod node;
pub mod root;
pub mod scheduler;
pub mod scope;
pub mod signal;
pub mod state;

pub use computed::{computed, computed_with, Computed};
pub use effect::effect;
pub use equality::SameValueZero;
pub use error::ReactiveError;
pub use root::{batch, create_root, flush, flush_effects, set_scheduler, untrack};
pub use scheduler::{ImmediateScheduler, Scheduler};
pub use scope::{active_scope, create_child_scope, on_cleanup, set_active_scope, Scope};
pub use signal::{signal, ReadSignal, Signal};
pub use state::{unwrap_value, TrackedFields, TrackedList};

#[cfg(feature = "tokio-scheduler")]
pub use scheduler::TokioScheduler;

#[cfg(feature = "wasm-scheduler")]
pub use scheduler::WasmScheduler;

/// Derive a per-field reactive wrapper for a plain struct. See [`state`] for
/// how the generated handle's getters and setters isolate each field's
/// dependency tracking from its siblings.
pub use reactive_core_macro::Tracked;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn readme_example_runs_the_effect_once_per_flush() {
        create_root(|| {
            let count = signal(0);
            let runs = Rc::new(Cell::new(0));
            let runs2 = runs.clone();
            effect(move || {
                count.get();
                runs2.set(runs2.get() + 1);
            });
            assert_eq!(runs.get(), 1);
            count.set(1);
            flush();
            assert_eq!(runs.get(), 2);
        });
    }

    #[test]
    fn public_api_composes_signal_computed_and_effect() {
        create_root(|| {
            let a = signal(2);
            let b = signal(3);
            let sum = computed(move || a.get() + b.get());
            let log = Rc::new(std::cell::RefCell::new(Vec::new()));
            let log2 = log.clone();
            effect(move || log2.borrow_mut().push(sum.get()));
            a.set(10);
            flush();
            assert_eq!(*log.borrow(), vec![5, 13]);
        });
    }
}
