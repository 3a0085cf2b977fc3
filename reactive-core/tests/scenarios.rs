//! End-to-end reproductions of the runtime's canonical propagation
//! behaviors, each exercised once here at the public-API level (unit tests
//! colocated with each module already cover the same ground piecemeal).

use reactive_core::{batch, computed, computed_with, create_root, effect, flush, signal};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Diamond: two computeds share one source; an effect reading both must see
/// the shared computed recompute exactly once per source write, not once
/// per path.
#[test]
fn diamond_shared_computed_recomputes_once() {
    create_root(|| {
        let base = signal(1);
        let shared_runs = Rc::new(Cell::new(0));
        let shared_runs2 = shared_runs.clone();
        let shared = computed(move || {
            shared_runs2.set(shared_runs2.get() + 1);
            base.get() + 1
        });
        let left = computed(move || shared.get() * 10);
        let right = computed(move || shared.get() * 100);
        let effect_runs = Rc::new(Cell::new(0));
        let effect_runs2 = effect_runs.clone();
        effect(move || {
            left.get();
            right.get();
            effect_runs2.set(effect_runs2.get() + 1);
        });
        assert_eq!(shared_runs.get(), 1);
        assert_eq!(effect_runs.get(), 1);

        base.set(2);
        flush();
        assert_eq!(shared_runs.get(), 2, "shared computed recomputes exactly once");
        assert_eq!(effect_runs.get(), 2, "the effect reading both paths runs exactly once");
    });
}

/// Cold short-circuit: a computed with no live (effect-rooted) consumer
/// never recomputes eagerly; it only validates lazily, by polling its
/// sources' versions, the next time something actually reads it.
#[test]
fn cold_computed_does_not_recompute_until_read() {
    create_root(|| {
        let a = signal(1);
        let runs = Rc::new(Cell::new(0));
        let runs2 = runs.clone();
        let cold = computed(move || {
            runs2.set(runs2.get() + 1);
            a.get() * 2
        });
        assert_eq!(runs.get(), 0, "a computed never eagerly runs at creation");

        a.set(5);
        a.set(10);
        assert_eq!(runs.get(), 0, "no live consumer: writes do not trigger recomputation");

        assert_eq!(cold.get(), 20, "reading it pulls the latest value on demand");
        assert_eq!(runs.get(), 1, "exactly one recompute, not one per missed write");
    });
}

/// Revert/coalescing: several writes to the same source inside one batch
/// collapse into a single scheduled run, which observes the final value at
/// the time the batch ends.
#[test]
fn writes_in_one_batch_coalesce_to_a_single_run() {
    create_root(|| {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let runs2 = runs.clone();
        let observed = Rc::new(Cell::new(-1));
        let observed2 = observed.clone();
        effect(move || {
            observed2.set(s.get());
            runs2.set(runs2.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        batch(|| {
            s.set(1);
            s.set(2);
            s.set(0); // reverts to the pre-batch value, but still one run.
        });
        assert_eq!(runs.get(), 2, "three writes in one batch still schedule only one run");
        assert_eq!(observed.get(), 0, "the run observes the value at batch end");
    });
}

/// Conditional dependency: a source read only on one branch of an `if` must
/// be unsubscribed once the branch not reading it is taken, so writing it
/// afterward no longer triggers a re-run.
#[test]
fn conditionally_read_source_is_dropped_when_no_longer_observed() {
    create_root(|| {
        let cond = signal(true);
        let a = signal(1);
        let b = signal(100);
        let runs = Rc::new(Cell::new(0));
        let runs2 = runs.clone();
        effect(move || {
            runs2.set(runs2.get() + 1);
            if cond.get() { a.get() } else { b.get() };
        });
        assert_eq!(runs.get(), 1);

        cond.set(false);
        flush();
        assert_eq!(runs.get(), 2);

        a.set(999);
        flush();
        assert_eq!(runs.get(), 2, "a is no longer read; writing it must not re-run the effect");

        b.set(5);
        flush();
        assert_eq!(runs.get(), 3, "b is now the live dependency");
    });
}

/// Scope disposal: disposing a scope tears down everything created inside
/// it, bottom-up, including stopping effects from ever running again and
/// running every registered cleanup exactly once.
#[test]
fn disposing_a_scope_stops_descendants_and_runs_cleanups_bottom_up() {
    create_root(|| {
        let order = Rc::new(RefCell::new(Vec::new()));
        let effect_runs = Rc::new(Cell::new(0));
        let s = signal(0);

        let (scope, ()) = reactive_core::create_child_scope(|_outer| {
            let order1 = order.clone();
            reactive_core::on_cleanup(move || order1.borrow_mut().push("outer"));
            let effect_runs2 = effect_runs.clone();
            effect(move || {
                s.get();
                effect_runs2.set(effect_runs2.get() + 1);
            });
            let (_inner, ()) = reactive_core::create_child_scope(|_inner| {
                let order2 = order.clone();
                reactive_core::on_cleanup(move || order2.borrow_mut().push("inner"));
            });
        });
        assert_eq!(effect_runs.get(), 1);

        scope.dispose();
        assert_eq!(*order.borrow(), vec!["inner", "outer"], "cleanups run bottom-up");

        s.set(1);
        flush();
        assert_eq!(effect_runs.get(), 1, "the disposed effect never runs again");
    });
}

/// Lazy bail-out: a computed with a custom equality function that reports
/// "unchanged" must not notify its own downstream consumers, even though
/// its source did change and it did recompute.
#[test]
fn custom_equality_bails_out_of_downstream_notification() {
    create_root(|| {
        let a = signal(1);
        let parity = computed_with(move || a.get() % 2, |x, y| x == y);
        let notifications = Rc::new(Cell::new(0));
        let notifications2 = notifications.clone();
        effect(move || {
            parity.get();
            notifications2.set(notifications2.get() + 1);
        });
        flush();
        assert_eq!(notifications.get(), 1);

        a.set(3); // still odd: recomputes, but equals() reports unchanged.
        flush();
        assert_eq!(notifications.get(), 1, "no notification when the derived value is equal");

        a.set(4); // now even: genuinely changes.
        flush();
        assert_eq!(notifications.get(), 2);
    });
}
