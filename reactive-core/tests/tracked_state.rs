//! Exercises the `#[derive(Tracked)]` per-field wrapper generated by
//! `reactive-core-macro`.

use reactive_core::{create_root, effect, flush, Tracked, TrackedFields};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Tracked, Clone, PartialEq, Debug)]
struct Point {
    x: f64,
    y: f64,
}

#[test]
fn reading_one_field_does_not_track_the_other() {
    create_root(|| {
        let point = Point { x: 1.0, y: 2.0 }.into_tracked();
        let x_runs = Rc::new(Cell::new(0));
        let x_runs2 = x_runs.clone();
        let point1 = point.clone();
        effect(move || {
            point1.x();
            x_runs2.set(x_runs2.get() + 1);
        });
        assert_eq!(x_runs.get(), 1);

        point.set_y(20.0);
        flush();
        assert_eq!(x_runs.get(), 1, "writing y must not re-run a reader of x");

        point.set_x(10.0);
        flush();
        assert_eq!(x_runs.get(), 2, "writing x must re-run its own reader");
        assert_eq!(point.x(), 10.0);
        assert_eq!(point.y(), 20.0);
    });
}

#[test]
fn with_accessor_borrows_without_cloning() {
    #[derive(Tracked, Clone)]
    struct Name {
        value: String,
    }

    create_root(|| {
        let name = NameTracked::new(Name {
            value: "ada".to_string(),
        });
        let len = name.with_value(|v| v.len());
        assert_eq!(len, 3);
        name.set_value("grace".to_string());
        assert_eq!(name.value(), "grace");
    });
}

#[test]
fn unwrap_value_returns_the_raw_struct_without_tracking() {
    create_root(|| {
        let raw = Point { x: 1.0, y: 2.0 };
        let point = raw.clone().into_tracked();

        assert_eq!(point.unwrap_value(), raw, "unwraps back to the same raw value");

        let runs = Rc::new(Cell::new(0));
        let runs2 = runs.clone();
        let point1 = point.clone();
        effect(move || {
            point1.unwrap_value();
            runs2.set(runs2.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        point.set_x(99.0);
        flush();
        assert_eq!(runs.get(), 1, "unwrap_value must not track any field");
    });
}
