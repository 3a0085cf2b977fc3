//! Pluggable stand-in for a host's microtask queue.
//!
//! A browser or async runtime normally gives a reactive library a place to
//! queue "run this after the current task, before the next repaint/tick".
//! Rust has no such ambient facility, so this crate models it as a trait and
//! defaults to a scheduler that does nothing until the caller explicitly
//! flushes — deterministic, and the only scheduler this crate's own tests
//! rely on.

use std::fmt;

/// Receives a boxed flush callback and decides when to run it.
pub trait Scheduler {
    /// Queue `run` to execute at some point after the current call stack
    /// unwinds. Implementations may run it synchronously (as
    /// [`ImmediateScheduler`] does not — it drops `run` entirely and relies
    /// on an explicit [`crate::flush`] call) or asynchronously.
    fn schedule(&self, run: Box<dyn FnOnce() + 'static>);
}

impl fmt::Debug for dyn Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Scheduler")
    }
}

/// Default scheduler: never auto-flushes. A write marks the batch pending
/// but nothing runs until [`crate::flush`] or [`crate::flush_effects`] is
/// called, or the enclosing [`crate::batch`] call returns. This keeps tests
/// and single-threaded callers fully deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, _run: Box<dyn FnOnce() + 'static>) {
        // Intentionally dropped: the caller is expected to flush explicitly.
    }
}

/// Runs the pending flush on the current `tokio` runtime's next yield point,
/// approximating a microtask on native async targets.
#[cfg(feature = "tokio-scheduler")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[cfg(feature = "tokio-scheduler")]
impl Scheduler for TokioScheduler {
    fn schedule(&self, run: Box<dyn FnOnce() + 'static>) {
        struct SendBox(Box<dyn FnOnce() + 'static>);
        // SAFETY: the closure only ever runs on the same thread that called
        // `schedule` because `tokio::task::spawn_local` requires a
        // `LocalSet` driven by that thread; we never hand it to another
        // worker thread.
        unsafe impl Send for SendBox {}
        let wrapped = SendBox(run);
        tokio::task::spawn_local(async move {
            (wrapped.0)();
        });
    }
}

/// Queues the pending flush as a browser microtask via
/// `wasm_bindgen_futures::spawn_local`.
#[cfg(feature = "wasm-scheduler")]
#[derive(Debug, Default, Clone, Copy)]
pub struct WasmScheduler;

#[cfg(feature = "wasm-scheduler")]
impl Scheduler for WasmScheduler {
    fn schedule(&self, run: Box<dyn FnOnce() + 'static>) {
        wasm_bindgen_futures::spawn_local(async move {
            run();
        });
    }
}
