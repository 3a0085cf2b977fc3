//! Error kinds that propagate synchronously to a caller.
//!
//! `ComputedFault`, `EffectFault` and `DisposalFault` are *not* represented
//! here: they are caught and either re-raised on next read (`ComputedFault`,
//! see [`crate::computed`]) or logged-and-swallowed (`EffectFault`/
//! `DisposalFault`, see [`crate::effect`] and [`crate::scope`]). Only the two
//! kinds that must reach the immediate caller are modeled as a `Result`
//! error type.

use thiserror::Error;

/// Errors returned directly to the caller of a reactive operation.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A computed read itself, directly or transitively, during its own
    /// evaluation.
    #[error("circular dependency detected while evaluating a computed")]
    CircularDependency,
    /// An operation was attempted on a [`crate::scope::Scope`] that has
    /// already been disposed.
    #[error("operation attempted on a disposed scope")]
    DisposedScope,
}
