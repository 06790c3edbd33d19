//! Process-level failures surfaced by [`super::Supervisor::run`].

use thiserror::Error;

/// Failures that should translate into a non-zero process exit code
/// (spec.md §6: exit codes `1` startup error, `2` fatal).
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// No subscription resolved to a known exchange adapter.
    #[error("no subscriptions matched a known exchange")]
    NoAdapters,

    /// Every spawned adapter exited without ever reaching `Live`.
    #[error("every adapter failed beyond retry")]
    AllAdaptersFailed,
}
