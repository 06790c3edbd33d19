//! The per-product adapter state machine (spec.md §4.4).

use std::fmt;

/// Where one `(exchange, product)` pair currently sits in its lifecycle.
///
/// Transitions are driven entirely by the owning adapter loop; this type
/// itself carries no behavior beyond labeling the state for logging and
/// for the [`crate::supervisor::Supervisor`]'s health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Not yet started.
    Idle,
    /// Transport is opening and sending subscribe frames.
    Connecting,
    /// Buffering live updates while a REST snapshot is fetched and applied.
    Bootstrapping,
    /// Steady state: applying updates and publishing snapshots.
    Live,
    /// A gap or checksum mismatch was detected; re-running the bootstrap
    /// protocol while preserving the subscription.
    Recovering,
    /// Waiting out an exponential backoff delay before reconnecting.
    Backoff,
    /// Terminal: transport closed, will not restart.
    Stopped,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdapterState::Idle => "idle",
            AdapterState::Connecting => "connecting",
            AdapterState::Bootstrapping => "bootstrapping",
            AdapterState::Live => "live",
            AdapterState::Recovering => "recovering",
            AdapterState::Backoff => "backoff",
            AdapterState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
