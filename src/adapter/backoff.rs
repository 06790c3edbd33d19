//! Exponential backoff with jitter for the `Backoff` adapter state.

use rand::Rng;
use std::time::Duration;

const BASE: Duration = Duration::from_millis(500);
const CAP: Duration = Duration::from_secs(60);
/// An interval in `Live` at least this long resets the backoff counter
/// (spec.md §4.4: "Reset `n` on a successful `Live` interval ≥ 60 s").
pub const RESET_THRESHOLD: Duration = Duration::from_secs(60);

/// `min(2^n · base, cap)` plus up to 20% jitter, tracking the retry count `n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    /// A fresh backoff counter at `n = 0`.
    pub fn new() -> Self {
        Backoff { attempt: 0 }
    }

    /// The delay for the current attempt, then increments `n`.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(10);
        let scaled = BASE.saturating_mul(1u32 << exp).min(CAP);
        self.attempt += 1;

        let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.2);
        let jitter = Duration::from_secs_f64(scaled.as_secs_f64() * jitter_frac);
        scaled + jitter
    }

    /// Reset `n` back to zero after a sufficiently long `Live` interval.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let mut b = Backoff::new();
        let d0 = b.next_delay();
        let d1 = b.next_delay();
        assert!(d0 >= BASE && d0 < BASE * 2);
        assert!(d1 >= BASE * 2);

        for _ in 0..20 {
            b.next_delay();
        }
        let d_late = b.next_delay();
        assert!(d_late <= CAP + CAP / 5);
    }

    #[test]
    fn reset_returns_to_base() {
        let mut b = Backoff::new();
        b.next_delay();
        b.next_delay();
        b.reset();
        let d = b.next_delay();
        assert!(d >= BASE && d < BASE * 2);
    }
}
