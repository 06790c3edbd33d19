//! Optional process metrics (spec.md C10), behind the `metrics` feature.
//!
//! These are process-health counters/gauges, not book analytics — the
//! crate's Non-goal excludes the latter, not the former (spec.md §1).
//! With the feature off every function here is a no-op, so call sites
//! never need a `cfg` of their own.

/// One applied book mutation (`add`/`remove`/`match`/`change`/`reset`).
pub fn record_update_applied(exchange: &str, instrument_id: &str) {
    #[cfg(feature = "metrics")]
    {
        metrics::counter!(
            "l3book_updates_applied_total",
            "exchange" => exchange.to_string(),
            "instrument" => instrument_id.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (exchange, instrument_id);
}

/// A sequence gap requiring re-bootstrap was detected.
pub fn record_gap_detected(exchange: &str, instrument_id: &str) {
    #[cfg(feature = "metrics")]
    {
        metrics::counter!(
            "l3book_gaps_detected_total",
            "exchange" => exchange.to_string(),
            "instrument" => instrument_id.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (exchange, instrument_id);
}

/// A Bitfinex checksum frame did not match the locally computed CRC32.
pub fn record_checksum_failure(instrument_id: &str) {
    #[cfg(feature = "metrics")]
    {
        metrics::counter!(
            "l3book_checksum_failures_total",
            "instrument" => instrument_id.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = instrument_id;
}

/// The current sequence number for one book, as a gauge.
pub fn set_sequence_gauge(exchange: &str, instrument_id: &str, sequence: u64) {
    #[cfg(feature = "metrics")]
    {
        metrics::gauge!(
            "l3book_sequence",
            "exchange" => exchange.to_string(),
            "instrument" => instrument_id.to_string()
        )
        .set(sequence as f64);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (exchange, instrument_id, sequence);
}
