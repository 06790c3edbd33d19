//! Command-line surface (spec.md §6, concretized in SPEC_FULL.md §4.7).

use clap::Parser;

/// Live L3 order book reconstruction from exchange WebSocket feeds.
#[derive(Parser, Debug)]
#[command(name = "l3book", version)]
pub struct Args {
    /// Subscription file: one `exchange_name,instmt_name,instmt_code` record per line.
    #[arg(long = "instmts", default_value = "subscriptions.ini")]
    pub instmts: String,

    /// Log file path. When absent, logs go to stderr.
    #[arg(long = "output")]
    pub output: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Enable Gdax persistence (accepted for compatibility, currently inert).
    #[arg(long = "gdax-persist")]
    pub gdax_persist: bool,

    /// Enable Bitfinex persistence (accepted for compatibility, currently inert).
    #[arg(long = "bitfinex-persist")]
    pub bitfinex_persist: bool,

    /// Enable Bittrex persistence (accepted for compatibility, currently inert).
    #[arg(long = "bittrex-persist")]
    pub bittrex_persist: bool,
}
