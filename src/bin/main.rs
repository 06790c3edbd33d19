use clap::Parser;
use l3book::{cli, config, supervisor::Supervisor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let args = cli::Args::parse();
    init_tracing(&args);

    let subscriptions = match config::load_subscriptions(&args.instmts) {
        Ok(subs) => subs,
        Err(e) => {
            error!(error = %e, "failed to load subscription file");
            std::process::exit(1);
        }
    };
    info!(
        file = args.instmts,
        count = subscriptions.len(),
        "loaded subscriptions"
    );

    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            let mut sig =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            sig.recv().await;
            info!("received SIGTERM, shutting down");
            cancel_clone.cancel();
        });
    }

    let supervisor = Supervisor::new();
    attach_log_sink(&supervisor);

    match supervisor.run(subscriptions, cancel).await {
        Ok(()) => {
            info!("shutdown complete");
            std::process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "fatal: every adapter exhausted retries");
            std::process::exit(2);
        }
    }
}

fn init_tracing(args: &cli::Args) {
    let filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    let builder = tracing_subscriber::fmt().with_max_level(filter).with_target(false);

    match &args.output {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|e| panic!("failed to open log file {path}: {e}"));
            builder.with_writer(std::sync::Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
}

/// Attach a trace-level sink that just logs every published snapshot.
/// Real consumers (persistence, dashboards) attach their own
/// `SubscriberPort` the same way; this keeps the binary useful on its own
/// (spec.md §1's Non-goal excludes persistence sinks, not observability).
fn attach_log_sink(supervisor: &Supervisor) {
    struct LogSink;

    #[async_trait::async_trait]
    impl l3book::publisher::SubscriberPort for LogSink {
        async fn deliver(&self, snapshot: l3book::Snapshot) {
            info!(
                exchange = snapshot.exchange,
                instrument = snapshot.instrument_id,
                sequence = snapshot.sequence,
                best_bid = ?snapshot.best_bid(),
                best_ask = ?snapshot.best_ask(),
                "snapshot"
            );
        }
    }

    supervisor
        .publisher()
        .subscribe(Arc::new(LogSink), l3book::SubscribeMode::Lossy);
}
