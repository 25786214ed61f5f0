mod cli;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use edupulse_common::PresenceSnapshot;
use edupulse_presence::{
    CredentialStore, FetchConfig, Granularity, PresenceStream, PresenceViewModel, SnapshotFetcher,
    SnapshotSource, StaticCredentials, StreamConfig, ViewConfig, ViewState,
};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("edupulse=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "edupulse=info".parse().unwrap()),
            ),
        )
        .init();

    tracing::info!("edupulse-watch v{} starting...", env!("CARGO_PKG_VERSION"));

    let token = args
        .token
        .clone()
        .or_else(|| std::env::var("EDUPULSE_TOKEN").ok());
    let credentials: Arc<dyn CredentialStore> = match token {
        Some(token) => Arc::new(StaticCredentials::new(token)),
        None => {
            tracing::warn!("no bearer token; the backend may reject presence requests");
            Arc::new(StaticCredentials::anonymous())
        }
    };

    let fetcher = SnapshotFetcher::new(FetchConfig::new(&args.base_url), Arc::clone(&credentials));

    if args.once {
        let result = if args.details {
            fetcher.fetch_details().await
        } else {
            fetcher.fetch_summary().await
        };
        match result {
            Ok(outcome) => print_snapshot(&outcome.snapshot),
            Err(e) => {
                tracing::error!("presence fetch failed: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let stream = PresenceStream::spawn(StreamConfig::new(&args.ws_url), Arc::clone(&credentials));
    let model = PresenceViewModel::with_config(
        Arc::new(fetcher),
        stream,
        Arc::clone(&credentials),
        ViewConfig {
            initial_granularity: if args.details {
                Granularity::Details
            } else {
                Granularity::Summary
            },
            ..ViewConfig::default()
        },
    );

    let mut updates = model.subscribe();
    model.initialize().await;
    render(&model.current().await);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(state) => render(&state),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    model.teardown().await;
}

fn render(state: &ViewState) {
    let transport = if state.connected { "live" } else { "rest" };
    match &state.snapshot {
        Some(snapshot) => {
            print!("[{transport}] ");
            print_snapshot(snapshot);
        }
        None => println!("[{transport}] waiting for first snapshot..."),
    }
    if let Some(err) = &state.last_error {
        println!(
            "  ! {} ({:?}, {} failed attempts)",
            err.message, err.category, err.retries
        );
    }
}

fn print_snapshot(snapshot: &PresenceSnapshot) {
    println!(
        "{} online as of {}",
        snapshot.total_online,
        snapshot.as_of.format("%H:%M:%S")
    );
    if let Some(details) = &snapshot.details {
        for entry in details {
            println!(
                "  {:>10?}  {}  (since {})",
                entry.role,
                entry.display_name,
                entry.connected_at.format("%H:%M:%S")
            );
        }
    }
}
