use clap::Parser;

/// EduPulse Watch — live online-presence viewer for an EduPulse backend.
#[derive(Parser, Debug)]
#[command(name = "edupulse-watch", version, about)]
pub struct Args {
    /// Backend base URL for the REST fallback.
    #[arg(long, default_value = "http://localhost:8080")]
    pub base_url: String,

    /// WebSocket endpoint for live updates.
    #[arg(long, default_value = "ws://localhost:8080/ws/presence")]
    pub ws_url: String,

    /// Bearer token; falls back to the EDUPULSE_TOKEN environment variable.
    #[arg(long)]
    pub token: Option<String>,

    /// Show the per-user listing instead of the count alone.
    #[arg(long)]
    pub details: bool,

    /// Fetch one snapshot over REST and exit.
    #[arg(long)]
    pub once: bool,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
