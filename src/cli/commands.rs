use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "marketlink", about = "Prediction-market sync engine with cross-market implication analysis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync cycle (ingestion, then analysis when enabled)
    Sync {
        /// Ignore the 24h freshness gate
        #[arg(long)]
        force: bool,
    },
    /// Serve the HTTP API and run the periodic sync driver until Ctrl-C
    Serve {
        /// Port override (defaults to API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List stored events
    Events {
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Row id to continue after
        #[arg(long)]
        cursor: Option<i64>,
        /// Only events whose closest market close is at or after this time (RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// Only events whose closest market close is at or before this time (RFC 3339)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show one stored event by its ticker
    Event { ticker: String },
    /// List stored markets
    Markets {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        cursor: Option<i64>,
        #[arg(long)]
        event: Option<String>,
        /// active, closed, or a raw exchange status
        #[arg(long)]
        status: Option<String>,
        /// Only markets closing at or after this time (RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// Only markets closing at or before this time (RFC 3339)
        #[arg(long)]
        to: Option<String>,
    },
    /// Semantic (vector) search over market descriptions
    Search {
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show the cached relationship for an ordered market pair
    Related {
        source: String,
        target: String,
    },
    /// Re-embed every active market and prune stale vectors
    Reindex,
    /// Show row and vector counts
    Stats,
}
