use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use marketlink::api::routes::{router, ApiState};
use marketlink::cli::commands::{Cli, Commands};
use marketlink::config::{Config, TRIGGER_CHANNEL_CAPACITY};
use marketlink::domain::values::market_status::MarketStatus;
use marketlink::MarketLink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let engine = match MarketLink::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error initializing MarketLink: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(engine, &config, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(engine: MarketLink, config: &Config, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Sync { force } => {
            let report = engine.sync(Utc::now(), force).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Serve { port } => {
            let engine = Arc::new(engine);
            let (triggers, trigger_rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
            let interval = Duration::from_secs(config.sync_interval_secs);

            // One Ctrl-C listener, fanned out to the server and the driver.
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    // Dropping the sender would stop the server; keep it alive.
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
                info!("Ctrl-C received, shutting down");
                let _ = shutdown_tx.send(true);
            });

            let driver = tokio::spawn({
                let engine = engine.clone();
                let shutdown = shutdown_rx.clone();
                async move { engine.run_driver(interval, trigger_rx, shutdown).await }
            });

            let bind_addr = format!("0.0.0.0:{}", port.unwrap_or(config.api_port));
            let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
            info!("HTTP API listening on {bind_addr}");

            axum::serve(listener, router(ApiState { engine, triggers }))
                .with_graceful_shutdown(async move {
                    let mut shutdown = shutdown_rx;
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await?;
            driver.await?;
            info!("Shut down cleanly");
        }
        Commands::Events { limit, cursor, from, to } => {
            let page = engine.events(Some(limit), cursor, parse_date(&from)?, parse_date(&to)?)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Event { ticker } => match engine.event(&ticker)? {
            Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
            None => println!("No stored event {ticker}"),
        },
        Commands::Markets { limit, cursor, event, status, from, to } => {
            let status = status
                .map(|s| s.parse::<MarketStatus>())
                .transpose()?;
            let page = engine.markets(Some(limit), cursor, event, status, parse_date(&from)?, parse_date(&to)?)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Search { query, limit } => {
            let results = engine.search(&query, Some(limit)).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Related { source, target } => match engine.related(&source, &target).await? {
            Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
            None => println!("No cached relationship for {source} -> {target}"),
        },
        Commands::Reindex => {
            let count = engine.reindex().await?;
            println!("Reindexed {count} markets");
        }
        Commands::Stats => {
            let stats = engine.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

fn parse_date(s: &Option<String>) -> Result<Option<DateTime<Utc>>, String> {
    match s {
        None => Ok(None),
        Some(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Some(dt.with_timezone(&Utc)));
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Ok(Some(date.and_time(NaiveTime::MIN).and_utc()));
            }
            Err(format!("Invalid date format: {s}. Use YYYY-MM-DD or RFC3339"))
        }
    }
}
