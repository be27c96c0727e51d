//! EVFINDER — sportsbook +EV and arbitrage scanner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the last snapshot from disk (if configured), and runs the
//! scan worker and dashboard until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use evfinder::config::AppConfig;
use evfinder::dashboard::{self, render::BookDirectory, routes::DashboardState};
use evfinder::data::odds_api::{HttpTransport, OddsClient};
use evfinder::engine::scanner::Scanner;
use evfinder::engine::worker::{self, ScanTrigger};
use evfinder::storage::{self, ResultStore};
use evfinder::strategy::Engine;

const BANNER: &str = r#"
 _______     _______ ___ _   _ ____  _____ ____
| ____\ \   / /  ___|_ _| \ | |  _ \| ____|  _ \
|  _|  \ \ / /| |_   | ||  \| | | | |  _| | |_) |
| |___  \ V / |  _|  | || |\  | |_| | |___|  _ <
|_____|  \_/  |_|   |___|_| \_|____/|_____|_| \_\

  Sportsbook +EV & Arbitrage Scanner
  v0.1.0
"#;

/// Manual triggers queued beyond the one being served are refused.
const TRIGGER_QUEUE: usize = 1;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;
    cfg.validate().context("Invalid configuration")?;

    init_logging();

    println!("{BANNER}");
    info!(
        interval_secs = cfg.scanner.interval_secs,
        game_markets = cfg.markets.game.len(),
        prop_groups = cfg.markets.props.len(),
        bookmakers = cfg.books.bookmakers.len(),
        "EVFINDER starting up"
    );

    // -- Components --------------------------------------------------------

    let keys = cfg.api_keys()?;
    info!(keys = keys.len(), "Loaded Odds API keys");

    let transport = HttpTransport::new(
        &cfg.odds_api.base_url,
        Duration::from_secs(cfg.odds_api.timeout_secs),
    )?;
    let client = Arc::new(OddsClient::new(transport, keys, cfg.odds_api_config()));

    let engine = Engine::new(cfg.engine_config()?);
    let scanner = Arc::new(
        Scanner::new(
            client.clone(),
            engine,
            cfg.markets.game.clone(),
            cfg.markets.props.clone(),
        )
        .with_request_delay(cfg.request_delay())
        .with_near_miss_limit(cfg.engine.near_miss_report_limit),
    );

    // -- Restore last snapshot ---------------------------------------------

    let store = match &cfg.storage.snapshot_file {
        Some(path) => match storage::load_snapshot(path) {
            Ok(Some(snapshot)) => ResultStore::with_snapshot(snapshot),
            Ok(None) => ResultStore::new(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable snapshot");
                ResultStore::new()
            }
        },
        None => ResultStore::new(),
    };
    let store = Arc::new(store);

    // -- Dashboard ---------------------------------------------------------

    let (triggers, trigger_rx) = mpsc::channel::<ScanTrigger>(TRIGGER_QUEUE);

    let dashboard_task = if cfg.dashboard.enabled {
        let port = dashboard_port(cfg.dashboard.port);
        let state = DashboardState::new(
            store.clone(),
            triggers.clone(),
            BookDirectory::new(cfg.books.display_names.clone()),
        )
        .with_key_probe(client.clone());
        Some(dashboard::spawn_dashboard(Arc::new(state), &cfg.dashboard.host, port).await?)
    } else {
        info!("Dashboard disabled");
        None
    };

    // -- Worker ------------------------------------------------------------

    let mut worker_task = tokio::spawn(worker::run_worker(
        scanner,
        store.clone(),
        cfg.worker_config(),
        trigger_rx,
    ));

    info!("Running. Press Ctrl+C to stop.");

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received.");
            true
        }
        result = &mut worker_task => {
            if let Err(e) = result {
                error!(error = %e, "Scan worker exited unexpectedly");
            }
            false
        }
    };

    if interrupted {
        worker_task.abort();
    }
    drop(triggers);
    if let Some(task) = dashboard_task {
        task.abort();
    }

    let snapshot = store.snapshot().await;
    info!(
        opportunities = snapshot.opportunities.len(),
        last_scan = ?snapshot.last_scan,
        "EVFINDER shut down cleanly."
    );

    Ok(())
}

/// `PORT` from the environment overrides the configured port.
fn dashboard_port(configured: u16) -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(configured)
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("evfinder=info"));

    let json_logging = std::env::var("EVFINDER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
