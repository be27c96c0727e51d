//! Background scan worker.
//!
//! Runs scans on startup, on a fixed interval, and on demand. Only one
//! scan runs at a time; a trigger that arrives mid-scan is dropped.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{error, info};

use super::scanner::Scanner;
use crate::data::OddsTransport;
use crate::storage::{self, ResultStore};

/// Why a scan was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    Startup,
    Interval,
    Manual,
}

impl fmt::Display for ScanTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTrigger::Startup => write!(f, "startup"),
            ScanTrigger::Interval => write!(f, "interval"),
            ScanTrigger::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub run_on_startup: bool,
    /// `None` disables the periodic scan.
    pub interval: Option<Duration>,
    /// Where to persist each completed snapshot, if anywhere.
    pub snapshot_file: Option<PathBuf>,
}

/// Run one scan unless another is already in flight. Returns whether a
/// scan ran.
pub async fn scan_once<T: OddsTransport>(
    scanner: &Scanner<T>,
    store: &ResultStore,
    trigger: ScanTrigger,
    snapshot_file: Option<&PathBuf>,
) -> bool {
    let Some(guard) = store.try_begin() else {
        info!(%trigger, "Scan already in progress — trigger ignored");
        return false;
    };

    info!(%trigger, "Starting scan");
    let report = scanner.run().await;
    store.publish(report, guard).await;

    if let Some(path) = snapshot_file {
        let snapshot = store.snapshot().await;
        if let Err(e) = storage::save_snapshot(&snapshot, path) {
            error!(error = %e, "Failed to save snapshot");
        }
    }
    true
}

/// Worker loop. Returns when the trigger channel closes.
pub async fn run_worker<T: OddsTransport>(
    scanner: Arc<Scanner<T>>,
    store: Arc<ResultStore>,
    config: WorkerConfig,
    mut triggers: mpsc::Receiver<ScanTrigger>,
) {
    let snapshot_file = config.snapshot_file.as_ref();

    if config.run_on_startup {
        scan_once(&scanner, &store, ScanTrigger::Startup, snapshot_file).await;
    }

    let mut ticker = config.interval.map(|period| {
        let mut t = tokio::time::interval_at(Instant::now() + period, period);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t
    });

    info!(
        interval_secs = config.interval.map(|d| d.as_secs()),
        "Scan worker running"
    );

    loop {
        let trigger = tokio::select! {
            _ = tick(&mut ticker) => ScanTrigger::Interval,
            received = triggers.recv() => match received {
                Some(trigger) => trigger,
                None => break,
            },
        };
        scan_once(&scanner, &store, trigger, snapshot_file).await;
    }

    info!("Scan worker stopped");
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
