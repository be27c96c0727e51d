//! Result store and snapshot persistence.
//!
//! The store holds the last completed scan and a scan-in-progress flag.
//! One scan writes at a time; readers always see the last completed
//! snapshot, even while a new scan is running. Snapshots can optionally
//! be saved to a JSON file so a restart does not blank the dashboard.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::scanner::{ScanReport, ScanStats};
use crate::types::Opportunity;

/// The last completed scan, as served to readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub scan_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time of the scan.
    pub last_scan: Option<DateTime<Utc>>,
    pub opportunities: Vec<Opportunity>,
    pub stats: ScanStats,
}

impl From<ScanReport> for ScanSnapshot {
    fn from(report: ScanReport) -> Self {
        Self {
            scan_id: Some(report.scan_id),
            started_at: Some(report.started_at),
            last_scan: Some(report.finished_at),
            opportunities: report.opportunities,
            stats: report.stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct ResultStore {
    scanning: AtomicBool,
    latest: RwLock<Arc<ScanSnapshot>>,
}

/// Proof that the holder owns the single active scan. Dropping it clears
/// the scanning flag, including on an early return.
pub struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self::with_snapshot(ScanSnapshot::default())
    }

    /// Start from a previously saved snapshot.
    pub fn with_snapshot(snapshot: ScanSnapshot) -> Self {
        Self {
            scanning: AtomicBool::new(false),
            latest: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Claim the scan slot. `None` if a scan is already running.
    pub fn try_begin(&self) -> Option<ScanGuard<'_>> {
        self.scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanGuard {
                flag: &self.scanning,
            })
    }

    /// Replace the visible snapshot with a finished scan and release the
    /// scan slot.
    pub async fn publish(&self, report: ScanReport, guard: ScanGuard<'_>) {
        let snapshot = Arc::new(ScanSnapshot::from(report));
        debug!(
            opportunities = snapshot.opportunities.len(),
            "Publishing scan snapshot"
        );
        *self.latest.write().await = snapshot;
        drop(guard);
    }

    pub async fn snapshot(&self) -> Arc<ScanSnapshot> {
        self.latest.read().await.clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Save a snapshot to a JSON file.
pub fn save_snapshot(snapshot: &ScanSnapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialise snapshot")?;

    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;

    debug!(path = %path.display(), opportunities = snapshot.opportunities.len(), "Snapshot saved");
    Ok(())
}

/// Load a snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_snapshot(path: &Path) -> Result<Option<ScanSnapshot>> {
    if !path.exists() {
        info!(path = %path.display(), "No saved snapshot found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;

    let snapshot: ScanSnapshot = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse snapshot from {}", path.display()))?;

    info!(
        path = %path.display(),
        opportunities = snapshot.opportunities.len(),
        last_scan = ?snapshot.last_scan,
        "Snapshot loaded from disk"
    );

    Ok(Some(snapshot))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
