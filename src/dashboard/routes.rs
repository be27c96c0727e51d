//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use super::render::{render, BookDirectory, OpportunityView};
use crate::data::{KeyProbe, KeyStatus};
use crate::engine::scanner::ScanStats;
use crate::engine::worker::ScanTrigger;
use crate::storage::ResultStore;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub store: Arc<ResultStore>,
    pub triggers: mpsc::Sender<ScanTrigger>,
    /// `None` when no key probe is wired up (key status reports nothing).
    pub keys: Option<Arc<dyn KeyProbe>>,
    pub books: BookDirectory,
}

impl DashboardState {
    pub fn new(
        store: Arc<ResultStore>,
        triggers: mpsc::Sender<ScanTrigger>,
        books: BookDirectory,
    ) -> Self {
        Self {
            store,
            triggers,
            keys: None,
            books,
        }
    }

    pub fn with_key_probe(mut self, probe: Arc<dyn KeyProbe>) -> Self {
        self.keys = Some(probe);
        self
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OpportunitiesResponse {
    pub opportunities: Vec<OpportunityView>,
    pub last_scan: Option<DateTime<Utc>>,
    pub total: usize,
    pub scanning: bool,
    pub stats: ScanStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ScanResponse {
    Started { success: bool },
    Rejected { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyStatusResponse {
    pub keys: Vec<KeyStatus>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/opportunities
pub async fn get_opportunities(State(state): State<AppState>) -> Json<OpportunitiesResponse> {
    let snapshot = state.store.snapshot().await;
    let opportunities: Vec<OpportunityView> = snapshot
        .opportunities
        .iter()
        .map(|opp| render(opp, &state.books))
        .collect();

    Json(OpportunitiesResponse {
        total: opportunities.len(),
        opportunities,
        last_scan: snapshot.last_scan,
        scanning: state.store.is_scanning(),
        stats: snapshot.stats.clone(),
    })
}

/// POST /api/scan
pub async fn trigger_scan(State(state): State<AppState>) -> Json<ScanResponse> {
    if state.store.is_scanning() {
        return Json(ScanResponse::Rejected {
            error: "Scan in progress".to_string(),
        });
    }

    let response = match state.triggers.try_send(ScanTrigger::Manual) {
        Ok(()) => {
            info!("Manual scan requested");
            ScanResponse::Started { success: true }
        }
        // a trigger is already queued
        Err(TrySendError::Full(_)) => ScanResponse::Rejected {
            error: "Scan in progress".to_string(),
        },
        Err(TrySendError::Closed(_)) => {
            warn!("Manual scan requested but the scan worker has stopped");
            ScanResponse::Rejected {
                error: "Scanner unavailable".to_string(),
            }
        }
    };
    Json(response)
}

/// GET /api/key-status
pub async fn get_key_status(State(state): State<AppState>) -> Json<KeyStatusResponse> {
    let keys = match &state.keys {
        Some(probe) => probe.key_status().await,
        None => Vec::new(),
    };
    Json(KeyStatusResponse { keys })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
