//! End-to-end scan pipeline.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

use evfinder::config::{GameMarket, PropGroup, PropMarket};
use evfinder::dashboard::build_router;
use evfinder::dashboard::render::BookDirectory;
use evfinder::dashboard::routes::{AppState, DashboardState};
use evfinder::data::odds_api::{OddsApiConfig, OddsClient};
use evfinder::engine::scanner::Scanner;
use evfinder::engine::worker::{run_worker, scan_once, ScanTrigger, WorkerConfig};
use evfinder::storage::{load_snapshot, ResultStore};
use evfinder::strategy::{Engine, EngineConfig};
use evfinder::types::{EdgeBasis, Opportunity, OutcomeKey};
use secrecy::SecretString;

use crate::fake_api::FakeOddsApi;

const DEAD_KEY: &str = "key-dead-aaaaaa";
const LIVE_KEY: &str = "key-live-bbbbbb";

fn make_client(api: FakeOddsApi, keys: &[&str]) -> Arc<OddsClient<FakeOddsApi>> {
    Arc::new(OddsClient::new(
        api,
        keys.iter().map(|k| SecretString::new(k.to_string())).collect(),
        OddsApiConfig::default(),
    ))
}

fn make_scanner(client: Arc<OddsClient<FakeOddsApi>>) -> Arc<Scanner<FakeOddsApi>> {
    let games = vec![GameMarket {
        sport: "basketball_nba".into(),
        market: "h2h".into(),
        label: "NBA Moneyline".into(),
    }];
    let props = vec![PropGroup {
        sport: "basketball_nba".into(),
        max_events: 1,
        markets: vec![PropMarket {
            market: "player_points".into(),
            label: "NBA Points".into(),
        }],
    }];
    Arc::new(
        Scanner::new(client, Engine::new(EngineConfig::default()), games, props)
            .with_request_delay(Duration::ZERO),
    )
}

fn make_state(
    store: Arc<ResultStore>,
    client: Arc<OddsClient<FakeOddsApi>>,
) -> (AppState, mpsc::Receiver<ScanTrigger>) {
    let (tx, rx) = mpsc::channel(1);
    let state = DashboardState::new(store, tx, BookDirectory::default()).with_key_probe(client);
    (Arc::new(state), rx)
}

async fn get_json(state: AppState, uri: &str) -> serde_json::Value {
    let resp = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn temp_path() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("evfinder_it_snapshot_{}.json", uuid::Uuid::new_v4()));
    p
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scan_publishes_ranked_results() {
    let api = FakeOddsApi::nba().reject_key(DEAD_KEY);
    let log = api.log();
    let client = make_client(api, &[DEAD_KEY, LIVE_KEY]);
    let scanner = make_scanner(client);
    let store = ResultStore::new();

    assert!(scan_once(&scanner, &store, ScanTrigger::Manual, None).await);
    let snap = store.snapshot().await;

    // one prop unit (Jokic points) and one game unit
    assert_eq!(snap.stats.units_evaluated, 2);
    assert_eq!(snap.stats.keys_active, 1);
    assert_eq!(snap.stats.keys_total, 2);
    assert!(snap.stats.arbitrages >= 1);
    // the three books agreeing on 26.5 are all near-misses both ways
    assert!(snap.stats.near_misses >= 6);
    assert!(snap.opportunities[0].is_arbitrage());

    let bets: Vec<_> = snap
        .opportunities
        .iter()
        .filter_map(|o| match o {
            Opportunity::Bet(b) => Some(b),
            _ => None,
        })
        .collect();

    let jazz = bets
        .iter()
        .find(|b| b.book == "d" && b.outcome == OutcomeKey::new("Utah Jazz", None))
        .unwrap();
    assert_eq!(jazz.basis, EdgeBasis::Devigged);
    assert_eq!(jazz.contributing_books, 3);

    let jokic = bets
        .iter()
        .find(|b| b.participant.as_deref() == Some("Nikola Jokic"))
        .unwrap();
    assert_eq!(jokic.book, "d");
    assert_eq!(
        jokic.basis,
        EdgeBasis::LineFallback {
            book_line: 24.5,
            consensus_line: 26.5
        }
    );
    assert!((jokic.gross_edge - 8.0).abs() < 1e-9);
    assert!((jokic.net_edge - 5.619).abs() < 1e-3);

    // the first request hit the dead key, then rotated
    let log = log.lock().unwrap();
    assert_eq!(log[0], ("/sports/basketball_nba/events".to_string(), DEAD_KEY.to_string()));
    assert_eq!(log[1], ("/sports/basketball_nba/events".to_string(), LIVE_KEY.to_string()));
    assert!(log[2..].iter().all(|(_, key)| key == LIVE_KEY));
}

#[tokio::test]
async fn test_dashboard_serves_scan_results() {
    let client = make_client(FakeOddsApi::nba().reject_key(DEAD_KEY), &[DEAD_KEY, LIVE_KEY]);
    let scanner = make_scanner(client.clone());
    let store = Arc::new(ResultStore::new());
    scan_once(&scanner, &store, ScanTrigger::Manual, None).await;

    let (state, _rx) = make_state(store, client);
    let json = get_json(state.clone(), "/api/opportunities").await;

    let rows = json["opportunities"].as_array().unwrap();
    assert_eq!(json["total"], rows.len());
    assert_eq!(json["scanning"], false);
    assert_eq!(rows[0]["type"], "arbitrage");
    assert!(rows[0]["recommendation"].as_str().unwrap().starts_with("ARB "));
    assert_eq!(rows[0]["stakes"].as_array().unwrap().len(), 2);

    let prop = rows.iter().find(|r| r["type"] == "player_prop").unwrap();
    assert_eq!(prop["player"], "Nikola Jokic");
    assert_eq!(prop["recommendation"], "OVER 24.5");
    assert_eq!(prop["label2_value"], "26.5");
    assert_eq!(prop["game"], "Utah Jazz @ Denver Nuggets");
    assert!(prop["confidence"].as_str().unwrap().starts_with("low"));

    let keys = get_json(state, "/api/key-status").await;
    assert_eq!(keys["keys"][0]["key"], "...aaaaaa");
    assert_eq!(keys["keys"][0]["status"], "exhausted");
    assert_eq!(keys["keys"][1]["key"], "...bbbbbb");
    assert_eq!(keys["keys"][1]["status"], "ok");
    assert_eq!(keys["keys"][1]["remaining"], "480");
}

#[tokio::test]
async fn test_manual_trigger_runs_worker_scan() {
    let client = make_client(FakeOddsApi::nba(), &[LIVE_KEY]);
    let scanner = make_scanner(client.clone());
    let store = Arc::new(ResultStore::new());
    let (state, rx) = make_state(store.clone(), client);

    let worker = tokio::spawn(run_worker(scanner, store.clone(), WorkerConfig::default(), rx));

    let resp = build_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/scan")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);

    for _ in 0..200 {
        if store.snapshot().await.last_scan.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let snap = store.snapshot().await;
    assert!(snap.last_scan.is_some());
    assert_eq!(snap.stats.units_evaluated, 2);

    worker.abort();
}

#[tokio::test]
async fn test_all_keys_rejected_publishes_empty_scan() {
    let api = FakeOddsApi::nba().reject_key(DEAD_KEY).reject_key(LIVE_KEY);
    let log = api.log();
    let scanner = make_scanner(make_client(api, &[DEAD_KEY, LIVE_KEY]));
    let store = ResultStore::new();

    scan_once(&scanner, &store, ScanTrigger::Interval, None).await;
    let snap = store.snapshot().await;

    assert!(snap.last_scan.is_some());
    assert!(snap.opportunities.is_empty());
    assert_eq!(snap.stats.keys_active, 0);
    // each key tried once on the first request, then the scan stops
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let path = temp_path();
    let scanner = make_scanner(make_client(FakeOddsApi::nba(), &[LIVE_KEY]));
    let store = ResultStore::new();
    scan_once(&scanner, &store, ScanTrigger::Startup, Some(&path)).await;
    let published = store.snapshot().await;

    let restored = ResultStore::with_snapshot(load_snapshot(&path).unwrap().unwrap());
    let snap = restored.snapshot().await;
    assert_eq!(snap.scan_id, published.scan_id);
    assert_eq!(snap.opportunities.len(), published.opportunities.len());
    assert_eq!(snap.stats, published.stats);

    std::fs::remove_file(&path).unwrap();
}
