//! Fake Odds API for integration testing.
//!
//! Serves canned JSON by request path, rejects configured keys with a
//! 401, and records every request. All in-memory.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use evfinder::data::{ApiReply, ApiRequest, FetchError, OddsTransport};

/// Recorded `(path, api_key)` pairs, shared with the test body.
pub type RequestLog = Arc<Mutex<Vec<(String, String)>>>;

pub struct FakeOddsApi {
    routes: HashMap<String, String>,
    rejected_keys: HashSet<String>,
    log: RequestLog,
}

impl FakeOddsApi {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            rejected_keys: HashSet::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A fake pre-loaded with the NBA fixtures below.
    pub fn nba() -> Self {
        Self::new()
            .route("/sports", "[]")
            .route("/sports/basketball_nba/odds", NBA_MONEYLINE)
            .route("/sports/basketball_nba/events", NBA_EVENTS)
            .route("/sports/basketball_nba/events/e1/odds", NBA_POINTS_E1)
    }

    pub fn route(mut self, path: &str, body: &str) -> Self {
        self.routes.insert(path.to_string(), body.to_string());
        self
    }

    pub fn reject_key(mut self, key: &str) -> Self {
        self.rejected_keys.insert(key.to_string());
        self
    }

    /// Handle on the request log; stays valid after the fake is moved
    /// into a client.
    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }
}

fn reply(status: u16, body: &str) -> ApiReply {
    ApiReply {
        status,
        body: body.to_string(),
        requests_remaining: Some("480".to_string()),
        requests_used: Some("20".to_string()),
    }
}

#[async_trait]
impl OddsTransport for FakeOddsApi {
    async fn get(&self, request: &ApiRequest, api_key: &str) -> Result<ApiReply, FetchError> {
        self.log
            .lock()
            .unwrap()
            .push((request.path.clone(), api_key.to_string()));

        if self.rejected_keys.contains(api_key) {
            return Ok(reply(401, r#"{"message":"API key is not valid"}"#));
        }
        match self.routes.get(&request.path) {
            Some(body) => Ok(reply(200, body)),
            None => Ok(reply(404, r#"{"message":"Unknown route"}"#)),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Four books on one game. Book `d` hangs +160 on the Jazz while the
/// others sit near +120, which is both a +EV bet and (against the -140
/// Nuggets price) an arbitrage.
pub const NBA_MONEYLINE: &str = r#"[{
    "id": "e1", "sport_key": "basketball_nba",
    "home_team": "Denver Nuggets", "away_team": "Utah Jazz",
    "commence_time": "2026-01-10T02:00:00Z",
    "bookmakers": [
        {"key": "a", "title": "Book A", "markets": [{"key": "h2h", "outcomes": [
            {"name": "Denver Nuggets", "price": -140}, {"name": "Utah Jazz", "price": 120}]}]},
        {"key": "b", "title": "Book B", "markets": [{"key": "h2h", "outcomes": [
            {"name": "Denver Nuggets", "price": -145}, {"name": "Utah Jazz", "price": 125}]}]},
        {"key": "c", "title": "Book C", "markets": [{"key": "h2h", "outcomes": [
            {"name": "Denver Nuggets", "price": -140}, {"name": "Utah Jazz", "price": 120}]}]},
        {"key": "d", "title": "Book D", "markets": [{"key": "h2h", "outcomes": [
            {"name": "Denver Nuggets", "price": -190}, {"name": "Utah Jazz", "price": 160}]}]}
    ]
}]"#;

pub const NBA_EVENTS: &str = r#"[
    {"id": "e1", "sport_key": "basketball_nba",
     "home_team": "Denver Nuggets", "away_team": "Utah Jazz",
     "commence_time": "2026-01-10T02:00:00Z"}
]"#;

/// Three books agree on 26.5 both ways; book `d` only offers the over
/// at 24.5, two points under the market.
pub const NBA_POINTS_E1: &str = r#"{
    "id": "e1", "sport_key": "basketball_nba",
    "home_team": "Denver Nuggets", "away_team": "Utah Jazz",
    "bookmakers": [
        {"key": "a", "markets": [{"key": "player_points", "outcomes": [
            {"name": "Over", "description": "Nikola Jokic", "price": -110, "point": 26.5},
            {"name": "Under", "description": "Nikola Jokic", "price": -110, "point": 26.5}]}]},
        {"key": "b", "markets": [{"key": "player_points", "outcomes": [
            {"name": "Over", "description": "Nikola Jokic", "price": -110, "point": 26.5},
            {"name": "Under", "description": "Nikola Jokic", "price": -110, "point": 26.5}]}]},
        {"key": "c", "markets": [{"key": "player_points", "outcomes": [
            {"name": "Over", "description": "Nikola Jokic", "price": -110, "point": 26.5},
            {"name": "Under", "description": "Nikola Jokic", "price": -110, "point": 26.5}]}]},
        {"key": "d", "markets": [{"key": "player_points", "outcomes": [
            {"name": "Over", "description": "Nikola Jokic", "price": -110, "point": 24.5}]}]}
    ]
}"#;
