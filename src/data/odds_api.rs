//! The Odds API v4 client.
//!
//! API docs: https://the-odds-api.com/liveapi/guides/v4/
//! Base URL: https://api.the-odds-api.com/v4
//! Auth: `apiKey` query parameter. A 401 means the key's quota is spent.
//!
//! Several keys can be configured. Each scan threads a [`KeyRotation`]
//! through its fetch calls: keys are used round-robin, a rejected key is
//! marked dead for the rest of the scan, and every call is bounded by the
//! number of keys.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    ApiReply, ApiRequest, FetchError, KeyProbe, KeyState, KeyStatus, OddsEvent, OddsTransport,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.the-odds-api.com/v4";

/// Query settings shared by every odds request.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsApiConfig {
    pub regions: String,
    /// Restricts responses to these books. Empty means every book.
    pub bookmakers: Vec<String>,
    pub odds_format: String,
}

impl Default for OddsApiConfig {
    fn default() -> Self {
        Self {
            regions: "us,us2".to_string(),
            bookmakers: Vec::new(),
            odds_format: "american".to_string(),
        }
    }
}

/// Mask a key to its last six characters, e.g. `...abc123`.
pub fn mask_key(key: &str) -> String {
    let tail = key.get(key.len().saturating_sub(6)..).unwrap_or("");
    format!("...{tail}")
}

// ---------------------------------------------------------------------------
// Key rotation
// ---------------------------------------------------------------------------

/// Per-scan key rotation state: a round-robin cursor and the set of keys
/// rejected so far.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRotation {
    cursor: usize,
    dead: BTreeSet<usize>,
    total: usize,
}

impl KeyRotation {
    pub fn new(total: usize) -> Self {
        Self {
            cursor: 0,
            dead: BTreeSet::new(),
            total,
        }
    }

    /// Index of the next live key, or `None` when every key is dead.
    pub fn next_key(&mut self) -> Option<usize> {
        for _ in 0..self.total {
            let index = self.cursor % self.total;
            self.cursor += 1;
            if !self.dead.contains(&index) {
                return Some(index);
            }
        }
        None
    }

    pub fn mark_dead(&mut self, index: usize) {
        if index < self.total {
            self.dead.insert(index);
        }
    }

    pub fn active(&self) -> usize {
        self.total - self.dead.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_exhausted(&self) -> bool {
        self.active() == 0
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OddsClient<T> {
    transport: T,
    keys: Vec<SecretString>,
    config: OddsApiConfig,
}

impl<T: OddsTransport> OddsClient<T> {
    pub fn new(transport: T, keys: Vec<SecretString>, config: OddsApiConfig) -> Self {
        Self {
            transport,
            keys,
            config,
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Fresh rotation state covering every configured key.
    pub fn rotation(&self) -> KeyRotation {
        KeyRotation::new(self.keys.len())
    }

    /// Issue `request` with the next live key, rotating past rejected keys.
    ///
    /// At most one attempt per key. A non-401 HTTP error is returned as-is
    /// without trying another key.
    async fn request(
        &self,
        rotation: &mut KeyRotation,
        request: &ApiRequest,
    ) -> Result<ApiReply, FetchError> {
        for _ in 0..self.keys.len() {
            let Some(index) = rotation.next_key() else {
                break;
            };
            let key = self.keys[index].expose_secret();
            let reply = self.transport.get(request, key).await?;
            match check_status(reply) {
                Ok(reply) => {
                    debug!(
                        path = %request.path,
                        key = %mask_key(key),
                        remaining = reply.requests_remaining.as_deref().unwrap_or("?"),
                        "Odds API request ok"
                    );
                    return Ok(reply);
                }
                Err(FetchError::Unauthorized) => {
                    rotation.mark_dead(index);
                    warn!(
                        key = %mask_key(key),
                        keys_left = rotation.active(),
                        "API key exhausted — rotating"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(FetchError::KeysExhausted)
    }

    fn odds_request(&self, path: String, market: &str) -> ApiRequest {
        let mut request = ApiRequest::new(path)
            .param("regions", self.config.regions.as_str())
            .param("markets", market)
            .param("oddsFormat", self.config.odds_format.as_str());
        if !self.config.bookmakers.is_empty() {
            request = request.param("bookmakers", self.config.bookmakers.join(","));
        }
        request
    }

    /// Bulk game-market odds for every upcoming event of `sport`.
    /// `None` on any failure.
    pub async fn fetch_odds(
        &self,
        rotation: &mut KeyRotation,
        sport: &str,
        market: &str,
    ) -> Option<Vec<OddsEvent>> {
        let request = self.odds_request(
            format!("/sports/{}/odds", urlencoding::encode(sport)),
            market,
        );
        let result = self
            .request(rotation, &request)
            .await
            .and_then(|reply| Ok(serde_json::from_str::<Vec<OddsEvent>>(&reply.body)?));

        match result {
            Ok(events) => {
                info!(sport, market, games = events.len(), "Fetched odds");
                Some(events)
            }
            Err(e) => {
                warn!(sport, market, error = %e, "Odds fetch failed");
                None
            }
        }
    }

    /// Upcoming events for `sport`, without odds. Empty on any failure.
    pub async fn fetch_events(&self, rotation: &mut KeyRotation, sport: &str) -> Vec<OddsEvent> {
        let request = ApiRequest::new(format!("/sports/{}/events", urlencoding::encode(sport)));
        let result = self
            .request(rotation, &request)
            .await
            .and_then(|reply| Ok(serde_json::from_str::<Vec<OddsEvent>>(&reply.body)?));

        match result {
            Ok(events) => {
                info!(sport, events = events.len(), "Fetched events");
                events
            }
            Err(e) => {
                warn!(sport, error = %e, "Events fetch failed");
                Vec::new()
            }
        }
    }

    /// Odds for one event and one market (used for player props).
    pub async fn fetch_event_odds(
        &self,
        rotation: &mut KeyRotation,
        sport: &str,
        event_id: &str,
        market: &str,
    ) -> Option<OddsEvent> {
        let request = self.odds_request(
            format!(
                "/sports/{}/events/{}/odds",
                urlencoding::encode(sport),
                urlencoding::encode(event_id)
            ),
            market,
        );
        let result = self
            .request(rotation, &request)
            .await
            .and_then(|reply| Ok(serde_json::from_str::<OddsEvent>(&reply.body)?));

        match result {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(sport, event_id, market, error = %e, "Event odds fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl<T: OddsTransport> KeyProbe for OddsClient<T> {
    /// Probe every key against `/sports` (free endpoint) and report quota.
    async fn key_status(&self) -> Vec<KeyStatus> {
        let request = ApiRequest::new("/sports");
        let mut statuses = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let key = key.expose_secret();
            let status = match self.transport.get(&request, key).await {
                Ok(reply) => KeyStatus {
                    key: mask_key(key),
                    status: if reply.status == 200 {
                        KeyState::Ok
                    } else {
                        KeyState::Exhausted
                    },
                    remaining: reply.requests_remaining,
                    used: reply.requests_used,
                },
                Err(e) => {
                    warn!(key = %mask_key(key), error = %e, "Key probe failed");
                    KeyStatus {
                        key: mask_key(key),
                        status: KeyState::Error,
                        remaining: None,
                        used: None,
                    }
                }
            };
            statuses.push(status);
        }
        statuses
    }
}

fn check_status(reply: ApiReply) -> Result<ApiReply, FetchError> {
    match reply.status {
        200 => Ok(reply),
        401 => Err(FetchError::Unauthorized),
        status => Err(FetchError::Http {
            status,
            message: error_message(&reply.body),
        }),
    }
}

/// The API's `message` field if the body is JSON, else the first 100
/// characters of the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(100).collect())
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// `reqwest`-backed transport.
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("EVFINDER/0.1.0")
            .build()
            .context("Failed to build HTTP client for The Odds API")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl OddsTransport for HttpTransport {
    async fn get(&self, request: &ApiRequest, api_key: &str) -> Result<ApiReply, FetchError> {
        let url = format!("{}{}", self.base_url, request.path);
        let resp = self
            .http
            .get(&url)
            .query(&[("apiKey", api_key)])
            .query(&request.query)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = resp.status().as_u16();
        let requests_remaining = header_value(resp.headers(), "x-requests-remaining");
        let requests_used = header_value(resp.headers(), "x-requests-used");
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        Ok(ApiReply {
            status,
            body,
            requests_remaining,
            requests_used,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
