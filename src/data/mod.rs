//! Odds data sources.
//!
//! Defines the raw Odds API payload shapes, the `OddsTransport` trait the
//! client talks through, and the fetch error type. Everything upstream of
//! the engine lives here; nothing here does any pricing math.

pub mod normalize;
pub mod odds_api;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw payloads (Odds API v4 JSON → Rust)
// ---------------------------------------------------------------------------

/// One event as returned by `/sports/{sport}/odds`, `/events`, or
/// `/events/{id}/odds`. The events listing carries no bookmakers.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    #[serde(default)]
    pub sport_key: String,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    /// RFC 3339 start time. Parsed leniently during normalization.
    #[serde(default)]
    pub commence_time: Option<String>,
    #[serde(default)]
    pub bookmakers: Vec<RawBookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBookmaker {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markets: Vec<RawMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMarket {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<RawOutcome>,
}

/// A single priced outcome. Every field is optional on the wire; bad
/// entries are dropped during normalization rather than failing the
/// whole payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOutcome {
    #[serde(default)]
    pub name: Option<String>,
    /// Player name on player-prop markets.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub point: Option<serde_json::Value>,
}

impl RawOutcome {
    /// Numeric price. Strings and other JSON types are rejected.
    pub fn price_value(&self) -> Option<f64> {
        self.price.as_ref().and_then(serde_json::Value::as_f64)
    }

    /// Numeric point. Numeric strings are accepted.
    pub fn point_value(&self) -> Option<f64> {
        match self.point.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A GET against the Odds API, relative to the configured base URL. The
/// API key is supplied separately so it never ends up in logged requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }
}

/// Raw reply: status, body, and the quota headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
    /// `x-requests-remaining`
    pub requests_remaining: Option<String>,
    /// `x-requests-used`
    pub requests_used: Option<String>,
}

/// Failure of a single fetch. Converted to "no data" before it reaches the
/// engine.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("All API keys exhausted")]
    KeysExhausted,

    #[error("API key rejected (401)")]
    Unauthorized,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Abstraction over the HTTP layer so the client can be driven by a fake
/// in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OddsTransport: Send + Sync {
    /// Perform one GET with `api_key` attached.
    async fn get(&self, request: &ApiRequest, api_key: &str) -> Result<ApiReply, FetchError>;
}

// ---------------------------------------------------------------------------
// Key status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Ok,
    Exhausted,
    Error,
}

/// Quota probe result for one API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyStatus {
    /// Masked key, e.g. `...abc123`.
    pub key: String,
    pub status: KeyState,
    pub remaining: Option<String>,
    pub used: Option<String>,
}

/// Anything that can report per-key quota, for the dashboard.
#[async_trait]
pub trait KeyProbe: Send + Sync {
    async fn key_status(&self) -> Vec<KeyStatus>;
}
