//! Shared types for the EVFINDER scanner.
//!
//! These types form the data model used across all modules: quoted
//! prices, outcome identities, per-event quote sets, and the
//! opportunity records emitted by the strategy engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// A quoted price in the American convention.
///
/// Positive values are net profit per 100 staked, negative values are the
/// stake required to profit 100. Zero and non-finite values are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Price(f64);

impl Price {
    /// Build a price, returning `None` for zero or non-finite input.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value != 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Price {
    type Error = EvError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Price::new(value).ok_or(EvError::InvalidPrice(value))
    }
}

impl From<Price> for f64 {
    fn from(price: Price) -> f64 {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.0.round() as i64;
        if rounded > 0 {
            write!(f, "+{rounded}")
        } else {
            write!(f, "{rounded}")
        }
    }
}

// ---------------------------------------------------------------------------
// Line point
// ---------------------------------------------------------------------------

/// A numeric line (spread, total, or player line) attached to an outcome.
///
/// Equality, ordering and hashing use the exact bit pattern (with `-0.0`
/// folded into `0.0`), so two points are equal only on an exact match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point(f64);

impl Point {
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    /// Round to the nearest quarter point (ties to even), for grouping
    /// player lines that differ slightly across bookmakers.
    pub fn quarter(value: f64) -> Option<Self> {
        Self::new((value * 4.0).round_ties_even() / 4.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn negated(self) -> Self {
        Self(if self.0 == 0.0 { 0.0 } else { -self.0 })
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Outcome key
// ---------------------------------------------------------------------------

/// Identity of a priced proposition: outcome name plus optional line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutcomeKey {
    pub name: String,
    pub point: Option<Point>,
}

impl OutcomeKey {
    pub fn new(name: impl Into<String>, point: Option<Point>) -> Self {
        Self {
            name: name.into(),
            point,
        }
    }

    /// Whether this is one side of an over/under pair.
    pub fn is_total_side(&self) -> bool {
        is_total_name(&self.name)
    }

    /// Whether `other` is the opposite side of the same two-way proposition.
    ///
    /// Moneylines pair two different names without points; totals pair
    /// Over/Under at the same point; spreads pair opposite points.
    pub fn complements(&self, other: &OutcomeKey) -> bool {
        if self.name == other.name {
            return false;
        }
        match (self.point, other.point) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                if self.is_total_side() && other.is_total_side() {
                    a == b
                } else {
                    a == b.negated()
                }
            }
            _ => false,
        }
    }
}

impl fmt::Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.point {
            Some(p) => write!(f, "{} {}", self.name, p),
            None => write!(f, "{}", self.name),
        }
    }
}

fn is_total_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("over") || name.eq_ignore_ascii_case("under")
}

// ---------------------------------------------------------------------------
// Events and quote sets
// ---------------------------------------------------------------------------

/// The sporting event a quote set belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: String,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: Option<DateTime<Utc>>,
}

impl EventInfo {
    /// "Away @ Home" label.
    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }
}

/// Shape of a market, which decides how lines are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    /// Moneylines, spreads, game totals. Points match exactly.
    Game,
    /// Player over/under totals. Points are bucketed to the quarter.
    PlayerTotal,
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::Game => write!(f, "game"),
            MarketKind::PlayerTotal => write!(f, "player_total"),
        }
    }
}

/// Bookmaker key → outcome → price, for one event and one market
/// (and one player, for player totals).
///
/// Ordered maps keep every downstream iteration deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSet {
    pub event: EventInfo,
    pub market_key: String,
    pub kind: MarketKind,
    /// Player name for player-total markets.
    pub participant: Option<String>,
    pub books: BTreeMap<String, BTreeMap<OutcomeKey, Price>>,
}

impl QuoteSet {
    pub fn new(event: EventInfo, market_key: impl Into<String>, kind: MarketKind) -> Self {
        Self {
            event,
            market_key: market_key.into(),
            kind,
            participant: None,
            books: BTreeMap::new(),
        }
    }

    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    /// Record a price. A later quote for the same book and outcome wins.
    pub fn insert(&mut self, book: impl Into<String>, key: OutcomeKey, price: Price) {
        self.books.entry(book.into()).or_default().insert(key, price);
    }

    pub fn is_empty(&self) -> bool {
        self.books.values().all(|q| q.is_empty())
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn price(&self, book: &str, key: &OutcomeKey) -> Option<Price> {
        self.books.get(book).and_then(|q| q.get(key)).copied()
    }

    /// Every outcome quoted by any book.
    pub fn outcomes(&self) -> BTreeSet<OutcomeKey> {
        self.books.values().flat_map(|q| q.keys().cloned()).collect()
    }
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// How a bet's edge was derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum EdgeBasis {
    /// Leave-one-out devigged consensus.
    Devigged,
    /// Line comparison for a book quoting only one side. Lower confidence.
    LineFallback { book_line: f64, consensus_line: f64 },
}

/// A single-book price that beats the fair consensus of the other books.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetOpportunity {
    pub event: EventInfo,
    pub market: String,
    pub participant: Option<String>,
    pub outcome: OutcomeKey,
    pub book: String,
    /// Percentage points captured after the book's own margin.
    pub net_edge: f64,
    /// Percentage points of pricing disagreement before the book's margin.
    pub gross_edge: f64,
    pub price: Price,
    /// Implied probability of the offered price, margin included.
    pub juiced_prob: f64,
    pub consensus_prob: Option<f64>,
    pub fair_price: Option<Price>,
    /// Overround of the offering book on this market, in percentage points.
    pub juice: Option<f64>,
    pub contributing_books: usize,
    pub weight_sum: f64,
    pub stake_fraction: Option<f64>,
    pub basis: EdgeBasis,
}

/// One side of an arbitrage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbLeg {
    pub outcome: OutcomeKey,
    pub book: String,
    pub price: Price,
    pub implied: f64,
    pub stake: Decimal,
}

/// Two complementary prices from two books that lock in a profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbOpportunity {
    pub event: EventInfo,
    pub market: String,
    pub participant: Option<String>,
    pub legs: [ArbLeg; 2],
    pub total_implied: f64,
    pub profit_pct: f64,
    pub notional: Decimal,
}

/// Output record of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Opportunity {
    Bet(BetOpportunity),
    Arbitrage(ArbOpportunity),
}

impl Opportunity {
    pub fn is_arbitrage(&self) -> bool {
        matches!(self, Opportunity::Arbitrage(_))
    }

    /// Net edge for bets, guaranteed profit for arbitrage.
    pub fn score(&self) -> f64 {
        match self {
            Opportunity::Bet(b) => b.net_edge,
            Opportunity::Arbitrage(a) => a.profit_pct,
        }
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opportunity::Bet(b) => write!(
                f,
                "[BET] {} | {} | {} @ {} on {} | net {:+.1}% gross {:+.1}%",
                b.event.matchup(),
                b.market,
                b.outcome,
                b.price,
                b.book,
                b.net_edge,
                b.gross_edge,
            ),
            Opportunity::Arbitrage(a) => write!(
                f,
                "[ARB] {} | {} | {} @ {} on {} + {} @ {} on {} | profit {:.2}%",
                a.event.matchup(),
                a.market,
                a.legs[0].outcome,
                a.legs[0].price,
                a.legs[0].book,
                a.legs[1].outcome,
                a.legs[1].price,
                a.legs[1].book,
                a.profit_pct,
            ),
        }
    }
}

/// A bet that fell just short of the minimum edge. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearMiss {
    pub matchup: String,
    pub market: String,
    pub participant: Option<String>,
    pub outcome: OutcomeKey,
    pub book: String,
    pub net_edge: f64,
}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.participant {
            Some(p) => write!(
                f,
                "{:+.1}% {} {} on {} ({})",
                self.net_edge, p, self.outcome, self.book, self.matchup
            ),
            None => write!(
                f,
                "{:+.1}% {} on {} ({})",
                self.net_edge, self.outcome, self.book, self.matchup
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for EVFINDER.
#[derive(Debug, thiserror::Error)]
pub enum EvError {
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error("Invalid weight for {book}: {weight} (must be > 0)")]
    InvalidWeight { book: String, weight: f64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
